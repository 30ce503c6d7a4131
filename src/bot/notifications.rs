//! `/notifications` menu and the scheduled digest job.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing::{error, info, warn};

use super::keyboard::{Action, NotifyAction, button, markup, pairs};
use super::{BotState, Ctx};
use crate::error::Result;
use crate::paper::query::notification_query;
use crate::paper::{Paper, SortBy};
use crate::session::Awaiting;
use crate::store::StoreError;
use crate::store::notifications::{Frequency, NotificationSettings};
use crate::store::preferences::{CATEGORY_FIELDS, is_known_category};
use crate::text::escape;

const DIGEST_SEARCH_SIZE: u32 = 10;
const DIGEST_SHOWN: usize = 5;

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![button("« Back", Action::Notify(NotifyAction::Menu))]
}

pub fn menu_text(settings: &NotificationSettings) -> String {
    let list = |items: &[String]| {
        if items.is_empty() { "None".to_string() } else { escape(&items.join(", ")) }
    };
    format!(
        "🔔 <b>Notification Settings</b>\n\n\
         Status: {}\n\
         Frequency: {}\n\
         Time: {} UTC\n\
         Keywords: {}\n\
         Categories: {}\n\n\
         New papers matching your keywords and categories are sent as a digest.",
        if settings.enabled { "✅ Enabled" } else { "❌ Disabled" },
        settings.frequency.label(),
        escape(&settings.notification_time),
        list(&settings.keywords),
        list(&settings.categories),
    )
}

pub fn menu_keyboard(settings: &NotificationSettings) -> InlineKeyboardMarkup {
    let toggle = if settings.enabled { "🔕 Disable" } else { "🔔 Enable" };
    let other = match settings.frequency {
        Frequency::Daily => Frequency::Weekly,
        Frequency::Weekly => Frequency::Daily,
    };
    markup(vec![
        vec![
            button(toggle, Action::Notify(NotifyAction::Toggle)),
            button(format!("📅 Switch to {}", other.label()), Action::Notify(NotifyAction::Frequency(other))),
        ],
        vec![
            button("🔑 Keywords", Action::Notify(NotifyAction::Keywords)),
            button("🏷️ Categories", Action::Notify(NotifyAction::Categories)),
        ],
        vec![button("⏰ Notification Time", Action::Notify(NotifyAction::Time))],
    ])
}

fn keywords_text(settings: &NotificationSettings) -> String {
    let mut text = "🔑 <b>Notification Keywords</b>\n\n".to_string();
    if settings.keywords.is_empty() {
        text.push_str("<i>No keywords yet</i>");
    } else {
        for keyword in &settings.keywords {
            text.push_str(&format!("• {}\n", escape(keyword)));
        }
    }
    text.push_str("\n\nPapers must match every keyword.");
    text
}

pub fn keywords_keyboard(settings: &NotificationSettings) -> InlineKeyboardMarkup {
    let mut rows: Vec<_> = settings
        .keywords
        .iter()
        .enumerate()
        .map(|(i, k)| vec![button(format!("❌ {k}"), Action::Notify(NotifyAction::RemoveKeyword(i)))])
        .collect();
    rows.push(vec![button("➕ Add Keyword", Action::Notify(NotifyAction::AddKeyword))]);
    rows.push(back_row());
    markup(rows)
}

pub fn categories_keyboard(settings: &NotificationSettings) -> InlineKeyboardMarkup {
    let toggles = CATEGORY_FIELDS
        .iter()
        .flat_map(|(_, cats)| cats.iter())
        .map(|(code, _)| {
            let mark = if settings.categories.iter().any(|c| c == code) { "✅" } else { "⭕️" };
            button(format!("{mark} {code}"), Action::Notify(NotifyAction::ToggleCategory(code.to_string())))
        })
        .collect();
    let mut rows = pairs(toggles);
    rows.push(back_row());
    markup(rows)
}

const CATEGORIES_TEXT: &str = "🏷️ <b>Notification Categories</b>\n\nDigests are limited to the selected categories.\n✅ = Selected\n⭕️ = Not Selected";

pub async fn show_menu(state: &BotState, ctx: &Ctx, origin: Option<MessageId>) -> Result<()> {
    state.sessions.with(ctx.uid(), |s| s.awaiting = None).await;
    let settings = state.notifications.get(ctx.uid())?;
    state.show(ctx, origin, &menu_text(&settings), menu_keyboard(&settings)).await
}

/// Button presses in the notification menu. Returns a toast for the callback answer.
pub async fn handle(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    action: NotifyAction,
) -> Result<Option<String>> {
    let uid = ctx.uid();
    match action {
        NotifyAction::Menu => show_menu(state, ctx, origin).await?,
        NotifyAction::Toggle => {
            let (enabled, settings) = state.notifications.update(uid, |s| {
                s.enabled = !s.enabled;
                s.enabled
            })?;
            info!("🔔 Notifications {} for {uid}", if enabled { "enabled" } else { "disabled" });
            state.show(ctx, origin, &menu_text(&settings), menu_keyboard(&settings)).await?;
            return Ok(Some(if enabled { "🔔 Notifications enabled" } else { "🔕 Notifications disabled" }.into()));
        }
        NotifyAction::Frequency(frequency) => {
            let (_, settings) = state.notifications.update(uid, |s| s.frequency = frequency)?;
            state.show(ctx, origin, &menu_text(&settings), menu_keyboard(&settings)).await?;
            return Ok(Some(format!("📅 {} digests", frequency.label())));
        }
        NotifyAction::Keywords => {
            state.sessions.with(uid, |s| s.awaiting = None).await;
            let settings = state.notifications.get(uid)?;
            state.show(ctx, origin, &keywords_text(&settings), keywords_keyboard(&settings)).await?;
        }
        NotifyAction::AddKeyword => {
            state.sessions.with(uid, |s| s.awaiting = Some(Awaiting::NotificationKeyword)).await;
            let text = "🔑 <b>Add Keyword</b>\n\nSend a keyword or phrase, e.g. <code>graph neural networks</code>";
            let kb = markup(vec![vec![button("« Back to Keywords", Action::Notify(NotifyAction::Keywords))]]);
            state.show(ctx, origin, text, kb).await?;
        }
        NotifyAction::RemoveKeyword(index) => {
            let (removed, settings) = state.notifications.update(uid, |s| s.remove_keyword(index))?;
            state.show(ctx, origin, &keywords_text(&settings), keywords_keyboard(&settings)).await?;
            return Ok(removed.map(|k| format!("Removed {k}")));
        }
        NotifyAction::Time => {
            state.sessions.with(uid, |s| s.awaiting = Some(Awaiting::NotificationTime)).await;
            let current = state.notifications.get(uid)?.notification_time;
            let text = format!(
                "⏰ <b>Notification Time</b>\n\nCurrent: {} UTC\n\nSend a new time in HH:MM (24h, UTC), e.g. <code>08:30</code>",
                escape(&current)
            );
            state.show(ctx, origin, &text, markup(vec![back_row()])).await?;
        }
        NotifyAction::Categories => {
            let settings = state.notifications.get(uid)?;
            state.show(ctx, origin, CATEGORIES_TEXT, categories_keyboard(&settings)).await?;
        }
        NotifyAction::ToggleCategory(code) => {
            if !is_known_category(&code) {
                return Ok(Some("❌ Unknown category".into()));
            }
            let (selected, settings) = state.notifications.update(uid, |s| s.toggle_category(&code))?;
            state.show(ctx, origin, CATEGORIES_TEXT, categories_keyboard(&settings)).await?;
            return Ok(Some(if selected { "Category added!" } else { "Category removed!" }.into()));
        }
    }
    Ok(None)
}

/// Text typed while a keyword or a time is awaited.
pub async fn on_text(state: &BotState, ctx: &Ctx, awaiting: Awaiting, text: &str) -> Result<()> {
    let uid = ctx.uid();
    match awaiting {
        Awaiting::NotificationKeyword => {
            state.sessions.with(uid, |s| s.awaiting = None).await;
            let (added, settings) = state.notifications.update(uid, |s| s.add_keyword(text))?;
            let reply = if added {
                format!("✅ Added keyword '{}'", escape(text.trim().to_lowercase().as_str()))
            } else {
                "❌ That keyword is empty or already in your list.".to_string()
            };
            state.telegram.send_text(ctx.chat, &reply).await?;
            state
                .telegram
                .send(ctx.chat, &keywords_text(&settings), Some(keywords_keyboard(&settings)))
                .await?;
        }
        Awaiting::NotificationTime => match state.notifications.set_time(uid, text) {
            Ok(time) => {
                state.sessions.with(uid, |s| s.awaiting = None).await;
                state
                    .telegram
                    .send_text(ctx.chat, &format!("✅ Digests will arrive after {time} UTC."))
                    .await?;
                show_menu(state, ctx, None).await?;
            }
            Err(StoreError::Invalid(_)) => {
                state
                    .telegram
                    .send(
                        ctx.chat,
                        "❌ Invalid time. Please use HH:MM (24h), e.g. <code>18:00</code>",
                        Some(markup(vec![back_row()])),
                    )
                    .await?;
            }
            Err(e) => return Err(e.into()),
        },
        _ => {}
    }
    Ok(())
}

/// Papers published after `since`; everything when there is no previous scan.
pub fn new_since(papers: Vec<Paper>, since: Option<DateTime<Utc>>) -> Vec<Paper> {
    match since {
        Some(since) => papers.into_iter().filter(|p| p.published > since).collect(),
        None => papers,
    }
}

pub fn digest_message(papers: &[Paper]) -> String {
    let mut text = format!(
        "🔔 <b>New Papers Alert!</b>\n\nFound {} new papers matching your interests:\n\n",
        papers.len()
    );
    for (i, paper) in papers.iter().take(DIGEST_SHOWN).enumerate() {
        text.push_str(&format!(
            "{}. <a href=\"{}\">{}</a>\n",
            i + 1,
            escape(&paper.pdf_url),
            escape(&paper.title)
        ));
    }
    if papers.len() > DIGEST_SHOWN {
        text.push_str(&format!("\n<i>...and {} more papers</i>", papers.len() - DIGEST_SHOWN));
    }
    text
}

/// Run the digest scan on the configured cron schedule until the process exits.
pub fn spawn_digest_job(state: Arc<BotState>) {
    let schedule = match Schedule::from_str(&state.config.notification_scan_cron) {
        Ok(schedule) => schedule,
        Err(e) => {
            error!("Digest job disabled, invalid cron: {e}");
            return;
        }
    };
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = schedule.after(&now).next() else {
                warn!("No future occurrence for digest cron, stopping");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            run_scan(&state, Utc::now()).await;
        }
    });
}

/// One pass over every user with notification settings.
pub async fn run_scan(state: &BotState, now: DateTime<Utc>) {
    let users = match state.notifications.user_ids() {
        Ok(users) => users,
        Err(e) => {
            error!("Digest scan could not list users: {e}");
            return;
        }
    };
    let mut sent = 0;
    for user_id in users {
        match notify_user(state, user_id, now).await {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(e) => error!("Digest for {user_id} failed: {e}"),
        }
    }
    if sent > 0 {
        info!("🔔 Sent {sent} digest(s)");
    }
}

/// Returns whether a digest was sent.
async fn notify_user(state: &BotState, user_id: i64, now: DateTime<Utc>) -> Result<bool> {
    let settings = state.notifications.get(user_id)?;
    if !settings.should_notify(now) {
        return Ok(false);
    }
    let Some(query) = notification_query(&settings.keywords, &settings.categories) else {
        return Ok(false);
    };

    let papers = state.papers.search(&query, DIGEST_SEARCH_SIZE, SortBy::SubmittedDate).await?;
    let fresh = new_since(papers, settings.last_checked_at());
    if !fresh.is_empty() {
        state.telegram.send_text(ChatId(user_id), &digest_message(&fresh)).await?;
    }
    state.notifications.update(user_id, |s| s.mark_checked(now))?;
    Ok(!fresh.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::callback_data;
    use crate::paper::sample_paper;
    use chrono::TimeZone;

    #[test]
    fn test_new_since() {
        let old = sample_paper("1", "old", "s");
        let mut fresh = sample_paper("2", "fresh", "s");
        fresh.published = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let kept = new_since(vec![old.clone(), fresh.clone()], Some(since));
        assert_eq!(kept, vec![fresh.clone()]);
        assert_eq!(new_since(vec![old, fresh], None).len(), 2);
    }

    #[test]
    fn test_digest_message_caps_links() {
        let papers: Vec<Paper> = (0..7).map(|i| sample_paper(&i.to_string(), &format!("T{i}"), "s")).collect();
        let text = digest_message(&papers);
        assert!(text.contains("Found 7 new papers"));
        assert!(text.contains("5. <a href="));
        assert!(!text.contains("6. <a href="));
        assert!(text.contains("...and 2 more papers"));

        assert!(!digest_message(&papers[..2]).contains("more papers"));
    }

    #[test]
    fn test_menu_keyboard_offers_other_frequency() {
        let settings = NotificationSettings::default();
        let data = callback_data(&menu_keyboard(&settings));
        assert_eq!(data, vec!["n:toggle", "n:freq:weekly", "n:kw", "n:cats", "n:time"]);
    }

    #[test]
    fn test_keywords_keyboard_by_index() {
        let mut settings = NotificationSettings::default();
        settings.add_keyword("Transformers");
        settings.add_keyword("diffusion");
        let data = callback_data(&keywords_keyboard(&settings));
        assert_eq!(data, vec!["n:kwrm:0", "n:kwrm:1", "n:kwadd", "n:menu"]);
    }

    #[test]
    fn test_categories_cover_catalog() {
        let settings = NotificationSettings::default();
        let total: usize = CATEGORY_FIELDS.iter().map(|(_, c)| c.len()).sum();
        // plus the back button
        assert_eq!(callback_data(&categories_keyboard(&settings)).len(), total + 1);
    }
}
