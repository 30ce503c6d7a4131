//! `/settings`: result count, journals, categories and auto-download.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing::info;

use super::keyboard::{Action, SettingsAction, button, markup};
use super::{BotState, Ctx};
use crate::error::Result;
use crate::session::Awaiting;
use crate::store::preferences::{CATEGORY_FIELDS, MAX_RESULT_CHOICES, Preferences, is_known_category};
use crate::text::escape;

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![button("« Back to Settings", Action::Settings(SettingsAction::Menu))]
}

pub fn menu_text(prefs: &Preferences) -> String {
    let journals = if prefs.specific_journals.is_empty() {
        "None".to_string()
    } else {
        escape(&prefs.specific_journals.join(", "))
    };
    format!(
        "🛠 <b>User Preferences</b>\n\n\
         Current Settings:\n\
         📊 Max Results: {}\n\
         📚 Specific Journals: {journals}\n\
         🏷️ Categories: {} selected\n\
         📥 Auto-download PDFs: {}\n\
         ⏰ Last Updated: {}\n\n\
         Select a setting to modify:",
        prefs.max_results,
        prefs.preferred_categories.len(),
        if prefs.auto_download { "On" } else { "Off" },
        escape(&prefs.last_updated),
    )
}

pub fn menu_keyboard(prefs: &Preferences) -> InlineKeyboardMarkup {
    let auto = if prefs.auto_download { "📥 Auto-download: On" } else { "📥 Auto-download: Off" };
    markup(vec![
        vec![
            button("📊 Max Results", Action::Settings(SettingsAction::MaxResults)),
            button("📚 Journals", Action::Settings(SettingsAction::Journals)),
        ],
        vec![
            button("🏷️ Categories", Action::Settings(SettingsAction::Categories)),
            button(auto, Action::Settings(SettingsAction::AutoDownload)),
        ],
        vec![button("🔄 Reset Preferences", Action::Settings(SettingsAction::Reset))],
    ])
}

fn journals_text(prefs: &Preferences) -> String {
    let mut text = "📚 <b>Journal Preferences</b>\n\n<b>Current journals:</b>\n".to_string();
    if prefs.specific_journals.is_empty() {
        text.push_str("<i>No journals selected</i>");
    } else {
        for journal in &prefs.specific_journals {
            text.push_str(&format!("• {}\n", escape(journal)));
        }
    }
    text.push_str("\n\nTap ➕ to add a journal or ❌ to remove one.");
    text
}

pub fn journals_keyboard(prefs: &Preferences) -> InlineKeyboardMarkup {
    let mut rows: Vec<_> = prefs
        .specific_journals
        .iter()
        .enumerate()
        .map(|(i, j)| vec![button(format!("❌ Remove {j}"), Action::Settings(SettingsAction::RemoveJournal(i)))])
        .collect();
    rows.push(vec![button("➕ Add New Journal", Action::Settings(SettingsAction::AddJournal))]);
    rows.push(back_row());
    markup(rows)
}

fn fields_text(prefs: &Preferences) -> String {
    let selected = if prefs.preferred_categories.is_empty() {
        "None selected".to_string()
    } else {
        prefs
            .preferred_categories
            .iter()
            .map(|c| format!("• {}", escape(c)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("🏷️ <b>Category Preferences</b>\n\nSelected Categories:\n{selected}\n\nChoose a field to view categories:")
}

fn fields_keyboard() -> InlineKeyboardMarkup {
    let mut rows: Vec<_> = CATEGORY_FIELDS
        .iter()
        .enumerate()
        .map(|(i, (field, _))| vec![button(format!("📚 {field}"), Action::Settings(SettingsAction::Field(i)))])
        .collect();
    rows.push(back_row());
    markup(rows)
}

/// Field index holding `code`.
fn field_of(code: &str) -> Option<usize> {
    CATEGORY_FIELDS
        .iter()
        .position(|(_, cats)| cats.iter().any(|(c, _)| *c == code))
}

pub fn field_keyboard(index: usize, prefs: &Preferences) -> Option<InlineKeyboardMarkup> {
    let (_, cats) = CATEGORY_FIELDS.get(index)?;
    let mut rows: Vec<_> = cats
        .iter()
        .map(|(code, name)| {
            let mark = if prefs.preferred_categories.iter().any(|c| c == code) { "✅" } else { "⭕️" };
            vec![button(
                format!("{mark} {name} ({code})"),
                Action::Settings(SettingsAction::ToggleCategory(code.to_string())),
            )]
        })
        .collect();
    rows.push(vec![
        button("« Back to Fields", Action::Settings(SettingsAction::Categories)),
        button("« Main Menu", Action::Settings(SettingsAction::Menu)),
    ]);
    Some(markup(rows))
}

fn field_text(index: usize) -> String {
    let name = CATEGORY_FIELDS.get(index).map(|(f, _)| *f).unwrap_or("Unknown");
    format!(
        "🏷️ <b>{name} Categories</b>\n\n\
         Tap a category to toggle selection:\n✅ = Selected\n⭕️ = Not Selected\n\n\
         Your selections narrow every search."
    )
}

pub async fn show_menu(state: &BotState, ctx: &Ctx, origin: Option<MessageId>) -> Result<()> {
    state.sessions.with(ctx.uid(), |s| s.awaiting = None).await;
    let prefs = state.preferences.get(ctx.uid())?;
    state.show(ctx, origin, &menu_text(&prefs), menu_keyboard(&prefs)).await
}

async fn show_field(state: &BotState, ctx: &Ctx, origin: Option<MessageId>, index: usize, prefs: &Preferences) -> Result<()> {
    let Some(kb) = field_keyboard(index, prefs) else {
        return Ok(());
    };
    state.show(ctx, origin, &field_text(index), kb).await
}

/// Button presses in the settings menu. Returns a toast for the callback answer.
pub async fn handle(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    action: SettingsAction,
) -> Result<Option<String>> {
    let uid = ctx.uid();
    match action {
        SettingsAction::Menu => show_menu(state, ctx, origin).await?,
        SettingsAction::MaxResults => {
            let current = state.preferences.get(uid)?.max_results;
            let choices = MAX_RESULT_CHOICES
                .iter()
                .map(|&n| button(n.to_string(), Action::Settings(SettingsAction::SetMaxResults(n))))
                .collect();
            let text = format!(
                "📊 <b>Maximum Results Settings</b>\n\nCurrent setting: {current}\nSelect new maximum number of search results:"
            );
            state.show(ctx, origin, &text, markup(vec![choices, back_row()])).await?;
        }
        SettingsAction::SetMaxResults(n) => {
            state.preferences.set_max_results(uid, n)?;
            show_menu(state, ctx, origin).await?;
            return Ok(Some(format!("✅ Maximum results updated to {n}")));
        }
        SettingsAction::Journals => {
            state.sessions.with(uid, |s| s.awaiting = None).await;
            let prefs = state.preferences.get(uid)?;
            state.show(ctx, origin, &journals_text(&prefs), journals_keyboard(&prefs)).await?;
        }
        SettingsAction::AddJournal => {
            state.sessions.with(uid, |s| s.awaiting = Some(Awaiting::JournalName)).await;
            let text = "📝 <b>Add New Journal</b>\n\n\
                        Send the journal name as a message.\n\n\
                        Example: <code>Nature</code> or <code>Science</code>";
            let kb = markup(vec![vec![button("« Back to Journals", Action::Settings(SettingsAction::Journals))]]);
            state.show(ctx, origin, text, kb).await?;
        }
        SettingsAction::RemoveJournal(index) => {
            let (removed, prefs) = state.preferences.update(uid, |p| p.remove_journal(index))?;
            state.show(ctx, origin, &journals_text(&prefs), journals_keyboard(&prefs)).await?;
            return Ok(removed.map(|j| format!("Removed {j}")));
        }
        SettingsAction::Categories => {
            let prefs = state.preferences.get(uid)?;
            state.show(ctx, origin, &fields_text(&prefs), fields_keyboard()).await?;
        }
        SettingsAction::Field(index) => {
            let prefs = state.preferences.get(uid)?;
            show_field(state, ctx, origin, index, &prefs).await?;
        }
        SettingsAction::ToggleCategory(code) => {
            if !is_known_category(&code) {
                return Ok(Some("❌ Unknown category".into()));
            }
            let (selected, prefs) = state.preferences.update(uid, |p| p.toggle_category(&code))?;
            if let Some(index) = field_of(&code) {
                show_field(state, ctx, origin, index, &prefs).await?;
            }
            return Ok(Some(if selected { "Category added!" } else { "Category removed!" }.into()));
        }
        SettingsAction::AutoDownload => {
            let (on, prefs) = state.preferences.update(uid, |p| {
                p.auto_download = !p.auto_download;
                p.auto_download
            })?;
            state.show(ctx, origin, &menu_text(&prefs), menu_keyboard(&prefs)).await?;
            return Ok(Some(if on { "📥 Auto-download on" } else { "Auto-download off" }.into()));
        }
        SettingsAction::Reset => {
            let prefs = state.preferences.reset(uid)?;
            info!("🔄 Preferences reset for {uid}");
            state.show(ctx, origin, &menu_text(&prefs), menu_keyboard(&prefs)).await?;
            return Ok(Some("✅ Preferences reset to default values".into()));
        }
    }
    Ok(None)
}

/// A journal name typed after "Add New Journal".
pub async fn on_text(state: &BotState, ctx: &Ctx, text: &str) -> Result<()> {
    let name = text.trim();
    state.sessions.with(ctx.uid(), |s| s.awaiting = None).await;
    let (added, prefs) = state.preferences.update(ctx.uid(), |p| p.add_journal(name))?;

    let reply = if name.is_empty() {
        "❌ Please send a journal name.".to_string()
    } else if added {
        format!("✅ Added '{}' to your preferred journals!", escape(name))
    } else {
        format!("❌ '{}' is already in your preferred journals!", escape(name))
    };
    state.telegram.send_text(ctx.chat, &reply).await?;
    state
        .telegram
        .send(ctx.chat, &journals_text(&prefs), Some(journals_keyboard(&prefs)))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::callback_data;

    #[test]
    fn test_menu_text() {
        let mut prefs = Preferences::default();
        prefs.add_journal("Nature & Co");
        prefs.toggle_category("cs.AI");
        let text = menu_text(&prefs);
        assert!(text.contains("Max Results: 10"));
        assert!(text.contains("Nature &amp; Co"));
        assert!(text.contains("1 selected"));
        assert!(text.contains("Auto-download PDFs: Off"));
    }

    #[test]
    fn test_journals_keyboard_by_index() {
        let mut prefs = Preferences::default();
        prefs.add_journal("Nature");
        prefs.add_journal("Physical Review Letters");
        assert_eq!(callback_data(&journals_keyboard(&prefs)), vec!["set:jrm:0", "set:jrm:1", "set:jadd", "set:menu"]);
    }

    #[test]
    fn test_field_keyboard_marks_selection() {
        let mut prefs = Preferences::default();
        prefs.toggle_category("cs.LG");
        let kb = field_keyboard(0, &prefs).unwrap();
        let labels: Vec<&str> = kb.inline_keyboard.iter().flatten().map(|b| b.text.as_str()).collect();
        assert!(labels.contains(&"✅ Machine Learning (cs.LG)"));
        assert!(labels.contains(&"⭕️ Robotics (cs.RO)"));
        assert!(field_keyboard(CATEGORY_FIELDS.len(), &prefs).is_none());
    }

    #[test]
    fn test_field_of() {
        assert_eq!(field_of("cs.AI"), Some(0));
        assert_eq!(field_of("q-bio.NC"), Some(4));
        assert_eq!(field_of("nope"), None);
    }
}
