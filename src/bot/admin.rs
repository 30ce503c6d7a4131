//! `/admin` panel: statistics, users, restrictions, admins and broadcast.
//!
//! Every action requires an admin. Managing admins and broadcasting are
//! reserved for the owner.

use chrono::{DateTime, Duration, Utc};
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing::{info, warn};

use super::keyboard::{Action, AdminAction, button, markup, pager};
use super::{BotState, Ctx};
use crate::error::Result;
use crate::session::{Awaiting, BroadcastDraft, BroadcastTarget};
use crate::store::admin::{RestrictionEntry, Statistics, UserRecord, paginate};
use crate::text::escape;

pub const USERS_PER_PAGE: usize = 10;
pub const RESTRICTIONS_PER_PAGE: usize = 5;
pub const BROADCAST_PICK_PER_PAGE: usize = 5;
const ACTIVE_WINDOW_HOURS: i64 = 24;
/// Longest timed restriction, about a century. Longer bans are blocks.
const MAX_RESTRICT_HOURS: i64 = 24 * 365 * 100;

/// `<id|@user> <hours> [reason]`
pub fn parse_restrict(text: &str) -> Option<(String, i64, String)> {
    let mut parts = text.split_whitespace();
    let user = parts.next()?.to_string();
    let hours: i64 = parts.next()?.parse().ok()?;
    if !(1..=MAX_RESTRICT_HOURS).contains(&hours) {
        return None;
    }
    let reason = parts.collect::<Vec<_>>().join(" ");
    Some((user, hours, reason))
}

/// When a restriction of `hours` starting at `now` ends. `None` past chrono's range.
pub fn restriction_end(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_hours(hours)?)
}

/// `<id|@user> [reason]`
pub fn parse_user_and_reason(text: &str) -> Option<(String, String)> {
    let mut parts = text.split_whitespace();
    let user = parts.next()?.to_string();
    Some((user, parts.collect::<Vec<_>>().join(" ")))
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![button("« Back", Action::Admin(AdminAction::Menu))]
}

fn cancel_keyboard() -> InlineKeyboardMarkup {
    markup(vec![vec![button("« Cancel", Action::Admin(AdminAction::Menu))]])
}

pub fn panel_text(stats: &Statistics) -> String {
    format!(
        "🛠 <b>Admin Control Panel</b>\n\n\
         Current Statistics:\n\
         • 👥 Total Users: {}\n\
         • 🔍 Total Searches: {}\n\
         • 📥 Total Downloads: {}\n\
         • 🤖 Total Summaries: {}\n\
         • 📊 Active Today: {}\n\n\
         Select an option to manage:",
        stats.total_users, stats.total_searches, stats.total_downloads, stats.total_summaries, stats.active_users_today,
    )
}

pub fn panel_keyboard(is_owner: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![button("📊 Statistics", Action::Admin(AdminAction::Stats))],
        vec![button("👥 Manage Users", Action::Admin(AdminAction::Users(0)))],
        vec![button("🚫 Manage Restrictions", Action::Admin(AdminAction::Restrictions(0)))],
    ];
    if is_owner {
        rows.push(vec![button("👮 Manage Admins", Action::Admin(AdminAction::Admins))]);
        rows.push(vec![button("📢 Broadcast Message", Action::Admin(AdminAction::Broadcast))]);
    }
    markup(rows)
}

fn stats_text(stats: &Statistics, data_points: usize) -> String {
    format!(
        "📊 <b>Detailed Statistics</b>\n\n\
         👥 <b>User Stats:</b>\n\
         • Total Users: {}\n\
         • Active Today: {}\n\n\
         🔍 <b>Activity Stats:</b>\n\
         • Total Searches: {}\n\
         • Total Downloads: {}\n\
         • Total Summaries: {}\n\n\
         📈 <b>System Stats:</b>\n\
         • Last Reset: {}\n\
         • Data Points: {data_points}",
        stats.total_users,
        stats.active_users_today,
        stats.total_searches,
        stats.total_downloads,
        stats.total_summaries,
        escape(&stats.last_reset),
    )
}

fn display_name(record: &UserRecord) -> String {
    match &record.username {
        Some(name) => format!("@{}", escape(name)),
        None => "(no username)".to_string(),
    }
}

pub fn users_text(users: &[(i64, UserRecord)], page: usize, pages: usize) -> String {
    let mut text = "👥 <b>User Management</b>\n\n".to_string();
    if users.is_empty() {
        text.push_str("<i>No users yet</i>\n");
    }
    for (id, record) in users {
        text.push_str(&format!(
            "<b>ID:</b> <code>{id}</code>\n<b>Username:</b> {}\n<b>Last Active:</b> {}\n<b>Total Actions:</b> {}\n\n",
            display_name(record),
            escape(&record.last_active),
            record.total_actions,
        ));
    }
    text.push_str(&format!("Page {}/{pages}", page + 1));
    text
}

pub fn restrictions_text(entries: &[RestrictionEntry], page: usize, pages: usize) -> String {
    let mut text = "🚫 <b>Restriction Management</b>\n".to_string();
    if entries.is_empty() {
        text.push_str("\n<i>No active restrictions</i>\n");
    }
    for entry in entries {
        match entry {
            RestrictionEntry::Blocked(id) => {
                text.push_str(&format!("\n⛔️ <code>{id}</code>\n<b>Type:</b> blocked\n"));
            }
            RestrictionEntry::Timed { user_id, restriction } => {
                text.push_str(&format!(
                    "\n⏳ <code>{user_id}</code>\n<b>Type:</b> restricted\n<b>Until:</b> {}\n<b>Reason:</b> {}\n",
                    escape(&restriction.end_time),
                    escape(&restriction.reason),
                ));
            }
        }
    }
    text.push_str(&format!("\nPage {}/{pages}", page + 1));
    text
}

fn restrictions_keyboard(page: usize, pages: usize) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![
            button("➕ Restrict", Action::Admin(AdminAction::Restrict)),
            button("⛔️ Block", Action::Admin(AdminAction::Block)),
        ],
        vec![button("✅ Remove Restriction", Action::Admin(AdminAction::Unrestrict))],
    ];
    let nav = pager(page, pages, |p| Action::Admin(AdminAction::Restrictions(p)));
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(back_row());
    markup(rows)
}

pub fn selection_keyboard(
    users: &[(i64, UserRecord)],
    draft: &BroadcastDraft,
    page: usize,
    pages: usize,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<_> = users
        .iter()
        .map(|(id, record)| {
            let mark = if draft.selected.contains(id) { "✅" } else { "⭕️" };
            let name = record.username.as_deref().map(|n| format!("@{n}")).unwrap_or_else(|| id.to_string());
            vec![button(format!("{mark} {name}"), Action::Admin(AdminAction::BroadcastToggle(*id, page)))]
        })
        .collect();
    let nav = pager(page, pages, |p| Action::Admin(AdminAction::BroadcastPage(p)));
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![
        button("✅ Done", Action::Admin(AdminAction::BroadcastConfirm)),
        button("« Cancel", Action::Admin(AdminAction::BroadcastCancel)),
    ]);
    markup(rows)
}

/// `/admin`
pub async fn show_panel(state: &BotState, ctx: &Ctx, origin: Option<MessageId>) -> Result<()> {
    if !state.admin.is_admin(ctx.uid())? {
        state
            .telegram
            .send_text(ctx.chat, "🚫 You don't have permission to access admin controls.")
            .await?;
        return Ok(());
    }
    state.sessions.with(ctx.uid(), |s| s.cancel()).await;
    let stats = state.admin.statistics(Utc::now())?;
    state
        .show(ctx, origin, &panel_text(&stats), panel_keyboard(state.admin.is_owner(ctx.uid())))
        .await
}

/// Admin panel buttons. Returns a toast for the callback answer.
pub async fn handle(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    action: AdminAction,
) -> Result<Option<String>> {
    let uid = ctx.uid();
    if !state.admin.is_admin(uid)? {
        return Ok(Some("🚫 Admins only".into()));
    }
    let owner_only = matches!(
        action,
        AdminAction::Admins
            | AdminAction::AddAdmin
            | AdminAction::RemoveAdmin
            | AdminAction::Broadcast
            | AdminAction::BroadcastTarget(_)
            | AdminAction::BroadcastPage(_)
            | AdminAction::BroadcastToggle(..)
            | AdminAction::BroadcastConfirm
            | AdminAction::BroadcastCancel
    );
    if owner_only && !state.admin.is_owner(uid) {
        return Ok(Some("👑 Only the owner can do that!".into()));
    }

    match action {
        AdminAction::Menu => show_panel(state, ctx, origin).await?,
        AdminAction::Stats => {
            let stats = state.admin.statistics(Utc::now())?;
            let data_points = state.admin.user_ids()?.len();
            state.show(ctx, origin, &stats_text(&stats, data_points), markup(vec![back_row()])).await?;
        }
        AdminAction::Users(page) => {
            let (users, pages) = state.admin.users_page(page, USERS_PER_PAGE)?;
            let page = page.min(pages - 1);
            let mut rows = Vec::new();
            let nav = pager(page, pages, |p| Action::Admin(AdminAction::Users(p)));
            if !nav.is_empty() {
                rows.push(nav);
            }
            rows.push(back_row());
            state.show(ctx, origin, &users_text(&users, page, pages), markup(rows)).await?;
        }
        AdminAction::Restrictions(page) => {
            state.sessions.with(uid, |s| s.awaiting = None).await;
            let (entries, pages) = paginate(state.admin.active_restrictions(Utc::now())?, page, RESTRICTIONS_PER_PAGE);
            let page = page.min(pages - 1);
            state
                .show(ctx, origin, &restrictions_text(&entries, page, pages), restrictions_keyboard(page, pages))
                .await?;
        }
        AdminAction::Restrict => {
            prompt(
                state,
                ctx,
                origin,
                Awaiting::AdminRestrict,
                "🚫 <b>Add Restriction</b>\n\nSend the user and duration:\n<code>ID/@username hours reason</code>\n\n\
                 Example: <code>123456789 24 Spamming</code>",
            )
            .await?
        }
        AdminAction::Block => {
            prompt(
                state,
                ctx,
                origin,
                Awaiting::AdminBlock,
                "⛔️ <b>Block User</b>\n\nSend the user to block:\n<code>ID/@username reason</code>\n\n\
                 Example: <code>@username Severe spam</code>",
            )
            .await?
        }
        AdminAction::Unrestrict => {
            prompt(
                state,
                ctx,
                origin,
                Awaiting::AdminUnrestrict,
                "✅ <b>Remove Restriction</b>\n\nSend the user to unblock or unrestrict:\n<code>ID/@username</code>",
            )
            .await?
        }
        AdminAction::Admins => {
            state.sessions.with(uid, |s| s.awaiting = None).await;
            let owner = state.admin.owner();
            let mut text = "👮 <b>Admin Management</b>\n\nCurrent admins:\n".to_string();
            for id in state.admin.admins()? {
                let badge = if id == owner { "👑" } else { "👮" };
                text.push_str(&format!("{badge} <code>{id}</code>\n"));
            }
            let kb = markup(vec![
                vec![
                    button("➕ Add Admin", Action::Admin(AdminAction::AddAdmin)),
                    button("➖ Remove Admin", Action::Admin(AdminAction::RemoveAdmin)),
                ],
                back_row(),
            ]);
            state.show(ctx, origin, &text, kb).await?;
        }
        AdminAction::AddAdmin => {
            prompt(
                state,
                ctx,
                origin,
                Awaiting::AdminAddAdmin,
                "➕ <b>Add New Admin</b>\n\nSend the user's ID or @username to promote.",
            )
            .await?
        }
        AdminAction::RemoveAdmin => {
            prompt(
                state,
                ctx,
                origin,
                Awaiting::AdminRemoveAdmin,
                "➖ <b>Remove Admin</b>\n\nSend the user's ID or @username to demote.",
            )
            .await?
        }
        AdminAction::Broadcast => {
            state
                .sessions
                .with(uid, |s| {
                    s.awaiting = None;
                    s.broadcast = None;
                })
                .await;
            let text = "📢 <b>Broadcast Message Panel</b>\n\nFirst, select your target audience:";
            let kb = markup(vec![
                vec![button("📌 All Users", Action::Admin(AdminAction::BroadcastTarget(BroadcastTarget::All)))],
                vec![button(
                    "⚡️ Active Users (24h)",
                    Action::Admin(AdminAction::BroadcastTarget(BroadcastTarget::Active)),
                )],
                vec![button(
                    "🎯 Specific User(s)",
                    Action::Admin(AdminAction::BroadcastTarget(BroadcastTarget::Selected)),
                )],
                back_row(),
            ]);
            state.show(ctx, origin, text, kb).await?;
        }
        AdminAction::BroadcastTarget(target) => {
            state.sessions.with(uid, |s| s.broadcast = Some(BroadcastDraft::new(target))).await;
            match target {
                BroadcastTarget::Selected => show_selection(state, ctx, origin, 0).await?,
                _ => await_broadcast(state, ctx, origin, target).await?,
            }
        }
        AdminAction::BroadcastPage(page) => show_selection(state, ctx, origin, page).await?,
        AdminAction::BroadcastToggle(user_id, page) => {
            let toggled = state
                .sessions
                .with(uid, |s| s.broadcast.as_mut().map(|d| d.toggle(user_id)))
                .await;
            if toggled.is_none() {
                return Ok(Some("❌ No broadcast in progress".into()));
            }
            show_selection(state, ctx, origin, page).await?;
        }
        AdminAction::BroadcastConfirm => {
            let selected = state
                .sessions
                .with(uid, |s| s.broadcast.as_ref().map(|d| d.selected.len()))
                .await;
            match selected {
                None => return Ok(Some("❌ No broadcast in progress".into())),
                Some(0) => return Ok(Some("❌ Select at least one user".into())),
                Some(_) => await_broadcast(state, ctx, origin, BroadcastTarget::Selected).await?,
            }
        }
        AdminAction::BroadcastCancel => {
            state
                .sessions
                .with(uid, |s| {
                    s.awaiting = None;
                    s.broadcast = None;
                })
                .await;
            show_panel(state, ctx, origin).await?;
            return Ok(Some("Broadcast cancelled".into()));
        }
    }
    Ok(None)
}

async fn prompt(state: &BotState, ctx: &Ctx, origin: Option<MessageId>, awaiting: Awaiting, text: &str) -> Result<()> {
    state.sessions.with(ctx.uid(), |s| s.awaiting = Some(awaiting)).await;
    state
        .show(ctx, origin, &format!("{text}\n\nSend /cancel to cancel this operation."), cancel_keyboard())
        .await
}

async fn show_selection(state: &BotState, ctx: &Ctx, origin: Option<MessageId>, page: usize) -> Result<()> {
    let Some(draft) = state.sessions.with(ctx.uid(), |s| s.broadcast.clone()).await else {
        return Ok(());
    };
    let (users, pages) = state.admin.users_page(page, BROADCAST_PICK_PER_PAGE)?;
    let page = page.min(pages - 1);
    let text = format!(
        "🎯 <b>Select Recipients</b>\n\nTap users to toggle them.\n\nSelected: {} user(s)\nPage {}/{pages}",
        draft.selected.len(),
        page + 1
    );
    state
        .show(ctx, origin, &text, selection_keyboard(&users, &draft, page, pages))
        .await
}

async fn await_broadcast(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    target: BroadcastTarget,
) -> Result<()> {
    state.sessions.with(ctx.uid(), |s| s.awaiting = Some(Awaiting::Broadcast)).await;
    let audience = match target {
        BroadcastTarget::All => "All Users".to_string(),
        BroadcastTarget::Active => "Active Users (24h)".to_string(),
        BroadcastTarget::Selected => {
            let n = state
                .sessions
                .with(ctx.uid(), |s| s.broadcast.as_ref().map_or(0, |d| d.selected.len()))
                .await;
            format!("Selected Users ({n})")
        }
    };
    let text = format!(
        "📢 <b>Broadcast</b>\n\nTarget: {audience}\n\n\
         Send the message to broadcast now. Text, photos, videos, documents and voice notes are all forwarded as-is."
    );
    let kb = markup(vec![vec![button("« Cancel", Action::Admin(AdminAction::BroadcastCancel))]]);
    state.show(ctx, origin, &text, kb).await
}

/// Text typed while a restriction or admin change is awaited.
pub async fn on_text(state: &BotState, ctx: &Ctx, awaiting: Awaiting, text: &str) -> Result<()> {
    let uid = ctx.uid();
    if !state.admin.is_admin(uid)? {
        state.sessions.with(uid, |s| s.awaiting = None).await;
        return Ok(());
    }
    let reply = match awaiting {
        Awaiting::AdminRestrict => {
            let Some((token, hours, reason, until)) = parse_restrict(text)
                .and_then(|(token, hours, reason)| Some((token, hours, reason, restriction_end(Utc::now(), hours)?)))
            else {
                return retry(state, ctx, "❌ Invalid format. Use: <code>ID/@username hours reason</code>").await;
            };
            let Some(target) = resolve(state, ctx, &token).await? else {
                return Ok(());
            };
            if state.admin.is_admin(target)? {
                format!("❌ <code>{target}</code> is an admin and cannot be restricted.")
            } else {
                state.admin.restrict(target, until, uid, &reason)?;
                info!("🚫 {uid} restricted {target} for {hours}h");
                format!("✅ User <code>{target}</code> restricted for {hours} hour(s).")
            }
        }
        Awaiting::AdminBlock => {
            let Some((token, reason)) = parse_user_and_reason(text) else {
                return retry(state, ctx, "❌ Invalid format. Use: <code>ID/@username reason</code>").await;
            };
            let Some(target) = resolve(state, ctx, &token).await? else {
                return Ok(());
            };
            if state.admin.is_admin(target)? {
                format!("❌ <code>{target}</code> is an admin and cannot be blocked.")
            } else if state.admin.block(target)? {
                info!("⛔️ {uid} blocked {target}: {reason}");
                format!("✅ User <code>{target}</code> blocked.")
            } else {
                format!("ℹ️ User <code>{target}</code> is already blocked.")
            }
        }
        Awaiting::AdminUnrestrict => {
            let Some(target) = resolve(state, ctx, text).await? else {
                return Ok(());
            };
            if state.admin.unrestrict(target)? {
                info!("✅ {uid} lifted restrictions on {target}");
                format!("✅ Restrictions removed for <code>{target}</code>.")
            } else {
                format!("ℹ️ <code>{target}</code> has no active restriction.")
            }
        }
        Awaiting::AdminAddAdmin | Awaiting::AdminRemoveAdmin => {
            if !state.admin.is_owner(uid) {
                state.sessions.with(uid, |s| s.awaiting = None).await;
                return Ok(());
            }
            let Some(target) = resolve(state, ctx, text).await? else {
                return Ok(());
            };
            if awaiting == Awaiting::AdminAddAdmin {
                if state.admin.add_admin(target)? {
                    info!("👮 {target} promoted to admin");
                    format!("✅ <code>{target}</code> is now an admin.")
                } else {
                    format!("ℹ️ <code>{target}</code> is already an admin.")
                }
            } else if state.admin.remove_admin(target)? {
                info!("👮 {target} removed from admins");
                format!("✅ <code>{target}</code> is no longer an admin.")
            } else {
                format!("❌ <code>{target}</code> is not an admin, or is the owner.")
            }
        }
        _ => return Ok(()),
    };

    state.sessions.with(uid, |s| s.awaiting = None).await;
    state.telegram.send(ctx.chat, &reply, Some(markup(vec![back_row()]))).await?;
    Ok(())
}

/// Invalid input keeps the awaiting mode so the admin can try again.
async fn retry(state: &BotState, ctx: &Ctx, text: &str) -> Result<()> {
    state.telegram.send(ctx.chat, text, Some(cancel_keyboard())).await?;
    Ok(())
}

async fn resolve(state: &BotState, ctx: &Ctx, token: &str) -> Result<Option<i64>> {
    let found = state.admin.resolve_user(token)?;
    if found.is_none() {
        retry(
            state,
            ctx,
            &format!("❌ User {} not found. Send a numeric ID or a known @username.", escape(token.trim())),
        )
        .await?;
    }
    Ok(found)
}

/// Copy the owner's message to every recipient of the current draft.
pub async fn broadcast(state: &BotState, ctx: &Ctx, message_id: MessageId) -> Result<()> {
    let uid = ctx.uid();
    let draft = state
        .sessions
        .with(uid, |s| {
            s.awaiting = None;
            s.broadcast.take()
        })
        .await;
    let Some(draft) = draft else {
        return Ok(());
    };
    if !state.admin.is_owner(uid) {
        return Ok(());
    }

    let recipients: Vec<i64> = match draft.target {
        BroadcastTarget::All => state.admin.user_ids()?,
        BroadcastTarget::Active => state.admin.active_since(Utc::now(), ACTIVE_WINDOW_HOURS)?,
        BroadcastTarget::Selected => draft.selected.iter().copied().collect(),
    }
    .into_iter()
    .filter(|&id| id != uid)
    .collect();

    let status = state
        .telegram
        .send_text(ctx.chat, &format!("📤 Broadcasting to {} user(s)...", recipients.len()))
        .await?;

    let (mut sent, mut failed) = (0usize, 0usize);
    for (i, user_id) in recipients.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(state.telegram.chunk_delay()).await;
        }
        match state.telegram.copy(ChatId(*user_id), ctx.chat, message_id).await {
            Ok(()) => sent += 1,
            Err(e) => {
                warn!("Broadcast to {user_id} failed: {e}");
                failed += 1;
            }
        }
    }
    info!("📢 Broadcast by {uid}: {sent} sent, {failed} failed");

    let report = format!("✅ <b>Broadcast complete</b>\n\nDelivered: {sent}\nFailed: {failed}");
    state.telegram.edit(ctx.chat, status.id, &report, Some(markup(vec![back_row()]))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::bot::keyboard::callback_data;

    fn record(name: Option<&str>) -> UserRecord {
        UserRecord {
            username: name.map(str::to_string),
            first_seen: "2024-01-01 00:00:00".into(),
            last_active: "2024-01-02 00:00:00".into(),
            total_actions: 3,
            actions: Default::default(),
        }
    }

    #[test]
    fn test_parse_restrict() {
        assert_eq!(
            parse_restrict("@spammer 48 Violation of rules"),
            Some(("@spammer".to_string(), 48, "Violation of rules".to_string()))
        );
        assert_eq!(parse_restrict("123 24"), Some(("123".to_string(), 24, String::new())));
        assert_eq!(parse_restrict("123"), None);
        assert_eq!(parse_restrict("123 soon"), None);
        assert_eq!(parse_restrict("123 0 nope"), None);
        assert_eq!(parse_restrict("123 10000000000 spam"), None);
        assert_eq!(parse_restrict("123 9223372036854775807"), None);
    }

    #[test]
    fn test_restriction_end_stays_in_range() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(restriction_end(now, 48), Some(now + Duration::hours(48)));
        assert!(restriction_end(now, MAX_RESTRICT_HOURS).is_some());
        assert_eq!(restriction_end(now, 10_000_000_000), None);
        assert_eq!(restriction_end(now, i64::MAX), None);
    }

    #[test]
    fn test_parse_user_and_reason() {
        assert_eq!(parse_user_and_reason(" 42  spam  bot "), Some(("42".to_string(), "spam bot".to_string())));
        assert_eq!(parse_user_and_reason("   "), None);
    }

    #[test]
    fn test_panel_keyboard_owner_extras() {
        assert_eq!(callback_data(&panel_keyboard(false)), vec!["a:stats", "a:users:0", "a:rs:0"]);
        let owner = callback_data(&panel_keyboard(true));
        assert!(owner.contains(&"a:admins".to_string()));
        assert!(owner.contains(&"a:bc".to_string()));
    }

    #[test]
    fn test_users_text() {
        let users = vec![(1, record(Some("ann<"))), (2, record(None))];
        let text = users_text(&users, 0, 2);
        assert!(text.contains("@ann&lt;"));
        assert!(text.contains("(no username)"));
        assert!(text.ends_with("Page 1/2"));
    }

    #[test]
    fn test_selection_keyboard() {
        let mut draft = BroadcastDraft::new(BroadcastTarget::Selected);
        draft.toggle(2);
        let users = vec![(1, record(Some("ann"))), (2, record(None))];
        let kb = selection_keyboard(&users, &draft, 0, 1);
        let labels: Vec<&str> = kb.inline_keyboard.iter().flatten().map(|b| b.text.as_str()).collect();
        assert_eq!(labels[0], "⭕️ @ann");
        assert_eq!(labels[1], "✅ 2");
        assert_eq!(callback_data(&kb), vec!["a:bcx:1:0", "a:bcx:2:0", "a:bcgo", "a:bcno"]);
    }

    #[test]
    fn test_restrictions_text() {
        let entries = vec![RestrictionEntry::Blocked(9)];
        let text = restrictions_text(&entries, 0, 1);
        assert!(text.contains("<code>9</code>"));
        assert!(restrictions_text(&[], 0, 1).contains("No active restrictions"));
    }
}
