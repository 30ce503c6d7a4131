//! Update dispatch: commands, messages and button presses.
//!
//! Every update passes the same gates before reaching a feature handler:
//! activity is recorded, restricted users are refused, and when a required
//! channel is configured non-members get a join prompt. Handlers return the
//! crate `Result`; failures are logged here and the user gets an apology.

use std::sync::Arc;

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use super::keyboard::{Action, VoiceAction, button, link, markup};
use super::{BotState, Ctx, admin, chat, comparison, filters, notifications, paper_actions, search, settings, voice};
use crate::error::Result;
use crate::session::Awaiting;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "PaperPilot commands:")]
pub enum Command {
    #[command(description = "welcome message")]
    Start,
    #[command(description = "how to use the bot")]
    Help,
    #[command(description = "about this bot")]
    About,
    #[command(description = "search papers, e.g. /search graph neural networks")]
    Search(String),
    #[command(description = "newest papers")]
    Latest,
    #[command(description = "compare selected papers")]
    Compare,
    #[command(description = "empty the comparison list")]
    ClearComparison,
    #[command(description = "empty the comparison list")]
    CancelCompare,
    #[command(description = "search preferences")]
    Settings,
    #[command(description = "paper alerts")]
    Notifications,
    #[command(description = "academic chat mode")]
    Chat,
    #[command(rename = "endchat", description = "leave chat mode")]
    EndChat,
    #[command(description = "cancel the current operation")]
    Cancel,
    #[command(description = "admin panel")]
    Admin,
}

const WELCOME: &str = "🎓 <b>Welcome to PaperPilot - Research Assistant!</b>\n\n\
    Your AI-powered research companion! Let's explore the world of science together! 🚀\n\n\
    <b>Features:</b>\n\
    📚 Smart Paper Search\n\
    🔬 Advanced Filters\n\
    🤖 AI-Powered Summaries\n\
    ❓ Interactive Q&amp;A\n\
    🔄 Paper Comparison\n\
    🎙️ Voice Search\n\
    🔔 New Paper Alerts\n\n\
    <b>Commands:</b>\n\
    /search <code>&lt;query&gt;</code> - Search for papers\n\
    /latest - Get latest papers\n\
    /compare - Compare papers\n\
    /settings - Search preferences\n\
    /notifications - Paper alerts\n\
    /chat - Academic chat\n\
    /help - Show help message\n\
    /about - About this bot";

const HELP: &str = "<b>How to use PaperPilot</b> 📚\n\n\
    1. <b>Search for papers:</b>\n   <code>/search machine learning</code>\n   or /search alone for the advanced filters\n\n\
    2. <b>Get an AI summary:</b>\n   Tap '🤖 Summarize' on any paper\n\n\
    3. <b>Ask questions:</b>\n   After a summary, just type your question!\n\n\
    4. <b>Navigate results:</b>\n   Use '➡️ More Results' to explore papers\n\n\
    5. <b>Compare papers:</b>\n   Tap '➕ Add to Compare' on two or three papers, then /compare\n\n\
    🎙️ <b>Voice Search:</b>\n\
    • Send a voice message with your search query\n\
    • Edit the transcribed text if needed\n\
    • Retry if the transcription isn't perfect\n\n\
    <b>Pro Tips:</b>\n\
    • Add a year for recent papers\n\
    • Use specific keywords\n\
    • Use /cancel to abort any pending input";

const ABOUT: &str = "🚀 <b>PaperPilot - Research Assistant</b>\n\n\
    🔬 <b>Features:</b>\n\
    • Smart Paper Search over arXiv\n\
    • Gemini AI Summaries and Q&amp;A\n\
    • Paper Comparison\n\
    • Voice Search\n\
    • Scheduled Paper Alerts\n\n\
    Knowledge is power, and this bot is your supercharger! ⚡️";

const JOIN_PROMPT: &str = "🌟 <b>Welcome to PaperPilot!</b> 🌟\n\n\
    You're one step away from AI-powered research summaries, interactive Q&amp;A and direct PDF downloads.\n\n\
    Join our channel to start using the bot, then tap \"✅ I've joined\".";

const APOLOGY: &str = "⚠️ Sorry, something went wrong while processing your request. Please try again in a moment.";

/// Outcome of the per-update gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Pass,
    Restricted,
    NotSubscribed,
}

async fn gate(state: &BotState, ctx: &Ctx) -> Result<Gate> {
    let uid = ctx.uid();
    let now = Utc::now();
    state.admin.record_activity(uid, ctx.username.as_deref(), None, now)?;

    if state.admin.is_restricted(uid, now)? {
        return Ok(Gate::Restricted);
    }
    if subscribed(state, ctx).await? {
        Ok(Gate::Pass)
    } else {
        Ok(Gate::NotSubscribed)
    }
}

/// Admins and deployments without a required channel always pass.
async fn subscribed(state: &BotState, ctx: &Ctx) -> Result<bool> {
    let Some(channel) = &state.config.required_channel else {
        return Ok(true);
    };
    if state.admin.is_admin(ctx.uid())? {
        return Ok(true);
    }
    match state.telegram.is_member(channel.id, ctx.user).await {
        Ok(member) => Ok(member),
        Err(e) => {
            error!("❌ Channel subscription check failed for {}: {e}", ctx.uid());
            Ok(false)
        }
    }
}

/// Tell the user why the gate refused them.
async fn refuse(state: &BotState, ctx: &Ctx, gate: Gate) -> Result<()> {
    match gate {
        Gate::Pass => {}
        Gate::Restricted => {
            state
                .telegram
                .send_text(ctx.chat, "⛔️ You are currently restricted from using this bot.")
                .await?;
        }
        Gate::NotSubscribed => {
            let mut rows = Vec::new();
            if let Some(channel) = &state.config.required_channel {
                rows.push(vec![link("🌟 Join Channel", &channel.join_url())]);
            }
            rows.push(vec![button("✅ I've joined", Action::CheckSubscription)]);
            state.telegram.send(ctx.chat, JOIN_PROMPT, Some(markup(rows))).await?;
        }
    }
    Ok(())
}

async fn apologize(state: &BotState, ctx: &Ctx) {
    if let Err(e) = state.telegram.send_text(ctx.chat, APOLOGY).await {
        warn!("Failed to send apology to {}: {e}", ctx.uid());
    }
}

pub async fn on_command(msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let ctx = Ctx::new(msg.chat.id, user);
    if let Err(e) = route_command(&state, &ctx, cmd).await {
        error!("Command from {} failed: {e}", ctx.uid());
        apologize(&state, &ctx).await;
    }
    Ok(())
}

async fn route_command(state: &BotState, ctx: &Ctx, cmd: Command) -> Result<()> {
    let verdict = gate(state, ctx).await?;
    // /start is shown even before the channel check
    let open = cmd == Command::Start && verdict == Gate::NotSubscribed;
    if verdict != Gate::Pass && !open {
        return refuse(state, ctx, verdict).await;
    }

    info!("⌨️ {:?} from {}", cmd, ctx.uid());
    if cmd != Command::Cancel {
        state.sessions.with(ctx.uid(), |s| s.awaiting = None).await;
    }

    match cmd {
        Command::Start => {
            state.telegram.send_text(ctx.chat, WELCOME).await?;
            if open {
                refuse(state, ctx, verdict).await?;
            }
        }
        Command::Help => {
            state.telegram.send_text(ctx.chat, HELP).await?;
        }
        Command::About => {
            let kb = state
                .config
                .required_channel
                .as_ref()
                .map(|c| markup(vec![vec![link("📢 Join Channel", &c.join_url())]]));
            state.telegram.send(ctx.chat, ABOUT, kb).await?;
        }
        Command::Search(terms) if terms.trim().is_empty() => search::show_options(state, ctx, None).await?,
        Command::Search(terms) => search::run_simple(state, ctx, &terms).await?,
        Command::Latest => search::latest(state, ctx).await?,
        Command::Compare => comparison::status(state, ctx).await?,
        Command::ClearComparison | Command::CancelCompare => comparison::clear(state, ctx).await?,
        Command::Settings => settings::show_menu(state, ctx, None).await?,
        Command::Notifications => notifications::show_menu(state, ctx, None).await?,
        Command::Chat => chat::start(state, ctx).await?,
        Command::EndChat => chat::end(state, ctx).await?,
        Command::Cancel => {
            state.sessions.with(ctx.uid(), |s| s.cancel()).await;
            state.telegram.send_text(ctx.chat, "❌ Operation cancelled.").await?;
        }
        Command::Admin => admin::show_panel(state, ctx, None).await?,
    }
    Ok(())
}

/// Non-command messages in private chats.
pub async fn on_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let ctx = Ctx::new(msg.chat.id, user);
    if let Err(e) = route_message(&state, &ctx, &msg).await {
        error!("Message from {} failed: {e}", ctx.uid());
        apologize(&state, &ctx).await;
    }
    Ok(())
}

async fn route_message(state: &BotState, ctx: &Ctx, msg: &Message) -> Result<()> {
    let verdict = gate(state, ctx).await?;
    if verdict != Gate::Pass {
        return refuse(state, ctx, verdict).await;
    }

    let (awaiting, chat_mode) = state.sessions.with(ctx.uid(), |s| (s.awaiting, s.chat_mode)).await;

    if awaiting == Some(Awaiting::Broadcast) {
        return admin::broadcast(state, ctx, msg.id).await;
    }
    if let Some(v) = msg.voice() {
        return voice::on_voice(state, ctx, msg.id, v.file.id.0.clone(), v.mime_type.as_ref().map(|m| m.to_string()))
            .await;
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.starts_with('/') {
        state
            .telegram
            .send_text(ctx.chat, "❓ Unknown command. Use /help to see what I can do.")
            .await?;
        return Ok(());
    }

    match awaiting {
        Some(Awaiting::SimpleSearch) => {
            state.sessions.with(ctx.uid(), |s| s.awaiting = None).await;
            search::run_simple(state, ctx, text).await
        }
        Some(a @ (Awaiting::FilterDateFrom | Awaiting::FilterDateTo | Awaiting::FilterAuthor)) => {
            filters::on_text(state, ctx, a, text).await
        }
        Some(Awaiting::JournalName) => settings::on_text(state, ctx, text).await,
        Some(a @ (Awaiting::NotificationKeyword | Awaiting::NotificationTime)) => {
            notifications::on_text(state, ctx, a, text).await
        }
        Some(Awaiting::VoiceEdit { message_id }) => voice::on_edit(state, ctx, message_id, text).await,
        Some(
            a @ (Awaiting::AdminRestrict
            | Awaiting::AdminBlock
            | Awaiting::AdminUnrestrict
            | Awaiting::AdminAddAdmin
            | Awaiting::AdminRemoveAdmin),
        ) => admin::on_text(state, ctx, a, text).await,
        Some(Awaiting::Broadcast) | None if chat_mode => chat::on_text(state, ctx, text).await,
        Some(Awaiting::Broadcast) | None => paper_actions::ask(state, ctx, text).await,
    }
}

pub async fn on_callback(q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let (chat, origin) = match &q.message {
        Some(m) => (m.chat().id, Some(m.id())),
        None => (ChatId(q.from.id.0 as i64), None),
    };
    let ctx = Ctx::new(chat, &q.from);
    let data = q.data.as_deref().unwrap_or_default();

    let Some(action) = Action::parse(data) else {
        warn!("Unknown callback data from {}: {data}", ctx.uid());
        state.telegram.answer(&q, Some("⌛ This button has expired.")).await;
        return Ok(());
    };

    // Slow actions are acknowledged up front so the button stops spinning.
    let slow = answers_early(&action);
    if slow {
        state.telegram.answer(&q, None).await;
    }
    let toast = match route_callback(&state, &ctx, origin, action).await {
        Ok(toast) => toast,
        Err(e) => {
            error!("Callback {data} from {} failed: {e}", ctx.uid());
            apologize(&state, &ctx).await;
            None
        }
    };
    if !slow {
        state.telegram.answer(&q, toast.as_deref()).await;
    }
    Ok(())
}

fn answers_early(action: &Action) -> bool {
    matches!(
        action,
        Action::Summarize(_)
            | Action::Download(_)
            | Action::CompareRun
            | Action::SearchSimple
            | Action::Voice(VoiceAction::Search(_))
    )
}

async fn route_callback(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    action: Action,
) -> Result<Option<String>> {
    if action == Action::Noop {
        return Ok(None);
    }
    let verdict = gate(state, ctx).await?;
    if action == Action::CheckSubscription {
        return check_subscription(state, ctx, origin, verdict).await;
    }
    if verdict != Gate::Pass {
        refuse(state, ctx, verdict).await?;
        return Ok(None);
    }

    match action {
        Action::SearchOptions => search::show_options(state, ctx, origin).await?,
        Action::SearchSimple => search::prompt_simple(state, ctx).await?,
        Action::SearchAdvanced => filters::show_menu(state, ctx, origin).await?,
        Action::Summarize(id) => paper_actions::summarize(state, ctx, &id).await?,
        Action::Download(id) => paper_actions::download(state, ctx, &id).await?,
        Action::AddToCompare(id) => return comparison::add(state, ctx, &id).await,
        Action::MoreResults => return search::more(state, ctx, origin).await,
        Action::CompareRun => comparison::run(state, ctx).await?,
        Action::CompareClear => comparison::clear(state, ctx).await?,
        Action::Filter(f) => return filters::handle(state, ctx, origin, f).await,
        Action::Settings(s) => return settings::handle(state, ctx, origin, s).await,
        Action::Notify(n) => return notifications::handle(state, ctx, origin, n).await,
        Action::Voice(v) => return voice::handle(state, ctx, origin, v).await,
        Action::EndChat => chat::end(state, ctx).await?,
        Action::Admin(a) => return admin::handle(state, ctx, origin, a).await,
        Action::CheckSubscription | Action::Noop => {}
    }
    Ok(None)
}

async fn check_subscription(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    verdict: Gate,
) -> Result<Option<String>> {
    match verdict {
        Gate::Pass => {
            if let Some(id) = origin {
                state.telegram.delete(ctx.chat, id).await;
            }
            state.telegram.send_text(ctx.chat, WELCOME).await?;
            Ok(Some("✅ Thanks for joining!".into()))
        }
        Gate::NotSubscribed => Ok(Some("❌ You haven't joined the channel yet.".into())),
        Gate::Restricted => {
            refuse(state, ctx, verdict).await?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<Command> {
        Command::parse(text, "paperpilot_bot").ok()
    }

    #[test]
    fn test_command_names() {
        assert_eq!(parse("/start"), Some(Command::Start));
        assert_eq!(parse("/endchat"), Some(Command::EndChat));
        assert_eq!(parse("/clear_comparison"), Some(Command::ClearComparison));
        assert_eq!(parse("/cancel_compare"), Some(Command::CancelCompare));
        assert_eq!(parse("/search quantum error correction"), Some(Command::Search("quantum error correction".into())));
        assert_eq!(parse("/search@paperpilot_bot llm"), Some(Command::Search("llm".into())));
        assert_eq!(parse("/nope"), None);
    }

    #[test]
    fn test_slow_actions_answer_early() {
        assert!(answers_early(&Action::Summarize("1".into())));
        assert!(answers_early(&Action::CompareRun));
        assert!(!answers_early(&Action::AddToCompare("1".into())));
        assert!(!answers_early(&Action::MoreResults));
    }
}
