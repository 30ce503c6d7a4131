//! Academic chat mode.

use rand::seq::SliceRandom;
use teloxide::types::InlineKeyboardMarkup;
use tracing::{info, warn};

use super::keyboard::{Action, button, markup};
use super::{BotState, Ctx};
use crate::ai::prompts;
use crate::error::Result;
use crate::text::escape;

const OFF_TOPIC: &[&str] = &[
    "🤓 Whoa there! Let's keep it scholarly! I'm like a professor who only talks about academic stuff.",
    "🎓 Hey! My brain is wired for science and research. Let's talk about something more... intellectual?",
    "📚 Plot twist: I'm actually a research nerd! Can we discuss something more academic?",
    "🔬 Sorry, I left my gaming console in the laboratory! Let's focus on research and learning!",
    "🧠 Error 404: Casual chat not found! Would you like to discuss quantum physics instead?",
    "🌟 I'm like a library that only stocks research papers! Let's explore something scholarly!",
];

const PLACEHOLDERS: &[&str] = &[
    "🧠 <i>Analyzing your query...</i> Hold tight, knowledge incoming!",
    "🔬 <i>Processing in the lab...</i> Results dropping soon!",
    "📚 <i>Flipping through the archives...</i> One moment!",
    "🎓 <i>PaperPilot at work...</i> Insight on the way!",
];

const GOODBYES: &[&str] = &[
    "🎓 Class dismissed! Come back when you're ready for more academic discussions!",
    "📚 Thanks for the scholarly chat! Come back when curiosity strikes!",
    "🔬 This concludes our intellectual exchange! Until next time!",
];

fn pick(choices: &'static [&'static str]) -> &'static str {
    choices.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

fn end_keyboard() -> InlineKeyboardMarkup {
    markup(vec![vec![button("❌ End Chat", Action::EndChat)]])
}

/// `/chat`
pub async fn start(state: &BotState, ctx: &Ctx) -> Result<()> {
    state
        .sessions
        .with(ctx.uid(), |s| {
            s.chat_mode = true;
            s.awaiting = None;
        })
        .await;
    info!("💬 Chat mode on for {}", ctx.uid());
    let text = "🎓 <b>Academic Chat Mode</b>\n\n\
                Ask me anything about science, research or learning.\n\n\
                • Stay focused on educational topics\n\
                • Engage in intellectual discussions\n\n\
                Use /endchat to end our conversation.";
    state.telegram.send(ctx.chat, text, Some(end_keyboard())).await?;
    Ok(())
}

/// `/endchat` and the End Chat button.
pub async fn end(state: &BotState, ctx: &Ctx) -> Result<()> {
    let was_active = state.sessions.with(ctx.uid(), |s| std::mem::replace(&mut s.chat_mode, false)).await;
    let text = if was_active { pick(GOODBYES) } else { "💡 No chat session is active. Use /chat to start one." };
    state.telegram.send_text(ctx.chat, text).await?;
    Ok(())
}

/// A text message while chat mode is on.
pub async fn on_text(state: &BotState, ctx: &Ctx, text: &str) -> Result<()> {
    state.telegram.typing(ctx.chat).await;

    let relevant = match state.model.generate(&prompts::topic_relevance(text)).await {
        Ok(answer) => prompts::is_yes(&answer),
        Err(e) => {
            warn!("Topic check failed, treating as off-topic: {e}");
            false
        }
    };
    if !relevant {
        state.telegram.send_text(ctx.chat, pick(OFF_TOPIC)).await?;
        return Ok(());
    }

    let placeholder = state.telegram.send_text(ctx.chat, pick(PLACEHOLDERS)).await?;
    let reply = state.model.generate(&prompts::academic_chat(text)).await;
    state.telegram.delete(ctx.chat, placeholder.id).await;
    let reply = reply?;
    state.telegram.send_parts(ctx.chat, &escape(reply.trim())).await
}
