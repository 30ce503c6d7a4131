//! Voice search: transcribe a voice note, then let the user retry, edit or search.
//!
//! Queries are remembered per voice message id so the buttons under a
//! transcript keep working after later voice notes arrive.

use teloxide::types::{InlineKeyboardMarkup, MessageId};
use tracing::{info, warn};

use super::keyboard::{Action, VoiceAction, button, markup};
use super::{BotState, Ctx, search};
use crate::error::Result;
use crate::session::{Awaiting, VoiceQuery};
use crate::text::escape;

const DEFAULT_MIME: &str = "audio/ogg";

pub fn result_keyboard(message_id: i32) -> InlineKeyboardMarkup {
    markup(vec![
        vec![
            button("🔄 Try Again", Action::Voice(VoiceAction::Retry(message_id))),
            button("✏️ Edit Query", Action::Voice(VoiceAction::Edit(message_id))),
        ],
        vec![button("🎯 Search Papers", Action::Voice(VoiceAction::Search(message_id)))],
    ])
}

fn retry_keyboard(message_id: i32) -> InlineKeyboardMarkup {
    markup(vec![vec![button("🔄 Try Again", Action::Voice(VoiceAction::Retry(message_id)))]])
}

pub fn transcript_message(text: &str) -> String {
    format!(
        "✅ <b>Voice Transcription Complete!</b>\n\n🎙️ I heard:\n<code>{}</code>\n\nChoose an action below:",
        escape(text)
    )
}

/// A voice note arrived.
pub async fn on_voice(
    state: &BotState,
    ctx: &Ctx,
    message_id: MessageId,
    file_id: String,
    mime_type: Option<String>,
) -> Result<()> {
    let query = VoiceQuery {
        file_id,
        mime_type: mime_type.unwrap_or_else(|| DEFAULT_MIME.to_string()),
        text: None,
    };
    state
        .sessions
        .with(ctx.uid(), |s| s.remember_voice(message_id.0, query.clone()))
        .await;

    state.telegram.typing(ctx.chat).await;
    let processing = state
        .telegram
        .send_text(ctx.chat, "🎧 Processing your voice search...\nTuning into your frequency...")
        .await?;
    transcribe_into(state, ctx, message_id.0, &query, processing.id).await
}

/// Transcribe `query` and show the outcome in `target`.
async fn transcribe_into(
    state: &BotState,
    ctx: &Ctx,
    voice_id: i32,
    query: &VoiceQuery,
    target: MessageId,
) -> Result<()> {
    let transcript = match state.telegram.download(&query.file_id).await {
        Ok(audio) => state
            .transcriber
            .transcribe(&audio, &query.mime_type)
            .await
            .map_err(crate::error::Error::from),
        Err(e) => Err(e),
    };

    match transcript {
        Ok(text) => {
            let text = text.trim().to_string();
            info!("🎙️ Transcribed voice {voice_id} for {}: {text}", ctx.uid());
            state
                .sessions
                .with(ctx.uid(), |s| {
                    if let Some(q) = s.voice_mut(voice_id) {
                        q.text = Some(text.clone());
                    }
                })
                .await;
            state
                .telegram
                .edit(ctx.chat, target, &transcript_message(&text), Some(result_keyboard(voice_id)))
                .await
        }
        Err(e) => {
            warn!("Voice transcription failed for {}: {e}", ctx.uid());
            let text = format!(
                "❌ Oops! Something went wrong.\nError: {}\n\nPlease try again or use text search.",
                escape(&e.to_string())
            );
            state.telegram.edit(ctx.chat, target, &text, Some(retry_keyboard(voice_id))).await
        }
    }
}

/// Retry / Edit / Search buttons. Returns a toast for the callback answer.
pub async fn handle(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    action: VoiceAction,
) -> Result<Option<String>> {
    const EXPIRED: &str = "⌛ This voice query has expired. Please send it again.";
    match action {
        VoiceAction::Retry(id) => {
            let Some(query) = state.sessions.with(ctx.uid(), |s| s.voice(id).cloned()).await else {
                return Ok(Some(EXPIRED.into()));
            };
            let target = match origin {
                Some(target) => {
                    state
                        .telegram
                        .edit(ctx.chat, target, "🎧 Listening again...", None)
                        .await?;
                    target
                }
                None => state.telegram.send_text(ctx.chat, "🎧 Listening again...").await?.id,
            };
            transcribe_into(state, ctx, id, &query, target).await?;
        }
        VoiceAction::Edit(id) => {
            let known = state
                .sessions
                .with(ctx.uid(), |s| {
                    let known = s.voice(id).is_some();
                    if known {
                        s.awaiting = Some(Awaiting::VoiceEdit { message_id: id });
                    }
                    known
                })
                .await;
            if !known {
                return Ok(Some(EXPIRED.into()));
            }
            state
                .telegram
                .send_text(ctx.chat, "✏️ Send the corrected search query as a text message.")
                .await?;
        }
        VoiceAction::Search(id) => {
            let text = state
                .sessions
                .with(ctx.uid(), |s| s.voice(id).and_then(|q| q.text.clone()))
                .await;
            let Some(text) = text else {
                return Ok(Some(EXPIRED.into()));
            };
            search::run_simple(state, ctx, &text).await?;
        }
    }
    Ok(None)
}

/// Replacement text for a voice query.
pub async fn on_edit(state: &BotState, ctx: &Ctx, message_id: i32, text: &str) -> Result<()> {
    let text = text.trim().to_string();
    let stored = state
        .sessions
        .with(ctx.uid(), |s| {
            s.awaiting = None;
            match s.voice_mut(message_id) {
                Some(q) if !text.is_empty() => {
                    q.text = Some(text.clone());
                    true
                }
                _ => false,
            }
        })
        .await;

    if !stored {
        state
            .telegram
            .send_text(ctx.chat, "❌ Could not update that voice query. Please send the voice note again.")
            .await?;
        return Ok(());
    }
    let kb = markup(vec![vec![button(
        "🔍 Search with Edited Query",
        Action::Voice(VoiceAction::Search(message_id)),
    )]]);
    state
        .telegram
        .send(ctx.chat, &format!("✅ Query updated:\n<code>{}</code>", escape(&text)), Some(kb))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::callback_data;

    #[test]
    fn test_result_keyboard_references_voice_message() {
        assert_eq!(callback_data(&result_keyboard(77)), vec!["v:retry:77", "v:edit:77", "v:go:77"]);
        assert_eq!(callback_data(&retry_keyboard(5)), vec!["v:retry:5"]);
    }

    #[test]
    fn test_transcript_message_escapes() {
        let text = transcript_message("papers on <b>graphs</b>");
        assert!(text.contains("<code>papers on &lt;b&gt;graphs&lt;/b&gt;</code>"));
    }
}
