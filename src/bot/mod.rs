//! Telegram front end: shared state, routing and per-feature handlers.

pub mod admin;
pub mod chat;
pub mod comparison;
pub mod filters;
pub mod keyboard;
pub mod notifications;
pub mod paper_actions;
pub mod router;
pub mod search;
pub mod settings;
pub mod telegram;
pub mod voice;

use std::sync::Arc;

use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId, User, UserId};

use crate::ai::{TextModel, Transcriber};
use crate::compare::Comparator;
use crate::config::Config;
use crate::error::Result;
use crate::paper::{CitationSource, PaperSource};
use crate::session::Sessions;
use crate::store::{AdminStore, NotificationStore, PreferenceStore};

pub use telegram::TelegramClient;

/// Everything handlers share.
pub struct BotState {
    pub config: Config,
    pub telegram: TelegramClient,
    pub papers: Arc<dyn PaperSource>,
    /// Absent when citation filtering is unavailable.
    pub citations: Option<Arc<dyn CitationSource>>,
    pub model: Arc<dyn TextModel>,
    pub transcriber: Arc<dyn Transcriber>,
    pub comparator: Comparator,
    pub preferences: PreferenceStore,
    pub notifications: NotificationStore,
    pub admin: AdminStore,
    pub sessions: Sessions,
}

impl BotState {
    /// Edit `origin` in place when the update came from a button, else send a new message.
    pub async fn show(
        &self,
        ctx: &Ctx,
        origin: Option<MessageId>,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<()> {
        match origin {
            Some(message_id) => self.telegram.edit(ctx.chat, message_id, text, Some(keyboard)).await,
            None => self.telegram.send(ctx.chat, text, Some(keyboard)).await.map(|_| ()),
        }
    }
}

/// Who an update came from and where to reply.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub chat: ChatId,
    pub user: UserId,
    pub username: Option<String>,
}

impl Ctx {
    pub fn new(chat: ChatId, user: &User) -> Self {
        Self { chat, user: user.id, username: user.username.clone() }
    }

    /// User id as stored in the JSON files.
    pub fn uid(&self) -> i64 {
        self.user.0 as i64
    }
}
