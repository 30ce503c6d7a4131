//! Telegram client using teloxide.

use std::time::Duration;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, FileId, InlineKeyboardMarkup, InputFile, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{info, warn};

use crate::error::Result;
use crate::text::{REPORT_CHUNK_LEN, split_into_parts, strip_html};

/// Extra attempts after a transient network failure.
const SEND_RETRIES: u32 = 2;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
    chunk_delay: Duration,
}

impl TelegramClient {
    pub fn new(bot: Bot, chunk_delay: Duration) -> Self {
        Self { bot, chunk_delay }
    }

    /// Send an HTML message.
    ///
    /// Retries on network errors. If Telegram rejects the markup the message
    /// is re-sent as plain text with the tags stripped.
    pub async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let mut attempt = 0;
        loop {
            let mut request = self.bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
            if let Some(kb) = keyboard.clone() {
                request = request.reply_markup(kb);
            }
            match request.await {
                Ok(msg) => return Ok(msg),
                Err(RequestError::Network(_) | RequestError::Io(_)) if attempt < SEND_RETRIES => {
                    attempt += 1;
                    warn!("Send to {chat_id} failed, retry {attempt}/{SEND_RETRIES}");
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                Err(RequestError::Api(ApiError::CantParseEntities(reason))) => {
                    warn!("HTML rejected ({reason}), sending plain text");
                    let mut request = self.bot.send_message(chat_id, strip_html(text));
                    if let Some(kb) = keyboard {
                        request = request.reply_markup(kb);
                    }
                    return Ok(request.await?);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<Message> {
        self.send(chat_id, text, None).await
    }

    /// Replace a message's text and keyboard. "Not modified" is not an error.
    pub async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut request = self
            .bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }
        match request.await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a message, logging failures.
    pub async fn delete(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(e) = self.bot.delete_message(chat_id, message_id).await {
            warn!("Failed to delete message {message_id} in {chat_id}: {e}");
        }
    }

    /// Send a long report as `Part i/n` messages separated by the chunk delay.
    pub async fn send_parts(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let parts = split_into_parts(text, REPORT_CHUNK_LEN);
        let total = parts.len();
        for (i, part) in parts.iter().enumerate() {
            self.send_text(chat_id, part).await?;
            if i + 1 < total {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }
        Ok(())
    }

    pub async fn send_pdf(&self, chat_id: ChatId, data: Vec<u8>, file_name: &str, caption: &str) -> Result<()> {
        info!("📎 Sending {file_name} to {chat_id} ({} bytes)", data.len());
        let file = InputFile::memory(data).file_name(file_name.to_string());
        self.bot
            .send_document(chat_id, file)
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    /// Download a file by file_id.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await?;
        let mut data = Vec::new();
        self.bot.download_file(&file.path, &mut data).await?;
        info!("📥 Downloaded {} bytes", data.len());
        Ok(data)
    }

    /// Whether the user currently belongs to the chat.
    pub async fn is_member(&self, chat_id: ChatId, user_id: UserId) -> Result<bool> {
        let member = self.bot.get_chat_member(chat_id, user_id).await?;
        Ok(match &member.kind {
            ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_) | ChatMemberKind::Member(_) => true,
            ChatMemberKind::Restricted(r) => r.is_member,
            ChatMemberKind::Left | ChatMemberKind::Banned(_) => false,
        })
    }

    /// Copy any message (text, media, ...) into another chat.
    pub async fn copy(&self, to: ChatId, from: ChatId, message_id: MessageId) -> Result<()> {
        self.bot.copy_message(to, from, message_id).await?;
        Ok(())
    }

    /// Acknowledge a button press, optionally with a toast.
    pub async fn answer(&self, query: &CallbackQuery, text: Option<&str>) {
        let mut request = self.bot.answer_callback_query(query.id.clone());
        if let Some(text) = text {
            request = request.text(text);
        }
        if let Err(e) = request.await {
            warn!("Failed to answer callback: {e}");
        }
    }

    pub async fn typing(&self, chat_id: ChatId) {
        use teloxide::types::ChatAction;
        self.bot.send_chat_action(chat_id, ChatAction::Typing).await.ok();
    }

    pub fn chunk_delay(&self) -> Duration {
        self.chunk_delay
    }
}
