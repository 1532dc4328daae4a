//! Telegram client using teloxide.

use std::path::Path;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatAction, FileId, InputFile, MessageId, ReplyParameters};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::chatbot::error::BotError;
use crate::chatbot::services::{Activity, SynthesizedAudio, Transport};
use crate::chatbot::text::chunk_text;

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Publish the command menu shown next to the input field.
    pub async fn register_commands(&self, commands: &[(&str, &str)]) -> Result<(), BotError> {
        let commands: Vec<BotCommand> = commands
            .iter()
            .map(|(name, description)| BotCommand::new(*name, *description))
            .collect();

        self.bot
            .set_my_commands(commands)
            .await
            .map_err(|e| transport_error("Failed to register commands", e))?;
        Ok(())
    }
}

/// Logged once by the router, not here.
fn transport_error(context: &str, e: impl std::fmt::Display) -> BotError {
    BotError::Transport(format!("{context}: {e}"))
}

#[async_trait]
impl Transport for TelegramClient {
    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), BotError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| transport_error("Failed to get file info", e))?;

        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| transport_error("Failed to open download target", e))?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| transport_error("Failed to download file", e))?;
        out.flush()
            .await
            .map_err(|e| transport_error("Failed to flush download", e))?;

        info!("📥 Downloaded {} ({} bytes)", file.path, file.meta.size);
        Ok(())
    }

    /// Long texts go out as several messages; only the first is threaded.
    /// A failure after the first part is `ReplyCutShort`.
    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<(), BotError> {
        let chat_id = ChatId(chat_id);
        let parts = chunk_text(text, MAX_MESSAGE_CHARS);
        let total = parts.len();

        for (i, part) in parts.into_iter().enumerate() {
            let mut request = self.bot.send_message(chat_id, part);
            if let (0, Some(msg_id)) = (i, reply_to) {
                request = request.reply_parameters(ReplyParameters::new(MessageId(msg_id)));
            }
            if let Err(e) = request.await {
                return Err(match i {
                    0 => transport_error("Failed to send", e),
                    sent => BotError::ReplyCutShort {
                        sent,
                        total,
                        reason: e.to_string(),
                    },
                });
            }
        }
        Ok(())
    }

    async fn send_voice(
        &self,
        chat_id: i64,
        audio: SynthesizedAudio,
        reply_to: Option<i32>,
    ) -> Result<(), BotError> {
        info!("🔊 Sending voice to chat {} ({} bytes)", chat_id, audio.bytes.len());

        let input_file = InputFile::memory(audio.bytes).file_name(audio.format.file_name());
        let mut request = self.bot.send_voice(ChatId(chat_id), input_file);

        if let Some(msg_id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(msg_id)));
        }

        request
            .await
            .map_err(|e| transport_error("Failed to send voice", e))?;
        Ok(())
    }

    async fn show_activity(&self, chat_id: i64, activity: Activity) -> Result<(), BotError> {
        let action = match activity {
            Activity::Typing => ChatAction::Typing,
            Activity::RecordingVoice => ChatAction::RecordVoice,
        };
        self.bot
            .send_chat_action(ChatId(chat_id), action)
            .await
            .map_err(|e| BotError::Transport(format!("Failed to send chat action: {e}")))?;
        Ok(())
    }
}
