//! Normalized inbound events.
//!
//! Every Telegram message is reduced to one of three shapes before it
//! reaches the router, so the router never touches teloxide types.

use teloxide::types::Message;

use crate::chatbot::error::BotError;

/// A recorded voice message that still lives on Telegram's servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceClip {
    pub file_id: String,
    pub duration_secs: u32,
}

/// A `/command` with its target bot and trailing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCall {
    /// Lower-cased name without the leading slash.
    pub name: String,
    /// Bot username from a `/cmd@bot` suffix.
    pub addressee: Option<String>,
    pub args: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    VoiceClip(VoiceClip),
    TextMessage(String),
    Command(CommandCall),
}

/// One user-originated message, immutable for the duration of its handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub message_id: i32,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Classify a Telegram message. Anything that is neither a voice note
    /// nor text (stickers, photos, service messages) is unrecognized.
    pub fn from_message(msg: &Message) -> Result<Self, BotError> {
        let chat_id = msg.chat.id.0;
        let message_id = msg.id.0;

        if let Some(voice) = msg.voice() {
            return Ok(Self {
                chat_id,
                message_id,
                kind: EventKind::VoiceClip(VoiceClip {
                    file_id: voice.file.id.0.clone(),
                    duration_secs: voice.duration.seconds(),
                }),
            });
        }

        match msg.text() {
            Some(text) => Self::from_text(chat_id, message_id, text),
            None => Err(BotError::UnrecognizedEvent),
        }
    }

    /// Build an event from raw message text.
    pub fn from_text(chat_id: i64, message_id: i32, text: &str) -> Result<Self, BotError> {
        if text.trim().is_empty() {
            return Err(BotError::UnrecognizedEvent);
        }

        let kind = match parse_command(text) {
            Some(call) => EventKind::Command(call),
            None => EventKind::TextMessage(text.to_string()),
        };

        Ok(Self { chat_id, message_id, kind })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::VoiceClip(_) => "voice",
            EventKind::TextMessage(_) => "text",
            EventKind::Command(_) => "command",
        }
    }
}

/// Parse `/name[@bot] [args]`. Returns `None` for text that only looks
/// like a command (a bare `/`, `/ spaced`, paths like `/usr/bin`).
pub fn parse_command(text: &str) -> Option<CommandCall> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };

    let (name, addressee) = match head.split_once('@') {
        Some((name, bot)) => (name, Some(bot.to_string())),
        None => (head, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    Some(CommandCall {
        name: name.to_ascii_lowercase(),
        addressee,
        args: args.to_string(),
    })
}
