//! Errors raised while handling a single inbound event.

use thiserror::Error;

/// Failure of one step of an event's handling.
///
/// None of these ever leave the router: they are logged and turned into a
/// fixed reply for the chat the event came from.
#[derive(Debug, Error)]
pub enum BotError {
    /// Telegram download or send failed.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("completion failed: {0}")]
    Completion(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// The update carries nothing the router knows how to handle.
    #[error("unrecognized event")]
    UnrecognizedEvent,

    #[error("voice clip is {seconds}s long, limit is {limit}s")]
    VoiceTooLong { seconds: u32, limit: u32 },

    /// A multi-part text reply failed after some parts were delivered.
    #[error("reply cut short after {sent} of {total} parts: {reason}")]
    ReplyCutShort { sent: usize, total: usize, reason: String },
}

impl BotError {
    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Transcription(_) => "transcription",
            Self::Completion(_) => "completion",
            Self::Synthesis(_) => "synthesis",
            Self::UnrecognizedEvent => "unrecognized",
            Self::VoiceTooLong { .. } => "voice_too_long",
            Self::ReplyCutShort { .. } => "cut_short",
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(format!("local file error: {e}"))
    }
}
