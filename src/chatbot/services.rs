//! Seams between the router and the outside world.
//!
//! The router only sees these traits. Production wires in the OpenAI,
//! Google TTS and Telegram clients; tests wire in recording fakes.

use std::path::Path;

use async_trait::async_trait;

use crate::chatbot::error::BotError;

/// Container of a synthesized clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    /// OGG with Opus, what Telegram's own voice notes use.
    OggOpus,
}

impl AudioFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Mp3 => "respuesta.mp3",
            Self::OggOpus => "respuesta.ogg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Chat action shown while a reply is being prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Typing,
    RecordingVoice,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, BotError>;
}

#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, BotError>;
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, BotError>;
}

/// Inbound file downloads and outbound messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download a remote file into `dest`, which already exists.
    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), BotError>;

    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<(), BotError>;

    async fn send_voice(
        &self,
        chat_id: i64,
        audio: SynthesizedAudio,
        reply_to: Option<i32>,
    ) -> Result<(), BotError>;

    /// Best effort; the default does nothing.
    async fn show_activity(&self, _chat_id: i64, _activity: Activity) -> Result<(), BotError> {
        Ok(())
    }
}
