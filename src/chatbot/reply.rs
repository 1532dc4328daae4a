//! Turning a generated reply into what actually gets sent.

use std::sync::Arc;

use tracing::{info, warn};

use crate::chatbot::services::{SynthesizedAudio, Synthesizer};

/// Process-wide reply rendering, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    #[default]
    Text,
    Voice,
}

impl ReplyMode {
    /// `VOICE_MODE=on` turns voice replies on; any other value leaves text.
    pub fn from_toggle(voice: bool) -> Self {
        if voice { Self::Voice } else { Self::Text }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundReply {
    Text(String),
    Voice(SynthesizedAudio),
}

/// Renders reply text according to the reply mode.
///
/// In voice mode a synthesis failure falls back to the text reply, so the
/// user always gets an answer.
pub struct ReplySelector {
    mode: ReplyMode,
    language: String,
    synthesizer: Arc<dyn Synthesizer>,
}

impl ReplySelector {
    pub fn new(mode: ReplyMode, language: String, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            mode,
            language,
            synthesizer,
        }
    }

    pub fn mode(&self) -> ReplyMode {
        self.mode
    }

    pub async fn render(&self, reply: String) -> OutboundReply {
        match self.mode {
            ReplyMode::Text => OutboundReply::Text(reply),
            ReplyMode::Voice => match self.synthesizer.synthesize(&reply, &self.language).await {
                Ok(audio) => {
                    info!("🔊 Synthesized {} bytes of speech", audio.bytes.len());
                    OutboundReply::Voice(audio)
                }
                Err(e) => {
                    warn!("Synthesis failed, replying with text: {e}");
                    OutboundReply::Text(reply)
                }
            },
        }
    }
}
