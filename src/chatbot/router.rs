//! Message router - classifies each event and runs exactly one handler.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chatbot::commands::CommandDispatcher;
use crate::chatbot::error::BotError;
use crate::chatbot::event::{EventKind, InboundEvent, VoiceClip};
use crate::chatbot::handlers::{HandlerKind, HandlerSet};
use crate::chatbot::reply::{OutboundReply, ReplyMode, ReplySelector};
use crate::chatbot::services::{Activity, Completer, Synthesizer, Transcriber, Transport};
use crate::chatbot::text::preview;

/// Behaviour knobs, all fixed at startup.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub reply_mode: ReplyMode,
    pub handlers: HandlerSet,
    pub greeting: String,
    /// Sent when any step of a pipeline fails.
    pub apology: String,
    pub too_long_message: String,
    /// Sent when a long reply stopped after some of its parts.
    pub cut_short_message: String,
    pub max_voice_seconds: u32,
    pub tts_language: String,
    pub bot_username: Option<String>,
}

/// Handles to the remote services, built once in `main`.
#[derive(Clone)]
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub transcriber: Arc<dyn Transcriber>,
    pub completer: Arc<dyn Completer>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

/// Which path an event took through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Command,
    Voice,
    Text,
    Dropped,
}

pub struct Router {
    handlers: HandlerSet,
    commands: CommandDispatcher,
    replies: ReplySelector,
    apology: String,
    too_long_message: String,
    cut_short_message: String,
    max_voice_seconds: u32,
    transport: Arc<dyn Transport>,
    transcriber: Arc<dyn Transcriber>,
    completer: Arc<dyn Completer>,
}

impl Router {
    pub fn new(settings: RouterSettings, services: Services) -> Self {
        let commands = CommandDispatcher::new(
            settings.greeting,
            settings.handlers.clone(),
            settings.bot_username,
        );
        let replies = ReplySelector::new(settings.reply_mode, settings.tts_language, services.synthesizer);

        Self {
            handlers: settings.handlers,
            commands,
            replies,
            apology: settings.apology,
            too_long_message: settings.too_long_message,
            cut_short_message: settings.cut_short_message,
            max_voice_seconds: settings.max_voice_seconds,
            transport: services.transport,
            transcriber: services.transcriber,
            completer: services.completer,
        }
    }

    pub fn commands(&self) -> &CommandDispatcher {
        &self.commands
    }

    /// Handle one event. Never fails: pipeline errors become an apology
    /// sent to the originating chat.
    pub async fn handle(&self, event: InboundEvent) -> Route {
        match &event.kind {
            EventKind::Command(call) => match self.commands.dispatch(call) {
                Some(reply) => {
                    info!("💬 /{} in chat {} (args: \"{}\")", call.name, event.chat_id, preview(&call.args, 50));
                    let result = self.send(&event, OutboundReply::Text(reply)).await;
                    self.finish(&event, result).await;
                    Route::Command
                }
                None => {
                    debug!("Ignoring command /{} in chat {}", call.name, event.chat_id);
                    Route::Dropped
                }
            },
            EventKind::VoiceClip(clip) if self.handlers.contains(HandlerKind::Voice) => {
                info!("🎤 Voice clip ({}s) in chat {}", clip.duration_secs, event.chat_id);
                let result = self.voice_pipeline(&event, clip).await;
                self.finish(&event, result).await;
                Route::Voice
            }
            EventKind::TextMessage(text) if self.handlers.contains(HandlerKind::Text) => {
                info!("📨 Text in chat {}: \"{}\"", event.chat_id, preview(text, 50));
                let result = self.text_pipeline(&event, text).await;
                self.finish(&event, result).await;
                Route::Text
            }
            _ => {
                debug!("No handler for {} event in chat {}", event.kind_name(), event.chat_id);
                Route::Dropped
            }
        }
    }

    async fn voice_pipeline(&self, event: &InboundEvent, clip: &VoiceClip) -> Result<(), BotError> {
        if clip.duration_secs > self.max_voice_seconds {
            return Err(BotError::VoiceTooLong {
                seconds: clip.duration_secs,
                limit: self.max_voice_seconds,
            });
        }

        self.show_activity(event.chat_id).await;
        let audio = self.download(clip).await?;
        let transcript = self.transcriber.transcribe(&audio).await?;
        if transcript.trim().is_empty() {
            return Err(BotError::Transcription("empty transcript".to_string()));
        }
        info!("📝 Transcript: \"{}\"", preview(&transcript, 100));

        let reply = self.completer.complete(&transcript).await?;
        self.reply(event, reply).await
    }

    async fn text_pipeline(&self, event: &InboundEvent, text: &str) -> Result<(), BotError> {
        self.show_activity(event.chat_id).await;
        let reply = self.completer.complete(text).await?;
        self.reply(event, reply).await
    }

    /// Fetch the clip through a temporary file that is removed when this
    /// returns, whatever the outcome.
    async fn download(&self, clip: &VoiceClip) -> Result<Vec<u8>, BotError> {
        let file = tempfile::Builder::new()
            .prefix("sofia-voice-")
            .suffix(".ogg")
            .tempfile()?;
        self.transport.download(&clip.file_id, file.path()).await?;
        let audio = tokio::fs::read(file.path()).await?;
        debug!("Downloaded {} bytes of voice audio", audio.len());
        Ok(audio)
    }

    async fn reply(&self, event: &InboundEvent, reply: String) -> Result<(), BotError> {
        info!("🤖 Reply: \"{}\"", preview(&reply, 100));
        match self.replies.render(reply.clone()).await {
            OutboundReply::Voice(audio) => match self.send(event, OutboundReply::Voice(audio)).await {
                Ok(()) => Ok(()),
                // e.g. VOICE_MESSAGES_FORBIDDEN from the user's privacy settings
                Err(e) => {
                    warn!("Voice reply rejected in chat {}, sending text: {e}", event.chat_id);
                    self.send(event, OutboundReply::Text(reply)).await
                }
            },
            text => self.send(event, text).await,
        }
    }

    async fn send(&self, event: &InboundEvent, outbound: OutboundReply) -> Result<(), BotError> {
        let reply_to = Some(event.message_id);
        match outbound {
            OutboundReply::Text(text) => self.transport.send_text(event.chat_id, &text, reply_to).await,
            OutboundReply::Voice(audio) => self.transport.send_voice(event.chat_id, audio, reply_to).await,
        }
    }

    async fn show_activity(&self, chat_id: i64) {
        let activity = match self.replies.mode() {
            ReplyMode::Text => Activity::Typing,
            ReplyMode::Voice => Activity::RecordingVoice,
        };
        if let Err(e) = self.transport.show_activity(chat_id, activity).await {
            debug!("Chat action failed: {e}");
        }
    }

    async fn finish(&self, event: &InboundEvent, result: Result<(), BotError>) {
        let Err(e) = result else {
            return;
        };

        warn!("{} pipeline failed in chat {} ({}): {e}", event.kind_name(), event.chat_id, e.kind());
        let notice = match e {
            BotError::VoiceTooLong { .. } => &self.too_long_message,
            BotError::ReplyCutShort { .. } => &self.cut_short_message,
            _ => &self.apology,
        };
        if let Err(e) = self.transport.send_text(event.chat_id, notice, Some(event.message_id)).await {
            error!("Could not tell chat {} about the failure: {e}", event.chat_id);
        }
    }
}
