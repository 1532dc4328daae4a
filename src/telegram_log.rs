//! Mirrors the bot's own log lines into an admin chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::chatbot::telegram::MAX_MESSAGE_CHARS;
use crate::chatbot::text::chunk_text;

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BUFFERED: usize = 50;

enum LogLine {
    /// WARN/ERROR, sent right away.
    Urgent(String),
    /// INFO, batched.
    Routine(String),
}

/// Forwards events from this crate only; teloxide and reqwest events are
/// skipped so a failing send cannot log itself in a loop.
pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl TelegramLogLayer {
    /// Must be called inside a tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();

        tokio::spawn(async move {
            let mut pending: Vec<String> = Vec::new();
            let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(LogLine::Urgent(text)) => post(&bot, chat_id, &text).await,
                        Some(LogLine::Routine(text)) => {
                            pending.push(text);
                            if pending.len() >= MAX_BUFFERED {
                                flush(&bot, chat_id, &mut pending).await;
                            }
                        }
                        None => {
                            flush(&bot, chat_id, &mut pending).await;
                            break;
                        }
                    },
                    _ = ticker.tick() => flush(&bot, chat_id, &mut pending).await,
                }
            }
        });

        Self { tx }
    }
}

async fn post(bot: &Bot, chat_id: ChatId, text: &str) {
    for part in chunk_text(text, MAX_MESSAGE_CHARS) {
        if let Err(e) = bot.send_message(chat_id, part).await {
            eprintln!("Failed to send log to Telegram: {e}");
            return;
        }
    }
}

async fn flush(bot: &Bot, chat_id: ChatId, pending: &mut Vec<String>) {
    if pending.is_empty() {
        return;
    }
    let combined = pending.join("\n");
    pending.clear();
    post(bot, chat_id, &combined).await;
}

#[derive(Default)]
struct LineVisitor {
    line: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.line = format!("{value:?}");
        } else if self.line.is_empty() {
            self.line = format!("{} = {:?}", field.name(), value);
        } else {
            self.line.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > Level::INFO || !meta.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let line = match *meta.level() {
            Level::ERROR => LogLine::Urgent(format!("❌ {}", visitor.line)),
            Level::WARN => LogLine::Urgent(format!("⚠️ {}", visitor.line)),
            _ => LogLine::Routine(visitor.line),
        };

        if self.tx.send(line).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
