//! Chatbot module - voice and text messages in, model replies out.

pub mod commands;
pub mod error;
pub mod event;
pub mod handlers;
pub mod openai;
pub mod reply;
pub mod router;
pub mod services;
pub mod telegram;
pub mod text;
pub mod tts;


pub use error::BotError;
pub use event::{EventKind, InboundEvent};
pub use handlers::{HandlerKind, HandlerSet};
pub use openai::OpenAiClient;
pub use reply::ReplyMode;
pub use router::{Route, Router, RouterSettings, Services};
pub use telegram::TelegramClient;
pub use tts::GoogleTts;
