//! Sofía - a Telegram assistant that listens to voice notes and talks back.
//!
//! Voice notes are transcribed with Whisper, answered by a chat model and,
//! in voice mode, read out with text-to-speech.

pub mod chatbot;
pub mod config;
pub mod telegram_log;
