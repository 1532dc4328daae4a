use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::ChatId;
use thiserror::Error;
use url::Url;

use crate::chatbot::handlers::{HandlerKind, HandlerSet};
use crate::chatbot::openai::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_TRANSCRIPTION_MODEL};
use crate::chatbot::reply::ReplyMode;
use crate::chatbot::router::RouterSettings;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", .path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", .path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// An environment variable holds an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Long polling `getUpdates`.
    Polling,
    /// Telegram POSTs updates to `<public_url>/webhook`.
    Webhook,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    telegram_bot_token: String,
    openai_api_key: String,
    /// Reply with synthesized speech instead of text.
    voice_mode: bool,
    delivery: Option<Delivery>,
    /// Public host or URL the webhook is registered under.
    public_url: Option<String>,
    port: Option<u16>,
    handlers: Option<Vec<HandlerKind>>,
    greeting: Option<String>,
    apology: Option<String>,
    too_long_message: Option<String>,
    cut_short_message: Option<String>,
    max_voice_seconds: Option<u32>,
    chat_model: Option<String>,
    transcription_model: Option<String>,
    system_prompt: Option<String>,
    openai_base_url: Option<String>,
    tts_language: Option<String>,
    /// Google host TLD, picks the accent (`es`, `com.mx`, ...).
    tts_tld: Option<String>,
    /// Transcode speech to OGG Opus with ffmpeg.
    transcode_voice: bool,
    ffmpeg_path: Option<String>,
    request_timeout_secs: Option<u64>,
    /// Directory for log files. Defaults to current directory.
    data_dir: Option<String>,
    /// Chat that receives WARN/ERROR log lines.
    log_chat_id: Option<i64>,
}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_VOICE_SECONDS: u32 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_GREETING: &str = "¡Hola! Soy Sofía, tu asistente de IA.";
const DEFAULT_APOLOGY: &str = "Lo siento, hubo un problema al procesar tu mensaje. Inténtalo de nuevo.";
const DEFAULT_TOO_LONG: &str = "El audio es demasiado largo. Envíame una nota de voz más corta.";
const DEFAULT_CUT_SHORT: &str = "Lo siento, mi respuesta se cortó a medias. Pregúntame de nuevo.";

/// Everything read at startup. Immutable afterwards.
pub struct Config {
    pub telegram_bot_token: String,
    pub openai_api_key: String,
    pub reply_mode: ReplyMode,
    pub delivery: Delivery,
    /// Set exactly when `delivery` is `Webhook`.
    pub webhook_url: Option<Url>,
    pub port: u16,
    pub handlers: HandlerSet,
    pub greeting: String,
    pub apology: String,
    pub too_long_message: String,
    pub cut_short_message: String,
    pub max_voice_seconds: u32,
    pub chat_model: String,
    pub transcription_model: String,
    pub system_prompt: Option<String>,
    pub openai_base_url: String,
    pub tts_language: String,
    pub tts_tld: String,
    /// ffmpeg binary when transcoding is on.
    pub ffmpeg_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
}

impl Config {
    /// Load from an optional JSON file, then apply environment overrides
    /// (`TELEGRAM_TOKEN`, `OPENAI_API_KEY`, `VOICE_MODE`, `RENDER_URL`, ...).
    /// `delivery` comes from the command line and wins over both.
    pub fn load(path: Option<&Path>, delivery: Option<Delivery>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, delivery, |var| std::env::var(var).ok())
    }

    pub fn load_with_env(
        path: Option<&Path>,
        delivery: Option<Delivery>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut file = match path {
            Some(path) => read_file(path)?,
            None => ConfigFile::default(),
        };
        apply_env(&mut file, env)?;
        if delivery.is_some() {
            file.delivery = delivery;
        }
        Self::validate(file)
    }

    fn validate(file: ConfigFile) -> Result<Self, ConfigError> {
        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }
        if file.openai_api_key.trim().is_empty() {
            return Err(ConfigError::Validation("openai_api_key is required".into()));
        }

        let handlers = match file.handlers {
            Some(kinds) => HandlerSet::new(kinds),
            None => HandlerSet::default(),
        };
        if handlers.is_empty() {
            return Err(ConfigError::Validation("handlers must enable at least one handler".into()));
        }

        let public_url = file.public_url.filter(|u| !u.trim().is_empty());
        let delivery = file.delivery.unwrap_or(if public_url.is_some() {
            Delivery::Webhook
        } else {
            Delivery::Polling
        });
        let webhook_url = match (delivery, public_url) {
            (Delivery::Webhook, Some(public)) => Some(webhook_url(&public)?),
            (Delivery::Webhook, None) => {
                return Err(ConfigError::Validation("public_url is required for webhook delivery".into()));
            }
            (Delivery::Polling, _) => None,
        };

        let max_voice_seconds = file.max_voice_seconds.unwrap_or(DEFAULT_MAX_VOICE_SECONDS);
        if max_voice_seconds == 0 {
            return Err(ConfigError::Validation("max_voice_seconds must be positive".into()));
        }

        let ffmpeg_path = file
            .transcode_voice
            .then(|| PathBuf::from(file.ffmpeg_path.unwrap_or_else(|| "ffmpeg".to_string())));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            openai_api_key: file.openai_api_key,
            reply_mode: ReplyMode::from_toggle(file.voice_mode),
            delivery,
            webhook_url,
            port: file.port.unwrap_or(DEFAULT_PORT),
            handlers,
            greeting: file.greeting.unwrap_or_else(|| DEFAULT_GREETING.to_string()),
            apology: file.apology.unwrap_or_else(|| DEFAULT_APOLOGY.to_string()),
            too_long_message: file.too_long_message.unwrap_or_else(|| DEFAULT_TOO_LONG.to_string()),
            cut_short_message: file.cut_short_message.unwrap_or_else(|| DEFAULT_CUT_SHORT.to_string()),
            max_voice_seconds,
            chat_model: file.chat_model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            transcription_model: file
                .transcription_model
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            system_prompt: file.system_prompt.filter(|p| !p.trim().is_empty()),
            openai_base_url: file.openai_base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            tts_language: file.tts_language.unwrap_or_else(|| "es".to_string()),
            tts_tld: file.tts_tld.unwrap_or_else(|| "es".to_string()),
            ffmpeg_path,
            request_timeout: Duration::from_secs(file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            data_dir: file.data_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            log_chat_id: file.log_chat_id.map(ChatId),
        })
    }

    /// Webhook listener address: all interfaces, configured port.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn router_settings(&self, bot_username: Option<String>) -> RouterSettings {
        RouterSettings {
            reply_mode: self.reply_mode,
            handlers: self.handlers.clone(),
            greeting: self.greeting.clone(),
            apology: self.apology.clone(),
            too_long_message: self.too_long_message.clone(),
            cut_short_message: self.cut_short_message.clone(),
            max_voice_seconds: self.max_voice_seconds,
            tts_language: self.tts_language.clone(),
            bot_username,
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })
}

fn apply_env(file: &mut ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
    if let Some(token) = env("TELEGRAM_TOKEN") {
        file.telegram_bot_token = token;
    }
    if let Some(key) = env("OPENAI_API_KEY") {
        file.openai_api_key = key;
    }
    if let Some(mode) = env("VOICE_MODE") {
        file.voice_mode = parse_toggle(&mode);
    }
    if let Some(delivery) = env("DELIVERY") {
        file.delivery = Some(match delivery.trim().to_ascii_lowercase().as_str() {
            "polling" => Delivery::Polling,
            "webhook" => Delivery::Webhook,
            other => {
                return Err(ConfigError::InvalidEnv {
                    var: "DELIVERY",
                    reason: format!("expected 'polling' or 'webhook', got '{other}'"),
                });
            }
        });
    }
    if let Some(url) = env("RENDER_URL") {
        file.public_url = Some(url);
    }
    if let Some(port) = env("PORT") {
        let port = port.trim().parse().map_err(|e| ConfigError::InvalidEnv {
            var: "PORT",
            reason: format!("{e}"),
        })?;
        file.port = Some(port);
    }
    if let Some(list) = env("HANDLERS") {
        let set = HandlerSet::parse_list(&list).map_err(|reason| ConfigError::InvalidEnv { var: "HANDLERS", reason })?;
        file.handlers = Some(set.iter().collect());
    }
    if let Some(chat) = env("LOG_CHAT_ID") {
        let chat = chat.trim().parse().map_err(|e| ConfigError::InvalidEnv {
            var: "LOG_CHAT_ID",
            reason: format!("{e}"),
        })?;
        file.log_chat_id = Some(chat);
    }
    Ok(())
}

/// `on` (also `true`, `1`, `yes`) enables; anything else disables.
fn parse_toggle(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
}

/// `myapp.onrender.com` becomes `https://myapp.onrender.com/webhook`;
/// full URLs keep their scheme and get `/webhook` appended.
fn webhook_url(public: &str) -> Result<Url, ConfigError> {
    let public = public.trim().trim_end_matches('/');
    let base = if public.contains("://") {
        public.to_string()
    } else {
        format!("https://{public}")
    };
    let full = if base.ends_with("/webhook") { base } else { format!("{base}/webhook") };
    Url::parse(&full).map_err(|e| ConfigError::Validation(format!("public_url '{public}' is not a valid URL: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOKEN: &str = "123456789:ABCdefGHIjklMNOpqrsTUVwxyz";

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    fn load_env(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        Config::load_with_env(None, None, env_of(vars))
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_env_only_config() {
        let config = load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.reply_mode, ReplyMode::Text);
        assert_eq!(config.delivery, Delivery::Polling);
        assert!(config.webhook_url.is_none());
        assert_eq!(config.port, 8080);
        assert_eq!(config.handlers, HandlerSet::default());
        assert_eq!(config.chat_model, "gpt-3.5-turbo");
        assert_eq!(config.tts_language, "es");
        assert!(config.ffmpeg_path.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_voice_mode_toggle() {
        let on = load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("VOICE_MODE", "on")]).unwrap();
        assert_eq!(on.reply_mode, ReplyMode::Voice);

        let off = load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("VOICE_MODE", "off")]).unwrap();
        assert_eq!(off.reply_mode, ReplyMode::Text);
    }

    #[test]
    fn test_render_url_implies_webhook() {
        let config = load_env(&[
            ("TELEGRAM_TOKEN", TOKEN),
            ("OPENAI_API_KEY", "k"),
            ("RENDER_URL", "sofia.onrender.com"),
            ("PORT", "10000"),
        ])
        .unwrap();
        assert_eq!(config.delivery, Delivery::Webhook);
        assert_eq!(config.bind_address(), "0.0.0.0:10000".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.webhook_url.as_ref().map(Url::as_str),
            Some("https://sofia.onrender.com/webhook")
        );
    }

    #[test]
    fn test_cli_delivery_wins() {
        let config = Config::load_with_env(
            None,
            Some(Delivery::Polling),
            env_of(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("RENDER_URL", "sofia.onrender.com")]),
        )
        .unwrap();
        assert_eq!(config.delivery, Delivery::Polling);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_webhook_requires_public_url() {
        let err = assert_err(load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("DELIVERY", "webhook")]));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("public_url"));
    }

    #[test]
    fn test_webhook_url_forms() {
        assert_eq!(webhook_url("bot.example.com/").unwrap().as_str(), "https://bot.example.com/webhook");
        assert_eq!(
            webhook_url("http://localhost:8443").unwrap().as_str(),
            "http://localhost:8443/webhook"
        );
        assert_eq!(
            webhook_url("https://bot.example.com/webhook").unwrap().as_str(),
            "https://bot.example.com/webhook"
        );
    }

    #[test]
    fn test_invalid_env_values() {
        let err = assert_err(load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("PORT", "http")]));
        assert!(matches!(err, ConfigError::InvalidEnv { var: "PORT", .. }));

        let err = assert_err(load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("DELIVERY", "smtp")]));
        assert!(matches!(err, ConfigError::InvalidEnv { var: "DELIVERY", .. }));

        let err = assert_err(load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("HANDLERS", "voice,fax")]));
        assert!(matches!(err, ConfigError::InvalidEnv { var: "HANDLERS", .. }));
    }

    #[test]
    fn test_handlers_from_env() {
        let config = load_env(&[("TELEGRAM_TOKEN", TOKEN), ("OPENAI_API_KEY", "k"), ("HANDLERS", "voice,text")]).unwrap();
        assert!(config.handlers.contains(HandlerKind::Text));
        assert!(!config.handlers.contains(HandlerKind::Start));
    }

    #[test]
    fn test_file_config_with_env_override() {
        let file = write_config(&format!(
            r#"{{
                "telegram_bot_token": "{TOKEN}",
                "openai_api_key": "sk-file",
                "handlers": ["start", "help", "voice", "text"],
                "greeting": "Buenas",
                "transcode_voice": true,
                "max_voice_seconds": 60,
                "log_chat_id": -100123
            }}"#
        ));
        let config =
            Config::load_with_env(Some(file.path()), None, env_of(&[("OPENAI_API_KEY", "sk-env")])).unwrap();
        assert_eq!(config.openai_api_key, "sk-env");
        assert_eq!(config.handlers, HandlerSet::all());
        assert_eq!(config.greeting, "Buenas");
        assert_eq!(config.cut_short_message, DEFAULT_CUT_SHORT);
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("ffmpeg")));
        assert_eq!(config.max_voice_seconds, 60);
        assert_eq!(config.log_chat_id, Some(ChatId(-100123)));
    }

    #[test]
    fn test_empty_handlers_rejected() {
        let file = write_config(&format!(
            r#"{{ "telegram_bot_token": "{TOKEN}", "openai_api_key": "k", "handlers": [] }}"#
        ));
        let err = assert_err(Config::load_with_env(Some(file.path()), None, env_of(&[])));
        assert!(err.to_string().contains("handlers"));
    }

    #[test]
    fn test_missing_token() {
        let err = assert_err(load_env(&[("OPENAI_API_KEY", "k")]));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_missing_openai_key() {
        let err = assert_err(load_env(&[("TELEGRAM_TOKEN", TOKEN)]));
        assert!(err.to_string().contains("openai_api_key"));
    }

    #[test]
    fn test_invalid_token_format() {
        for token in ["invalid_token_no_colon", "notanumber:ABCdef", "123456789:"] {
            let err = assert_err(load_env(&[("TELEGRAM_TOKEN", token), ("OPENAI_API_KEY", "k")]));
            assert!(matches!(err, ConfigError::Validation(_)), "token {token} accepted");
        }
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load_with_env(
            Some(Path::new("/nonexistent/path/config.json")),
            None,
            env_of(&[]),
        ));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load_with_env(Some(file.path()), None, env_of(&[])));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn test_parse_toggle() {
        assert!(parse_toggle("on"));
        assert!(parse_toggle(" ON "));
        assert!(parse_toggle("true"));
        assert!(!parse_toggle("off"));
        assert!(!parse_toggle(""));
    }
}
