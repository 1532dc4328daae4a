use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use sofia::chatbot::{GoogleTts, InboundEvent, OpenAiClient, Router, Services, TelegramClient};
use sofia::config::{Config, Delivery};
use sofia::telegram_log::TelegramLogLayer;

/// Sofía: a Telegram assistant that answers voice notes.
#[derive(Parser)]
#[command(name = "sofia", version)]
struct Args {
    /// JSON config file; environment variables override its values.
    #[arg(short, long, env = "SOFIA_CONFIG")]
    config: Option<PathBuf>,

    /// How to receive updates. Defaults to webhook when a public URL is set.
    #[arg(long, value_enum)]
    delivery: Option<Delivery>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::load(args.config.as_deref(), args.delivery).context("Failed to load configuration")?;

    let bot = Bot::new(&config.telegram_bot_token);
    let _log_guard = init_logging(&config, &bot)?;

    info!("🚀 Starting sofia...");
    if let Some(ref path) = args.config {
        info!("Loaded config from {}", path.display());
    }
    info!(
        "Reply mode: {:?}, handlers: {}, delivery: {:?}",
        config.reply_mode, config.handlers, config.delivery
    );

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            Some(me.username().to_string())
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            None
        }
    };

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let openai = Arc::new(
        OpenAiClient::new(config.openai_api_key.clone(), http.clone())
            .with_base_url(&config.openai_base_url)
            .with_models(config.chat_model.clone(), config.transcription_model.clone())
            .with_system_prompt(config.system_prompt.clone()),
    );
    let tts = Arc::new(GoogleTts::new(http, config.tts_tld.clone()).with_transcoding(config.ffmpeg_path.clone()));
    let telegram = Arc::new(TelegramClient::new(bot.clone()));

    let services = Services {
        transport: telegram.clone(),
        transcriber: openai.clone(),
        completer: openai,
        synthesizer: tts,
    };
    let router = Arc::new(Router::new(config.router_settings(bot_username), services));

    if let Err(e) = telegram.register_commands(&router.commands().menu()).await {
        warn!("Command menu not updated: {e}");
    }

    let handler = Update::filter_message().endpoint(handle_message);
    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build();

    match config.delivery {
        Delivery::Polling => {
            info!("Receiving updates by long polling");
            dispatcher.dispatch().await;
        }
        Delivery::Webhook => {
            let url = config.webhook_url.clone().context("webhook delivery without a webhook URL")?;
            let address = config.bind_address();
            info!("Registering webhook {url}, listening on {address}");

            let listener = webhooks::axum(bot, webhooks::Options::new(address, url))
                .await
                .context("Failed to register webhook")?;
            dispatcher
                .dispatch_with_listener(listener, LoggingErrorHandler::with_custom_text("Webhook listener error"))
                .await;
        }
    }

    info!("Shut down");
    Ok(())
}

async fn handle_message(msg: Message, router: Arc<Router>) -> ResponseResult<()> {
    match InboundEvent::from_message(&msg) {
        Ok(event) => {
            let route = router.handle(event).await;
            debug!("Message {} in chat {} → {:?}", msg.id, msg.chat.id, route);
        }
        Err(e) => debug!("Dropping message {} in chat {}: {e}", msg.id, msg.chat.id),
    }
    Ok(())
}

/// Stdout plus a log file under `<data_dir>/logs`, and the admin chat when
/// `log_chat_id` is set. The guard must live until shutdown.
fn init_logging(config: &Config, bot: &Bot) -> anyhow::Result<WorkerGuard> {
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).with_context(|| format!("Failed to create {}", log_dir.display()))?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("sofia.log"))
        .context("Failed to open log file")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let telegram_layer = config.log_chat_id.map(|chat_id| TelegramLogLayer::new(bot.clone(), chat_id));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .with(telegram_layer)
        .init();

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
