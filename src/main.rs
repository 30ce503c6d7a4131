use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use paperpilot::ai::{GeminiClient, TextModel, Transcriber};
use paperpilot::bot::router::{self, Command};
use paperpilot::bot::{BotState, TelegramClient, notifications};
use paperpilot::compare::Comparator;
use paperpilot::config::Config;
use paperpilot::paper::{ArxivClient, CitationSource, PaperSource, SemanticScholar};
use paperpilot::session::Sessions;
use paperpilot::store::{AdminStore, NotificationStore, PreferenceStore};
use paperpilot::whisper::Whisper;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "paperpilot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("paperpilot.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting paperpilot...");
    info!("Loaded config from {config_path}");
    info!("Owner IDs: {:?}", config.owner_ids);

    let bot = Bot::new(&config.telegram_bot_token);
    let state = match build_state(config, bot.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Startup failed: {e}");
            std::process::exit(1);
        }
    };

    notifications::spawn_digest_job(state.clone());

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(router::on_command),
        )
        .branch(Update::filter_message().endpoint(router::on_message))
        .branch(Update::filter_callback_query().endpoint(router::on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn build_state(config: Config, bot: Bot) -> Result<BotState, Box<dyn std::error::Error>> {
    let gemini = Arc::new(GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())?);
    let model: Arc<dyn TextModel> = gemini.clone();

    let transcriber: Arc<dyn Transcriber> = match &config.whisper_model_path {
        Some(path) => match Whisper::new(path) {
            Ok(whisper) => Arc::new(whisper),
            Err(e) => {
                warn!("Whisper unavailable, using Gemini for voice: {e}");
                gemini.clone()
            }
        },
        None => {
            info!("No Whisper model configured, using Gemini for voice");
            gemini.clone()
        }
    };

    let papers: Arc<dyn PaperSource> = Arc::new(ArxivClient::new()?);
    let citations: Option<Arc<dyn CitationSource>> =
        match SemanticScholar::new(config.semantic_scholar_api_key.clone()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Citation filtering disabled: {e}");
                None
            }
        };

    let owner = config.primary_owner().0 as i64;
    let admin = AdminStore::new(&config.data_dir, owner)?;
    for extra in config.owner_ids.iter().skip(1) {
        if admin.add_admin(extra.0 as i64)? {
            info!("Added configured owner {} as admin", extra.0);
        }
    }

    let cache_age = chrono::Duration::hours(config.comparison_cache_hours);
    let comparator = Comparator::new(model.clone(), cache_age);

    Ok(BotState {
        telegram: TelegramClient::new(bot, Duration::from_millis(config.chunk_delay_ms)),
        papers,
        citations,
        model,
        transcriber,
        comparator,
        preferences: PreferenceStore::new(&config.data_dir)?,
        notifications: NotificationStore::new(&config.data_dir)?,
        admin,
        sessions: Sessions::new(config.daily_comparison_limit),
        config,
    })
}
