use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use survey_bot::bot;
use survey_bot::config::BotConfig;
use survey_bot::db::BanStore;
use survey_bot::localization::Texts;
use survey_bot::logging::init_tracing;
use survey_bot::messenger::TelegramMessenger;
use survey_bot::router::Router;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid bot configuration")?;
    // Keeps the log file writer alive until shutdown
    let _log_guard = init_tracing(config.log_format, &config.log_file)?;

    info!("Starting survey bot");
    info!(database_url = %config.database_url, "Initializing ban database");
    let bans = BanStore::connect(&config.database_url).await?;

    let texts = Texts::load(&config.language)?;
    let config = Arc::new(config);
    let timeouts = config.timeouts;

    let polling_bot = bot::polling_bot(&config.token, &timeouts)?;
    let messenger = Arc::new(TelegramMessenger::new(
        bot::build_bot(&config.token, timeouts.request)?,
        bot::build_bot(&config.token, timeouts.media)?,
    ));
    let router = Arc::new(Router::assemble(
        Arc::clone(&config),
        bans,
        messenger,
        texts,
    ));

    info!(
        survey_chat = config.survey_chat,
        main_chat = config.main_chat,
        polling_timeout_secs = timeouts.polling.as_secs(),
        "Bot initialized, starting dispatcher"
    );

    let listener = bot::polling_listener(polling_bot.clone(), &timeouts);
    Dispatcher::builder(polling_bot, bot::schema())
        .dependencies(dptree::deps![Arc::clone(&config), Arc::clone(&router)])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("Update listener error"),
        )
        .await;

    router.aggregator().shutdown().await;
    info!("Survey bot stopped");
    Ok(())
}
