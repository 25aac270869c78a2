mod config;
mod dispatch;
mod handlers;
mod health;
mod rates;
mod supervisor;

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use config::Config;
use handlers::EventRouter;
use rates::RateClient;
use supervisor::BackoffPolicy;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.bot_token);

    // Needed so /rate@botname style commands parse; tolerated failure.
    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            me.username().to_string()
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            String::new()
        }
    };

    tokio::spawn(health::serve(config.port));

    info!("🟢 kursbot starting (currencies: {:?})", config.currencies);

    let router = Arc::new(EventRouter::new(
        bot.clone(),
        bot_username,
        RateClient::new(),
        config.currencies,
    ));

    supervisor::supervise(BackoffPolicy::default(), move || {
        supervisor::run_session(bot.clone(), router.clone())
    })
    .await;
}
