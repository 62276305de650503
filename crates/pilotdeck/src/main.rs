//! `PilotDeck` - headless sync daemon
//!
//! Keeps the account data of every stored character in sync with the game's
//! API, one section at a time.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod daemon;
mod settings;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daemon::Daemon;
use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pilotdeck=info,pilotdeck_core=info,pilotdeck_sso=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PilotDeck");

    let settings = Settings::load()?;
    settings.validate()?;

    let daemon = Daemon::new(&settings).await?;
    daemon.run().await
}
