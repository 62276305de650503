//! Periodic synchronization of all characters.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use pilotdeck_core::{
    CharacterRepository, CredentialManager, JsonSection, PayloadRepository, SectionOutcome,
    SectionRegistry, SectionStatusRepository, SectionUpdater, StatusCache,
};
use pilotdeck_sso::SsoClient;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::settings::Settings;

/// Timeout of a single HTTP request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Wired up synchronization engine.
pub struct Daemon {
    tick_interval: Duration,
    characters: Arc<CharacterRepository>,
    statuses: Arc<SectionStatusRepository>,
    payloads: Arc<PayloadRepository>,
    cache: Arc<StatusCache>,
    updater: Arc<SectionUpdater>,
}

impl Daemon {
    /// Opens storage and builds the engine from `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the settings are
    /// unusable.
    pub async fn new(settings: &Settings) -> Result<Self> {
        let database_path = settings.database_path()?;
        if let Some(dir) = database_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let database = database_path.to_string_lossy();
        info!(path = %database, "Opening database");

        let characters = Arc::new(CharacterRepository::new(&database).await?);
        let statuses = Arc::new(SectionStatusRepository::new(&database).await?);
        let payloads = Arc::new(PayloadRepository::new(&database).await?);

        let interrupted = statuses.clear_started().await?;
        if interrupted > 0 {
            info!(count = interrupted, "Cleared interrupted section updates");
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("pilotdeck/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let mut sso = SsoClient::new(settings.sso.client_id.clone(), settings.sso_provider()?)
            .with_http_client(http.clone());
        if let Some(secret) = &settings.sso.client_secret {
            sso = sso.with_client_secret(secret.clone());
        }

        let base_url = settings.esi_base_url()?;
        let mut registry = SectionRegistry::new();
        for section in settings.enabled_sections() {
            registry.register(
                section,
                Arc::new(JsonSection::new(
                    section,
                    &base_url,
                    http.clone(),
                    Arc::clone(&payloads),
                )),
            );
        }
        let registry = Arc::new(registry);
        info!(sections = registry.len(), "Registered sections");

        let cache = Arc::new(StatusCache::for_registry(&registry));
        cache.init_from_storage(&characters, &statuses).await?;

        let credentials = Arc::new(CredentialManager::new(
            Arc::clone(&characters),
            Arc::new(sso),
        ));
        let updater = Arc::new(SectionUpdater::new(
            registry,
            credentials,
            Arc::clone(&characters),
            Arc::clone(&statuses),
            Arc::clone(&cache),
        ));

        Ok(Self {
            tick_interval: settings.tick_interval(),
            characters,
            statuses,
            payloads,
            cache,
            updater,
        })
    }

    /// Updates due sections on every tick until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown signal cannot be installed.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    info!("Shutting down");
                    self.close().await;
                    return Ok(());
                }
            }
        }
    }

    async fn close(&self) {
        self.characters.close().await;
        self.statuses.close().await;
        self.payloads.close().await;
    }

    async fn tick(&self) {
        if let Err(e) = self.cache.update_characters(&self.characters).await {
            warn!("Failed to reload characters: {e}");
        }

        let character_ids = self.cache.character_ids();
        if character_ids.is_empty() {
            debug!("No characters to update");
            return;
        }

        let outcomes = self.updater.update_all_due(&character_ids).await;
        log_failures(&outcomes);

        let summary = self.cache.summary(Utc::now());
        info!(
            fresh = summary.fraction_fresh(),
            current = summary.current,
            errors = summary.errors,
            missing = summary.missing,
            total = summary.total,
            updated = outcomes.len(),
            "Sync status"
        );
    }
}

fn log_failures(outcomes: &[SectionOutcome]) {
    for outcome in outcomes {
        if let Err(e) = &outcome.result {
            let name = outcome.section.display_name();
            warn!(
                character_id = %outcome.character_id,
                section = %outcome.section,
                "{name} could not be updated: {e}"
            );
        }
    }
}
