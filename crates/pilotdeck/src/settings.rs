//! Daemon settings.
//!
//! Read from `settings.json` in the `pilotdeck` config directory. A missing
//! file means defaults; missing fields take their default value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use pilotdeck_core::Section;
use pilotdeck_sso::SsoProvider;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default API root of the remote service.
pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/latest/";

/// Daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between two checks for due sections.
    pub tick_interval_secs: u64,
    /// Database file. Defaults to the `pilotdeck` data directory.
    pub database_path: Option<PathBuf>,
    /// SSO application.
    pub sso: SsoSettings,
    /// API root of the remote service.
    pub esi_base_url: String,
    /// Sections to keep in sync. Empty means all.
    pub sections: Vec<Section>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            database_path: None,
            sso: SsoSettings::default(),
            esi_base_url: DEFAULT_ESI_BASE_URL.to_string(),
            sections: Vec::new(),
        }
    }
}

/// Registered SSO application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoSettings {
    /// Client ID of the application.
    pub client_id: String,
    /// Client secret, for confidential applications.
    pub client_secret: Option<String>,
    /// Token endpoint. Defaults to the EVE Online SSO.
    pub token_url: Option<String>,
}

impl Settings {
    /// Location of the settings file.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pilotdeck").join("settings.json"))
    }

    /// Loads settings from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        Self::load_from(&path)
    }

    /// Loads settings from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(?path, "Settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        tracing::info!(?path, "Loaded settings");
        Ok(settings)
    }

    /// Checks the settings for values the daemon cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_secs == 0 {
            bail!("tick_interval_secs must be greater than zero");
        }
        if self.sso.client_id.trim().is_empty() {
            bail!("sso.client_id must be set");
        }
        self.esi_base_url()?;
        self.sso_provider()?
            .validate()
            .context("Invalid sso.token_url")?;
        Ok(())
    }

    /// Interval between two ticks.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Database file to use.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the data directory is unknown.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(dir.join("pilotdeck").join("pilotdeck.db"))
    }

    /// Parsed API root.
    ///
    /// # Errors
    ///
    /// Returns an error if `esi_base_url` is not a valid URL.
    pub fn esi_base_url(&self) -> Result<Url> {
        Url::parse(&self.esi_base_url)
            .with_context(|| format!("Invalid esi_base_url: {}", self.esi_base_url))
    }

    /// SSO provider for token refreshes.
    ///
    /// # Errors
    ///
    /// Returns an error if `sso.token_url` is not a valid URL.
    pub fn sso_provider(&self) -> Result<SsoProvider> {
        let provider = match &self.sso.token_url {
            Some(url) => SsoProvider::new("Custom", url),
            None => SsoProvider::eve_online(),
        };
        provider.context("Invalid sso.token_url")
    }

    /// Sections to keep in sync, without duplicates.
    #[must_use]
    pub fn enabled_sections(&self) -> Vec<Section> {
        if self.sections.is_empty() {
            return Section::ALL.to_vec();
        }
        let mut sections = self.sections.clone();
        sections.sort();
        sections.dedup();
        sections
    }
}
