//! SSO provider configurations.

use crate::error::{Error, Result};
use url::Url;

/// SSO provider configuration.
#[derive(Debug, Clone)]
pub struct SsoProvider {
    /// Provider name (e.g., "EVE Online").
    pub name: String,
    /// Token endpoint URL.
    pub token_url: Url,
}

impl SsoProvider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(name: impl Into<String>, token_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            token_url: Url::parse(token_url.as_ref())?,
        })
    }

    /// EVE Online SSO (v2) configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn eve_online() -> Result<Self> {
        Self::new("EVE Online", "https://login.eveonline.com/v2/oauth/token")
    }

    /// Validates that the token endpoint is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.token_url.scheme() {
            "https" | "http" => Ok(()),
            other => Err(Error::InvalidConfig(format!(
                "token_url has unsupported scheme: {other}"
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_eve_online_provider() {
        let provider = SsoProvider::eve_online().unwrap();
        assert_eq!(provider.name, "EVE Online");
        assert_eq!(provider.token_url.host_str(), Some("login.eveonline.com"));
        provider.validate().unwrap();
    }

    #[test]
    fn test_custom_provider() {
        let provider = SsoProvider::new("Custom", "http://127.0.0.1:8080/token").unwrap();
        assert_eq!(provider.name, "Custom");
        provider.validate().unwrap();
    }

    #[test]
    fn test_invalid_provider() {
        assert!(SsoProvider::new("Broken", "not a url").is_err());

        let provider = SsoProvider::new("Ftp", "ftp://example.com/token").unwrap();
        assert!(provider.validate().is_err());
    }
}
