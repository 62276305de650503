//! SSO token types and expiry checks.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before the recorded expiry from which an access token must no
/// longer be used.
pub const EXPIRY_GUARD: i64 = 60;

/// SSO access token with metadata.
///
/// `Debug` output redacts the access and refresh tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Access token string.
    pub access_token: String,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Expiration time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token for obtaining new access tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Space separated scopes granted by the SSO server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at: None,
            refresh_token: None,
            scope: None,
        }
    }

    /// Creates a token from a token endpoint response received at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the response carries an empty access token.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        if response.access_token.is_empty() {
            return Err(Error::InvalidResponse("empty access token".into()));
        }
        let expires_at = response
            .expires_in
            .map(|secs| now + Duration::seconds(i64::from(secs)));

        Ok(Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at,
            refresh_token: response.refresh_token,
            scope: response.scope,
        })
    }

    /// Reports whether the token is still valid `within` from `now`.
    ///
    /// A token without a recorded expiry never expires.
    #[must_use]
    pub fn remains_valid_at(&self, now: DateTime<Utc>, within: Duration) -> bool {
        self.expires_at.is_none_or(|exp| exp > now + within)
    }

    /// Reports whether the token expires within [`EXPIRY_GUARD`] seconds of
    /// `now` and must be refreshed before use.
    #[must_use]
    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        !self.remains_valid_at(now, Duration::seconds(EXPIRY_GUARD))
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the expiration time.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Returns the granted scopes.
    #[must_use]
    pub fn scopes(&self) -> BTreeSet<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Reports whether all `required` scopes have been granted.
    #[must_use]
    pub fn has_scopes<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> bool {
        let granted = self.scopes();
        required.into_iter().all(|s| granted.contains(s))
    }

    /// Returns the refresh token if available.
    ///
    /// # Errors
    ///
    /// Returns an error if no refresh token is available.
    pub fn refresh_token(&self) -> Result<&str> {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(Error::NoRefreshToken)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token response from the SSO server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type.
    pub token_type: String,
    /// Expires in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u32>,
    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Error response from the SSO server.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Error description.
    #[serde(default)]
    pub error_description: String,
}

impl ErrorResponse {
    /// Converts to an Error.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::oauth_error(self.error, self.error_description)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new("access123", "Bearer");
        assert_eq!(token.access_token, "access123");
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_none());
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn test_token_expiration() {
        let now = Utc::now();
        let expired = Token::new("access123", "Bearer").with_expires_at(now - Duration::seconds(120));
        assert!(expired.needs_refresh_at(now));

        let expiring = Token::new("access123", "Bearer").with_expires_at(now + Duration::seconds(59));
        assert!(expiring.needs_refresh_at(now));

        let valid = Token::new("access123", "Bearer").with_expires_at(now + Duration::seconds(3600));
        assert!(!valid.needs_refresh_at(now));

        assert!(!Token::new("access123", "Bearer").needs_refresh_at(now));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = Token::new("access-secret", "Bearer").with_refresh_token("refresh-secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
        assert!(debug.contains("Bearer"));
    }

    #[test]
    fn test_expiry_guard_window() {
        let now = Utc::now();
        let guard = Duration::seconds(EXPIRY_GUARD);

        let soon = Token::new("a", "Bearer").with_expires_at(now + Duration::seconds(30));
        assert!(!soon.remains_valid_at(now, guard));

        let later = Token::new("a", "Bearer").with_expires_at(now + Duration::seconds(120));
        assert!(later.remains_valid_at(now, guard));

        let unknown = Token::new("a", "Bearer");
        assert!(unknown.remains_valid_at(now, guard));
    }

    #[test]
    fn test_scopes() {
        let token = Token::new("a", "Bearer")
            .with_scope("esi-skills.read_skills.v1 esi-mail.read_mail.v1");
        assert_eq!(token.scopes().len(), 2);
        assert!(token.has_scopes(["esi-skills.read_skills.v1"]));
        assert!(!token.has_scopes(["esi-skills.read_skills.v1", "esi-assets.read_assets.v1"]));
        assert!(Token::new("a", "Bearer").has_scopes([]));
    }

    #[test]
    fn test_missing_refresh_token() {
        let token = Token::new("a", "Bearer");
        assert!(matches!(token.refresh_token(), Err(Error::NoRefreshToken)));

        let empty = Token::new("a", "Bearer").with_refresh_token("");
        assert!(matches!(empty.refresh_token(), Err(Error::NoRefreshToken)));
    }

    #[test]
    fn test_token_from_response() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: "test_token".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(1200),
            refresh_token: Some("refresh".to_string()),
            scope: Some("esi-skills.read_skills.v1".to_string()),
        };

        let token = Token::from_response(response, now).unwrap();
        assert_eq!(token.access_token, "test_token");
        assert_eq!(token.expires_at, Some(now + Duration::seconds(1200)));
        assert!(!token.needs_refresh_at(now));
    }
}
