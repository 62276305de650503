//! SSO client for the `refresh_token` grant.

use crate::error::{Error, Result};
use crate::provider::SsoProvider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

/// SSO client configuration.
#[derive(Debug, Clone)]
pub struct SsoClient {
    /// Client ID of the registered application.
    pub client_id: String,
    /// Client secret (None for PKCE-only public clients).
    pub client_secret: Option<String>,
    /// Provider configuration.
    pub provider: SsoProvider,
    /// HTTP client.
    http_client: Client,
}

impl SsoClient {
    /// Creates a new SSO client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: SsoProvider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Uses a preconfigured HTTP client (timeouts, user agent).
    #[must_use]
    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Refreshes an access token using its refresh token.
    ///
    /// The returned token carries the new access token, refresh token and
    /// expiry. Scopes and the refresh token are kept from `token` when the
    /// server omits them.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or if the token has no refresh token.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        debug!(provider = %self.provider.name, "Refreshing SSO token");
        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(error_from_body(status.as_u16(), &body));
        }

        let token_response: TokenResponse = response.json().await?;
        let mut new_token = Token::from_response(token_response, Utc::now())?;

        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }
        if new_token.scope.is_none() {
            new_token.scope.clone_from(&token.scope);
        }

        Ok(new_token)
    }
}

/// Longest response body kept in a [`Error::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Maps an unsuccessful token endpoint response to an error.
///
/// OAuth error bodies become [`Error::OAuth`]; anything else keeps the status.
fn error_from_body(status: u16, body: &str) -> Error {
    if let Ok(error) = serde_json::from_str::<ErrorResponse>(body) {
        return error.into_error();
    }
    let body: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    Error::Status { status, body }
}
