//! Credential management.
//!
//! Keeps the stored SSO token of each character usable: a token that
//! expires within [`EXPIRY_GUARD`](pilotdeck_sso::EXPIRY_GUARD) seconds is
//! refreshed and persisted before it is handed out. Refreshes of one character are serialized, so sections
//! updating concurrently for the same character refresh its token once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use pilotdeck_sso::{SsoClient, Token};
use tracing::{debug, info};

use crate::character::{CharacterId, CharacterRepository, CharacterToken};
use crate::{Error, Result};

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refreshes `token`, returning the replacement issued by the SSO server.
    async fn refresh(&self, token: &Token) -> pilotdeck_sso::Result<Token>;
}

#[async_trait]
impl TokenRefresher for SsoClient {
    async fn refresh(&self, token: &Token) -> pilotdeck_sso::Result<Token> {
        self.refresh_token(token).await
    }
}

/// Hands out valid tokens, refreshing them when needed.
pub struct CredentialManager {
    characters: Arc<CharacterRepository>,
    refresher: Arc<dyn TokenRefresher>,
    locks: Mutex<HashMap<CharacterId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CredentialManager {
    /// Creates a credential manager.
    #[must_use]
    pub fn new(characters: Arc<CharacterRepository>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            characters,
            refresher,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Makes sure `token` can be used for at least [`EXPIRY_GUARD`](pilotdeck_sso::EXPIRY_GUARD) seconds.
    ///
    /// A token that expires sooner is refreshed, updated in place and
    /// persisted. On failure the token and the stored copy stay untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh or persisting the new token fails.
    pub async fn ensure_valid(&self, token: &mut CharacterToken) -> Result<()> {
        if !token.token.needs_refresh_at(Utc::now()) {
            return Ok(());
        }

        debug!(character_id = %token.character_id, "Token expires soon, refreshing");
        let refreshed = self.refresher.refresh(&token.token).await?;

        let mut updated = token.clone();
        updated.token.access_token = refreshed.access_token;
        updated.token.token_type = refreshed.token_type;
        updated.token.expires_at = refreshed.expires_at;
        if refreshed.refresh_token.is_some() {
            updated.token.refresh_token = refreshed.refresh_token;
        }
        if refreshed.scope.is_some() {
            updated.token.scope = refreshed.scope;
        }

        self.characters.save_token(&updated).await?;
        *token = updated;

        info!(
            character_id = %token.character_id,
            expires_at = ?token.token.expires_at,
            "Refreshed token"
        );
        Ok(())
    }

    /// Loads the token of a character and makes sure it is usable.
    ///
    /// The token must grant all of `required_scopes`. Concurrent calls for the
    /// same character are serialized; a call that waited re-reads the token
    /// and finds it already refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is stored, scopes are missing, or the
    /// refresh fails.
    pub async fn valid_token(
        &self,
        character_id: CharacterId,
        required_scopes: &[&str],
    ) -> Result<CharacterToken> {
        let lock = self.lock_for(character_id);
        let _guard = lock.lock().await;

        let mut token = self
            .characters
            .get_token(character_id)
            .await?
            .ok_or(Error::TokenNotFound(character_id))?;

        if !token.token.has_scopes(required_scopes.iter().copied()) {
            let granted = token.token.scopes();
            let missing = required_scopes
                .iter()
                .filter(|scope| !granted.contains(**scope))
                .map(|scope| (*scope).to_string())
                .collect();
            return Err(Error::MissingScopes {
                character_id,
                missing,
            });
        }

        self.ensure_valid(&mut token).await?;
        Ok(token)
    }

    /// Drops the refresh lock of a removed character.
    pub fn forget(&self, character_id: CharacterId) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&character_id);
    }

    fn lock_for(&self, character_id: CharacterId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(character_id).or_default())
    }
}
