//! Section update orchestration.
//!
//! [`SectionUpdater::run`] brings one character section up to date:
//!
//! 1. obtain a valid token for the character (refreshing it if needed)
//! 2. fetch the current payload through the section handler
//! 3. fingerprint the payload and compare it with the stored fingerprint
//! 4. persist the payload, only if it changed or the update was forced
//! 5. record the outcome in storage and in the [`StatusCache`]
//!
//! Credential failures leave the stored status untouched. Fetch and persist
//! failures are recorded with the completion time advanced, so a failing
//! section waits out its timeout before it is tried again. The fingerprint is
//! only advanced after a successful persist.
//!
//! Concurrent runs for the same character section are coalesced into one.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::character::{CharacterId, CharacterRepository};
use crate::credentials::CredentialManager;
use crate::fingerprint::content_hash;
use crate::registry::{AuthContext, SectionRegistry};
use crate::scheduler::Scheduler;
use crate::section::{Section, SectionStatus, SectionStatusRepository};
use crate::singleflight::{SingleFlight, key_for};
use crate::status_cache::StatusCache;
use crate::{Error, Result};

/// Failure of a section update.
///
/// Cheap to clone, so every caller coalesced onto one run receives the same
/// error value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpdateError {
    /// No usable token: missing, lacking scopes or refresh failed.
    #[error("Credential error: {0}")]
    Credential(#[source] Arc<Error>),

    /// Fetching the payload failed.
    #[error("Fetch failed: {0}")]
    Fetch(#[source] Arc<Error>),

    /// Storing the payload failed.
    #[error("Persist failed: {0}")]
    Persist(#[source] Arc<Error>),

    /// Reading or writing the update status failed.
    #[error("Status storage error: {0}")]
    Storage(#[source] Arc<Error>),

    /// The section has no registered handler.
    #[error("Section not registered: {0}")]
    UnknownSection(Section),
}

impl UpdateError {
    fn credential(err: Error) -> Self {
        Self::Credential(Arc::new(err))
    }

    fn fetch(err: Error) -> Self {
        Self::Fetch(Arc::new(err))
    }

    fn persist(err: Error) -> Self {
        Self::Persist(Arc::new(err))
    }

    fn storage(err: Error) -> Self {
        Self::Storage(Arc::new(err))
    }

    /// The underlying core error, if any.
    #[must_use]
    pub fn inner(&self) -> Option<&Error> {
        match self {
            Self::Credential(e) | Self::Fetch(e) | Self::Persist(e) | Self::Storage(e) => Some(e),
            Self::UnknownSection(_) => None,
        }
    }
}

/// Result of one section update started by [`SectionUpdater::update_all_due`].
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    /// Character.
    pub character_id: CharacterId,
    /// Section.
    pub section: Section,
    /// Whether the data changed, or why the update failed.
    pub result: std::result::Result<bool, UpdateError>,
}

/// Keeps character sections up to date.
pub struct SectionUpdater {
    registry: Arc<SectionRegistry>,
    scheduler: Scheduler,
    credentials: Arc<CredentialManager>,
    characters: Arc<CharacterRepository>,
    statuses: Arc<SectionStatusRepository>,
    cache: Arc<StatusCache>,
    flight: SingleFlight<std::result::Result<bool, UpdateError>>,
}

impl SectionUpdater {
    /// Creates an updater.
    #[must_use]
    pub fn new(
        registry: Arc<SectionRegistry>,
        credentials: Arc<CredentialManager>,
        characters: Arc<CharacterRepository>,
        statuses: Arc<SectionStatusRepository>,
        cache: Arc<StatusCache>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(Arc::clone(&registry), Arc::clone(&statuses)),
            registry,
            credentials,
            characters,
            statuses,
            cache,
            flight: SingleFlight::new(),
        }
    }

    /// The scheduler deciding which sections are due.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The status cache written by this updater.
    #[must_use]
    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Updates a section and reports whether its data changed.
    ///
    /// With `force` the payload is persisted even if unchanged. A call for a
    /// section that is already being updated waits for that run and returns
    /// its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is not registered or any step fails.
    pub async fn run(
        &self,
        character_id: CharacterId,
        section: Section,
        force: bool,
    ) -> std::result::Result<bool, UpdateError> {
        let key = key_for(section, character_id);
        let result = self
            .flight
            .run(&key, || self.update(character_id, section, force))
            .await;

        match &result {
            Ok(changed) => info!(
                character_id = %character_id,
                section = %section,
                forced = force,
                changed = *changed,
                "Section update completed"
            ),
            Err(e) => warn!(
                character_id = %character_id,
                section = %section,
                forced = force,
                "Section update failed: {e}"
            ),
        }
        result
    }

    /// Updates a section if its data expired, or unconditionally with `force`.
    ///
    /// Returns `false` without doing anything when the section is not due.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is not registered or the update fails.
    pub async fn update_if_needed(
        &self,
        character_id: CharacterId,
        section: Section,
        force: bool,
    ) -> std::result::Result<bool, UpdateError> {
        if !force && !self.is_due(character_id, section).await? {
            return Ok(false);
        }
        self.run(character_id, section, force).await
    }

    /// Updates every due section of the given characters concurrently.
    ///
    /// Returns one outcome per section that was due. A failing section does
    /// not stop the others.
    pub async fn update_all_due(self: &Arc<Self>, characters: &[CharacterId]) -> Vec<SectionOutcome> {
        let mut tasks = JoinSet::new();

        for &character_id in characters {
            for section in self.registry.sections() {
                match self.is_due(character_id, section).await {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        warn!(character_id = %character_id, section = %section, "Expiry check failed: {e}");
                        continue;
                    }
                }
                let updater = Arc::clone(self);
                tasks.spawn(async move {
                    let result = updater.run(character_id, section, false).await;
                    SectionOutcome {
                        character_id,
                        section,
                        result,
                    }
                });
            }
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Section update task failed: {e}"),
            }
        }
        debug!(updated = outcomes.len(), "Finished updating due sections");
        outcomes
    }

    /// Removes a character with its token, section data, section status and
    /// cache entries.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be updated.
    pub async fn remove_character(&self, character_id: CharacterId) -> Result<()> {
        for section in self.registry.sections() {
            if let Some(registered) = self.registry.get(section) {
                registered.handler.remove(character_id).await?;
            }
        }
        self.statuses.delete_character(character_id).await?;
        self.characters.delete(character_id).await?;
        self.cache.remove_character(character_id);
        self.credentials.forget(character_id);
        info!(character_id = %character_id, "Removed character");
        Ok(())
    }

    async fn is_due(
        &self,
        character_id: CharacterId,
        section: Section,
    ) -> std::result::Result<bool, UpdateError> {
        self.scheduler
            .is_expired(character_id, section)
            .await
            .map_err(|e| match e {
                Error::UnknownSection(_) => UpdateError::UnknownSection(section),
                e => UpdateError::storage(e),
            })
    }

    async fn update(
        &self,
        character_id: CharacterId,
        section: Section,
        force: bool,
    ) -> std::result::Result<bool, UpdateError> {
        let handler = self
            .registry
            .get(section)
            .map(|registered| Arc::clone(&registered.handler))
            .ok_or(UpdateError::UnknownSection(section))?;

        let token = self
            .credentials
            .valid_token(character_id, section.scopes())
            .await
            .map_err(UpdateError::credential)?;

        let mut status = self
            .statuses
            .get(character_id, section)
            .await
            .map_err(UpdateError::storage)?
            .unwrap_or_else(|| SectionStatus::new(character_id, section));
        status.started_at = Some(Utc::now());
        self.statuses
            .put(&status)
            .await
            .map_err(UpdateError::storage)?;
        self.cache
            .set_started(character_id, section, status.started_at);

        let auth = AuthContext {
            character_id,
            access_token: token.token.access_token,
        };
        let payload = match handler.fetch(&auth).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.record_failure(status, UpdateError::fetch(e)).await),
        };
        let hash = match content_hash(&payload) {
            Ok(hash) => hash,
            Err(e) => return Err(self.record_failure(status, UpdateError::fetch(e)).await),
        };

        let changed = force || hash != status.content_hash;
        if changed {
            if let Err(e) = handler.persist(character_id, &payload).await {
                return Err(self.record_failure(status, UpdateError::persist(e)).await);
            }
        }

        status.content_hash = hash;
        status.error_message.clear();
        status.started_at = None;
        status.completed_at = Some(Utc::now());
        if let Err(e) = self.statuses.put(&status).await {
            let err = UpdateError::storage(e);
            self.cache.set_error(character_id, section, err.to_string());
            self.cache.set_started(character_id, section, None);
            return Err(err);
        }
        self.cache.set_status(&status);

        debug!(
            character_id = %character_id,
            section = %section,
            changed,
            "Recorded section update"
        );
        Ok(changed)
    }

    /// Records a failed run and hands the error back.
    ///
    /// The stored fingerprint is kept. The cache keeps the completion time of
    /// the last good run.
    async fn record_failure(&self, mut status: SectionStatus, err: UpdateError) -> UpdateError {
        status.error_message = err.to_string();
        status.started_at = None;
        status.completed_at = Some(Utc::now());

        if let Err(e) = self.statuses.put(&status).await {
            error!(
                character_id = %status.character_id,
                section = %status.section,
                "Failed to record section error: {e}"
            );
        }
        self.cache
            .set_error(status.character_id, status.section, status.error_message);
        self.cache.set_started(status.character_id, status.section, None);
        err
    }
}
