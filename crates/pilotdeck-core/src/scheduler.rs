//! Expiry scheduling of section updates.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::character::CharacterId;
use crate::registry::SectionRegistry;
use crate::section::{Section, SectionStatusRepository};
use crate::{Error, Result};

/// Decides whether a section must be fetched again.
pub struct Scheduler {
    registry: Arc<SectionRegistry>,
    statuses: Arc<SectionStatusRepository>,
}

impl Scheduler {
    /// Creates a scheduler over the given registry and status store.
    #[must_use]
    pub const fn new(registry: Arc<SectionRegistry>, statuses: Arc<SectionStatusRepository>) -> Self {
        Self { registry, statuses }
    }

    /// Reports whether the section's stored data has expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is not registered or the status
    /// cannot be read.
    pub async fn is_expired(&self, character_id: CharacterId, section: Section) -> Result<bool> {
        self.is_expired_at(character_id, section, Utc::now()).await
    }

    /// Reports whether the section's stored data has expired at `now`.
    ///
    /// A section without a recorded status is always expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is not registered or the status
    /// cannot be read.
    pub async fn is_expired_at(
        &self,
        character_id: CharacterId,
        section: Section,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let registered = self
            .registry
            .get(section)
            .ok_or_else(|| Error::UnknownSection(section.to_string()))?;

        let expired = self
            .statuses
            .get(character_id, section)
            .await?
            .is_none_or(|status| status.is_expired_at(now, to_delta(registered.timeout)));
        Ok(expired)
    }
}

/// Converts a timeout to a calendar duration, saturating on overflow.
pub(crate) fn to_delta(timeout: Duration) -> TimeDelta {
    TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::{AuthContext, SectionHandler};
    use crate::section::SectionStatus;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Noop;

    #[async_trait]
    impl SectionHandler for Noop {
        async fn fetch(&self, _auth: &AuthContext) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn persist(&self, _character_id: CharacterId, _payload: &Value) -> Result<()> {
            Ok(())
        }

        async fn remove(&self, _character_id: CharacterId) -> Result<()> {
            Ok(())
        }
    }

    async fn scheduler() -> (Scheduler, Arc<SectionStatusRepository>) {
        let mut registry = SectionRegistry::new();
        registry.register_with_timeout(Section::Online, Duration::from_secs(30), Arc::new(Noop));
        let statuses = Arc::new(SectionStatusRepository::in_memory().await.unwrap());
        (
            Scheduler::new(Arc::new(registry), Arc::clone(&statuses)),
            statuses,
        )
    }

    #[tokio::test]
    async fn test_expiry_against_timeout() {
        let (scheduler, statuses) = scheduler().await;
        let now = Utc::now();
        let mut status = SectionStatus::new(CharacterId(1), Section::Online);

        status.completed_at = Some(now - TimeDelta::seconds(10));
        statuses.put(&status).await.unwrap();
        assert!(
            !scheduler
                .is_expired_at(CharacterId(1), Section::Online, now)
                .await
                .unwrap()
        );

        status.completed_at = Some(now - TimeDelta::seconds(40));
        statuses.put(&status).await.unwrap();
        assert!(
            scheduler
                .is_expired_at(CharacterId(1), Section::Online, now)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_status_is_expired() {
        let (scheduler, _) = scheduler().await;
        assert!(
            scheduler
                .is_expired(CharacterId(99), Section::Online)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_unregistered_section_is_an_error() {
        let (scheduler, _) = scheduler().await;
        let err = scheduler
            .is_expired(CharacterId(1), Section::Assets)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSection(_)));
    }
}
