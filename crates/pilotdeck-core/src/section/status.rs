//! Update status of a character section.

use chrono::{DateTime, TimeDelta, Utc};

use super::model::Section;
use crate::character::CharacterId;

/// Persisted outcome of the latest update runs of one character section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionStatus {
    /// Character the section belongs to.
    pub character_id: CharacterId,
    /// Section.
    pub section: Section,
    /// Fingerprint of the last successfully stored payload. Empty if never fetched.
    pub content_hash: String,
    /// Error of the latest run. Empty when healthy.
    pub error_message: String,
    /// Start of the run in progress, if any.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion of the latest run, successful or not.
    pub completed_at: Option<DateTime<Utc>>,
}

impl SectionStatus {
    /// Creates an empty status for a section that has never been updated.
    #[must_use]
    pub const fn new(character_id: CharacterId, section: Section) -> Self {
        Self {
            character_id,
            section,
            content_hash: String::new(),
            error_message: String::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Reports whether the latest run failed.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    /// Reports whether a run is in progress.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Reports whether the section data has expired at `now`, given its timeout.
    ///
    /// A section that never completed is always expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        self.completed_at.is_none_or(|completed_at| {
            completed_at
                .checked_add_signed(timeout)
                .is_some_and(|deadline| now > deadline)
        })
    }
}
