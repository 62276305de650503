//! In-memory cache of section update status.
//!
//! The UI polls freshness many times per second; reading it from storage each
//! time is wasteful. [`StatusCache`] keeps a projection of every stored
//! [`SectionStatus`] together with the character names, is filled once from
//! storage at startup and is then written directly by the updater.
//!
//! Losing the cache is harmless: it is rebuilt from storage on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::Result;
use crate::character::{Character, CharacterId, CharacterRepository};
use crate::registry::SectionRegistry;
use crate::scheduler::to_delta;
use crate::section::{Section, SectionStatus, SectionStatusRepository, doubled};

/// Cached status of one character section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// Error of the latest run. Empty when healthy.
    pub error_message: String,
    /// Completion of the latest run.
    pub completed_at: Option<DateTime<Utc>>,
    /// Start of the run in progress.
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&SectionStatus> for CacheEntry {
    fn from(status: &SectionStatus) -> Self {
        Self {
            error_message: status.error_message.clone(),
            completed_at: status.completed_at,
            started_at: status.started_at,
        }
    }
}

/// A character section as shown in status lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    /// Character.
    pub character_id: CharacterId,
    /// Character name, empty if unknown.
    pub character_name: String,
    /// Section.
    pub section: Section,
    /// Staleness timeout of the section.
    pub timeout: Duration,
    /// Cached status. Default when the section was never updated.
    pub entry: CacheEntry,
}

impl SectionView {
    /// Human readable section name.
    #[must_use]
    pub fn section_name(&self) -> String {
        self.section.display_name()
    }

    /// Reports whether the latest run failed.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        !self.entry.error_message.is_empty()
    }

    /// Reports whether the section never completed a run.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        self.entry.completed_at.is_none()
    }

    /// Reports whether a run is in progress.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.entry.started_at.is_some()
    }

    /// Reports whether the data is recent enough to display, i.e. completed
    /// within twice the section timeout.
    #[must_use]
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        let window = to_delta(doubled(self.timeout));
        self.entry
            .completed_at
            .is_some_and(|completed_at| now - completed_at <= window)
    }
}

/// Aggregated freshness over a set of character sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    /// Sections completed within twice their timeout.
    pub current: usize,
    /// Sections whose latest run failed.
    pub errors: usize,
    /// Sections that never completed a run.
    pub missing: usize,
    /// Sections with a run in progress.
    pub running: usize,
    /// All sections covered by the summary.
    pub total: usize,
}

impl StatusSummary {
    /// Proportion of current sections, from 0.0 to 1.0.
    ///
    /// An empty summary counts as fully fresh.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction_fresh(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.current as f64 / self.total as f64
    }

    /// Reports whether no section has an error.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.errors == 0
    }

    /// Reports whether any section is being updated.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running > 0
    }

    fn add(&mut self, other: Self) {
        self.current += other.current;
        self.errors += other.errors;
        self.missing += other.missing;
        self.running += other.running;
        self.total += other.total;
    }
}

#[derive(Default)]
struct Inner {
    characters: Vec<Character>,
    entries: HashMap<(CharacterId, Section), CacheEntry>,
}

/// Process wide, read-optimized copy of the section update status.
pub struct StatusCache {
    sections: Vec<(Section, Duration)>,
    inner: Mutex<Inner>,
}

impl StatusCache {
    /// Creates an empty cache covering `sections` with their default timeouts.
    #[must_use]
    pub fn new(sections: impl IntoIterator<Item = Section>) -> Self {
        Self::with_timeouts(sections.into_iter().map(|s| (s, s.timeout())))
    }

    /// Creates an empty cache covering the sections of a registry.
    #[must_use]
    pub fn for_registry(registry: &SectionRegistry) -> Self {
        Self::with_timeouts(registry.timeouts())
    }

    /// Creates an empty cache covering `sections` with the given timeouts.
    #[must_use]
    pub fn with_timeouts(sections: impl IntoIterator<Item = (Section, Duration)>) -> Self {
        let mut sections: Vec<_> = sections.into_iter().collect();
        sections.sort_by_key(|(section, _)| *section);
        sections.dedup_by_key(|(section, _)| *section);
        Self {
            sections,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Loads characters and all their stored section status.
    ///
    /// Must run once before the first read.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn init_from_storage(
        &self,
        characters: &CharacterRepository,
        statuses: &SectionStatusRepository,
    ) -> Result<()> {
        let loaded = characters.list().await?;
        let mut count = 0;
        for status in statuses.list_all().await? {
            if loaded.iter().any(|c| c.id == status.character_id) {
                self.set_status(&status);
                count += 1;
            }
        }
        debug!(
            characters = loaded.len(),
            statuses = count,
            "Initialized status cache"
        );
        self.set_characters(loaded);
        Ok(())
    }

    /// Reloads the character list from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn update_characters(&self, characters: &CharacterRepository) -> Result<()> {
        self.set_characters(characters.list().await?);
        Ok(())
    }

    /// Replaces the character list.
    pub fn set_characters(&self, mut characters: Vec<Character>) {
        characters.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        self.lock().characters = characters;
    }

    /// Known characters in alphabetical order.
    #[must_use]
    pub fn characters(&self) -> Vec<Character> {
        self.lock().characters.clone()
    }

    /// IDs of the known characters.
    #[must_use]
    pub fn character_ids(&self) -> Vec<CharacterId> {
        self.lock().characters.iter().map(|c| c.id).collect()
    }

    /// Name of a known character.
    #[must_use]
    pub fn character_name(&self, character_id: CharacterId) -> Option<String> {
        self.lock()
            .characters
            .iter()
            .find(|c| c.id == character_id)
            .map(|c| c.name.clone())
    }

    /// Cached status of a section, default if never recorded.
    #[must_use]
    pub fn get(&self, character_id: CharacterId, section: Section) -> CacheEntry {
        self.lock()
            .entries
            .get(&(character_id, section))
            .cloned()
            .unwrap_or_default()
    }

    /// Records a completed run, replacing the cached status.
    pub fn set(
        &self,
        character_id: CharacterId,
        section: Section,
        error_message: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) {
        self.lock().entries.insert(
            (character_id, section),
            CacheEntry {
                error_message: error_message.into(),
                completed_at: Some(completed_at),
                started_at: None,
            },
        );
    }

    /// Records an error, keeping the completion time of the last run.
    pub fn set_error(
        &self,
        character_id: CharacterId,
        section: Section,
        error_message: impl Into<String>,
    ) {
        self.lock()
            .entries
            .entry((character_id, section))
            .or_default()
            .error_message = error_message.into();
    }

    /// Marks a run as started, or as no longer running with `None`.
    pub fn set_started(
        &self,
        character_id: CharacterId,
        section: Section,
        started_at: Option<DateTime<Utc>>,
    ) {
        self.lock()
            .entries
            .entry((character_id, section))
            .or_default()
            .started_at = started_at;
    }

    /// Replaces the cached status with a stored one.
    pub fn set_status(&self, status: &SectionStatus) {
        self.lock()
            .entries
            .insert((status.character_id, status.section), status.into());
    }

    /// Drops a character and all its cached status.
    pub fn remove_character(&self, character_id: CharacterId) {
        let mut inner = self.lock();
        inner.characters.retain(|c| c.id != character_id);
        inner.entries.retain(|(id, _), _| *id != character_id);
    }

    /// All covered sections of a character, including never updated ones.
    #[must_use]
    pub fn list_sections(&self, character_id: CharacterId) -> Vec<SectionView> {
        let inner = self.lock();
        Self::views(&inner, &self.sections, character_id)
    }

    /// Summary over the sections of one character.
    #[must_use]
    pub fn character_summary(&self, character_id: CharacterId, now: DateTime<Utc>) -> StatusSummary {
        let inner = self.lock();
        Self::summarize(&Self::views(&inner, &self.sections, character_id), now)
    }

    /// Summary over all sections of all known characters.
    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>) -> StatusSummary {
        let inner = self.lock();
        let mut summary = StatusSummary::default();
        for character in &inner.characters {
            let views = Self::views(&inner, &self.sections, character.id);
            summary.add(Self::summarize(&views, now));
        }
        summary
    }

    fn views(
        inner: &Inner,
        sections: &[(Section, Duration)],
        character_id: CharacterId,
    ) -> Vec<SectionView> {
        let character_name = inner
            .characters
            .iter()
            .find(|c| c.id == character_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();

        sections
            .iter()
            .map(|&(section, timeout)| SectionView {
                character_id,
                character_name: character_name.clone(),
                section,
                timeout,
                entry: inner
                    .entries
                    .get(&(character_id, section))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect()
    }

    fn summarize(views: &[SectionView], now: DateTime<Utc>) -> StatusSummary {
        let mut summary = StatusSummary {
            total: views.len(),
            ..StatusSummary::default()
        };
        for view in views {
            if view.has_error() {
                summary.errors += 1;
            }
            if view.is_missing() {
                summary.missing += 1;
            } else if view.is_current(now) {
                summary.current += 1;
            }
            if view.is_running() {
                summary.running += 1;
            }
        }
        summary
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
