//! Section registry.
//!
//! Maps each [`Section`] to the handler that knows how to fetch and persist
//! it, together with the timeout after which its data becomes stale. The
//! registry is built once at startup; adding a section is a `register` call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::character::CharacterId;
use crate::section::Section;

/// Credentials of one update run, handed explicitly to a section fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Character the data is fetched for.
    pub character_id: CharacterId,
    /// Access token that was validated for this run.
    pub access_token: String,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("character_id", &self.character_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Fetches and stores the data of one section.
#[async_trait]
pub trait SectionHandler: Send + Sync {
    /// Fetches the current payload from the remote API.
    ///
    /// Must not have side effects beyond the read itself.
    async fn fetch(&self, auth: &AuthContext) -> Result<Value>;

    /// Stores a payload locally.
    ///
    /// Only called when the payload changed or the update was forced.
    async fn persist(&self, character_id: CharacterId, payload: &Value) -> Result<()>;

    /// Deletes the locally stored data of a removed character.
    async fn remove(&self, character_id: CharacterId) -> Result<()>;
}

/// A section together with its handler and staleness timeout.
#[derive(Clone)]
pub struct RegisteredSection {
    /// Section.
    pub section: Section,
    /// Time after which the stored data is stale.
    pub timeout: Duration,
    /// Handler doing the actual work.
    pub handler: Arc<dyn SectionHandler>,
}

impl std::fmt::Debug for RegisteredSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSection")
            .field("section", &self.section)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Table of all sections the updater can work on.
#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
    sections: BTreeMap<Section, RegisteredSection>,
}

impl SectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler with the section's default timeout.
    ///
    /// Registering a section again replaces the previous handler.
    pub fn register(&mut self, section: Section, handler: Arc<dyn SectionHandler>) -> &mut Self {
        self.register_with_timeout(section, section.timeout(), handler)
    }

    /// Registers a handler with a custom timeout.
    pub fn register_with_timeout(
        &mut self,
        section: Section,
        timeout: Duration,
        handler: Arc<dyn SectionHandler>,
    ) -> &mut Self {
        self.sections.insert(
            section,
            RegisteredSection {
                section,
                timeout,
                handler,
            },
        );
        self
    }

    /// Looks up a registered section.
    #[must_use]
    pub fn get(&self, section: Section) -> Option<&RegisteredSection> {
        self.sections.get(&section)
    }

    /// Registered sections in identifier order.
    pub fn sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.sections.keys().copied()
    }

    /// Registered sections with their timeouts.
    pub fn timeouts(&self) -> impl Iterator<Item = (Section, Duration)> + '_ {
        self.sections.values().map(|s| (s.section, s.timeout))
    }

    /// Number of registered sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Reports whether no section is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
