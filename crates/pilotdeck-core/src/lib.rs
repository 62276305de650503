//! # pilotdeck-core
//!
//! Core synchronization engine for `PilotDeck`.
//!
//! This crate mirrors a character's remote account data into local storage,
//! one named [`Section`] at a time:
//! - Characters and SSO tokens (`SQLite`)
//! - Section registry and expiry scheduling
//! - Credential management with transparent token refresh
//! - Single-flight deduplication of concurrent updates
//! - Content fingerprinting to skip writes when nothing changed
//! - An in-memory status cache for cheap freshness reads by the UI

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod character;
pub mod credentials;
mod error;
pub mod fingerprint;
pub mod registry;
pub mod remote;
pub mod scheduler;
pub mod section;
pub mod singleflight;
pub mod status_cache;
pub mod updater;

pub use character::{Character, CharacterId, CharacterRepository, CharacterToken};
pub use credentials::{CredentialManager, TokenRefresher};
pub use error::{Error, Result};
pub use fingerprint::content_hash;
pub use registry::{AuthContext, RegisteredSection, SectionHandler, SectionRegistry};
pub use remote::{JsonSection, PayloadRepository};
pub use scheduler::Scheduler;
pub use section::{Section, SectionStatus, SectionStatusRepository};
pub use singleflight::SingleFlight;
pub use status_cache::{CacheEntry, SectionView, StatusCache, StatusSummary};
pub use updater::{SectionOutcome, SectionUpdater, UpdateError};
