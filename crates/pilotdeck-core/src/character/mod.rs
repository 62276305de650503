//! Character management module.
//!
//! Provides the characters whose sections are synchronized and the SSO
//! tokens used to fetch them.

mod model;
mod repository;

pub use model::{Character, CharacterId, CharacterToken};
pub use repository::CharacterRepository;
