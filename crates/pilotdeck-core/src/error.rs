//! Error types for the core library.

use thiserror::Error;

use crate::character::CharacterId;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL could not be built.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// SSO operation failed.
    #[error("SSO error: {0}")]
    Sso(#[from] pilotdeck_sso::Error),

    /// Remote API answered with a non-success status.
    #[error("Remote API error: {status} - {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// No token stored for the character.
    #[error("No token for character: {0}")]
    TokenNotFound(CharacterId),

    /// Token lacks scopes required by a section.
    #[error("Token for character {character_id} is missing scopes: {}", missing.join(", "))]
    MissingScopes {
        /// Character the token belongs to.
        character_id: CharacterId,
        /// Scopes that were required but not granted.
        missing: Vec<String>,
    },

    /// Section identifier is not known.
    #[error("Unknown section: {0}")]
    UnknownSection(String),

    /// Section handler failure that is not covered by another variant.
    #[error("{0}")]
    Handler(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
