//! Character model types.

use pilotdeck_sso::Token;
use serde::{Deserialize, Serialize};

/// Unique identifier of a character, as assigned by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub i64);

impl CharacterId {
    /// Create a new character ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A character whose account data is mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Character ID.
    pub id: CharacterId,
    /// Display name.
    pub name: String,
}

impl Character {
    /// Create a new character.
    #[must_use]
    pub fn new(id: CharacterId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// SSO token owned by a character.
///
/// `Debug` output redacts the token secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterToken {
    /// Character the token belongs to.
    pub character_id: CharacterId,
    /// The token itself.
    pub token: Token,
}

impl CharacterToken {
    /// Create a new character token.
    #[must_use]
    pub const fn new(character_id: CharacterId, token: Token) -> Self {
        Self {
            character_id,
            token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_id_display() {
        assert_eq!(CharacterId::new(93_000_001).to_string(), "93000001");
    }

    #[test]
    fn test_character_ids_order() {
        let mut ids = vec![CharacterId(3), CharacterId(1), CharacterId(2)];
        ids.sort();
        assert_eq!(ids, vec![CharacterId(1), CharacterId(2), CharacterId(3)]);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = CharacterToken::new(
            CharacterId(7),
            Token::new("access-secret", "Bearer").with_refresh_token("refresh-secret"),
        );
        let debug = format!("{token:?}");
        assert!(debug.contains("CharacterId(7)"));
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
    }
}
