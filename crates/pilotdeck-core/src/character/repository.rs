//! Character and token storage repository.

use chrono::{DateTime, Utc};
use pilotdeck_sso::Token;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::model::{Character, CharacterId, CharacterToken};
use crate::Result;

/// Repository for characters and their SSO tokens.
pub struct CharacterRepository {
    pool: SqlitePool,
}

impl CharacterRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Closes the connection pool. Later queries fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS character_tokens (
                character_id INTEGER PRIMARY KEY NOT NULL,
                access_token TEXT NOT NULL,
                token_type TEXT NOT NULL,
                refresh_token TEXT,
                expires_at TEXT,
                scope TEXT,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update a character.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, character: &Character) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO characters (id, name) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(character.id.0)
        .bind(&character.name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get character by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: CharacterId) -> Result<Option<Character>> {
        let row = sqlx::query("SELECT id, name FROM characters WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_character))
    }

    /// Get all characters in alphabetical order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Character>> {
        let rows = sqlx::query("SELECT id, name FROM characters ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_character).collect())
    }

    /// Delete a character together with its token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: CharacterId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM character_tokens WHERE character_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM characters WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(character_id = %id, "Deleted character");
        Ok(())
    }

    /// Get the token of a character.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_token(&self, id: CharacterId) -> Result<Option<CharacterToken>> {
        let row = sqlx::query(
            r"
            SELECT character_id, access_token, token_type, refresh_token, expires_at, scope
            FROM character_tokens
            WHERE character_id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_token))
    }

    /// Insert or update the token of a character.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save_token(&self, token: &CharacterToken) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO character_tokens
                (character_id, access_token, token_type, refresh_token, expires_at, scope)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(character_id) DO UPDATE SET
                access_token = excluded.access_token,
                token_type = excluded.token_type,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                scope = excluded.scope,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(token.character_id.0)
        .bind(&token.token.access_token)
        .bind(&token.token.token_type)
        .bind(&token.token.refresh_token)
        .bind(token.token.expires_at.map(|t| t.to_rfc3339()))
        .bind(&token.token.scope)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_character(row: &sqlx::sqlite::SqliteRow) -> Character {
    Character {
        id: CharacterId::new(row.get("id")),
        name: row.get("name"),
    }
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> CharacterToken {
    let expires_at = row
        .get::<Option<String>, _>("expires_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc));

    CharacterToken {
        character_id: CharacterId::new(row.get("character_id")),
        token: Token {
            access_token: row.get("access_token"),
            token_type: row.get("token_type"),
            expires_at,
            refresh_token: row.get("refresh_token"),
            scope: row.get("scope"),
        },
    }
}
