//! Raw payload storage repository.

use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;
use crate::character::CharacterId;
use crate::section::Section;

/// Repository holding the latest JSON payload of each character section.
pub struct PayloadRepository {
    pool: SqlitePool,
}

impl PayloadRepository {
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

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS character_section_payloads (
                character_id INTEGER NOT NULL,
                section TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (character_id, section)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store the payload of a section, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database query fails.
    pub async fn put(&self, character_id: CharacterId, section: Section, payload: &Value) -> Result<()> {
        let payload = serde_json::to_string(payload)?;
        sqlx::query(
            r"
            INSERT INTO character_section_payloads (character_id, section, payload)
            VALUES (?, ?, ?)
            ON CONFLICT(character_id, section) DO UPDATE SET
                payload = excluded.payload,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(character_id.0)
        .bind(section.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the stored payload of a section.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query or deserialization fails.
    pub async fn get(&self, character_id: CharacterId, section: Section) -> Result<Option<Value>> {
        let row = sqlx::query(
            "SELECT payload FROM character_section_payloads WHERE character_id = ? AND section = ?",
        )
        .bind(character_id.0)
        .bind(section.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let payload: String = row.get("payload");
            serde_json::from_str(&payload).map_err(Into::into)
        })
        .transpose()
    }

    /// Delete the stored payload of a section.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, character_id: CharacterId, section: Section) -> Result<()> {
        sqlx::query("DELETE FROM character_section_payloads WHERE character_id = ? AND section = ?")
            .bind(character_id.0)
            .bind(section.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
