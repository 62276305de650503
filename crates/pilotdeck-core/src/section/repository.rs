//! Section status storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use super::model::Section;
use super::status::SectionStatus;
use crate::Result;
use crate::character::CharacterId;

/// Repository for the update status of character sections.
pub struct SectionStatusRepository {
    pool: SqlitePool,
}

impl SectionStatusRepository {
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
            CREATE TABLE IF NOT EXISTS character_section_status (
                character_id INTEGER NOT NULL,
                section TEXT NOT NULL,
                content_hash TEXT NOT NULL DEFAULT '',
                error_message TEXT NOT NULL DEFAULT '',
                started_at TEXT,
                completed_at TEXT,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (character_id, section)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the status of one section.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(
        &self,
        character_id: CharacterId,
        section: Section,
    ) -> Result<Option<SectionStatus>> {
        let row = sqlx::query(
            r"
            SELECT character_id, section, content_hash, error_message, started_at, completed_at
            FROM character_section_status
            WHERE character_id = ? AND section = ?
            ",
        )
        .bind(character_id.0)
        .bind(section.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(row_to_status))
    }

    /// Insert or overwrite the status of one section.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn put(&self, status: &SectionStatus) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO character_section_status
                (character_id, section, content_hash, error_message, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(character_id, section) DO UPDATE SET
                content_hash = excluded.content_hash,
                error_message = excluded.error_message,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(status.character_id.0)
        .bind(status.section.as_str())
        .bind(&status.content_hash)
        .bind(&status.error_message)
        .bind(status.started_at.map(|t| t.to_rfc3339()))
        .bind(status.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List all section statuses of a character.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, character_id: CharacterId) -> Result<Vec<SectionStatus>> {
        let rows = sqlx::query(
            r"
            SELECT character_id, section, content_hash, error_message, started_at, completed_at
            FROM character_section_status
            WHERE character_id = ?
            ORDER BY section ASC
            ",
        )
        .bind(character_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_status).collect())
    }

    /// List the section statuses of all characters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<SectionStatus>> {
        let rows = sqlx::query(
            r"
            SELECT character_id, section, content_hash, error_message, started_at, completed_at
            FROM character_section_status
            ORDER BY character_id ASC, section ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_status).collect())
    }

    /// Delete all section statuses of a character.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_character(&self, character_id: CharacterId) -> Result<()> {
        sqlx::query("DELETE FROM character_section_status WHERE character_id = ?")
            .bind(character_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Clear `started_at` on every row.
    ///
    /// Runs that were in progress when the process stopped never finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear_started(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE character_section_status SET started_at = NULL WHERE started_at IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Convert a database row to a status, skipping rows of retired sections.
fn row_to_status(row: &sqlx::sqlite::SqliteRow) -> Option<SectionStatus> {
    let section_id: String = row.get("section");
    let section = match section_id.parse::<Section>() {
        Ok(section) => section,
        Err(e) => {
            warn!("Ignoring stored status: {e}");
            return None;
        }
    };

    Some(SectionStatus {
        character_id: CharacterId::new(row.get("character_id")),
        section,
        content_hash: row.get("content_hash"),
        error_message: row.get("error_message"),
        started_at: parse_timestamp(row.get("started_at")),
        completed_at: parse_timestamp(row.get("completed_at")),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn completed(character_id: i64, section: Section, hash: &str) -> SectionStatus {
        SectionStatus {
            content_hash: hash.to_string(),
            completed_at: Some(Utc::now()),
            ..SectionStatus::new(CharacterId(character_id), section)
        }
    }

    #[tokio::test]
    async fn test_get_missing_status() {
        let repo = SectionStatusRepository::in_memory().await.unwrap();
        let status = repo.get(CharacterId(1), Section::Skills).await.unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let repo = SectionStatusRepository::in_memory().await.unwrap();

        let first = completed(1, Section::Skills, "h1");
        repo.put(&first).await.unwrap();
        assert_eq!(
            repo.get(CharacterId(1), Section::Skills).await.unwrap(),
            Some(first)
        );

        let mut second = completed(1, Section::Skills, "h1");
        second.error_message = "boom".to_string();
        repo.put(&second).await.unwrap();

        let loaded = repo.get(CharacterId(1), Section::Skills).await.unwrap().unwrap();
        assert_eq!(loaded, second);
        assert!(loaded.has_error());
    }

    #[tokio::test]
    async fn test_list_and_delete_character() {
        let repo = SectionStatusRepository::in_memory().await.unwrap();
        repo.put(&completed(1, Section::Skills, "a")).await.unwrap();
        repo.put(&completed(1, Section::Mails, "b")).await.unwrap();
        repo.put(&completed(2, Section::Skills, "c")).await.unwrap();

        assert_eq!(repo.list(CharacterId(1)).await.unwrap().len(), 2);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);

        repo.delete_character(CharacterId(1)).await.unwrap();
        assert!(repo.list(CharacterId(1)).await.unwrap().is_empty());
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_started() {
        let repo = SectionStatusRepository::in_memory().await.unwrap();
        let mut running = completed(1, Section::Online, "");
        running.started_at = Some(Utc::now());
        repo.put(&running).await.unwrap();

        assert_eq!(repo.clear_started().await.unwrap(), 1);
        let loaded = repo.get(CharacterId(1), Section::Online).await.unwrap().unwrap();
        assert!(!loaded.is_running());
    }

    #[tokio::test]
    async fn test_closed_repository_rejects_writes() {
        let repo = SectionStatusRepository::in_memory().await.unwrap();
        repo.close().await;
        assert!(repo.put(&completed(1, Section::Online, "")).await.is_err());
    }
}
