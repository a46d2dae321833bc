use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool},
    Pool, Row, Sqlite,
};
use std::path::Path;
use tracing::{debug, error, info};

use super::TicketSource;
use crate::{models::RawAlert, Error, Result};

/// Reads the `messages` table directly.
pub struct SqliteTicketSource {
    pool: Pool<Sqlite>,
    limit: u32,
}

impl SqliteTicketSource {
    pub async fn new(path: &Path, limit: u32) -> Result<Self> {
        info!("Connecting to SQLite database: {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            error!("Failed to connect to SQLite: {}", e);
            Error::Sqlx(e)
        })?;

        Ok(Self { pool, limit })
    }

    pub async fn init(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                Error::Migrate(e)
            })?;

        Ok(())
    }

    /// Newest first. `created_at` mixes RFC 3339 and `YYYY-MM-DD HH:MM:SS`
    /// text, so rows are ordered by the parsed instant, not the raw string.
    /// Unparseable values sort last.
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<RawAlert>> {
        let offset = page.saturating_sub(1) as i64 * self.limit as i64;

        let rows = sqlx::query(
            r#"
            SELECT id, subject, message, created_at
            FROM messages
            ORDER BY datetime(created_at) DESC, id DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(self.limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let alerts = rows
            .into_iter()
            .map(|row| -> std::result::Result<RawAlert, sqlx::Error> {
                Ok(RawAlert {
                    id: row.try_get("id")?,
                    subject: row.try_get::<Option<String>, _>("subject")?.unwrap_or_default(),
                    message: row.try_get::<Option<String>, _>("message")?.unwrap_or_default(),
                    created_at: row.try_get::<Option<String>, _>("created_at")?.unwrap_or_default(),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Read {} messages (page {})", alerts.len(), page);
        Ok(alerts)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }

    /// Upsert rows by id in one transaction. Returns the number written.
    pub async fn import(&self, alerts: &[RawAlert]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for alert in alerts {
            sqlx::query(
                r#"
                INSERT INTO messages (id, subject, message, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    subject = excluded.subject,
                    message = excluded.message,
                    created_at = excluded.created_at
                "#,
            )
            .bind(alert.id)
            .bind(&alert.subject)
            .bind(&alert.message)
            .bind(&alert.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Imported {} messages", alerts.len());
        Ok(alerts.len())
    }
}

#[async_trait]
impl TicketSource for SqliteTicketSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch(&self) -> Result<Vec<RawAlert>> {
        self.fetch_page(1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_source(limit: u32) -> SqliteTicketSource {
        // A single connection keeps every query on the same in-memory database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let source = SqliteTicketSource { pool, limit };
        source.init().await.unwrap();
        source
    }

    #[tokio::test]
    async fn import_then_fetch_newest_first() {
        let source = memory_source(10).await;
        let written = source
            .import(&[
                RawAlert::new(1, "Problem: A", "Problem started", "2025-09-26 10:00:00"),
                RawAlert::new(2, "Resolved: A", "Problem has been resolved", "2025-09-26 11:00:00"),
            ])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let alerts = source.fetch().await.unwrap();
        let ids: Vec<i64> = alerts.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(source.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn import_upserts_by_id() {
        let source = memory_source(10).await;
        source
            .import(&[RawAlert::new(1, "Problem: A", "Problem started", "2025-09-26 10:00:00")])
            .await
            .unwrap();
        source
            .import(&[RawAlert::new(1, "Resolved: A", "Problem has been resolved", "2025-09-26 10:00:00")])
            .await
            .unwrap();

        let alerts = source.fetch().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject, "Resolved: A");
    }

    #[tokio::test]
    async fn creates_database_file_on_first_use() {
        let dir = std::env::temp_dir().join(format!("ticket-monitor-{}", std::process::id()));
        let path = dir.join("nested").join("messages.db");

        let source = SqliteTicketSource::new(&path, 10).await.unwrap();
        source.init().await.unwrap();
        assert!(path.exists());
        assert!(source.fetch().await.unwrap().is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn newest_first_across_timestamp_formats() {
        let source = memory_source(2).await;
        source
            .import(&[
                RawAlert::new(1, "s", "m", "2025-09-26T10:00:00Z"),
                RawAlert::new(2, "s", "m", "2025-09-26 23:00:00"),
                RawAlert::new(3, "s", "m", "2025-09-26T22:00:00+02:00"),
                RawAlert::new(4, "s", "m", "not a date"),
            ])
            .await
            .unwrap();

        let ids: Vec<i64> = source.fetch().await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let ids: Vec<i64> = source.fetch_page(2).await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn pages_by_limit() {
        let source = memory_source(2).await;
        let rows: Vec<RawAlert> = (1..=5)
            .map(|i| RawAlert::new(i, "s", "m", format!("2025-09-2{} 10:00:00", i)))
            .collect();
        source.import(&rows).await.unwrap();

        let first: Vec<i64> = source.fetch_page(1).await.unwrap().iter().map(|a| a.id).collect();
        let last: Vec<i64> = source.fetch_page(3).await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(first, vec![5, 4]);
        assert_eq!(last, vec![1]);
    }
}
