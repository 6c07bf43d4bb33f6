use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::{error::LinkError, models::Link};

const LINK_COLUMNS: &str = "code, target_url, total_clicks, last_clicked, created_at";

/// Handle to the `links` table.
///
/// Cloning is cheap: every clone shares the same connection pool. Each method
/// checks a connection out for the duration of one statement and the pool
/// takes it back on every exit path.
#[derive(Clone, Debug)]
pub struct LinkStore {
    pool: SqlitePool,
}

impl LinkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url`, creating the database file if needed.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn code_exists(&self, code: &str) -> Result<bool, sqlx::Error> {
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE code = ?1")
            .bind(code)
            .fetch_one(&self.pool)
            .await?;

        Ok(found > 0)
    }

    /// Insert a new link and return the stored row.
    ///
    /// The primary key is the final arbiter of uniqueness: losing a race for
    /// `code` surfaces as [`LinkError::Conflict`].
    pub async fn insert(
        &self,
        code: &str,
        target_url: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Link, LinkError> {
        let sql = format!(
            "INSERT INTO links (code, target_url, created_at) VALUES (?1, ?2, ?3)
             RETURNING {LINK_COLUMNS}"
        );

        sqlx::query_as::<_, Link>(&sql)
            .bind(code)
            .bind(target_url)
            .bind(created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if LinkError::is_unique_violation(&e) {
                    LinkError::Conflict(code.to_owned())
                } else {
                    LinkError::Database(e)
                }
            })
    }

    pub async fn find(&self, code: &str) -> Result<Option<Link>, sqlx::Error> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM links WHERE code = ?1");

        sqlx::query_as::<_, Link>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    /// Return every link, newest first.
    pub async fn list(&self) -> Result<Vec<Link>, sqlx::Error> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM links ORDER BY created_at DESC, rowid DESC");

        sqlx::query_as::<_, Link>(&sql).fetch_all(&self.pool).await
    }

    /// Permanently delete a link. Returns `false` if no row matched.
    pub async fn delete(&self, code: &str) -> Result<bool, sqlx::Error> {
        let affected = sqlx::query("DELETE FROM links WHERE code = ?1")
            .bind(code)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    /// Count one visit. A single UPDATE so concurrent clicks never lose an
    /// increment. Returns `false` if the link vanished in the meantime.
    pub async fn record_click(
        &self,
        code: &str,
        clicked_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let affected = sqlx::query(
            "UPDATE links SET total_clicks = total_clicks + 1, last_clicked = ?2 WHERE code = ?1",
        )
        .bind(code)
        .bind(clicked_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }
}

/// In-memory store with migrations applied, shared by the test modules.
#[cfg(test)]
pub async fn memory_store() -> LinkStore {
    // A single long-lived connection: every SQLite `:memory:` connection
    // would otherwise see its own empty database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let store = LinkStore::new(pool);
    store.migrate().await.unwrap();
    store
}
