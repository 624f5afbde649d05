use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use crate::db::LedgerResult;
use crate::db::models::transaction::{LeaderboardEntry, PointTransaction};
use crate::db::models::{GuildId, UserId};

/// Leaderboards never return more rows than this.
pub const LEADERBOARD_LIMIT: i64 = 20;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TRANSACTION_FIELDS: &str = "id, user_id, guild_id, points, reason, timestamp";

/// Append-only point ledger backed by a single sqlite table.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Opens (creating if needed) the database at `path` and makes sure the `points_log` table
    /// exists. Safe to call on every start.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn initialize(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.create_schema().await?;

        tracing::info!("ledger initialized");
        Ok(ledger)
    }

    async fn create_schema(&self) -> LedgerResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS points_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                points INTEGER NOT NULL,
                reason TEXT,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS points_log_guild_timestamp
            ON points_log (guild_id, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[instrument(skip(self, reason))]
    pub async fn record_transaction(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        points: i64,
        reason: Option<&str>,
    ) -> LedgerResult<PointTransaction> {
        self.record_transaction_at(user_id, guild_id, points, reason, Utc::now())
            .await
    }

    /// Same as [`Ledger::record_transaction`], stamped with `at` instead of the current time.
    #[instrument(skip(self, reason))]
    pub async fn record_transaction_at(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        points: i64,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> LedgerResult<PointTransaction> {
        match insert(&self.pool, user_id, guild_id, points, reason, at).await {
            Ok(row) => {
                tracing::debug!(id = row.id, "recorded point transaction");
                Ok(row)
            }
            Err(e) => {
                tracing::error!(error = ?e, "point transaction insert failure");
                Err(e.into())
            }
        }
    }

    /// Records one row per user inside a single storage transaction: either every row commits or
    /// none do.
    #[instrument(skip(self, user_ids, reason), fields(user_count = user_ids.len()))]
    pub async fn record_batch(
        &self,
        user_ids: &[UserId],
        guild_id: GuildId,
        points: i64,
        reason: Option<&str>,
    ) -> LedgerResult<usize> {
        let at = Utc::now();
        let mut tx = self.pool.begin().await?;

        for user_id in user_ids {
            if let Err(e) = insert(&mut *tx, *user_id, guild_id, points, reason, at).await {
                tracing::error!(error = ?e, user_id = %user_id, "batch insert failure, rolling back");
                tx.rollback().await?;
                return Err(e.into());
            }
        }

        tx.commit().await?;

        tracing::debug!(recorded = user_ids.len(), "recorded point batch");
        Ok(user_ids.len())
    }

    #[instrument(skip(self))]
    pub async fn get_leaderboard(
        &self,
        guild_id: GuildId,
        window: Option<TimeDelta>,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        self.get_leaderboard_at(guild_id, window, Utc::now()).await
    }

    /// Sums points per user for `guild_id`, keeping only rows at or after `now - window` when a
    /// window is given. Highest total first, at most [`LEADERBOARD_LIMIT`] rows.
    #[instrument(skip(self))]
    pub async fn get_leaderboard_at(
        &self,
        guild_id: GuildId,
        window: Option<TimeDelta>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT user_id, SUM(points) AS total_points FROM points_log WHERE guild_id = ",
        );
        query.push_bind(guild_id);

        if let Some(window) = window {
            query.push(" AND timestamp >= ").push_bind(now - window);
        }

        query
            .push(" GROUP BY user_id ORDER BY total_points DESC LIMIT ")
            .push_bind(LEADERBOARD_LIMIT);

        let entries = query
            .build_query_as::<LeaderboardEntry>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(entry_count = entries.len(), "computed leaderboard");
        Ok(entries)
    }

    /// Every recorded row for a guild, oldest first.
    #[cfg(test)]
    #[instrument(skip(self))]
    pub async fn transactions(&self, guild_id: GuildId) -> LedgerResult<Vec<PointTransaction>> {
        Ok(sqlx::query_as::<_, PointTransaction>(&format!(
            "SELECT {} FROM points_log WHERE guild_id = ? ORDER BY id ASC",
            TRANSACTION_FIELDS
        ))
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

async fn insert<'e, E>(
    executor: E,
    user_id: UserId,
    guild_id: GuildId,
    points: i64,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> sqlx::Result<PointTransaction>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PointTransaction>(&format!(
        r#"
        INSERT INTO points_log (user_id, guild_id, points, reason, timestamp)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        TRANSACTION_FIELDS
    ))
    .bind(user_id)
    .bind(guild_id)
    .bind(points)
    .bind(reason)
    .bind(at)
    .fetch_one(executor)
    .await
}
