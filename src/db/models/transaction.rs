use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GuildId, UserId};

/// Base points_log table model
///
/// Rows are append-only; nothing in this crate updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointTransaction {
    pub id: i64,
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub points: i64,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub total_points: i64,
}

impl From<(UserId, i64)> for LeaderboardEntry {
    fn from((user_id, total_points): (UserId, i64)) -> Self {
        Self {
            user_id,
            total_points,
        }
    }
}
