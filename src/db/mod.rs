use thiserror::Error;

pub mod ledger;
pub mod models;

pub mod prelude {
    pub use crate::db::ledger::{LEADERBOARD_LIMIT, Ledger};
    pub use crate::db::models::transaction::{LeaderboardEntry, PointTransaction};
    pub use crate::db::models::{GuildId, RoleId, UserId};
    pub use crate::db::{LedgerErr, LedgerResult};
}

pub type LedgerResult<T> = core::result::Result<T, LedgerErr>;

#[derive(Debug, Error)]
pub enum LedgerErr {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error("while preparing the database directory: {0}")]
    IoError(#[from] std::io::Error),
}
