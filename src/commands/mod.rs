use async_trait::async_trait;
use thiserror::Error;
use tracing::{Instrument, instrument};

use crate::db::prelude::*;
use crate::util::discord::{DiscordErr, DiscordResult};

pub mod definitions;
pub mod grant;
pub mod guard;
pub mod leaderboard;
pub mod reply;

pub use guard::Permissions;
pub use leaderboard::Timespan;
pub use reply::{Embed, Reply};

pub const COMMAND_FAILED: &str = "Something went wrong while running this command.";

/// A guild member as far as the command handlers care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
    /// Set for automated/service accounts, which never receive points.
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GrantPoints {
        member: Member,
        points: i64,
        reason: Option<String>,
    },
    GrantRolePoints {
        role: RoleId,
        points: i64,
        reason: Option<String>,
    },
    Leaderboard {
        timespan: Timespan,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GrantPoints { .. } => definitions::GIVE_POINTS,
            Command::GrantRolePoints { .. } => definitions::GIVE_ROLE,
            Command::Leaderboard { .. } => definitions::LEADERBOARD,
        }
    }

    pub fn requires_admin(&self) -> bool {
        !matches!(self, Command::Leaderboard { .. })
    }
}

/// One authenticated command invocation inside a guild.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub guild_id: GuildId,
    pub caller: Caller,
    pub command: Command,
}

/// Member lookups served by the chat platform.
#[async_trait]
pub trait Directory: Send + Sync {
    /// `Ok(None)` when the user is no longer a member of the guild.
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> DiscordResult<Option<Member>>;

    /// Current membership snapshot of a role.
    async fn role_members(&self, guild_id: GuildId, role_id: RoleId)
    -> DiscordResult<Vec<Member>>;
}

/// Sends responses back to the invoking user.
///
/// The first call acknowledges the invocation; `defer` acknowledges with a "thinking" state and
/// every later `respond` replaces that state.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn defer(&self) -> ResponderResult<()>;
    async fn respond(&self, reply: Reply) -> ResponderResult<()>;
}

pub struct Context<'a> {
    pub ledger: &'a Ledger,
    pub directory: &'a dyn Directory,
    pub responder: &'a dyn Responder,
    pub guild_id: GuildId,
}

/// Runs an invocation to completion. Handler failures are logged and reported to the caller
/// rather than returned.
#[instrument(skip_all, fields(command = invocation.command.name(), guild = %invocation.guild_id, caller = %invocation.caller.id))]
pub async fn execute(
    ledger: &Ledger,
    directory: &dyn Directory,
    responder: &dyn Responder,
    invocation: Invocation,
) {
    let ctx = Context {
        ledger,
        directory,
        responder,
        guild_id: invocation.guild_id,
    };

    if let Err(e) = dispatch(&ctx, invocation).await {
        tracing::error!(error = ?e, "command handler failure");
        if let Err(e) = responder.respond(Reply::ephemeral(COMMAND_FAILED)).await {
            tracing::error!(error = ?e, "unable to report command failure");
        }
    }
}

pub async fn dispatch(ctx: &Context<'_>, invocation: Invocation) -> CommandResult<()> {
    if invocation.command.requires_admin()
        && let Err(rejection) = guard::require_admin(&invocation.caller)
    {
        ctx.responder.respond(rejection).await?;
        return Ok(());
    }

    match invocation.command {
        Command::GrantPoints {
            member,
            points,
            reason,
        } => {
            grant::grant_points(ctx, &member, points, reason.as_deref())
                .instrument(tracing::debug_span!("grant_points"))
                .await
        }
        Command::GrantRolePoints {
            role,
            points,
            reason,
        } => {
            grant::grant_role_points(ctx, role, points, reason.as_deref())
                .instrument(tracing::debug_span!("grant_role_points"))
                .await
        }
        Command::Leaderboard { timespan } => {
            leaderboard::leaderboard(ctx, timespan)
                .instrument(tracing::debug_span!("leaderboard"))
                .await
        }
    }
}

pub type CommandResult<T> = core::result::Result<T, CommandErr>;

#[derive(Debug, Error)]
pub enum CommandErr {
    #[error(transparent)]
    LedgerError(#[from] LedgerErr),

    #[error(transparent)]
    DirectoryError(#[from] DiscordErr),

    #[error(transparent)]
    ResponderError(#[from] ResponderErr),
}

pub type ResponderResult<T> = core::result::Result<T, ResponderErr>;

#[derive(Debug, Error)]
pub enum ResponderErr {
    #[error("interaction acknowledgement channel closed")]
    Closed,

    #[error(transparent)]
    DiscordError(#[from] DiscordErr),
}
