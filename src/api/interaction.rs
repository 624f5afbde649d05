//! Interaction payloads as Discord delivers them, and the responder that answers them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::commands::definitions::{
    GIVE_POINTS, GIVE_ROLE, LEADERBOARD, OPTION_INTEGER, OPTION_ROLE, OPTION_STRING, OPTION_USER,
};
use crate::commands::{
    Caller, Command, Invocation, Member, Permissions, Reply, Responder, ResponderErr,
    ResponderResult, Timespan,
};
use crate::db::prelude::{GuildId, RoleId, UserId};
use crate::util::discord::{Discord, DiscordUser, display_name};

// interaction types
pub const PING: u8 = 1;
pub const APPLICATION_COMMAND: u8 = 2;

// interaction callback types
const PONG: u8 = 1;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE: u8 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Present for invocations inside a guild.
    #[serde(default)]
    pub member: Option<InteractionMember>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionMember {
    pub user: DiscordUser,
    /// Stringified permission bitfield of the invoking member in this channel.
    #[serde(default)]
    pub permissions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub resolved: Resolved,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Value,
}

/// Full objects for the ids referenced by user/role options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resolved {
    #[serde(default)]
    pub users: HashMap<UserId, DiscordUser>,
    #[serde(default)]
    pub members: HashMap<UserId, ResolvedMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedMember {
    #[serde(default)]
    pub nick: Option<String>,
}

impl Interaction {
    /// Parses an application command interaction into the command it asks for.
    pub fn invocation(&self) -> InteractionResult<Invocation> {
        let (Some(guild_id), Some(member)) = (self.guild_id, self.member.as_ref()) else {
            return Err(InteractionErr::NotInGuild);
        };

        let data = self.data.as_ref().ok_or(InteractionErr::MissingData)?;
        let permissions = member
            .permissions
            .parse::<Permissions>()
            .map_err(|_| InteractionErr::InvalidPermissions(member.permissions.clone()))?;

        let caller = Caller {
            id: member.user.id,
            permissions,
        };

        let command = match data.name.as_str() {
            GIVE_POINTS => Command::GrantPoints {
                member: data.member("member")?,
                points: data.integer("points")?,
                reason: data.string("reason")?,
            },
            GIVE_ROLE => Command::GrantRolePoints {
                role: data.role("role")?,
                points: data.integer("points")?,
                reason: data.string("reason")?,
            },
            LEADERBOARD => Command::Leaderboard {
                timespan: match data.string("timespan")? {
                    Some(t) => t
                        .parse::<Timespan>()
                        .map_err(|_| InteractionErr::InvalidOption("timespan"))?,
                    None => Timespan::default(),
                },
            },
            other => return Err(InteractionErr::UnknownCommand(other.to_string())),
        };

        Ok(Invocation {
            guild_id,
            caller,
            command,
        })
    }
}

impl CommandData {
    fn option(&self, name: &'static str, kind: u8) -> InteractionResult<Option<&Value>> {
        match self.options.iter().find(|o| o.name == name) {
            Some(opt) if opt.kind == kind => Ok(Some(&opt.value)),
            Some(_) => Err(InteractionErr::InvalidOption(name)),
            None => Ok(None),
        }
    }

    fn required(&self, name: &'static str, kind: u8) -> InteractionResult<&Value> {
        self.option(name, kind)?
            .ok_or(InteractionErr::MissingOption(name))
    }

    fn integer(&self, name: &'static str) -> InteractionResult<i64> {
        self.required(name, OPTION_INTEGER)?
            .as_i64()
            .ok_or(InteractionErr::InvalidOption(name))
    }

    fn string(&self, name: &'static str) -> InteractionResult<Option<String>> {
        match self.option(name, OPTION_STRING)? {
            Some(value) => value
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or(InteractionErr::InvalidOption(name)),
            None => Ok(None),
        }
    }

    fn snowflake(&self, name: &'static str, kind: u8) -> InteractionResult<i64> {
        self.required(name, kind)?
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or(InteractionErr::InvalidOption(name))
    }

    fn role(&self, name: &'static str) -> InteractionResult<RoleId> {
        Ok(RoleId(self.snowflake(name, OPTION_ROLE)?))
    }

    /// The targeted member, built from the resolved data that accompanies the option.
    fn member(&self, name: &'static str) -> InteractionResult<Member> {
        let id = UserId(self.snowflake(name, OPTION_USER)?);
        let user = self
            .resolved
            .users
            .get(&id)
            .ok_or(InteractionErr::InvalidOption(name))?;
        let nick = self
            .resolved
            .members
            .get(&id)
            .and_then(|m| m.nick.as_deref());

        Ok(Member {
            id,
            display_name: display_name(user, nick),
            bot: user.bot,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Reply>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: PONG,
            data: None,
        }
    }

    pub fn deferred() -> Self {
        Self {
            kind: DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE,
            data: None,
        }
    }

    pub fn message(reply: Reply) -> Self {
        Self {
            kind: CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(reply),
        }
    }
}

/// Answers one interaction. The first response goes back through `initial` as the HTTP response
/// body; anything after that edits the original message over REST.
pub struct InteractionResponder {
    initial: Mutex<Option<oneshot::Sender<InteractionResponse>>>,
    discord: Discord,
    token: String,
}

impl InteractionResponder {
    pub fn new(
        initial: oneshot::Sender<InteractionResponse>,
        discord: Discord,
        token: String,
    ) -> Self {
        Self {
            initial: Mutex::new(Some(initial)),
            discord,
            token,
        }
    }

    /// Takes the acknowledgement sender, or `None` once the interaction has been acknowledged.
    fn take_initial(&self) -> Option<oneshot::Sender<InteractionResponse>> {
        match self.initial.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl Responder for InteractionResponder {
    async fn defer(&self) -> ResponderResult<()> {
        match self.take_initial() {
            Some(tx) => tx
                .send(InteractionResponse::deferred())
                .map_err(|_| ResponderErr::Closed),
            None => Ok(()),
        }
    }

    async fn respond(&self, reply: Reply) -> ResponderResult<()> {
        tracing::debug!(ephemeral = reply.is_ephemeral(), "responding to interaction");
        match self.take_initial() {
            Some(tx) => tx
                .send(InteractionResponse::message(reply))
                .map_err(|_| ResponderErr::Closed),
            None => Ok(self
                .discord
                .edit_original_response(&self.token, &reply)
                .await?),
        }
    }
}

pub type InteractionResult<T> = core::result::Result<T, InteractionErr>;

#[derive(Debug, Error)]
pub enum InteractionErr {
    #[error("unsupported interaction type {0}")]
    UnsupportedType(u8),

    #[error("command was not invoked inside a guild")]
    NotInGuild,

    #[error("interaction carries no command data")]
    MissingData,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("missing required option '{0}'")]
    MissingOption(&'static str),

    #[error("option '{0}' is missing its value or has the wrong type")]
    InvalidOption(&'static str),

    #[error("malformed permission bitfield '{0}'")]
    InvalidPermissions(String),
}
