use async_trait::async_trait;
use http::header::{AUTHORIZATION, InvalidHeaderValue, USER_AGENT};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::commands::definitions::command_definitions;
use crate::commands::{Directory, Member, Reply};
use crate::db::prelude::{GuildId, RoleId, UserId};
use crate::util::env::{EnvErr, Var};
use crate::var;

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const MEMBER_PAGE_LIMIT: usize = 1000;
const CLIENT_USER_AGENT: &str = concat!(
    "DiscordBot (",
    env!("CARGO_PKG_NAME"),
    ", ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Thin REST client for the handful of Discord endpoints the bot talks to.
#[derive(Debug, Clone)]
pub struct Discord {
    client: reqwest::Client,
    api_base: String,
    application_id: String,
}

impl Discord {
    pub fn new(token: &str, application_id: &str, api_base: &str) -> DiscordResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bot {token}"))?);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            application_id: application_id.to_string(),
        })
    }

    pub async fn from_env() -> DiscordResult<Self> {
        Self::new(
            var!(Var::DiscordToken).await?,
            var!(Var::DiscordApplicationId).await?,
            var!(Var::DiscordApiBase).await?,
        )
    }

    /// Fetch a single guild member, or `None` if they are not (or no longer) in the guild.
    #[instrument(skip(self))]
    pub async fn guild_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> DiscordResult<Option<GuildMember>> {
        let uri = format!("{}/guilds/{guild_id}/members/{user_id}", self.api_base);
        let res = self.client.get(uri).send().await?;

        if res.status() == StatusCode::NOT_FOUND {
            tracing::debug!("member not present in guild");
            return Ok(None);
        }

        Ok(Some(Self::parse(res).await?))
    }

    /// Every member of the guild, fetched page by page.
    #[instrument(skip(self))]
    pub async fn guild_members(&self, guild_id: GuildId) -> DiscordResult<Vec<GuildMember>> {
        let mut members: Vec<GuildMember> = Vec::new();
        let mut after = UserId(0);

        loop {
            let uri = format!("{}/guilds/{guild_id}/members", self.api_base);
            let res = self
                .client
                .get(uri)
                .query(&[
                    ("limit", MEMBER_PAGE_LIMIT.to_string()),
                    ("after", after.to_string()),
                ])
                .send()
                .await?;

            let page: Vec<GuildMember> = Self::parse(res).await?;
            let page_len = page.len();

            if let Some(last) = page.iter().map(|m| m.user.id).max() {
                after = last;
            }
            members.extend(page);

            tracing::trace!(page_len, fetched = members.len(), "fetched member page");
            if page_len < MEMBER_PAGE_LIMIT {
                break;
            }
        }

        tracing::debug!(member_count = members.len(), "fetched guild members");
        Ok(members)
    }

    /// Replace the deferred "thinking" state of an interaction with `reply`.
    #[instrument(skip(self, token, reply))]
    pub async fn edit_original_response(&self, token: &str, reply: &Reply) -> DiscordResult<()> {
        let uri = format!(
            "{}/webhooks/{}/{token}/messages/@original",
            self.api_base, self.application_id
        );

        let res = self.client.patch(uri).json(reply).send().await?;
        Self::check(res).await?;

        Ok(())
    }

    /// Upload the command definitions, overwriting whatever was registered before. Guild-scoped
    /// registrations apply immediately; global ones can take a while to propagate.
    #[instrument(skip(self))]
    pub async fn register_commands(&self, guild_id: Option<GuildId>) -> DiscordResult<usize> {
        let uri = match guild_id {
            Some(guild_id) => format!(
                "{}/applications/{}/guilds/{guild_id}/commands",
                self.api_base, self.application_id
            ),
            None => format!(
                "{}/applications/{}/commands",
                self.api_base, self.application_id
            ),
        };

        let res = self
            .client
            .put(uri)
            .json(&command_definitions())
            .send()
            .await?;

        let registered: Vec<Value> = Self::parse(res).await?;
        tracing::info!(count = registered.len(), "registered application commands");

        Ok(registered.len())
    }

    async fn parse<T>(res: reqwest::Response) -> DiscordResult<T>
    where
        T: DeserializeOwned,
    {
        Ok(Self::check(res).await?.json::<T>().await?)
    }

    /// Turns non-success responses into errors, keeping any JSON error body Discord sent along.
    async fn check(res: reqwest::Response) -> DiscordResult<reqwest::Response> {
        let status = res.status();

        if let Some(remaining) = res.headers().get("x-ratelimit-remaining")
            && let Some(bucket) = res.headers().get("x-ratelimit-bucket")
        {
            tracing::trace!(ratelimit_remaining = ?remaining, ratelimit_bucket = ?bucket, "rate-limit bucket");
        }

        if status.is_success() {
            return Ok(res);
        }

        tracing::error!(code = %status, "non-success response from discord");
        match res.json::<Value>().await {
            Ok(body) => {
                tracing::error!(body = ?body, "error message in response");
                Err(DiscordErr::FetchErrWithBody { status, body })
            }
            Err(_) => Err(DiscordErr::FetchErr(status)),
        }
    }
}

#[async_trait]
impl Directory for Discord {
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> DiscordResult<Option<Member>> {
        Ok(self.guild_member(guild_id, user_id).await?.map(Member::from))
    }

    async fn role_members(&self, guild_id: GuildId, role_id: RoleId) -> DiscordResult<Vec<Member>> {
        let members = self.guild_members(guild_id).await?;

        Ok(members
            .into_iter()
            .filter(|m| role_id.is_everyone(guild_id) || m.roles.contains(&role_id))
            .map(Member::from)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user: DiscordUser,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

/// Guild nickname, then global display name, then username.
pub fn display_name(user: &DiscordUser, nick: Option<&str>) -> String {
    nick.or(user.global_name.as_deref())
        .unwrap_or(&user.username)
        .to_string()
}

impl From<GuildMember> for Member {
    fn from(value: GuildMember) -> Self {
        Self {
            id: value.user.id,
            display_name: display_name(&value.user, value.nick.as_deref()),
            bot: value.user.bot,
        }
    }
}

pub type DiscordResult<T> = core::result::Result<T, DiscordErr>;

#[derive(Debug, Error)]
pub enum DiscordErr {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("while parsing environment vars: {0}")]
    EnvError(#[from] EnvErr),

    #[error("while creating a HeaderValue ({0})")]
    HeaderError(#[from] InvalidHeaderValue),

    #[error("error during discord request: {0}")]
    FetchErr(StatusCode),

    #[error("error (with detail) during discord request ({status}): {body}")]
    FetchErrWithBody { status: StatusCode, body: Value },
}
