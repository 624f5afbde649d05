//! Environment configuration.
//!
//! Variables are read once (process environment plus an optional `.env` file) and deserialized
//! into [`Env`] from `(name, value)` pairs, so `rename`/`default` attributes apply as usual.

use std::sync::LazyLock;

use serde::Deserialize;
use serde::de::{self, value::MapDeserializer};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::util::discord::DISCORD_API_BASE;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);
pub async fn get_env() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = get_env().await?;
    Ok(match var {
        Var::DiscordToken => &vars.discord_token,
        Var::DiscordApplicationId => &vars.discord_application_id,
        Var::DiscordPublicKey => &vars.discord_public_key,
        Var::DiscordApiBase => &vars.discord_api_base,
        Var::DatabasePath => &vars.database_path,
        Var::ServerApiPort => &vars.server_api_port,
        Var::ServiceName => &vars.service_name,
        Var::OtelExporterEndpoint => &vars.otel_exporter_otlp_endpoint,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    pub discord_token: String,
    pub discord_application_id: String,
    /// Hex-encoded Ed25519 key used to verify interaction signatures
    pub discord_public_key: String,
    #[serde(default = "default_api_base")]
    pub discord_api_base: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_server_api_port")]
    pub server_api_port: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// OTLP collector; export is disabled when empty
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(from_iter(dotenvy::vars())?)
    }
}

#[inline]
fn default_api_base() -> String {
    DISCORD_API_BASE.to_string()
}

#[inline]
fn default_database_path() -> String {
    String::from("/data/contribution_points.db")
}

#[inline]
fn default_server_api_port() -> String {
    String::from("8080")
}

#[inline]
fn default_service_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

#[derive(Debug, Clone, Copy)]
pub enum Var {
    DiscordToken,
    DiscordApplicationId,
    DiscordPublicKey,
    DiscordApiBase,
    DatabasePath,
    ServerApiPort,
    ServiceName,
    OtelExporterEndpoint,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

/// Deserialize an [`Env`] from `(name, value)` pairs; names that aren't fields are ignored.
pub fn from_iter<Iter>(iter: Iter) -> Result<Env, EnvDeserializeError>
where
    Iter: IntoIterator<Item = (String, String)>,
{
    Env::deserialize(MapDeserializer::new(iter.into_iter()))
}

impl de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.to_string())
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing required environment variable {0}")]
    MissingValue(String),
}

#[cfg(test)]
mod test {
    use super::*;

    fn pairs(vars: &[(&str, &str)]) -> Vec<(String, String)> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_apply() {
        let env: Env = from_iter(pairs(&[
            ("DISCORD_TOKEN", "token"),
            ("DISCORD_APPLICATION_ID", "1234"),
            ("DISCORD_PUBLIC_KEY", "abcd"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();

        assert_eq!(env.discord_token, "token");
        assert_eq!(env.database_path, "/data/contribution_points.db");
        assert_eq!(env.server_api_port, "8080");
        assert_eq!(env.discord_api_base, DISCORD_API_BASE);
        assert!(env.otel_exporter_otlp_endpoint.is_empty());
    }

    #[test]
    fn test_overrides_and_missing() {
        let env: Env = from_iter(pairs(&[
            ("DISCORD_TOKEN", "token"),
            ("DISCORD_APPLICATION_ID", "1234"),
            ("DISCORD_PUBLIC_KEY", "abcd"),
            ("DATABASE_PATH", "./data/points.db"),
            ("SERVER_API_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(env.database_path, "./data/points.db");
        assert_eq!(env.server_api_port, "9000");

        let err = from_iter(pairs(&[("DISCORD_TOKEN", "token")])).unwrap_err();
        assert!(matches!(err, EnvDeserializeError::MissingValue(ref v) if v == "DISCORD_APPLICATION_ID"));
    }
}
