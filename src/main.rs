use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use crate::api::middleware::VerifyErr;
use crate::api::middleware::verify::Verifier;
use crate::api::server::{AppState, ServerErr};
use crate::args::{Cli, Cmd};
use crate::db::prelude::*;
use crate::util::discord::{Discord, DiscordErr};
use crate::util::env::{EnvErr, Var};
use crate::util::telemetry;

mod api;
mod args;
mod commands;
mod db;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Ledger(#[from] LedgerErr),

    #[error(transparent)]
    Discord(#[from] DiscordErr),

    #[error(transparent)]
    Verify(#[from] VerifyErr),

    #[error(transparent)]
    Server(#[from] ServerErr),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let telemetry_registry = telemetry::Telemetry::new().await?.register();

    let result = match cli.command.unwrap_or_default() {
        Cmd::Serve => serve().await,
        Cmd::Register { guild } => register(guild).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = ?e, "exiting with error");
    }

    telemetry_registry.shutdown();
    result
}

async fn serve() -> Result<()> {
    tracing::info!("starting interactions server");

    let ledger = Ledger::initialize(var!(Var::DatabasePath).await?).await?;
    let state = Arc::new(AppState {
        ledger: ledger.clone(),
        discord: Discord::from_env().await?,
        verifier: Arc::new(Verifier::from_env().await?),
    });

    api::server::start_server(state).await?;

    ledger.pool().close().await;
    Ok(())
}

async fn register(guild: Option<GuildId>) -> Result<()> {
    let discord = Discord::from_env().await?;
    let count = discord.register_commands(guild).await?;

    match guild {
        Some(guild) => tracing::info!(count, %guild, "registered guild commands"),
        None => tracing::info!(count, "registered global commands (propagation may take a while)"),
    }

    Ok(())
}
