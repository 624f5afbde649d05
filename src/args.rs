use clap::{Parser, Subcommand};

use crate::db::prelude::GuildId;

#[derive(Parser, Debug)]
#[command(version, about = "Contribution point ledger for Discord guilds")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Cmd>,
}

#[derive(Subcommand, Debug, Default, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// Serve the interactions endpoint (default)
    #[default]
    Serve,

    /// Upload slash command definitions, replacing any registered before
    Register {
        /// Register to a single guild (applies immediately) instead of globally
        #[arg(short, long)]
        guild: Option<GuildId>,
    },
}
