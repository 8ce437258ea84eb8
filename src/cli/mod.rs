pub mod commands;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "infoline-api")]
#[command(about = "InfoLine school data collection API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "Deliver queued email and push notifications")]
    ProcessNotifications {
        #[arg(long, help = "Drain one batch per channel and exit")]
        once: bool,
    },

    #[command(about = "Mint a bearer token for a user id (development)")]
    Token {
        #[arg(long, help = "Auth user id the token is issued for")]
        user: Uuid,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve::run().await,
        Commands::ProcessNotifications { once } => commands::notifications::run(once).await,
        Commands::Token { user } => commands::token::run(user),
    }
}
