use clap::{Parser, Subcommand};

/// Modgate — image moderation gateway
#[derive(Parser)]
#[command(name = "modgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the moderation server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "7000")]
        port: u16,
    },

    /// Manage bearer tokens directly against the store
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Create a new bearer token. Use --admin to bootstrap the first
    /// admin token before the HTTP API is usable.
    Create {
        #[arg(long)]
        admin: bool,
    },
    /// List all tokens
    List,
    /// Delete a token by its exact string
    Delete { token: String },
}
