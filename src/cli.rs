use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "punte",
    version,
    about = "Browser-to-SSH terminal relay (WebSocket gateway)"
)]
pub struct Cli {
    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the environment configuration and print a summary
    CheckConfig,
    /// Health check: verify a running instance is reachable via TCP connect
    HealthCheck {
        /// Address to check (host:port)
        #[arg(long, default_value = "127.0.0.1:3001")]
        addr: String,
        /// Timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page (roff format)
    Manpage,
}
