use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tendersbot")]
#[command(author, version, about = "Telegram bot for the tenders and procurement department", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// Validate configuration and the content tree, then exit
    Check,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
