use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{CompletionsCommand, ConfigureCommand, ListCommand, UseCommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "aws-op", version, about = "CLI tool for managing AWS authentication via 1Password", long_about = None)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        default_value = "default",
        help = "aws-op configuration profile"
    )]
    pub profile: String,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "List AWS items stored in 1Password")]
    List(ListCommand),
    #[command(about = "Export credentials of an AWS item to a sourceable file")]
    Use(UseCommand),
    #[command(about = "Configure aws-op settings")]
    Configure(ConfigureCommand),
    #[command(about = "Generate shell completion scripts for aws-op")]
    Completions(CompletionsCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let profile = self.profile;

        match self.command {
            Commands::List(cmd) => cmd.execute(&profile).await,
            Commands::Use(cmd) => cmd.execute(&profile).await,
            Commands::Configure(cmd) => cmd.execute(&profile).await,
            Commands::Completions(cmd) => {
                cmd.execute();
                Ok(())
            }
        }
    }
}
