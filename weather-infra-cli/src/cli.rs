use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Weather Infra - deployment declaration for the weather service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Stack name; selects weather-infra.<stack>.yaml
    #[arg(long, global = true, default_value = "dev")]
    pub stack: String,

    /// Settings file to use instead of the stack's default file
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the declared resources without submitting them
    Plan {
        /// Output format (table or json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Show the resource names derived from the prefix
    Names,

    /// Show the loaded configuration
    Config {
        /// Show actual secret values (use with caution)
        #[arg(long)]
        show_secrets: bool,
    },

    /// Submit the deployment to the in-memory orchestrator
    Simulate {
        /// Number of consecutive runs against the same simulated state
        #[arg(long, default_value = "1")]
        runs: usize,

        /// Output format (table or json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}
