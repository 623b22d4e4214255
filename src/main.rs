use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cardboard::config::{CONFIG_FILE, Overrides};

mod cmd;

#[derive(Parser)]
#[command(name = "cardboard")]
#[command(version, about = "Kanban board back-end: boards, lists, cards, labels, and comments over HTTP")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a separately served front-end)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and seed the default user
    Init {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default cardboard.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut overrides = Overrides {
        log_level: cli.verbose.then(|| "debug".to_string()),
        ..Default::default()
    };

    match &cli.command {
        Commands::Serve {
            host,
            port,
            db_path,
            dev,
        } => {
            overrides.host = host.clone();
            overrides.port = *port;
            overrides.db_path = db_path.clone();
            overrides.dev_mode = *dev;
            cmd::cmd_serve(&cli.config, &overrides).await?;
        }
        Commands::Init { db_path } => {
            overrides.db_path = db_path.clone();
            cmd::cmd_init(&cli.config, &overrides)?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(&cli.config, &overrides, command.clone())?;
        }
    }

    Ok(())
}
