//! Configuration view and validation commands: `cardboard config`.

use std::path::Path;

use anyhow::{Context, Result};
use cardboard::config::{CardboardToml, Overrides};

use super::super::ConfigCommands;

pub fn cmd_config(
    config_path: &Path,
    overrides: &Overrides,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Cardboard Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No config file at {} (using defaults)", config_path.display());
            }
            println!();

            let config = CardboardToml::resolve(config_path, overrides)?;
            println!("Effective values (with env/CLI overrides):");
            println!();
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = CardboardToml::resolve(config_path, overrides)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
                println!();
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
                println!();
                anyhow::bail!("Configuration has {} warning(s)", warnings.len());
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("Config already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }

            CardboardToml::default().save(config_path)?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, dev_mode");
            println!("  - [database] path");
            println!("  - [auth] default_username, default_email");
            println!("  - [log] level, format, directory");
            println!();
        }
    }

    Ok(())
}
