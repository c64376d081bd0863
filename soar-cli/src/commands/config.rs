use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a blank config file
    Init {
        /// File or directory to create it in (defaults to the user config dir)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show the active configuration with keys masked
    Show,
}

/// `config init` needs no existing file, so `config` is only loaded for `show`.
pub fn handle(cmd: ConfigCommands, config: Option<Config>) -> Result<()> {
    match cmd {
        ConfigCommands::Init { path, force } => {
            let created = Config::create(path.as_deref(), force)?;
            println!("✓ Config file created at {}", created.display());
            println!("  Fill in the [application] and [client] url and key before use.");
        }
        ConfigCommands::Show => {
            let config = config.context("no configuration loaded")?;
            println!("# {}", config.path().display());
            print!("{}", config.masked()?);
        }
    }

    Ok(())
}
