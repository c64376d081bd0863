//! `soar client ...`: user-level endpoints under `/api/client`.

mod account;
mod files;
mod servers;
mod settings;
mod startup;
mod subusers;

use anyhow::Result;
use clap::Subcommand;

pub use account::AccountCommands;
pub use files::FilesCommands;
pub use servers::ServersCommands;
pub use settings::SettingsCommands;
pub use startup::StartupCommands;
pub use subusers::SubusersCommands;

use super::Ctx;
use crate::config::ScopeKind;

#[derive(Subcommand, Debug)]
pub enum ClientCommands {
    /// Account details, two-factor and API keys
    #[command(subcommand)]
    Account(AccountCommands),
    /// Servers visible to the account
    #[command(subcommand)]
    Servers(ServersCommands),
    /// Server file management
    #[command(subcommand)]
    Files(FilesCommands),
    /// Startup variables
    #[command(subcommand)]
    Startup(StartupCommands),
    /// Server subusers
    #[command(subcommand)]
    Subusers(SubusersCommands),
    /// Server settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

pub fn handle(ctx: &Ctx, cmd: ClientCommands) -> Result<()> {
    let api = ctx.api(ScopeKind::Client)?;

    match cmd {
        ClientCommands::Account(cmd) => account::handle(&api, cmd),
        ClientCommands::Servers(cmd) => servers::handle(&api, cmd),
        ClientCommands::Files(cmd) => files::handle(&api, cmd),
        ClientCommands::Startup(cmd) => startup::handle(&api, cmd),
        ClientCommands::Subusers(cmd) => subusers::handle(&api, cmd),
        ClientCommands::Settings(cmd) => settings::handle(&api, cmd),
    }
}
