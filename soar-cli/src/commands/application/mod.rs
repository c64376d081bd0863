//! `soar app ...`: administrative endpoints under `/api/application`.

mod locations;
mod nests;
mod nodes;
mod servers;
mod users;

use anyhow::Result;
use clap::Subcommand;

pub use locations::LocationsCommands;
pub use nests::NestsCommands;
pub use nodes::NodesCommands;
pub use servers::ServersCommands;
pub use users::UsersCommands;

use super::Ctx;
use crate::config::ScopeKind;

#[derive(Subcommand, Debug)]
pub enum AppCommands {
    /// Manage panel users
    #[command(subcommand)]
    Users(UsersCommands),
    /// Manage servers
    #[command(subcommand)]
    Servers(ServersCommands),
    /// Inspect nodes
    #[command(subcommand)]
    Nodes(NodesCommands),
    /// Manage locations
    #[command(subcommand)]
    Locations(LocationsCommands),
    /// Inspect nests and eggs
    #[command(subcommand)]
    Nests(NestsCommands),
}

pub fn handle(ctx: &Ctx, cmd: AppCommands) -> Result<()> {
    let api = ctx.api(ScopeKind::Application)?;

    match cmd {
        AppCommands::Users(cmd) => users::handle(&api, cmd),
        AppCommands::Servers(cmd) => servers::handle(&api, cmd),
        AppCommands::Nodes(cmd) => nodes::handle(&api, cmd),
        AppCommands::Locations(cmd) => locations::handle(&api, cmd),
        AppCommands::Nests(cmd) => nests::handle(&api, cmd),
    }
}
