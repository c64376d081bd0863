use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;

use crate::commands::{Api, PageArgs, PayloadArgs};
use crate::input::{Definition, Kind};

const SERVER_DETAILS: Definition = &[
    ("name", Kind::String),
    ("user", Kind::Integer),
    ("external_id", Kind::NullableString),
    ("description", Kind::NullableString),
];

#[derive(Subcommand, Debug)]
pub enum ServersCommands {
    /// List servers, optionally filtered
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        uuid: Option<String>,
        /// Filter by external ID
        #[arg(long)]
        external: Option<String>,
        /// Filter by docker image
        #[arg(long)]
        image: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get a server by ID
    Get { id: u32 },
    /// Get a server by external ID
    External { id: String },
    /// Suspend a server
    Suspend { id: u32 },
    /// Unsuspend a server
    Unsuspend { id: u32 },
    /// Trigger a reinstall
    Reinstall { id: u32 },
    /// Update name, owner, external ID and description
    Details {
        id: u32,
        #[command(flatten)]
        input: PayloadArgs,
    },
    /// Delete a server
    Delete {
        id: u32,
        /// Delete even if the node cannot be reached
        #[arg(long)]
        force: bool,
    },
}

pub fn handle(api: &Api<'_>, cmd: ServersCommands) -> Result<()> {
    match cmd {
        ServersCommands::List {
            name,
            uuid,
            external,
            image,
            page,
        } => {
            let mut req = api.request(Method::GET, "/api/application/servers", None)?;
            for (field, value) in [
                ("name", name),
                ("uuid", uuid),
                ("external_id", external),
                ("image", image),
            ] {
                if let Some(value) = value {
                    req = req.query(&format!("filter[{field}]"), &value);
                }
            }
            api.collection(req, &page)
        }
        ServersCommands::Get { id } => {
            let req = api.request(Method::GET, &format!("/api/application/servers/{id}"), None)?;
            api.item(req)
        }
        ServersCommands::External { id } => {
            let req = api.request(
                Method::GET,
                &format!("/api/application/servers/external/{id}"),
                None,
            )?;
            api.item(req)
        }
        ServersCommands::Suspend { id } => action(api, id, "suspend"),
        ServersCommands::Unsuspend { id } => action(api, id, "unsuspend"),
        ServersCommands::Reinstall { id } => action(api, id, "reinstall"),
        ServersCommands::Details { id, input } => {
            let body = input.body(SERVER_DETAILS)?;
            let req = api.request(
                Method::PATCH,
                &format!("/api/application/servers/{id}/details"),
                Some(body),
            )?;
            api.item(req)
        }
        ServersCommands::Delete { id, force } => {
            let path = if force {
                format!("/api/application/servers/{id}/force")
            } else {
                format!("/api/application/servers/{id}")
            };
            api.run(api.request(Method::DELETE, &path, None)?)?;
            api.ctx().log().info(&format!("deleted server {id}"));
            Ok(())
        }
    }
}

fn action(api: &Api<'_>, id: u32, name: &str) -> Result<()> {
    let req = api.request(
        Method::POST,
        &format!("/api/application/servers/{id}/{name}"),
        None,
    )?;
    api.run(req)?;
    api.ctx().log().info(&format!("{name} request sent for server {id}"));
    Ok(())
}
