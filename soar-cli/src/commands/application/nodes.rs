use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;

use crate::commands::{Api, PageArgs};

#[derive(Subcommand, Debug)]
pub enum NodesCommands {
    /// List nodes, optionally filtered
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        uuid: Option<String>,
        #[arg(long)]
        fqdn: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get a node by ID
    Get { id: u32 },
    /// Print the daemon configuration for a node
    Config { id: u32 },
}

pub fn handle(api: &Api<'_>, cmd: NodesCommands) -> Result<()> {
    match cmd {
        NodesCommands::List {
            name,
            uuid,
            fqdn,
            page,
        } => {
            let mut req = api.request(Method::GET, "/api/application/nodes", None)?;
            for (field, value) in [("name", name), ("uuid", uuid), ("fqdn", fqdn)] {
                if let Some(value) = value {
                    req = req.query(&format!("filter[{field}]"), &value);
                }
            }
            api.collection(req, &page)
        }
        NodesCommands::Get { id } => {
            let req = api.request(Method::GET, &format!("/api/application/nodes/{id}"), None)?;
            api.item(req)
        }
        // Not an envelope; only the indentation changes.
        NodesCommands::Config { id } => {
            let req = api.request(
                Method::GET,
                &format!("/api/application/nodes/{id}/configuration"),
                None,
            )?;
            api.json(req)
        }
    }
}
