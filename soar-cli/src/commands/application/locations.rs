use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;

use crate::commands::{Api, PageArgs, PayloadArgs};
use crate::input::{Definition, Kind};

const LOCATION: Definition = &[("short", Kind::String), ("long", Kind::NullableString)];

#[derive(Subcommand, Debug)]
pub enum LocationsCommands {
    /// List locations, optionally filtered
    List {
        #[arg(long)]
        short: Option<String>,
        #[arg(long)]
        long: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get a location by ID
    Get { id: u32 },
    /// Create a location (short, long)
    Create {
        #[command(flatten)]
        input: PayloadArgs,
    },
    /// Update a location (short, long)
    Update {
        id: u32,
        #[command(flatten)]
        input: PayloadArgs,
    },
    /// Delete a location
    Delete { id: u32 },
}

pub fn handle(api: &Api<'_>, cmd: LocationsCommands) -> Result<()> {
    match cmd {
        LocationsCommands::List { short, long, page } => {
            let mut req = api.request(Method::GET, "/api/application/locations", None)?;
            for (field, value) in [("short", short), ("long", long)] {
                if let Some(value) = value {
                    req = req.query(&format!("filter[{field}]"), &value);
                }
            }
            api.collection(req, &page)
        }
        LocationsCommands::Get { id } => {
            let req = api.request(Method::GET, &format!("/api/application/locations/{id}"), None)?;
            api.item(req)
        }
        LocationsCommands::Create { input } => {
            let body = input.body(LOCATION)?;
            let req = api.request(Method::POST, "/api/application/locations", Some(body))?;
            api.item(req)
        }
        LocationsCommands::Update { id, input } => {
            let body = input.body(LOCATION)?;
            let req = api.request(
                Method::PATCH,
                &format!("/api/application/locations/{id}"),
                Some(body),
            )?;
            api.item(req)
        }
        LocationsCommands::Delete { id } => {
            let req = api.request(
                Method::DELETE,
                &format!("/api/application/locations/{id}"),
                None,
            )?;
            api.run(req)?;
            api.ctx().log().info(&format!("deleted location {id}"));
            Ok(())
        }
    }
}
