use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::json;

use crate::commands::{json_body, Api, PageArgs};

#[derive(Subcommand, Debug)]
pub enum StartupCommands {
    /// List startup variables
    Get { id: String },
    /// Set a startup variable
    Set {
        id: String,
        key: String,
        value: String,
    },
}

pub fn handle(api: &Api<'_>, cmd: StartupCommands) -> Result<()> {
    match cmd {
        StartupCommands::Get { id } => {
            let req = api.request(Method::GET, &format!("/api/client/servers/{id}/startup"), None)?;
            api.collection(req, &PageArgs::default())
        }
        StartupCommands::Set { id, key, value } => {
            let body = json_body(json!({"key": key, "value": value}))?;
            let req = api.request(
                Method::PUT,
                &format!("/api/client/servers/{id}/startup/variable"),
                body,
            )?;
            api.item(req)
        }
    }
}
