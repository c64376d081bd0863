use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::json;

use crate::commands::{json_body, Api, PageArgs};

#[derive(Subcommand, Debug)]
pub enum SubusersCommands {
    /// List subusers of a server
    List { id: String },
    /// Get one subuser
    Get { id: String, uuid: String },
    /// Invite a subuser with the given permissions
    Add {
        id: String,
        email: String,
        #[arg(required = true)]
        permissions: Vec<String>,
    },
    /// Remove a subuser
    Remove { id: String, uuid: String },
}

pub fn handle(api: &Api<'_>, cmd: SubusersCommands) -> Result<()> {
    match cmd {
        SubusersCommands::List { id } => {
            let req = api.request(Method::GET, &format!("/api/client/servers/{id}/users"), None)?;
            api.collection(req, &PageArgs::default())
        }
        SubusersCommands::Get { id, uuid } => {
            let req = api.request(
                Method::GET,
                &format!("/api/client/servers/{id}/users/{uuid}"),
                None,
            )?;
            api.item(req)
        }
        SubusersCommands::Add {
            id,
            email,
            permissions,
        } => {
            let body = json_body(json!({"email": email, "permissions": permissions}))?;
            api.item(api.request(Method::POST, &format!("/api/client/servers/{id}/users"), body)?)
        }
        SubusersCommands::Remove { id, uuid } => {
            let req = api.request(
                Method::DELETE,
                &format!("/api/client/servers/{id}/users/{uuid}"),
                None,
            )?;
            api.run(req)?;
            api.ctx().log().info(&format!("removed subuser {uuid}"));
            Ok(())
        }
    }
}
