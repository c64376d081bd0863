use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::json;

use crate::commands::{json_body, Api};

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Rename a server
    Rename { id: String, name: String },
    /// Reinstall a server
    Reinstall { id: String },
    /// Change the docker image
    Image { id: String, image: String },
}

pub fn handle(api: &Api<'_>, cmd: SettingsCommands) -> Result<()> {
    let log = api.ctx().log();

    match cmd {
        SettingsCommands::Rename { id, name } => {
            let body = json_body(json!({"name": name}))?;
            api.run(api.request(
                Method::POST,
                &format!("/api/client/servers/{id}/settings/rename"),
                body,
            )?)?;
            log.info(&format!("renamed {id} to '{name}'"));
        }
        SettingsCommands::Reinstall { id } => {
            api.run(api.request(
                Method::POST,
                &format!("/api/client/servers/{id}/settings/reinstall"),
                None,
            )?)?;
            log.info(&format!("reinstall started for {id}"));
        }
        SettingsCommands::Image { id, image } => {
            let body = json_body(json!({"docker_image": image}))?;
            api.run(api.request(
                Method::PUT,
                &format!("/api/client/servers/{id}/settings/docker-image"),
                body,
            )?)?;
            log.info(&format!("docker image for {id} set to {image}"));
        }
    }

    Ok(())
}
