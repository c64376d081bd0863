use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use reqwest::Method;
use serde_json::json;

use crate::commands::{json_body, Api, PageArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerSignal {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerSignal {
    fn as_str(self) -> &'static str {
        match self {
            PowerSignal::Start => "start",
            PowerSignal::Stop => "stop",
            PowerSignal::Restart => "restart",
            PowerSignal::Kill => "kill",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ServersCommands {
    /// List servers the account can access
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get websocket credentials for a server
    Websocket { id: String },
    /// Show current resource usage
    Resources { id: String },
    /// Show server activity
    Activity {
        id: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Send a console command
    Command { id: String, command: String },
    /// Change the power state
    Power {
        id: String,
        #[arg(value_enum)]
        signal: PowerSignal,
    },
}

pub fn handle(api: &Api<'_>, cmd: ServersCommands) -> Result<()> {
    match cmd {
        ServersCommands::List { page } => {
            api.collection(api.request(Method::GET, "/api/client", None)?, &page)
        }
        ServersCommands::Websocket { id } => {
            let req = api.request(Method::GET, &format!("/api/client/servers/{id}/websocket"), None)?;
            api.data(req)
        }
        ServersCommands::Resources { id } => {
            let req = api.request(Method::GET, &format!("/api/client/servers/{id}/resources"), None)?;
            api.item(req)
        }
        ServersCommands::Activity { id, page } => {
            let req = api.request(Method::GET, &format!("/api/client/servers/{id}/activity"), None)?;
            api.collection(req, &page)
        }
        ServersCommands::Command { id, command } => {
            let body = json_body(json!({"command": command}))?;
            api.run(api.request(Method::POST, &format!("/api/client/servers/{id}/command"), body)?)?;
            api.ctx().log().info(&format!("command sent to {id}"));
            Ok(())
        }
        ServersCommands::Power { id, signal } => {
            let body = json_body(json!({"signal": signal.as_str()}))?;
            api.run(api.request(Method::POST, &format!("/api/client/servers/{id}/power"), body)?)?;
            api.ctx()
                .log()
                .info(&format!("{} signal sent to {id}", signal.as_str()));
            Ok(())
        }
    }
}
