use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;

use crate::commands::{Api, PageArgs, PayloadArgs};
use crate::input::{Definition, Kind};

const CREATE_USER: Definition = &[
    ("username", Kind::String),
    ("email", Kind::String),
    ("first_name", Kind::String),
    ("last_name", Kind::String),
];

const UPDATE_USER: Definition = &[
    ("username", Kind::String),
    ("email", Kind::String),
    ("first_name", Kind::String),
    ("last_name", Kind::String),
    ("language", Kind::String),
    ("root_admin", Kind::Boolean),
];

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List users, optionally filtered
    List {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        uuid: Option<String>,
        /// Filter by external ID
        #[arg(long)]
        external: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get a user by ID
    Get { id: u32 },
    /// Get a user by external ID
    External { id: String },
    /// Create a user (username, email, first_name, last_name)
    Create {
        #[command(flatten)]
        input: PayloadArgs,
    },
    /// Update a user (create fields plus language, root_admin)
    Update {
        id: u32,
        #[command(flatten)]
        input: PayloadArgs,
    },
    /// Delete a user
    Delete { id: u32 },
}

pub fn handle(api: &Api<'_>, cmd: UsersCommands) -> Result<()> {
    match cmd {
        UsersCommands::List {
            email,
            username,
            uuid,
            external,
            page,
        } => {
            let mut req = api.request(Method::GET, "/api/application/users", None)?;
            for (field, value) in [
                ("email", email),
                ("username", username),
                ("uuid", uuid),
                ("external_id", external),
            ] {
                if let Some(value) = value {
                    req = req.query(&format!("filter[{field}]"), &value);
                }
            }
            api.collection(req, &page)
        }
        UsersCommands::Get { id } => {
            let req = api.request(Method::GET, &format!("/api/application/users/{id}"), None)?;
            api.item(req)
        }
        UsersCommands::External { id } => {
            let req = api.request(
                Method::GET,
                &format!("/api/application/users/external/{id}"),
                None,
            )?;
            api.item(req)
        }
        UsersCommands::Create { input } => {
            let body = input.body(CREATE_USER)?;
            let req = api.request(Method::POST, "/api/application/users", Some(body))?;
            api.item(req)
        }
        UsersCommands::Update { id, input } => {
            let body = input.body(UPDATE_USER)?;
            let req = api.request(
                Method::PATCH,
                &format!("/api/application/users/{id}"),
                Some(body),
            )?;
            api.item(req)
        }
        UsersCommands::Delete { id } => {
            let req = api.request(Method::DELETE, &format!("/api/application/users/{id}"), None)?;
            api.run(req)?;
            api.ctx().log().info(&format!("deleted user {id}"));
            Ok(())
        }
    }
}
