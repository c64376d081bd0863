use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;
use serde_json::json;

use crate::commands::{json_body, Api, PageArgs, PayloadArgs};
use crate::input::{Definition, Kind};

const UPDATE_PASSWORD: Definition = &[
    ("current_password", Kind::String),
    ("password", Kind::String),
    ("password_confirmation", Kind::String),
];

const CREATE_API_KEY: Definition = &[
    ("description", Kind::String),
    ("allowed_ips", Kind::StringArray),
];

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Show the account
    Get,
    /// List the permission keys the panel knows about
    Permissions,
    /// Show recent account activity
    Activity {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Two-factor authentication
    #[command(subcommand)]
    TwoFactor(TwoFactorCommands),
    /// Change the account email
    Email { email: String, password: String },
    /// Change the account password
    Password {
        #[command(flatten)]
        input: PayloadArgs,
    },
    /// Manage account API keys
    #[command(subcommand)]
    ApiKeys(ApiKeysCommands),
}

#[derive(Subcommand, Debug)]
pub enum TwoFactorCommands {
    /// Get the setup QR code data and secret
    Get,
    /// Enable two-factor with a TOTP code
    Enable { code: String, password: String },
    /// Disable two-factor
    Disable { password: String },
}

#[derive(Subcommand, Debug)]
pub enum ApiKeysCommands {
    /// List API keys
    List,
    /// Create an API key (description, allowed_ips)
    Create {
        #[command(flatten)]
        input: PayloadArgs,
    },
    /// Delete an API key
    Delete { identifier: String },
}

pub fn handle(api: &Api<'_>, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Get => api.item(api.request(Method::GET, "/api/client/account", None)?),
        AccountCommands::Permissions => {
            api.item(api.request(Method::GET, "/api/client/permissions", None)?)
        }
        AccountCommands::Activity { page } => {
            let req = api.request(Method::GET, "/api/client/account/activity", None)?;
            api.collection(req, &page)
        }
        AccountCommands::TwoFactor(cmd) => two_factor(api, cmd),
        AccountCommands::Email { email, password } => {
            let body = json_body(json!({"email": email, "password": password}))?;
            api.run(api.request(Method::PUT, "/api/client/account/email", body)?)?;
            api.ctx().log().info("account email updated");
            Ok(())
        }
        AccountCommands::Password { input } => {
            let body = input.body(UPDATE_PASSWORD)?;
            api.run(api.request(Method::PUT, "/api/client/account/password", Some(body))?)?;
            api.ctx().log().info("account password updated");
            Ok(())
        }
        AccountCommands::ApiKeys(cmd) => api_keys(api, cmd),
    }
}

fn two_factor(api: &Api<'_>, cmd: TwoFactorCommands) -> Result<()> {
    const PATH: &str = "/api/client/account/two-factor";

    match cmd {
        TwoFactorCommands::Get => api.data(api.request(Method::GET, PATH, None)?),
        TwoFactorCommands::Enable { code, password } => {
            let body = json_body(json!({"code": code, "password": password}))?;
            api.item(api.request(Method::POST, PATH, body)?)
        }
        TwoFactorCommands::Disable { password } => {
            let body = json_body(json!({"password": password}))?;
            api.run(api.request(Method::DELETE, PATH, body)?)?;
            api.ctx().log().info("two-factor authentication disabled");
            Ok(())
        }
    }
}

fn api_keys(api: &Api<'_>, cmd: ApiKeysCommands) -> Result<()> {
    match cmd {
        ApiKeysCommands::List => {
            let req = api.request(Method::GET, "/api/client/account/api-keys", None)?;
            api.collection(req, &PageArgs::default())
        }
        ApiKeysCommands::Create { input } => {
            let body = input.body(CREATE_API_KEY)?;
            api.item(api.request(Method::POST, "/api/client/account/api-keys", Some(body))?)
        }
        ApiKeysCommands::Delete { identifier } => {
            let req = api.request(
                Method::DELETE,
                &format!("/api/client/account/api-keys/{identifier}"),
                None,
            )?;
            api.run(req)?;
            api.ctx().log().info(&format!("deleted api key {identifier}"));
            Ok(())
        }
    }
}
