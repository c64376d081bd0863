use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};

use crate::commands::application::{self, AppCommands};
use crate::commands::client::{self, ClientCommands};
use crate::commands::config::{self, ConfigCommands};
use crate::commands::Ctx;
use crate::config::{Config, LogConfig, PolicyOverrides};
use crate::http::HttpError;
use crate::logger::{ConsoleLogger, LogSettings, Logger};

#[derive(Parser, Debug)]
#[command(name = "soar", version)]
#[command(about = "A CLI client for the panel application and client APIs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the local or global one
    #[arg(long, global = true, env = "SOAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ignore ./.soar.toml and use the global config
    #[arg(short, long, global = true)]
    pub global: bool,

    /// Print only resource attributes
    #[arg(long, global = true, overrides_with = "no_unwrap")]
    pub unwrap: bool,
    /// Print the full response envelope
    #[arg(long, global = true)]
    pub no_unwrap: bool,

    /// Indent JSON output
    #[arg(long, global = true, overrides_with = "no_pretty")]
    pub pretty: bool,
    /// Print compact JSON
    #[arg(long, global = true)]
    pub no_pretty: bool,

    /// Retry requests that hit the rate limit
    #[arg(long, global = true, overrides_with = "no_retry_ratelimit")]
    pub retry_ratelimit: bool,
    #[arg(long, global = true, hide = true)]
    pub no_retry_ratelimit: bool,

    /// Show debug diagnostics
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored diagnostics
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Save this session's diagnostics to the logs directory
    #[arg(long, global = true)]
    pub save_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Application API (admin key)
    #[command(subcommand)]
    App(AppCommands),

    /// Client API (account key)
    #[command(subcommand)]
    Client(ClientCommands),

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl Cli {
    pub fn overrides(&self) -> PolicyOverrides {
        PolicyOverrides {
            unwrap_attributes: flag(self.unwrap, self.no_unwrap),
            pretty_print: flag(self.pretty, self.no_pretty),
            retry_on_rate_limit: flag(self.retry_ratelimit, self.no_retry_ratelimit),
        }
    }

    pub fn log_settings(&self, logs: LogConfig) -> LogSettings {
        LogSettings {
            color: logs.use_color && !self.no_color,
            debug: logs.use_debug || self.debug,
            quiet: self.quiet,
            ignore_warnings: logs.ignore_warnings,
        }
    }

    /// Runs the command and reports any failure, returning the exit code.
    pub fn run(self) -> ExitCode {
        let loaded = match self.command {
            Commands::Config(ConfigCommands::Init { .. }) => Ok(None),
            _ => Config::load(self.config.as_deref(), self.global).map(Some),
        };

        let logs = match &loaded {
            Ok(Some(config)) => config.logs,
            _ => LogConfig::default(),
        };
        let log = Arc::new(ConsoleLogger::new(self.log_settings(logs)));
        let save_logs = self.save_logs;

        let result = loaded
            .map_err(Error::from)
            .and_then(|config| self.dispatch(config, log.clone()));

        let code = match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                report(log.as_ref(), &err);
                ExitCode::FAILURE
            }
        };

        if save_logs {
            match log.save() {
                Ok(path) => eprintln!("logs saved to {}", path.display()),
                Err(err) => eprintln!("failed to save logs: {err:#}"),
            }
        }

        code
    }

    fn dispatch(self, config: Option<Config>, log: Arc<ConsoleLogger>) -> Result<()> {
        let overrides = self.overrides();

        match self.command {
            Commands::Config(cmd) => config::handle(cmd, config),
            Commands::App(cmd) => application::handle(&context(config, overrides, log)?, cmd),
            Commands::Client(cmd) => client::handle(&context(config, overrides, log)?, cmd),
        }
    }
}

fn context(config: Option<Config>, overrides: PolicyOverrides, log: Arc<ConsoleLogger>) -> Result<Ctx> {
    let config = config.context("no configuration loaded")?;
    let policy = config.output_policy().with_overrides(overrides);
    log.debug(&format!("using config {}", config.path().display()));
    Ctx::new(config, policy, log)
}

/// Prints one line per API error record, or the error chain otherwise.
pub fn report(log: &dyn Logger, err: &Error) {
    let http = err.chain().find_map(|cause| cause.downcast_ref::<HttpError>());

    match http {
        Some(HttpError::Api { status, records }) if records.is_empty() => {
            log.error(&format!("api error: {status} (no error details returned)"));
        }
        Some(HttpError::Api { records, .. }) => {
            for record in records {
                log.error(&record.to_string());
            }
        }
        _ => log.error(&format!("{err:#}")),
    }
}
