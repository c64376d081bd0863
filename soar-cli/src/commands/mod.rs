//! Thin call sites that turn arguments into requests against one scope and
//! print whatever comes back.

pub mod application;
pub mod client;
pub mod config;

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::config::{Config, OutputPolicy, ScopeKind};
use crate::http::{
    self, normalize_collection, normalize_data, normalize_item, reformat, Engine, HttpError,
    Outcome, Request,
};
use crate::input::{self, Definition};
use crate::logger::Logger;

const RATE_LIMIT_ATTEMPTS: u32 = 3;
const RATE_LIMIT_DELAY: Duration = Duration::from_secs(1);

#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Page number to fetch
    #[arg(long)]
    pub page: Option<u32>,
    /// Results per page (at most 100)
    #[arg(long)]
    pub per_page: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PayloadArgs {
    /// Payload as JSON or `key=value` pairs
    #[arg(short, long, conflicts_with = "src")]
    pub data: Option<String>,
    /// Read the JSON payload from a file
    #[arg(long)]
    pub src: Option<PathBuf>,
}

impl PayloadArgs {
    /// Builds a request body holding every field of `def`.
    pub fn body(&self, def: Definition) -> Result<Vec<u8>> {
        if let Some(path) = &self.src {
            let raw = fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(input::from_json(def, &raw)?);
        }

        match &self.data {
            Some(data) if data.trim_start().starts_with('{') => {
                Ok(input::from_json(def, data.as_bytes())?)
            }
            Some(data) => {
                let parsed = input::parse(data)?;
                Ok(input::marshal(def, &parsed)?)
            }
            None => bail!("either --data or --src must be provided"),
        }
    }
}

/// State shared by every command in one invocation.
pub struct Ctx {
    config: Config,
    policy: OutputPolicy,
    log: Arc<dyn Logger>,
    http: Client,
    retry_delay: Duration,
    out: RefCell<Box<dyn Write>>,
}

impl Ctx {
    pub fn new(config: Config, policy: OutputPolicy, log: Arc<dyn Logger>) -> Result<Self> {
        Ok(Self {
            config,
            policy,
            log,
            http: http::transport()?,
            retry_delay: RATE_LIMIT_DELAY,
            out: RefCell::new(Box::new(std::io::stdout())),
        })
    }

    /// Redirects command output, e.g. into a buffer.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = RefCell::new(out);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn policy(&self) -> &OutputPolicy {
        &self.policy
    }

    pub fn log(&self) -> &dyn Logger {
        self.log.as_ref()
    }

    /// Opens the API for `kind`, failing if its credentials are unusable.
    pub fn api(&self, kind: ScopeKind) -> Result<Api<'_>> {
        let scope = self.config.get_scope(kind)?;
        let engine = Engine::with_client(self.http.clone(), scope, self.log.clone())?;
        Ok(Api { ctx: self, engine })
    }

    pub fn write(&self, buf: &[u8]) -> Result<()> {
        let mut out = self.out.borrow_mut();
        out.write_all(buf)?;
        if !buf.ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// One credential scope bound to the invocation's context.
pub struct Api<'a> {
    ctx: &'a Ctx,
    engine: Engine,
}

impl Api<'_> {
    pub fn request(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Request> {
        Ok(self.engine.request(method, path, body)?)
    }

    /// Request to a signed URL; no bearer token.
    pub fn request_url(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Request> {
        Ok(self.engine.request_url(method, url, body)?)
    }

    /// Executes `req`, re-sending on 429 when rate-limit retries are on.
    pub fn send(&self, req: Request) -> Result<Outcome, HttpError> {
        if !self.ctx.policy.retry_on_rate_limit {
            return self.engine.execute(req);
        }

        let mut req = req;
        let mut delay = self.ctx.retry_delay;
        for attempt in 1..RATE_LIMIT_ATTEMPTS {
            let Some(retry) = req.try_clone() else {
                break;
            };

            match self.engine.execute(req) {
                Err(err) if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) => {
                    self.ctx.log.warn(&format!(
                        "rate limited, retrying in {}ms (attempt {attempt} of {RATE_LIMIT_ATTEMPTS})",
                        delay.as_millis()
                    ));
                    thread::sleep(delay);
                    delay *= 2;
                    req = retry;
                }
                other => return other,
            }
        }

        self.engine.execute(req)
    }

    /// Sends `req` and prints the single resource it returns.
    pub fn item(&self, req: Request) -> Result<()> {
        self.print_with(req, normalize_item)
    }

    pub fn collection(&self, req: Request, page: &PageArgs) -> Result<()> {
        let req = req.paginate(page.page, page.per_page);
        self.print_with(req, normalize_collection)
    }

    pub fn data(&self, req: Request) -> Result<()> {
        self.print_with(req, normalize_data)
    }

    /// Prints arbitrary JSON re-indented per the output policy.
    pub fn json(&self, req: Request) -> Result<()> {
        self.print_with(req, reformat)
    }

    /// Prints the body exactly as received.
    pub fn raw(&self, req: Request) -> Result<()> {
        let outcome = self.send(req)?;
        if !outcome.bytes().is_empty() {
            self.ctx.write(outcome.bytes())?;
        }
        Ok(())
    }

    /// Sends `req` for its side effect; any body is discarded.
    pub fn run(&self, req: Request) -> Result<()> {
        self.send(req)?;
        Ok(())
    }

    /// Fetches the `attributes.url` of a signed-URL endpoint.
    pub fn signed_url(&self, req: Request) -> Result<String> {
        let outcome = self.send(req)?;
        let value: Value = serde_json::from_slice(outcome.bytes())
            .context("failed to parse signed url response")?;
        match value.pointer("/attributes/url").and_then(Value::as_str) {
            Some(url) => Ok(url.to_string()),
            None => bail!("response did not contain a signed url"),
        }
    }

    pub fn ctx(&self) -> &Ctx {
        self.ctx
    }

    fn print_with<F>(&self, req: Request, normalize: F) -> Result<()>
    where
        F: Fn(&[u8], &OutputPolicy) -> Result<Vec<u8>, http::NormalizeError>,
    {
        let outcome = self.send(req)?;
        if outcome.bytes().is_empty() {
            return Ok(());
        }

        let out = normalize(outcome.bytes(), &self.ctx.policy)?;
        self.ctx.write(&out)
    }
}

/// Serializes a `json!` payload for a request body.
pub fn json_body(value: Value) -> Result<Option<Vec<u8>>> {
    Ok(Some(
        serde_json::to_vec(&value).context("failed to encode request body")?,
    ))
}
