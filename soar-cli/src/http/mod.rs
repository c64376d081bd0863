//! Authenticated request construction and response classification.

pub mod response;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::blocking::{multipart::Form, Client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::Scope;
use crate::logger::Logger;

pub use response::{normalize_collection, normalize_data, normalize_item, reformat, NormalizeError};

pub const USER_AGENT: &str = concat!("soar/", env!("CARGO_PKG_VERSION"));
pub const MAX_PER_PAGE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One `{code, status, detail}` record from a JSON:API `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub detail: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code.is_empty(), self.status.is_empty()) {
            (true, true) => f.write_str(&self.detail),
            (false, true) => write!(f, "{}: {}", self.code, self.detail),
            (true, false) => write!(f, "({}) {}", self.status, self.detail),
            (false, false) => write!(f, "{} ({}): {}", self.code, self.status, self.detail),
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("api error: {status} ({} error(s))", .records.len())]
    Api {
        status: StatusCode,
        records: Vec<ErrorRecord>,
    },
    #[error("unknown api error: {0}")]
    UnknownApi(StatusCode),
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid header value for {0}")]
    InvalidHeader(HeaderName),
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } | HttpError::UnknownApi(status) => Some(*status),
            HttpError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 200/201/202. The body may be zero-length.
    Body(Vec<u8>),
    /// 204 No Content.
    Empty,
}

impl Outcome {
    /// Body bytes; an empty slice for [`Outcome::Empty`].
    pub fn bytes(&self) -> &[u8] {
        match self {
            Outcome::Body(buf) => buf,
            Outcome::Empty => &[],
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Outcome::Body(buf) => buf,
            Outcome::Empty => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum Body {
    Bytes(Vec<u8>),
    Form(Form),
}

/// A request ready to dispatch. Built by [`Engine::request`] or
/// [`Engine::request_url`]; headers and query may be adjusted before
/// [`Engine::execute`] consumes it.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
}

impl Request {
    fn new(method: Method, url: Url, body: Option<Vec<u8>>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self {
            method,
            url,
            headers,
            body: body.map(Body::Bytes),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replaces a header, e.g. `Accept: text/plain` for raw file contents.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, HttpError> {
        let value = HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name.clone()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Appends a percent-encoded query pair.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Sends a multipart form instead of the byte body. The multipart
    /// content type (with boundary) is set by the transport.
    pub fn form(mut self, form: Form) -> Self {
        self.headers.remove(CONTENT_TYPE);
        self.body = Some(Body::Form(form));
        self
    }

    /// Clones the request unless it carries a multipart form.
    pub fn try_clone(&self) -> Option<Self> {
        let body = match &self.body {
            None => None,
            Some(Body::Bytes(buf)) => Some(Body::Bytes(buf.clone())),
            Some(Body::Form(_)) => return None,
        };

        Some(Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
        })
    }

    /// Adds `page` and `per_page` (clamped to [`MAX_PER_PAGE`]) query pairs.
    /// A zero `per_page` adds nothing.
    pub fn paginate(self, page: Option<u32>, per_page: Option<u32>) -> Self {
        let req = match page {
            Some(page) => self.query("page", &page.to_string()),
            None => self,
        };

        match per_page {
            Some(per_page) if per_page > 0 => {
                req.query("per_page", &per_page.min(MAX_PER_PAGE).to_string())
            }
            _ => req,
        }
    }
}

/// Issues requests against one credential scope.
#[derive(Clone)]
pub struct Engine {
    http: Client,
    scope: Scope,
    host: Option<String>,
    log: Arc<dyn Logger>,
}

impl Engine {
    /// Builds an engine with its own transport.
    pub fn new(scope: Scope, log: Arc<dyn Logger>) -> Result<Self, HttpError> {
        Self::with_client(transport()?, scope, log)
    }

    /// Builds an engine sharing an existing transport and its connection pool.
    pub fn with_client(http: Client, scope: Scope, log: Arc<dyn Logger>) -> Result<Self, HttpError> {
        let host = parse_url(&scope.url)?.host_str().map(str::to_owned);

        Ok(Self {
            http,
            scope,
            host,
            log,
        })
    }

    /// Builds an authenticated request for `path` relative to the scope URL.
    pub fn request(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Request, HttpError> {
        let url = parse_url(&format!("{}{}", self.scope.url.trim_end_matches('/'), path))?;
        let req = Request::new(method, url, body);
        req.header(AUTHORIZATION, &format!("Bearer {}", self.scope.key))
    }

    /// Builds a request for an absolute URL outside the scope, such as a
    /// signed download link. No bearer token is attached.
    pub fn request_url(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Request, HttpError> {
        Ok(Request::new(method, parse_url(url)?, body))
    }

    pub fn execute_with_pagination(
        &self,
        req: Request,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Outcome, HttpError> {
        self.execute(req.paginate(page, per_page))
    }

    /// Sends the request once and classifies the response.
    pub fn execute(&self, req: Request) -> Result<Outcome, HttpError> {
        self.log
            .info(&format!("request: {} {}", req.method, req.url.path()));

        let mut builder = self
            .http
            .request(req.method, req.url)
            .headers(req.headers);
        builder = match req.body {
            Some(Body::Bytes(buf)) => builder.body(buf),
            Some(Body::Form(form)) => builder.multipart(form),
            None => builder,
        };

        let start = Instant::now();
        let res = builder.send()?;
        let taken = start.elapsed().as_millis();

        let status = res.status();
        self.log
            .info(&format!("response: {} ({}ms)", status.as_u16(), taken));
        if let Some(length) = res.content_length() {
            self.log.debug(&format!("content length: {length}"));
        }

        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                Ok(Outcome::Body(res.bytes()?.to_vec()))
            }
            StatusCode::NO_CONTENT => Ok(Outcome::Empty),
            _ => {
                let same_host = res.url().host_str() == self.host.as_deref();
                let buf = match res.bytes() {
                    Ok(buf) if !buf.is_empty() => buf,
                    _ => return Err(HttpError::UnknownApi(status)),
                };

                let records = if same_host {
                    parse_api_errors(&buf)?
                } else {
                    self.log.debug("error response did not originate from the panel");
                    vec![parse_foreign_error(status, &buf)?]
                };

                Err(HttpError::Api { status, records })
            }
        }
    }
}

/// Builds the shared blocking transport.
pub fn transport() -> Result<Client, HttpError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

fn parse_url(raw: &str) -> Result<Url, HttpError> {
    Url::parse(raw).map_err(|source| HttpError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

fn parse_api_errors(buf: &[u8]) -> Result<Vec<ErrorRecord>, HttpError> {
    #[derive(Deserialize)]
    struct Payload {
        #[serde(default)]
        errors: Vec<ErrorRecord>,
    }

    let payload: Payload = serde_json::from_slice(buf).map_err(|source| HttpError::Decode {
        context: "api error response",
        source,
    })?;
    Ok(payload.errors)
}

fn parse_foreign_error(status: StatusCode, buf: &[u8]) -> Result<ErrorRecord, HttpError> {
    #[derive(Deserialize)]
    struct Payload {
        error: String,
    }

    let payload: Payload = serde_json::from_slice(buf).map_err(|source| HttpError::Decode {
        context: "foreign error response",
        source,
    })?;
    Ok(ErrorRecord {
        code: String::new(),
        status: status.as_u16().to_string(),
        detail: payload.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputPolicy;
    use crate::logger::{Level, MemoryLogger};
    use httpmock::prelude::*;
    use serde_json::json;

    fn engine_for(server: &MockServer) -> (Engine, Arc<MemoryLogger>) {
        let log = Arc::new(MemoryLogger::new());
        let scope = Scope {
            url: server.base_url(),
            key: "tok".into(),
        };
        let engine = Engine::new(scope, log.clone()).expect("engine");
        (engine, log)
    }

    fn offline_engine() -> Engine {
        let scope = Scope {
            url: "https://panel.test".into(),
            key: "tok".into(),
        };
        Engine::new(scope, Arc::new(MemoryLogger::new())).expect("engine")
    }

    #[test]
    fn request_sets_scope_headers() {
        let req = offline_engine()
            .request(Method::GET, "/api/application/users/5", None)
            .unwrap();

        assert_eq!(req.url().as_str(), "https://panel.test/api/application/users/5");
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer tok");
        assert_eq!(req.headers()[ACCEPT], "application/json");
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn absolute_requests_carry_no_bearer_token() {
        let req = offline_engine()
            .request_url(Method::GET, "https://files.node.test/download?token=abc", None)
            .unwrap()
            .header(ACCEPT, "application/octet-stream")
            .unwrap();

        assert!(req.headers().get(AUTHORIZATION).is_none());
        assert_eq!(req.headers()[ACCEPT], "application/octet-stream");
    }

    #[test]
    fn pagination_clamps_per_page() {
        let engine = offline_engine();
        let req = engine
            .request(Method::GET, "/api/application/users", None)
            .unwrap()
            .paginate(Some(2), Some(500));
        assert_eq!(req.url().query(), Some("page=2&per_page=100"));

        let req = engine
            .request(Method::GET, "/api/application/users", None)
            .unwrap()
            .paginate(None, Some(0));
        assert_eq!(req.url().query(), None);

        let req = engine
            .request(Method::GET, "/api/application/users", None)
            .unwrap()
            .paginate(None, None);
        assert_eq!(req.url().query(), None);
    }

    #[test]
    fn pagination_reaches_the_wire() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/application/servers")
                .query_param("page", "3")
                .query_param("per_page", "100");
            then.status(200).body(r#"{"object":"list","data":[]}"#);
        });

        let (engine, _) = engine_for(&server);
        let req = engine
            .request(Method::GET, "/api/application/servers", None)
            .unwrap();
        engine
            .execute_with_pagination(req, Some(3), Some(250))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn success_statuses_return_body() {
        let server = MockServer::start();
        for (path, status) in [("/ok", 200), ("/created", 201), ("/accepted", 202)] {
            server.mock(|when, then| {
                when.method(GET).path(path);
                then.status(status).body(r#"{"object":"x","attributes":{}}"#);
            });
        }

        let (engine, _) = engine_for(&server);
        for path in ["/ok", "/created", "/accepted"] {
            let req = engine.request(Method::GET, path, None).unwrap();
            assert_eq!(
                engine.execute(req).unwrap(),
                Outcome::Body(br#"{"object":"x","attributes":{}}"#.to_vec())
            );
        }
    }

    #[test]
    fn empty_success_body_is_not_no_content() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/client/servers/abc/command");
            then.status(200);
        });

        let (engine, _) = engine_for(&server);
        let req = engine
            .request(Method::POST, "/api/client/servers/abc/command", None)
            .unwrap();
        assert_eq!(engine.execute(req).unwrap(), Outcome::Body(Vec::new()));
    }

    #[test]
    fn no_content_ignores_any_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/api/application/users/5");
            then.status(204).body("should never be read");
        });

        let (engine, _) = engine_for(&server);
        let req = engine
            .request(Method::DELETE, "/api/application/users/5", None)
            .unwrap();
        assert_eq!(engine.execute(req).unwrap(), Outcome::Empty);
    }

    #[test]
    fn same_host_errors_parse_records() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/application/users");
            then.status(422).json_body(json!({
                "errors": [
                    {"code": "ValidationException", "status": "422", "detail": "The email field is required."},
                    {"code": "ValidationException", "status": "422", "detail": "The username field is required."}
                ]
            }));
        });

        let (engine, _) = engine_for(&server);
        let req = engine
            .request(Method::POST, "/api/application/users", Some(b"{}".to_vec()))
            .unwrap();

        match engine.execute(req) {
            Err(HttpError::Api { status, records }) => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].code, "ValidationException");
                assert_eq!(records[1].detail, "The username field is required.");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn empty_error_list_is_still_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/client");
            then.status(403).body(r#"{"errors":[]}"#);
        });

        let (engine, _) = engine_for(&server);
        let req = engine.request(Method::GET, "/api/client", None).unwrap();
        match engine.execute(req) {
            Err(HttpError::Api { status, records }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(records.is_empty());
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn error_without_body_is_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/client");
            then.status(500);
        });

        let (engine, _) = engine_for(&server);
        let req = engine.request(Method::GET, "/api/client", None).unwrap();
        let err = engine.execute(req).unwrap_err();
        assert!(matches!(err, HttpError::UnknownApi(StatusCode::INTERNAL_SERVER_ERROR)));
        assert!(err.to_string().starts_with("unknown api error: 500"));
    }

    #[test]
    fn malformed_error_body_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/client");
            then.status(502).body("<html>bad gateway</html>");
        });

        let (engine, _) = engine_for(&server);
        let req = engine.request(Method::GET, "/api/client", None).unwrap();
        assert!(matches!(
            engine.execute(req),
            Err(HttpError::Decode { .. })
        ));
    }

    #[test]
    fn off_host_redirect_errors_parse_single_message() {
        let panel = MockServer::start();
        let node = MockServer::start();

        let signed = node.mock(|when, then| {
            when.method(GET).path("/download/file");
            then.status(403).json_body(json!({"error": "signed url has expired"}));
        });
        let redirect = panel.mock(|when, then| {
            when.method(GET).path("/api/client/servers/abc/files/fetch");
            then.status(302).header(
                "location",
                format!("http://localhost:{}/download/file", node.port()),
            );
        });

        let (engine, _) = engine_for(&panel);
        let req = engine
            .request(Method::GET, "/api/client/servers/abc/files/fetch", None)
            .unwrap();

        match engine.execute(req) {
            Err(HttpError::Api { status, records }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].detail, "signed url has expired");
                assert_eq!(records[0].status, "403");
            }
            other => panic!("expected api error, got {other:?}"),
        }
        redirect.assert();
        signed.assert();
    }

    #[test]
    fn same_host_on_another_port_parses_records() {
        let panel = MockServer::start();
        let moved = MockServer::start();

        moved.mock(|when, then| {
            when.method(GET).path("/api/application/users/5");
            then.status(422).json_body(json!({"errors": [
                {"code": "ValidationException", "status": "422", "detail": "The email field is required."}
            ]}));
        });
        panel.mock(|when, then| {
            when.method(GET).path("/api/application/users/5");
            then.status(302).header("location", moved.url("/api/application/users/5"));
        });

        let (engine, _) = engine_for(&panel);
        let req = engine
            .request(Method::GET, "/api/application/users/5", None)
            .unwrap();

        match engine.execute(req) {
            Err(HttpError::Api { records, .. }) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].code, "ValidationException");
                assert_eq!(records[0].detail, "The email field is required.");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn transport_failure_is_not_an_api_error() {
        let scope = Scope {
            url: "http://127.0.0.1:9".into(),
            key: "tok".into(),
        };
        let engine = Engine::new(scope, Arc::new(MemoryLogger::new())).unwrap();
        let req = engine.request(Method::GET, "/api/client", None).unwrap();
        assert!(matches!(engine.execute(req), Err(HttpError::Transport(_))));
    }

    #[test]
    fn execute_logs_request_and_timing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/client/account");
            then.status(200).body(r#"{"object":"user","attributes":{}}"#);
        });

        let (engine, log) = engine_for(&server);
        let req = engine
            .request(Method::GET, "/api/client/account", None)
            .unwrap();
        engine.execute(req).unwrap();

        let lines = log.lines();
        assert_eq!(lines[0], (Level::Info, "request: GET /api/client/account".to_string()));
        assert!(lines[1].1.starts_with("response: 200 ("));
    }

    #[test]
    fn fetch_and_unwrap_user_end_to_end() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/application/users/5")
                .header("authorization", "Bearer tok")
                .header("user-agent", USER_AGENT);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"object":"user","attributes":{"id":5,"email":"a@b.com"}}"#);
        });

        let (engine, _) = engine_for(&server);
        let req = engine
            .request(Method::GET, "/api/application/users/5", None)
            .unwrap();
        let outcome = engine.execute(req).unwrap();

        let policy = OutputPolicy {
            unwrap_attributes: true,
            pretty_print: false,
            retry_on_rate_limit: false,
        };
        let out = normalize_item(outcome.bytes(), &policy).unwrap();
        assert_eq!(out, br#"{"id":5,"email":"a@b.com"}"#.to_vec());
        mock.assert();
    }
}
