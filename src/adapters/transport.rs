//! JSON-over-HTTP transport shared by the forge and artifact server clients.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use super::{ForgeError, ForgeResult};
use crate::types::SslVerifyMode;

const USER_AGENT: &str = concat!("cookforge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
            HttpMethod::Delete => f.write_str("DELETE"),
        }
    }
}

/// Issue a request, get parsed JSON back (or `Null` for an empty body)
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: HttpMethod, url: &str, body: Option<&Value>) -> ForgeResult<Value>;

    async fn get(&self, url: &str) -> ForgeResult<Value> {
        self.request(HttpMethod::Get, url, None).await
    }
}

/// How requests authenticate
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Anonymous,
    /// `Authorization: token <t>`
    Token(String),
    /// `Authorization: Bearer <t>`
    Bearer(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Token(_) => f.write_str("Token(***)"),
            Credentials::Bearer(_) => f.write_str("Bearer(***)"),
            Credentials::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub ssl_verify: SslVerifyMode,
    pub proxy: Option<String>,
    pub credentials: Credentials,
}

/// `reqwest`-backed transport. No retries: every failure is returned as-is.
pub struct HttpTransport {
    client: Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> ForgeResult<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);

        if config.ssl_verify == SslVerifyMode::VerifyNone {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(proxy) = &config.proxy {
            debug!(proxy = %proxy, "using HTTP proxy");
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ForgeError::Network(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ForgeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            credentials: config.credentials,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: HttpMethod, url: &str, body: Option<&Value>) -> ForgeResult<Value> {
        let mut req = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Delete => self.client.delete(url),
        };
        req = req.header(header::ACCEPT, "application/json");

        req = match &self.credentials {
            Credentials::Anonymous => req,
            Credentials::Token(token) => req.header(header::AUTHORIZATION, format!("token {token}")),
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::Basic { username, password } => req.basic_auth(username, password.as_ref()),
        };

        if let Some(body) = body {
            req = req.json(body);
        }

        debug!(method = %method, url = %url, "sending request");

        let response = req
            .send()
            .await
            .map_err(|e| ForgeError::Network(format!("{method} {url}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ForgeError::Network(format!("{method} {url}: {e}")))?;

        if !status.is_success() {
            return Err(ForgeError::Transport {
                status: status.as_u16(),
                message: error_message(status, &text),
                url: url.to_string(),
            });
        }

        decode_body(url, &text)
    }
}

/// The API's `message` field when the error body carries one
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| status.to_string())
}

fn decode_body(url: &str, body: &str) -> ForgeResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|_| ForgeError::Decode {
        url: url.to_string(),
        body: body.to_string(),
    })
}
