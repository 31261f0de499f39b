//! Request/response exchange with the engine.
//!
//! The orchestrator talks to the engine only through [`EngineTransport`], so
//! tests can substitute an in-memory engine for the HTTP one.

use crate::config::EngineConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use rootcause::prelude::Report;
use serde_json::Value;
use tracing::debug;

/// Header carrying the engine API key.
pub const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Where a request is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Relative to the REST API base, e.g. `/workflows`.
    Api(String),
    /// Relative to the webhook base, e.g. `/execute`.
    Webhook(String),
    /// Relative to the engine origin, e.g. `/healthz`.
    Root(String),
}

impl Endpoint {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Api(path) | Self::Webhook(path) | Self::Root(path) => path,
        }
    }
}

/// One request to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub body: Option<Value>,
}

impl EngineRequest {
    #[must_use]
    pub fn new(method: Method, endpoint: Endpoint) -> Self {
        Self {
            method,
            endpoint,
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// The engine's answer to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub status: u16,
    /// Parsed JSON, the raw text when it is not JSON, or `Null` when empty.
    pub body: Value,
}

impl EngineResponse {
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A human-readable failure message.
    ///
    /// Prefers the structured `message` field the engine sets on errors.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.body {
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| self.body.to_string(), str::to_string),
            Value::String(text) if !text.is_empty() => text.clone(),
            Value::Null | Value::String(_) => format!("HTTP {}", self.status),
            other => other.to_string(),
        }
    }
}

/// Sends requests to the engine.
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Sends one request. Non-2xx statuses are responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` when no HTTP response was received.
    async fn send(&self, request: &EngineRequest) -> Result<EngineResponse, Report<TransportError>>;
}

/// Engine transport over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    api_base: String,
    webhook_base: String,
    root_base: String,
    api_key: String,
}

impl HttpTransport {
    /// Creates a transport with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` if the base URL does not parse and
    /// `TransportError::ClientBuild` if the HTTP client cannot be created.
    pub fn new(config: &EngineConfig) -> Result<Self, Report<TransportError>> {
        let api_base = config.api_base().to_string();
        let mut root = Url::parse(&api_base).map_err(|e| TransportError::InvalidUrl {
            url: api_base.clone(),
            reason: e.to_string(),
        })?;
        root.set_path("");
        root.set_query(None);
        let root_base = root.as_str().trim_end_matches('/').to_string();

        let webhook_base = config
            .webhook_base_url
            .as_deref()
            .map_or_else(|| format!("{root_base}/webhook"), |url| {
                url.trim_end_matches('/').to_string()
            });

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TransportError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_base,
            webhook_base,
            root_base,
            api_key: config.api_key.clone(),
        })
    }

    /// Absolute URL for an endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &Endpoint) -> String {
        let base = match endpoint {
            Endpoint::Api(_) => &self.api_base,
            Endpoint::Webhook(_) => &self.webhook_base,
            Endpoint::Root(_) => &self.root_base,
        };
        format!("{base}{}", endpoint.path())
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    let reason = err.to_string();
    if err.is_timeout() {
        TransportError::Timeout { reason }
    } else if err.is_connect() {
        TransportError::Connect { reason }
    } else {
        TransportError::Request { reason }
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl EngineTransport for HttpTransport {
    async fn send(&self, request: &EngineRequest) -> Result<EngineResponse, Report<TransportError>> {
        let url = self.url(&request.endpoint);
        debug!(method = %request.method, url = %url, "engine request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| TransportError::Body {
            reason: e.to_string(),
        })?;

        debug!(status, "engine response");
        Ok(EngineResponse::new(status, parse_body(&text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_endpoints_against_bases() {
        let transport =
            HttpTransport::new(&EngineConfig::new("http://engine:5678/api/v1/", "k")).unwrap();
        assert_eq!(
            transport.url(&Endpoint::Api("/workflows".to_string())),
            "http://engine:5678/api/v1/workflows"
        );
        assert_eq!(
            transport.url(&Endpoint::Webhook("/execute".to_string())),
            "http://engine:5678/webhook/execute"
        );
        assert_eq!(
            transport.url(&Endpoint::Root("/healthz".to_string())),
            "http://engine:5678/healthz"
        );
    }

    #[test]
    fn explicit_webhook_base_wins() {
        let mut config = EngineConfig::new("http://engine:5678/api/v1", "k");
        config.webhook_base_url = Some("https://hooks.example.com/mantra/".to_string());
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.url(&Endpoint::Webhook("/execute".to_string())),
            "https://hooks.example.com/mantra/execute"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        let err = HttpTransport::new(&EngineConfig::new("not a url", "k")).unwrap_err();
        assert!(matches!(
            err.current_context(),
            TransportError::InvalidUrl { .. }
        ));
    }

    #[test]
    fn response_message_prefers_structured_field() {
        let response = EngineResponse::new(400, json!({"message": "Workflow has no trigger"}));
        assert_eq!(response.message(), "Workflow has no trigger");
        assert_eq!(EngineResponse::new(502, Value::Null).message(), "HTTP 502");
        assert_eq!(
            EngineResponse::new(500, json!("upstream exploded")).message(),
            "upstream exploded"
        );
        assert!(!response.is_success());
        assert!(EngineResponse::new(204, Value::Null).is_success());
    }

    #[test]
    fn body_parsing_tolerates_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"id": 7}"#), json!({"id": 7}));
        assert_eq!(parse_body("Bad Gateway"), json!("Bad Gateway"));
    }
}
