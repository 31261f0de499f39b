//! Error types for the engine crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `TransportError`: A single request never produced an HTTP response
//! - `LifecycleError`: A lifecycle operation failed after its retry policy
//!
//! Operation variants carry the last HTTP status seen (`None` when every
//! attempt failed below HTTP) and the engine's message.

use mantra_workflow::{SchemaError, TransformError};
use std::fmt;

/// Errors from sending one request to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The configured base URL cannot be used.
    InvalidUrl { url: String, reason: String },
    /// The HTTP client could not be built.
    ClientBuild { reason: String },
    /// The request exceeded the configured timeout.
    Timeout { reason: String },
    /// The engine could not be reached.
    Connect { reason: String },
    /// The request failed for another reason.
    Request { reason: String },
    /// The response body could not be read.
    Body { reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url, reason } => write!(f, "invalid engine url '{url}': {reason}"),
            Self::ClientBuild { reason } => write!(f, "failed to build http client: {reason}"),
            Self::Timeout { reason } => write!(f, "request timed out: {reason}"),
            Self::Connect { reason } => write!(f, "engine unreachable: {reason}"),
            Self::Request { reason } => write!(f, "request failed: {reason}"),
            Self::Body { reason } => write!(f, "failed to read response body: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors from lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The submitted document failed validation.
    InvalidWorkflow(SchemaError),
    /// A node could not be transformed.
    Transform(TransformError),
    /// The user's grant is missing, expired or revoked.
    AuthenticationExpired { detail: String },
    /// The engine or a third-party API throttled the request.
    RateLimited { detail: String },
    Creation { status: Option<u16>, detail: String },
    Retrieval { status: Option<u16>, detail: String },
    Activation { status: Option<u16>, detail: String },
    Execution { status: Option<u16>, detail: String },
    Deactivation { status: Option<u16>, detail: String },
    Deletion { status: Option<u16>, detail: String },
    /// The engine could not be reached at all.
    ServiceUnavailable { detail: String },
    /// The engine answered with a body missing required fields.
    InvalidResponse { detail: String },
}

impl LifecycleError {
    /// The last HTTP status the engine returned, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Creation { status, .. }
            | Self::Retrieval { status, .. }
            | Self::Activation { status, .. }
            | Self::Execution { status, .. }
            | Self::Deactivation { status, .. }
            | Self::Deletion { status, .. } => *status,
            Self::AuthenticationExpired { .. } => Some(401),
            Self::RateLimited { .. } => Some(429),
            Self::InvalidWorkflow(_)
            | Self::Transform(_)
            | Self::ServiceUnavailable { .. }
            | Self::InvalidResponse { .. } => None,
        }
    }

    /// Whether repeating the operation later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::ServiceUnavailable { .. } => true,
            Self::Creation { status, .. }
            | Self::Retrieval { status, .. }
            | Self::Activation { status, .. }
            | Self::Execution { status, .. }
            | Self::Deactivation { status, .. }
            | Self::Deletion { status, .. } => status.is_none_or(|s| s >= 500),
            Self::InvalidWorkflow(_)
            | Self::Transform(_)
            | Self::AuthenticationExpired { .. }
            | Self::InvalidResponse { .. } => false,
        }
    }

    /// Whether the user or operator must re-authenticate before retrying.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        self.status() == Some(401)
    }

    /// Returns `(service, operation)` for an unsupported node operation.
    #[must_use]
    pub fn unsupported_operation(&self) -> Option<(&str, &str)> {
        match self {
            Self::Transform(err) => err.unsupported_operation(),
            _ => None,
        }
    }
}

fn write_status(f: &mut fmt::Formatter<'_>, what: &str, status: Option<u16>, detail: &str) -> fmt::Result {
    match status {
        Some(status) => write!(f, "{what} failed with status {status}: {detail}"),
        None => write!(f, "{what} failed: {detail}"),
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWorkflow(err) => write!(f, "{err}"),
            Self::Transform(err) => write!(f, "{err}"),
            Self::AuthenticationExpired { detail } => {
                write!(f, "authentication expired: {detail}")
            }
            Self::RateLimited { detail } => write!(f, "rate limited: {detail}"),
            Self::Creation { status, detail } => {
                write_status(f, "workflow creation", *status, detail)
            }
            Self::Retrieval { status, detail } => {
                write_status(f, "workflow retrieval", *status, detail)
            }
            Self::Activation { status, detail } => {
                write_status(f, "workflow activation", *status, detail)
            }
            Self::Execution { status, detail } => {
                write_status(f, "workflow execution", *status, detail)
            }
            Self::Deactivation { status, detail } => {
                write_status(f, "workflow deactivation", *status, detail)
            }
            Self::Deletion { status, detail } => {
                write_status(f, "workflow deletion", *status, detail)
            }
            Self::ServiceUnavailable { detail } => {
                write!(f, "workflow engine unavailable: {detail}")
            }
            Self::InvalidResponse { detail } => {
                write!(f, "unexpected engine response: {detail}")
            }
        }
    }
}

impl std::error::Error for LifecycleError {}
