//! Workflow engine client for mantra deployment.
//!
//! This crate provides:
//! - `EngineConfig`: connection and retry settings loaded from `ENGINE_*`
//! - `EngineTransport`: the request seam, with an HTTP implementation
//! - `LifecycleOrchestrator`: create, activate, execute, deactivate and delete
//! - `BackoffPolicy`: retry timing shared by every call
//!
//! Enable the `testing` feature for an in-memory engine.

pub mod backoff;
pub mod config;
pub mod error;
pub mod orchestrator;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use config::EngineConfig;
pub use error::{LifecycleError, TransportError};
pub use orchestrator::{
    ConnectionStatus, CreatedWorkflow, ExecutionResult, ExternalWorkflowHandle,
    LifecycleOrchestrator, PreparedWorkflow, WorkflowState,
};
pub use transport::{
    API_KEY_HEADER, EngineRequest, EngineResponse, EngineTransport, Endpoint, HttpTransport,
};
