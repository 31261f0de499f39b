//! Workflow documents and the graph transformation engine.
//!
//! This crate provides:
//!
//! - **Document model**: Nodes, connections and settings in the engine's JSON shape
//! - **Schema validation**: Structural checks on caller-supplied documents
//! - **Service transformers**: Mail, calendar, drive and sheets node chains
//! - **Graph transformer**: Whole-workflow rewriting with node metadata
//!
//! Everything here is pure and synchronous; deployment lives in the engine crate.

pub mod document;
pub mod error;
pub mod schema;
pub mod service;
pub mod transform;
pub mod trigger;

pub use document::{
    ConnectionTarget, Connections, Node, NodeConnections, Position, WorkflowDocument,
    apply_default_settings, default_settings,
};
pub use error::{NodeTransformError, SchemaError, TransformError};
pub use schema::{parse_document, validate, validate_for_submission};
pub use service::{
    CanonicalError, NodeMetadata, NodeMetadataMap, ServiceKind, ServiceRegistry, TransformerFn,
};
pub use transform::{GraphTransformer, NodeMapping, TransformOptions, TransformedWorkflow};
pub use trigger::default_trigger;
