//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SchemaError`: The raw document does not have the engine's shape
//! - `NodeTransformError`: A single service node could not be expanded
//! - `TransformError`: Graph-level failure naming the offending node
//!
//! All three are plain values; the lifecycle layer wraps them into reports.

use std::fmt;

/// Errors from validating or decoding a workflow document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The document is not a JSON object.
    NotAnObject,
    /// The `nodes` field is absent.
    MissingNodes,
    /// The `nodes` field is not a list.
    NodesNotAList,
    /// The `nodes` list is empty.
    EmptyNodes,
    /// A `nodes` entry is not an object.
    NodeNotAnObject { index: usize },
    /// A node lacks one of `id`, `type` or `parameters`.
    NodeMissingField { index: usize, field: &'static str },
    /// The `connections` field is absent.
    MissingConnections,
    /// The `connections` field is not an object.
    ConnectionsNotAnObject,
    /// Two nodes share a name.
    DuplicateNodeName { name: String },
    /// A top-level field required for submission is absent.
    MissingField { field: &'static str },
    /// The document has the right outline but a field has the wrong type.
    Malformed { reason: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "invalid workflow: must be a JSON object"),
            Self::MissingNodes => write!(f, "invalid workflow: missing nodes"),
            Self::NodesNotAList => write!(f, "invalid workflow: nodes must be an array"),
            Self::EmptyNodes => write!(f, "invalid workflow: nodes must not be empty"),
            Self::NodeNotAnObject { index } => {
                write!(f, "invalid workflow: node {index} must be an object")
            }
            Self::NodeMissingField { index, field } => {
                write!(f, "invalid workflow: node {index} missing {field}")
            }
            Self::MissingConnections => write!(f, "invalid workflow: missing connections"),
            Self::ConnectionsNotAnObject => {
                write!(f, "invalid workflow: connections must be an object")
            }
            Self::DuplicateNodeName { name } => {
                write!(f, "invalid workflow: duplicate node name '{name}'")
            }
            Self::MissingField { field } => {
                write!(f, "workflow not ready for submission: missing {field}")
            }
            Self::Malformed { reason } => write!(f, "invalid workflow: {reason}"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Errors from expanding one service node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTransformError {
    /// The node asks for an operation the service transformer does not know.
    UnsupportedOperation { service: String, operation: String },
    /// A generated node's name is already taken in the workflow.
    DuplicateName { name: String },
    /// A generated node's id is already taken in the workflow.
    DuplicateId { id: String },
}

impl fmt::Display for NodeTransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOperation { service, operation } => {
                write!(f, "unsupported {service} operation: {operation}")
            }
            Self::DuplicateName { name } => write!(f, "node name '{name}' is already in use"),
            Self::DuplicateId { id } => write!(f, "node id '{id}' is already in use"),
        }
    }
}

impl std::error::Error for NodeTransformError {}

/// A graph transform aborted on one node.
///
/// No partial workflow is produced when this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    /// Name of the node whose expansion failed.
    pub node_name: String,
    /// Why the expansion failed.
    pub source: NodeTransformError,
}

impl TransformError {
    /// Attaches the node name to a node-level failure.
    #[must_use]
    pub fn new(node_name: impl Into<String>, source: NodeTransformError) -> Self {
        Self {
            node_name: node_name.into(),
            source,
        }
    }

    /// Returns `(service, operation)` when the failure was an unknown operation.
    #[must_use]
    pub fn unsupported_operation(&self) -> Option<(&str, &str)> {
        match &self.source {
            NodeTransformError::UnsupportedOperation { service, operation } => {
                Some((service.as_str(), operation.as_str()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to transform node '{}': {}", self.node_name, self.source)
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display() {
        let err = SchemaError::NodeMissingField {
            index: 2,
            field: "type",
        };
        assert_eq!(err.to_string(), "invalid workflow: node 2 missing type");
        assert_eq!(
            SchemaError::NotAnObject.to_string(),
            "invalid workflow: must be a JSON object"
        );
    }

    #[test]
    fn transform_error_names_node() {
        let err = TransformError::new(
            "Send Report",
            NodeTransformError::UnsupportedOperation {
                service: "gmail".to_string(),
                operation: "archive".to_string(),
            },
        );
        let display = err.to_string();
        assert!(display.contains("Send Report"));
        assert!(display.contains("unsupported gmail operation: archive"));
        assert_eq!(err.unsupported_operation(), Some(("gmail", "archive")));
    }
}
