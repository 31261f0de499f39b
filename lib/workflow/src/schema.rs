//! Structural validation of raw workflow documents.
//!
//! `validate` is the gate every caller-supplied document passes before it
//! is transformed. `validate_for_submission` is the looser check run on the
//! prepared document right before it is sent to the engine.

use crate::document::WorkflowDocument;
use crate::error::SchemaError;
use serde_json::Value;
use std::collections::HashSet;

const REQUIRED_NODE_FIELDS: [&str; 3] = ["id", "type", "parameters"];
const SUBMISSION_FIELDS: [&str; 4] = ["name", "nodes", "connections", "settings"];

/// Checks that `doc` has the outline of an engine workflow.
///
/// # Errors
///
/// Returns the first structural problem found: the document is not an
/// object, `nodes` is missing, not a list or empty, a node is not an object
/// or lacks `id`, `type` or `parameters`, or `connections` is missing or
/// not an object.
pub fn validate(doc: &Value) -> Result<(), SchemaError> {
    let object = doc.as_object().ok_or(SchemaError::NotAnObject)?;

    let nodes = object
        .get("nodes")
        .ok_or(SchemaError::MissingNodes)?
        .as_array()
        .ok_or(SchemaError::NodesNotAList)?;
    if nodes.is_empty() {
        return Err(SchemaError::EmptyNodes);
    }

    for (index, node) in nodes.iter().enumerate() {
        let node = node
            .as_object()
            .ok_or(SchemaError::NodeNotAnObject { index })?;
        if let Some(field) = REQUIRED_NODE_FIELDS
            .into_iter()
            .find(|field| !node.contains_key(*field))
        {
            return Err(SchemaError::NodeMissingField { index, field });
        }
    }

    match object.get("connections") {
        None => Err(SchemaError::MissingConnections),
        Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(SchemaError::ConnectionsNotAnObject),
    }
}

/// Validates `doc` and decodes it into a [`WorkflowDocument`].
///
/// Nodes without a name are named after their id.
///
/// # Errors
///
/// Returns any [`validate`] failure, `SchemaError::Malformed` when a field
/// has the wrong type, and `SchemaError::DuplicateNodeName` when two nodes
/// share a name.
pub fn parse_document(doc: &Value) -> Result<WorkflowDocument, SchemaError> {
    validate(doc)?;

    let mut workflow: WorkflowDocument =
        serde_json::from_value(doc.clone()).map_err(|e| SchemaError::Malformed {
            reason: e.to_string(),
        })?;

    let mut seen = HashSet::with_capacity(workflow.nodes.len());
    for node in &mut workflow.nodes {
        if node.name.is_empty() {
            node.name = node.id.clone();
        }
        if !seen.insert(node.name.clone()) {
            return Err(SchemaError::DuplicateNodeName {
                name: node.name.clone(),
            });
        }
    }

    Ok(workflow)
}

/// Checks a prepared document carries every field the engine expects.
///
/// # Errors
///
/// Returns `SchemaError::NotAnObject` or `SchemaError::MissingField`.
pub fn validate_for_submission(doc: &Value) -> Result<(), SchemaError> {
    let object = doc.as_object().ok_or(SchemaError::NotAnObject)?;
    match SUBMISSION_FIELDS
        .into_iter()
        .find(|field| !object.contains_key(*field))
    {
        Some(field) => Err(SchemaError::MissingField { field }),
        None => Ok(()),
    }
}
