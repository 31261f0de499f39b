//! The synthetic entry point inserted into every deployed workflow.
//!
//! The engine refuses to activate a workflow without a trigger node, and
//! mantra documents are authored without one.

use crate::document::{Node, Position};

/// Id of the synthetic trigger node.
pub const DEFAULT_TRIGGER_ID: &str = "mantra_default_trigger";

/// Name of the synthetic trigger node.
pub const DEFAULT_TRIGGER_NAME: &str = "Mantra Trigger";

/// Engine type of the synthetic trigger node.
pub const MANUAL_TRIGGER_NODE_TYPE: &str = "n8n-nodes-base.manualTrigger";

/// Builds the synthetic trigger node.
#[must_use]
pub fn default_trigger() -> Node {
    Node::new(
        DEFAULT_TRIGGER_ID,
        MANUAL_TRIGGER_NODE_TYPE,
        DEFAULT_TRIGGER_NAME,
        Position::new(0, 0),
    )
    .with_extra("typeVersion", serde_json::json!(1))
}

/// Returns true for engine trigger types such as `gmailTrigger`.
#[must_use]
pub fn is_trigger_type(node_type: &str) -> bool {
    node_type.to_ascii_lowercase().ends_with("trigger")
}
