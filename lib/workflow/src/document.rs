//! Workflow documents in the engine's JSON shape.
//!
//! A document is a list of nodes plus a connection table keyed by node
//! *name*. Fields the model does not know about are carried through
//! untouched so that unmodified nodes survive a transform verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Canvas coordinates of a node, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position(pub i64, pub i64);

impl Position {
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self(x, y)
    }

    /// Returns the position moved `dx` units to the left.
    #[must_use]
    pub const fn shifted_left(self, dx: i64) -> Self {
        Self(self.0 - dx, self.1)
    }
}

/// A single step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable identifier, preserved across transforms.
    pub id: String,
    /// Engine node type, e.g. `n8n-nodes-base.gmail`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display name; the key used by the connection table.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_fail: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_on_fail: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_between_tries: Option<u64>,
    /// Engine fields not modelled here (`typeVersion`, `credentials`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    /// Creates a node with empty parameters.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        name: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: name.into(),
            parameters: Map::new(),
            position,
            continue_on_fail: None,
            retry_on_fail: None,
            max_tries: None,
            wait_between_tries: None,
            extra: Map::new(),
        }
    }

    /// Replaces the parameters. Non-object values leave them empty.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    /// Lets the engine keep running the workflow when this node fails.
    #[must_use]
    pub fn with_continue_on_fail(mut self) -> Self {
        self.continue_on_fail = Some(true);
        self
    }

    /// Enables node-level retries with a fixed delay between tries.
    #[must_use]
    pub fn with_retry(mut self, max_tries: u32, wait_between_tries_ms: u64) -> Self {
        self.retry_on_fail = Some(true);
        self.max_tries = Some(max_tries);
        self.wait_between_tries = Some(wait_between_tries_ms);
        self
    }

    /// Sets an engine field that has no typed counterpart.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Reads a parameter as text.
    ///
    /// Numbers and booleans are rendered, and resource-locator objects
    /// (`{"__rl": true, "value": ...}`) yield their `value`. Empty strings
    /// count as absent.
    #[must_use]
    pub fn text_parameter(&self, key: &str) -> Option<String> {
        self.parameters.get(key).and_then(value_as_text)
    }

    /// Reads `outer.inner`, e.g. `options.ccList` or `filters.q`.
    #[must_use]
    pub fn nested_text_parameter(&self, outer: &str, inner: &str) -> Option<String> {
        self.parameters
            .get(outer)
            .and_then(|v| v.get(inner))
            .and_then(value_as_text)
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => return map.get("value").and_then(value_as_text),
        Value::Null | Value::Array(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// The `main` port group name.
pub const MAIN_PORT: &str = "main";

fn main_port() -> String {
    MAIN_PORT.to_string()
}

/// One edge endpoint inside the connection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Target node name.
    pub node: String,
    /// Input port group on the target.
    #[serde(rename = "type", default = "main_port")]
    pub port: String,
    /// Input index on the target.
    #[serde(default)]
    pub index: u32,
}

impl ConnectionTarget {
    /// A `main` edge into input 0 of `node`.
    #[must_use]
    pub fn main(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: main_port(),
            index: 0,
        }
    }
}

/// Outgoing edges of one node: port group, then output index, then targets.
pub type NodeConnections = BTreeMap<String, Vec<Vec<ConnectionTarget>>>;

/// Connection table keyed by source node name.
pub type Connections = BTreeMap<String, NodeConnections>;

/// A whole workflow as exchanged with the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Connections,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl WorkflowDocument {
    #[must_use]
    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Adds a `main` edge from output 0 of `source` to `target`.
    pub fn connect(&mut self, source: &str, target: &str) {
        let outputs = self
            .connections
            .entry(source.to_string())
            .or_default()
            .entry(main_port())
            .or_default();
        if outputs.is_empty() {
            outputs.push(Vec::new());
        }
        outputs[0].push(ConnectionTarget::main(target));
    }

    /// Iterates every edge as `(source name, target)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &ConnectionTarget)> {
        self.connections.iter().flat_map(|(source, groups)| {
            groups
                .values()
                .flatten()
                .flatten()
                .map(move |target| (source.as_str(), target))
        })
    }

    /// Serializes into the engine's JSON shape.
    ///
    /// # Errors
    ///
    /// Returns an error if a node carries a non-serializable extra field,
    /// which cannot happen for documents decoded from JSON.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Engine settings applied when a workflow does not specify them.
#[must_use]
pub fn default_settings() -> Map<String, Value> {
    let defaults = json!({
        "saveExecutionProgress": true,
        "saveManualExecutions": true,
        "saveDataErrorExecution": "all",
        "saveDataSuccessExecution": "all",
        "executionOrder": "v1",
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Inserts each default setting the caller did not supply.
///
/// Returns how many keys were added.
pub fn apply_default_settings(settings: &mut Map<String, Value>) -> usize {
    let mut added = 0;
    for (key, value) in default_settings() {
        if !settings.contains_key(&key) {
            settings.insert(key, value);
            added += 1;
        }
    }
    added
}
