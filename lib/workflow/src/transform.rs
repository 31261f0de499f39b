//! Whole-graph rewriting.
//!
//! [`GraphTransformer::transform`] replaces every service node with its
//! chain, inserts the synthetic trigger, rewires connections through the
//! name mapping and fills in default settings. It is pure: the input is
//! never modified and the same input always yields the same output.

use crate::document::{
    ConnectionTarget, Connections, Node, WorkflowDocument, apply_default_settings,
};
use crate::error::{NodeTransformError, TransformError};
use crate::service::{NodeMetadata, NodeMetadataMap, ServiceContext, ServiceRegistry};
use crate::trigger::{DEFAULT_TRIGGER_ID, default_trigger};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Default OAuth token endpoint used by mail token nodes.
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default token broker used by calendar, drive and sheets token nodes.
pub const DEFAULT_TOKEN_BROKER_URL: &str = "http://localhost:8000/api/google/token";

/// Endpoints baked into generated token nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    pub oauth_token_url: String,
    pub token_broker_url: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            oauth_token_url: DEFAULT_OAUTH_TOKEN_URL.to_string(),
            token_broker_url: DEFAULT_TOKEN_BROKER_URL.to_string(),
        }
    }
}

/// Original node name to the name that replaces it.
pub type NodeMapping = BTreeMap<String, String>;

/// The result of a successful transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedWorkflow {
    pub workflow: WorkflowDocument,
    pub node_mapping: NodeMapping,
    /// Edges removed because an endpoint had no mapping.
    pub dropped_edges: usize,
}

/// Rewrites workflows using a service registry.
#[derive(Debug, Clone)]
pub struct GraphTransformer {
    registry: ServiceRegistry,
    options: TransformOptions,
}

impl Default for GraphTransformer {
    fn default() -> Self {
        Self::new(ServiceRegistry::google(), TransformOptions::default())
    }
}

impl GraphTransformer {
    #[must_use]
    pub fn new(registry: ServiceRegistry, options: TransformOptions) -> Self {
        Self { registry, options }
    }

    /// Transforms `workflow`, returning the new document and the metadata of
    /// every expanded node.
    ///
    /// # Errors
    ///
    /// Returns `TransformError` naming the first node whose expansion failed.
    /// Nothing is returned for the other nodes in that case.
    pub fn transform(
        &self,
        workflow: &WorkflowDocument,
    ) -> Result<(TransformedWorkflow, NodeMetadataMap), TransformError> {
        let ctx = ServiceContext {
            workflow,
            options: &self.options,
        };

        let mut nodes = Vec::with_capacity(workflow.nodes.len() + 1);
        if workflow.node_by_id(DEFAULT_TRIGGER_ID).is_none() {
            nodes.push(default_trigger());
        }

        let mut mapping = NodeMapping::new();
        let mut metadata = NodeMetadataMap::new();

        for node in &workflow.nodes {
            let Some((kind, transformer)) = self.registry.resolve(&node.node_type) else {
                mapping.insert(node.name.clone(), node.name.clone());
                nodes.push(node.clone());
                continue;
            };

            let expansion =
                transformer(node, &ctx).map_err(|source| TransformError::new(&node.name, source))?;
            let replacement = expansion
                .iter()
                .find(|n| n.id == node.id)
                .or_else(|| expansion.last())
                .map_or_else(|| node.name.clone(), |n| n.name.clone());

            debug!(
                node = %node.name,
                service = kind.service_name(),
                generated = expansion.len(),
                "expanded service node"
            );
            mapping.insert(node.name.clone(), replacement);
            metadata.insert(node.id.clone(), NodeMetadata::for_service(kind));
            nodes.extend(expansion);
        }

        if let Some(err) = find_collision(&nodes) {
            return Err(err);
        }

        let (connections, dropped_edges) = rebuild_connections(&workflow.connections, &mapping);
        if dropped_edges > 0 {
            warn!(dropped_edges, "dropped connections with unknown endpoints");
        }

        let mut settings = workflow.settings.clone();
        apply_default_settings(&mut settings);

        let transformed = TransformedWorkflow {
            workflow: WorkflowDocument {
                name: workflow.name.clone(),
                nodes,
                connections,
                settings,
            },
            node_mapping: mapping,
            dropped_edges,
        };
        Ok((transformed, metadata))
    }
}

/// Reports the first node whose id or name repeats an earlier one.
///
/// Generated helper names are derived from the original name, so a caller
/// node may already hold one.
fn find_collision(nodes: &[Node]) -> Option<TransformError> {
    let mut ids = HashSet::with_capacity(nodes.len());
    let mut names = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            return Some(TransformError::new(
                &node.name,
                NodeTransformError::DuplicateId {
                    id: node.id.clone(),
                },
            ));
        }
        if !names.insert(node.name.as_str()) {
            return Some(TransformError::new(
                &node.name,
                NodeTransformError::DuplicateName {
                    name: node.name.clone(),
                },
            ));
        }
    }
    None
}

/// Rewrites every edge endpoint through `mapping`.
///
/// Returns the new table and the number of edges dropped because the source
/// or target had no mapping.
fn rebuild_connections(connections: &Connections, mapping: &NodeMapping) -> (Connections, usize) {
    let mut rebuilt = Connections::new();
    let mut dropped = 0;

    for (source, groups) in connections {
        let Some(mapped_source) = mapping.get(source) else {
            dropped += groups.values().flatten().map(Vec::len).sum::<usize>();
            continue;
        };

        let entry = rebuilt.entry(mapped_source.clone()).or_default();
        for (port, outputs) in groups {
            let rewired: Vec<Vec<ConnectionTarget>> = outputs
                .iter()
                .map(|targets| {
                    targets
                        .iter()
                        .filter_map(|target| match mapping.get(&target.node) {
                            Some(mapped) => {
                                let mut target = target.clone();
                                target.node = mapped.clone();
                                Some(target)
                            }
                            None => {
                                dropped += 1;
                                None
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
            entry.insert(port.clone(), rewired);
        }
    }

    (rebuilt, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Node, Position};
    use crate::schema::parse_document;
    use crate::service::chain::HTTP_REQUEST_NODE_TYPE;
    use crate::trigger::DEFAULT_TRIGGER_NAME;
    use serde_json::json;

    fn digest_workflow() -> WorkflowDocument {
        parse_document(&json!({
            "name": "Inbox digest",
            "nodes": [
                {"id": "start", "type": "n8n-nodes-base.start", "name": "Start",
                 "parameters": {}, "position": [0, 0]},
                {"id": "n1", "type": "n8n-nodes-base.gmail", "name": "Fetch Mail",
                 "parameters": {"operation": "getAll"}, "position": [400, 0]},
                {"id": "n2", "type": "n8n-nodes-base.set", "name": "Shape",
                 "parameters": {"values": {}}, "position": [700, 0], "typeVersion": 3}
            ],
            "connections": {
                "Start": {"main": [[{"node": "Fetch Mail", "type": "main", "index": 0}]]},
                "Fetch Mail": {"main": [[{"node": "Shape", "type": "main", "index": 0}]]}
            },
            "settings": {"timezone": "Europe/Berlin"}
        }))
        .expect("valid workflow")
    }

    #[test]
    fn preserves_ids_and_passes_unknown_nodes_through() {
        let input = digest_workflow();
        let (out, metadata) = GraphTransformer::default().transform(&input).expect("transform");

        for original in &input.nodes {
            assert!(out.workflow.node_by_id(&original.id).is_some(), "{}", original.id);
        }
        assert_eq!(out.workflow.node_by_id("n2"), input.node_by_id("n2"));
        assert_eq!(
            out.workflow.node_by_id("n1").map(|n| n.node_type.as_str()),
            Some(HTTP_REQUEST_NODE_TYPE)
        );
        assert_eq!(metadata.keys().collect::<Vec<_>>(), vec!["n1"]);
        assert_eq!(metadata["n1"].service, "gmail");
    }

    #[test]
    fn every_original_edge_survives_the_mapping() {
        let input = digest_workflow();
        let (out, _) = GraphTransformer::default().transform(&input).expect("transform");

        assert_eq!(out.dropped_edges, 0);
        for (source, target) in input.edges() {
            let mapped_source = &out.node_mapping[source];
            let mapped_target = &out.node_mapping[&target.node];
            assert!(
                out.workflow
                    .edges()
                    .any(|(s, t)| s == mapped_source && &t.node == mapped_target),
                "{source} -> {}",
                target.node
            );
        }
    }

    #[test]
    fn inserts_one_trigger_and_stays_stable_on_rerun() {
        let transformer = GraphTransformer::default();
        let (first, _) = transformer.transform(&digest_workflow()).expect("transform");
        assert_eq!(first.workflow.nodes[0].name, DEFAULT_TRIGGER_NAME);
        // trigger + start + 3 mail nodes + set
        assert_eq!(first.workflow.nodes.len(), 6);

        let (second, metadata) = transformer.transform(&first.workflow).expect("rerun");
        assert_eq!(second.workflow, first.workflow);
        assert!(metadata.is_empty());
    }

    #[test]
    fn send_expands_to_five_nodes_with_trigger() {
        let input = WorkflowDocument {
            name: "Notify".to_string(),
            nodes: vec![
                Node::new("n1", "n8n-nodes-base.gmail", "Notify", Position::new(300, 0))
                    .with_parameters(json!({"operation": "send", "sendTo": "a@example.com"})),
            ],
            ..WorkflowDocument::default()
        };
        let (out, _) = GraphTransformer::default().transform(&input).expect("transform");

        assert_eq!(out.workflow.nodes.len(), 5);
        let op = out.workflow.node_by_id("n1").expect("operation node");
        assert_eq!(op.node_type, HTTP_REQUEST_NODE_TYPE);
        assert_eq!(op.name, "Notify");
    }

    #[test]
    fn drops_edges_to_unknown_nodes() {
        let mut input = digest_workflow();
        input.connect("Shape", "Ghost");
        input.connect("Phantom", "Shape");

        let (out, _) = GraphTransformer::default().transform(&input).expect("transform");
        assert_eq!(out.dropped_edges, 2);
        assert!(out.workflow.edges().all(|(_, t)| t.node != "Ghost"));
        assert!(!out.workflow.connections.contains_key("Phantom"));
    }

    #[test]
    fn keeps_caller_settings_and_fills_defaults() {
        let (out, _) = GraphTransformer::default()
            .transform(&digest_workflow())
            .expect("transform");
        assert_eq!(out.workflow.settings["timezone"], "Europe/Berlin");
        assert_eq!(out.workflow.settings["saveExecutionProgress"], true);
    }

    #[test]
    fn failure_names_the_node_and_returns_nothing() {
        let mut input = digest_workflow();
        input.nodes[1].parameters.insert("operation".to_string(), json!("archive"));

        let err = GraphTransformer::default()
            .transform(&input)
            .expect_err("archive is unsupported");
        assert_eq!(err.node_name, "Fetch Mail");
        assert_eq!(err.unsupported_operation(), Some(("gmail", "archive")));
    }

    #[test]
    fn generated_names_must_not_shadow_existing_nodes() {
        let input = parse_document(&json!({
            "nodes": [
                {"id": "m1", "type": "n8n-nodes-base.gmail", "name": "Mail",
                 "parameters": {"operation": "getAll"}},
                {"id": "x1", "type": "n8n-nodes-base.set", "name": "Mail - Get Access Token",
                 "parameters": {}}
            ],
            "connections": {}
        }))
        .expect("valid workflow");

        let err = GraphTransformer::default()
            .transform(&input)
            .expect_err("helper name collides");
        assert_eq!(
            err.source,
            NodeTransformError::DuplicateName {
                name: "Mail - Get Access Token".to_string()
            }
        );
        assert_eq!(err.unsupported_operation(), None);
    }

    #[test]
    fn generated_ids_must_not_shadow_existing_nodes() {
        let input = WorkflowDocument {
            nodes: vec![
                Node::new("d1", "n8n-nodes-base.googleDrive", "Files", Position::new(600, 0))
                    .with_parameters(json!({"operation": "list"})),
                Node::new("d1_token", "n8n-nodes-base.set", "Token cache", Position::new(0, 0)),
            ],
            ..WorkflowDocument::default()
        };

        let err = GraphTransformer::default()
            .transform(&input)
            .expect_err("helper id collides");
        assert_eq!(
            err.source,
            NodeTransformError::DuplicateId {
                id: "d1_token".to_string()
            }
        );
    }

    #[test]
    fn empty_registry_only_adds_trigger() {
        let transformer = GraphTransformer::new(ServiceRegistry::empty(), TransformOptions::default());
        let input = digest_workflow();
        let (out, _) = transformer.transform(&input).expect("transform");
        assert_eq!(out.workflow.nodes.len(), input.nodes.len() + 1);
        assert_eq!(
            out.workflow.connections["Fetch Mail"]["main"][0],
            vec![ConnectionTarget::main("Shape")]
        );
    }

    #[test]
    fn transforms_are_independent_across_threads() {
        let transformer = GraphTransformer::default();
        let input = digest_workflow();
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| transformer.transform(&input)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread").expect("transform"))
                .collect()
        });
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
