//! In-memory engine for tests.
//!
//! [`FakeEngine`] behaves like a small engine by default: it assigns ids on
//! create, tracks activation, and answers webhook executions only for active
//! workflows. Replies can be scripted per route to simulate failures.

use crate::error::TransportError;
use crate::transport::{EngineRequest, EngineResponse, EngineTransport, Endpoint};
use async_trait::async_trait;
use mantra_workflow::WorkflowDocument;
use reqwest::Method;
use rootcause::prelude::Report;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Engine operation a request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeRoute {
    Health,
    Create,
    Get,
    Activate,
    Deactivate,
    Delete,
    Execute,
}

impl FakeRoute {
    /// Classifies a request. Unknown paths return `None` and get a 404.
    #[must_use]
    pub fn of(request: &EngineRequest) -> Option<(Self, Option<String>)> {
        match &request.endpoint {
            Endpoint::Root(path) if path == "/healthz" => Some((Self::Health, None)),
            Endpoint::Webhook(path) if path == "/execute" && request.method == Method::POST => {
                Some((Self::Execute, None))
            }
            Endpoint::Api(path) => {
                let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
                match (request.method.as_str(), segments.as_slice()) {
                    ("POST", ["workflows"]) => Some((Self::Create, None)),
                    ("GET", ["workflows", id]) => Some((Self::Get, Some((*id).to_string()))),
                    ("DELETE", ["workflows", id]) => {
                        Some((Self::Delete, Some((*id).to_string())))
                    }
                    ("POST", ["workflows", id, "activate"]) => {
                        Some((Self::Activate, Some((*id).to_string())))
                    }
                    ("POST", ["workflows", id, "deactivate"]) => {
                        Some((Self::Deactivate, Some((*id).to_string())))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// A scripted answer.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Reply(EngineResponse),
    /// Fails below HTTP, as if the engine were down.
    Unreachable,
}

impl FakeReply {
    #[must_use]
    pub fn status(status: u16, body: Value) -> Self {
        Self::Reply(EngineResponse::new(status, body))
    }
}

#[derive(Debug, Clone)]
struct StoredWorkflow {
    body: Value,
    active: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    workflows: BTreeMap<String, StoredWorkflow>,
    next_id: u64,
    next_execution: u64,
    scripts: HashMap<FakeRoute, VecDeque<FakeReply>>,
    requests: Vec<EngineRequest>,
    unreachable: bool,
}

/// A shared in-memory engine. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queues `reply` for the next `times` requests to `route`.
    pub fn script(&self, route: FakeRoute, reply: FakeReply, times: usize) {
        let mut state = self.state();
        let queue = state.scripts.entry(route).or_default();
        queue.extend(std::iter::repeat_n(reply, times));
    }

    /// Makes every request fail below HTTP until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Stores a workflow directly and returns its id.
    pub fn insert_workflow(&self, document: &WorkflowDocument, active: bool) -> String {
        let body = serde_json::to_value(document).unwrap_or(Value::Null);
        let mut state = self.state();
        let id = state.allocate_id();
        state
            .workflows
            .insert(id.clone(), StoredWorkflow { body, active });
        id
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<EngineRequest> {
        self.state().requests.clone()
    }

    /// Number of requests received for `route`.
    #[must_use]
    pub fn count(&self, route: FakeRoute) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| FakeRoute::of(r).is_some_and(|(found, _)| found == route))
            .count()
    }

    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        self.state().workflows.contains_key(id)
    }

    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.state().workflows.get(id).is_some_and(|w| w.active)
    }
}

fn not_found(message: &str) -> EngineResponse {
    EngineResponse::new(404, json!({ "message": message }))
}

impl FakeState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn simulate(&mut self, route: FakeRoute, id: Option<String>, body: Option<&Value>) -> EngineResponse {
        let id = id.unwrap_or_default();
        match route {
            FakeRoute::Health => EngineResponse::new(200, json!({"status": "ok", "version": "1.0.0-fake"})),
            FakeRoute::Create => {
                let new_id = self.allocate_id();
                let mut stored = body.cloned().unwrap_or_else(|| json!({}));
                if let Value::Object(map) = &mut stored {
                    map.insert("id".to_string(), json!(new_id));
                    map.insert("active".to_string(), json!(false));
                }
                self.workflows.insert(
                    new_id,
                    StoredWorkflow {
                        body: stored.clone(),
                        active: false,
                    },
                );
                EngineResponse::new(200, stored)
            }
            FakeRoute::Get => match self.workflows.get(&id) {
                Some(workflow) => {
                    let mut body = workflow.body.clone();
                    if let Value::Object(map) = &mut body {
                        map.insert("id".to_string(), json!(id));
                        map.insert("active".to_string(), json!(workflow.active));
                    }
                    EngineResponse::new(200, body)
                }
                None => not_found("Workflow not found"),
            },
            FakeRoute::Activate | FakeRoute::Deactivate => match self.workflows.get_mut(&id) {
                Some(workflow) => {
                    workflow.active = route == FakeRoute::Activate;
                    EngineResponse::new(200, json!({"id": id, "active": workflow.active}))
                }
                None => not_found("Workflow not found"),
            },
            FakeRoute::Delete => match self.workflows.remove(&id) {
                Some(_) => EngineResponse::new(200, json!({"id": id})),
                None => not_found("Workflow not found"),
            },
            FakeRoute::Execute => {
                let workflow_id = body
                    .and_then(|b| b.get("workflowId"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !self.workflows.get(workflow_id).is_some_and(|w| w.active) {
                    return not_found("The requested webhook is not registered");
                }
                self.next_execution += 1;
                let data = body.and_then(|b| b.get("data")).cloned().unwrap_or(Value::Null);
                EngineResponse::new(
                    200,
                    json!({"executionId": format!("exec-{}", self.next_execution), "data": data}),
                )
            }
        }
    }
}

#[async_trait]
impl EngineTransport for FakeEngine {
    async fn send(&self, request: &EngineRequest) -> Result<EngineResponse, Report<TransportError>> {
        let mut state = self.state();
        state.requests.push(request.clone());

        let unreachable = || TransportError::Connect {
            reason: "connection refused".to_string(),
        };
        if state.unreachable {
            return Err(unreachable().into());
        }

        let Some((route, id)) = FakeRoute::of(request) else {
            return Ok(not_found("Not found"));
        };
        let scripted = state.scripts.get_mut(&route).and_then(VecDeque::pop_front);
        match scripted {
            Some(FakeReply::Reply(response)) => Ok(response),
            Some(FakeReply::Unreachable) => Err(unreachable().into()),
            None => Ok(state.simulate(route, id, request.body.as_ref())),
        }
    }
}
