//! Workflow lifecycle on the engine.
//!
//! The engine owns workflow state (`created → active ⇄ inactive → deleted`);
//! the orchestrator only drives transitions. Every call shares one
//! [`BackoffPolicy`]. A 401 is never retried.

use crate::backoff::BackoffPolicy;
use crate::config::EngineConfig;
use crate::error::{LifecycleError, TransportError};
use crate::transport::{EngineRequest, EngineResponse, EngineTransport, Endpoint, HttpTransport};
use chrono::Utc;
use mantra_workflow::{
    CanonicalError, GraphTransformer, NodeMetadataMap, SchemaError, ServiceRegistry,
    WorkflowDocument, parse_document, validate_for_submission,
};
use reqwest::Method;
use rootcause::prelude::Report;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// A workflow deployed on the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalWorkflowHandle {
    pub external_id: String,
    pub active: bool,
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
    pub version: Option<String>,
    pub error: Option<String>,
}

/// Engine-side state of one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowState {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// A validated, transformed document ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedWorkflow {
    pub document: WorkflowDocument,
    pub metadata: NodeMetadataMap,
    pub dropped_edges: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedWorkflow {
    pub handle: ExternalWorkflowHandle,
    pub metadata: NodeMetadataMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub execution_id: Option<String>,
    pub output: Value,
}

/// Why the last attempt of a call failed.
#[derive(Debug, Clone)]
struct Failure {
    status: Option<u16>,
    detail: String,
    unreachable: bool,
}

impl Failure {
    fn from_response(response: &EngineResponse) -> Self {
        Self {
            status: Some(response.status),
            detail: response.message(),
            unreachable: false,
        }
    }

    fn from_transport(err: &TransportError) -> Self {
        Self {
            status: None,
            detail: err.to_string(),
            unreachable: matches!(err, TransportError::Connect { .. }),
        }
    }

    fn into_error(self, operation: fn(Option<u16>, String) -> LifecycleError) -> LifecycleError {
        match self.status {
            Some(429) => LifecycleError::RateLimited {
                detail: self.detail,
            },
            None if self.unreachable => LifecycleError::ServiceUnavailable {
                detail: self.detail,
            },
            status => operation(status, self.detail),
        }
    }
}

fn creation(status: Option<u16>, detail: String) -> LifecycleError {
    LifecycleError::Creation { status, detail }
}

fn retrieval(status: Option<u16>, detail: String) -> LifecycleError {
    LifecycleError::Retrieval { status, detail }
}

fn activation(status: Option<u16>, detail: String) -> LifecycleError {
    LifecycleError::Activation { status, detail }
}

fn execution(status: Option<u16>, detail: String) -> LifecycleError {
    LifecycleError::Execution { status, detail }
}

fn deactivation(status: Option<u16>, detail: String) -> LifecycleError {
    LifecycleError::Deactivation { status, detail }
}

fn deletion(status: Option<u16>, detail: String) -> LifecycleError {
    LifecycleError::Deletion { status, detail }
}

fn server_side_or_throttled(status: u16) -> bool {
    status >= 500 || status == 429
}

fn not_missing(status: u16) -> bool {
    status != 404
}

/// Engine ids may be strings or numbers.
fn engine_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn workflow_path(id: &str) -> Endpoint {
    Endpoint::Api(format!("/workflows/{id}"))
}

/// Drives workflows through their engine lifecycle.
pub struct LifecycleOrchestrator<T> {
    transport: Arc<T>,
    transformer: GraphTransformer,
    backoff: BackoffPolicy,
}

impl<T> Clone for LifecycleOrchestrator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            transformer: self.transformer.clone(),
            backoff: self.backoff,
        }
    }
}

impl LifecycleOrchestrator<HttpTransport> {
    /// Builds an HTTP-backed orchestrator with the Google service registry.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn from_config(config: &EngineConfig) -> Result<Self, Report<TransportError>> {
        let transport = HttpTransport::new(config)?;
        let transformer = GraphTransformer::new(ServiceRegistry::google(), config.transform_options());
        Ok(Self::new(transport, transformer, config.backoff()))
    }
}

impl<T: EngineTransport> LifecycleOrchestrator<T> {
    #[must_use]
    pub fn new(transport: T, transformer: GraphTransformer, backoff: BackoffPolicy) -> Self {
        Self {
            transport: Arc::new(transport),
            transformer,
            backoff,
        }
    }

    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Checks that the engine answers. Never fails; problems are reported in the status.
    #[instrument(skip(self))]
    pub async fn check_connection(&self) -> ConnectionStatus {
        let request = EngineRequest::new(Method::GET, Endpoint::Root("/healthz".to_string()));
        let started = Instant::now();
        let result = self.transport.send(&request).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let status = match result {
            Ok(response) if response.is_success() => ConnectionStatus {
                connected: true,
                latency_ms: Some(latency_ms),
                version: response
                    .body
                    .get("version")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                error: None,
            },
            Ok(response) => ConnectionStatus {
                connected: false,
                latency_ms: Some(latency_ms),
                version: None,
                error: Some(response.message()),
            },
            Err(report) => ConnectionStatus {
                connected: false,
                latency_ms: None,
                version: None,
                error: Some(report.current_context().to_string()),
            },
        };
        debug!(connected = status.connected, "engine health check");
        status
    }

    /// Validates and transforms a raw document for submission.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWorkflow` for schema violations and `Transform` when a
    /// service node cannot be expanded.
    pub fn prepare(&self, workflow: &Value) -> Result<PreparedWorkflow, Report<LifecycleError>> {
        let document = parse_document(workflow).map_err(LifecycleError::InvalidWorkflow)?;
        let (transformed, metadata) = self
            .transformer
            .transform(&document)
            .map_err(LifecycleError::Transform)?;

        let mut document = transformed.workflow;
        if document.name.trim().is_empty() {
            document.name = format!("Mantra workflow {}", Utc::now().to_rfc3339());
        }

        let value = document.to_value().map_err(|e| {
            LifecycleError::InvalidWorkflow(SchemaError::Malformed {
                reason: e.to_string(),
            })
        })?;
        validate_for_submission(&value).map_err(LifecycleError::InvalidWorkflow)?;

        Ok(PreparedWorkflow {
            document,
            metadata,
            dropped_edges: transformed.dropped_edges,
        })
    }

    /// Prepares, creates and (best effort) activates a workflow.
    ///
    /// # Errors
    ///
    /// See [`prepare`](Self::prepare) and [`create_prepared`](Self::create_prepared).
    pub async fn create(&self, workflow: &Value) -> Result<CreatedWorkflow, Report<LifecycleError>> {
        let prepared = self.prepare(workflow)?;
        self.create_prepared(prepared).await
    }

    /// Submits a prepared workflow, then tries to activate it.
    ///
    /// Activation failures are logged and reflected in `handle.active`.
    ///
    /// # Errors
    ///
    /// Returns `Creation` once retries are exhausted or on a non-retryable
    /// status, and `InvalidResponse` if the engine returned no id.
    #[instrument(skip(self, prepared), fields(name = %prepared.document.name))]
    pub async fn create_prepared(
        &self,
        prepared: PreparedWorkflow,
    ) -> Result<CreatedWorkflow, Report<LifecycleError>> {
        let body = prepared.document.to_value().map_err(|e| LifecycleError::Creation {
            status: None,
            detail: e.to_string(),
        })?;
        let request =
            EngineRequest::new(Method::POST, Endpoint::Api("/workflows".to_string())).with_body(body);
        let response = self
            .send_with_retry(&request, server_side_or_throttled)
            .await
            .map_err(|f| f.into_error(creation))?;

        let external_id =
            engine_id(response.body.get("id")).ok_or_else(|| LifecycleError::InvalidResponse {
                detail: "workflow creation response has no id".to_string(),
            })?;
        info!(external_id = %external_id, nodes = prepared.document.nodes.len(), "workflow created");

        let active = match self.activate(&external_id).await {
            Ok(()) => true,
            Err(report) => {
                warn!(
                    external_id = %external_id,
                    error = %report.current_context(),
                    "workflow created but activation failed"
                );
                false
            }
        };

        Ok(CreatedWorkflow {
            handle: ExternalWorkflowHandle {
                external_id,
                active,
            },
            metadata: prepared.metadata,
        })
    }

    /// Reads a workflow's engine-side state.
    ///
    /// # Errors
    ///
    /// Returns `Retrieval` with the engine status, e.g. 404 for unknown ids.
    #[instrument(skip(self))]
    pub async fn get_workflow(&self, id: &str) -> Result<WorkflowState, Report<LifecycleError>> {
        Ok(self
            .fetch_state(id)
            .await
            .map_err(|f| f.into_error(retrieval))?)
    }

    /// Activates a workflow unless the engine already reports it active.
    ///
    /// # Errors
    ///
    /// Returns `Activation` with the last status and engine message. A 401 is
    /// returned without retrying.
    #[instrument(skip(self))]
    pub async fn activate(&self, id: &str) -> Result<(), Report<LifecycleError>> {
        let state = self
            .fetch_state(id)
            .await
            .map_err(|f| f.into_error(activation))?;
        if state.active {
            debug!("workflow already active");
            return Ok(());
        }
        self.post_activate(id).await
    }

    /// Runs an active workflow through the execute webhook.
    ///
    /// Server errors, throttling and transport failures are retried under the
    /// shared policy. A 404 means the webhook is not registered; the workflow
    /// is activated once more, skipping the state check, and the call is
    /// repeated once.
    ///
    /// # Errors
    ///
    /// Returns `Activation` if the workflow cannot be activated, `Execution`
    /// for failed runs, and `AuthenticationExpired` or `RateLimited` when the
    /// run output carries a normalized third-party error.
    #[instrument(skip(self, data))]
    pub async fn execute(&self, id: &str, data: Value) -> Result<ExecutionResult, Report<LifecycleError>> {
        self.activate(id).await?;

        let request = EngineRequest::new(Method::POST, Endpoint::Webhook("/execute".to_string()))
            .with_body(json!({ "workflowId": id, "data": data }));

        let response = match self.send_with_retry(&request, server_side_or_throttled).await {
            Err(failure) if failure.status == Some(404) => {
                info!("execute webhook missing, reactivating workflow");
                self.post_activate(id).await?;
                self.send_with_retry(&request, server_side_or_throttled)
                    .await
                    .map_err(|f| f.into_error(execution))?
            }
            other => other.map_err(|f| f.into_error(execution))?,
        };

        let execution_id = engine_id(response.body.get("executionId"));
        let output = match response.body {
            Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };

        if let Some(canonical) = CanonicalError::from_output(&output) {
            if canonical.is_authentication_failure() {
                return Err(LifecycleError::AuthenticationExpired {
                    detail: canonical.error,
                }
                .into());
            }
            if canonical.is_rate_limited() {
                return Err(LifecycleError::RateLimited {
                    detail: canonical.error,
                }
                .into());
            }
        }

        info!(execution_id = ?execution_id, "workflow executed");
        Ok(ExecutionResult {
            execution_id,
            output,
        })
    }

    /// Deactivates a workflow with a single request.
    ///
    /// # Errors
    ///
    /// Returns `Deactivation` with the engine status.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: &str) -> Result<(), Report<LifecycleError>> {
        let request = EngineRequest::new(Method::POST, Endpoint::Api(format!("/workflows/{id}/deactivate")));
        self.send_once(&request)
            .await
            .map_err(|f| f.into_error(deactivation))?;
        info!("workflow deactivated");
        Ok(())
    }

    /// Deletes a workflow with a single request.
    ///
    /// # Errors
    ///
    /// Returns `Deletion` with the engine status.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), Report<LifecycleError>> {
        let request = EngineRequest::new(Method::DELETE, workflow_path(id));
        self.send_once(&request)
            .await
            .map_err(|f| f.into_error(deletion))?;
        info!("workflow deleted");
        Ok(())
    }

    async fn post_activate(&self, id: &str) -> Result<(), Report<LifecycleError>> {
        let request = EngineRequest::new(Method::POST, Endpoint::Api(format!("/workflows/{id}/activate")));
        self.send_with_retry(&request, not_missing)
            .await
            .map_err(|f| f.into_error(activation))?;
        info!(workflow_id = %id, "workflow activated");
        Ok(())
    }

    async fn fetch_state(&self, id: &str) -> Result<WorkflowState, Failure> {
        let request = EngineRequest::new(Method::GET, workflow_path(id));
        let response = self
            .send_with_retry(&request, server_side_or_throttled)
            .await?;
        let body = &response.body;
        Ok(WorkflowState {
            id: engine_id(body.get("id")).unwrap_or_else(|| id.to_string()),
            name: body
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            active: body.get("active").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    async fn send_once(&self, request: &EngineRequest) -> Result<EngineResponse, Failure> {
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(Failure::from_response(&response)),
            Err(report) => Err(Failure::from_transport(report.current_context())),
        }
    }

    /// Sends `request` until it succeeds, a status fails `retry_status`, or
    /// the policy runs out of attempts. Transport failures are always retried.
    async fn send_with_retry(
        &self,
        request: &EngineRequest,
        retry_status: fn(u16) -> bool,
    ) -> Result<EngineResponse, Failure> {
        let mut attempt = 0;
        loop {
            let failure = match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };
            let retryable = failure
                .status
                .is_none_or(|status| status != 401 && retry_status(status));
            if !retryable || !self.backoff.has_attempt_after(attempt) {
                return Err(failure);
            }

            warn!(
                path = request.endpoint.path(),
                attempt = attempt + 1,
                status = ?failure.status,
                detail = %failure.detail,
                "engine call failed, retrying"
            );
            self.backoff.wait(attempt).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEngine, FakeReply, FakeRoute};

    fn orchestrator(engine: &FakeEngine, attempts: u32) -> LifecycleOrchestrator<FakeEngine> {
        LifecycleOrchestrator::new(
            engine.clone(),
            GraphTransformer::default(),
            BackoffPolicy::immediate(attempts),
        )
    }

    fn mail_workflow() -> Value {
        json!({
            "name": "Morning digest",
            "nodes": [{
                "id": "n1",
                "name": "Fetch mail",
                "type": "n8n-nodes-base.gmail",
                "parameters": {"operation": "getAll"},
                "position": [200, 0]
            }],
            "connections": {}
        })
    }

    fn stored(engine: &FakeEngine, active: bool) -> String {
        engine.insert_workflow(
            &WorkflowDocument {
                name: "stored".to_string(),
                ..WorkflowDocument::default()
            },
            active,
        )
    }

    #[tokio::test]
    async fn activation_is_idempotent() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, false);

        orchestrator.activate(&id).await.unwrap();
        orchestrator.activate(&id).await.unwrap();

        assert_eq!(engine.count(FakeRoute::Activate), 1);
        assert!(engine.is_active(&id));
    }

    #[tokio::test]
    async fn unauthorized_activation_is_not_retried() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 5);
        let id = stored(&engine, false);
        engine.script(
            FakeRoute::Activate,
            FakeReply::status(401, json!({"message": "unauthorized"})),
            5,
        );

        let err = orchestrator.activate(&id).await.unwrap_err();
        assert_eq!(engine.count(FakeRoute::Activate), 1);
        assert!(err.current_context().requires_reauthentication());
        assert!(matches!(
            err.current_context(),
            LifecycleError::Activation { status: Some(401), .. }
        ));
    }

    #[tokio::test]
    async fn server_errors_use_every_attempt() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, false);
        engine.script(FakeRoute::Activate, FakeReply::status(500, Value::Null), 10);

        let err = orchestrator.activate(&id).await.unwrap_err();
        assert_eq!(engine.count(FakeRoute::Activate), 3);
        assert_eq!(err.current_context().status(), Some(500));
        assert!(err.current_context().is_retryable());
    }

    #[tokio::test]
    async fn bad_request_message_is_surfaced() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, false);
        engine.script(
            FakeRoute::Activate,
            FakeReply::status(400, json!({"message": "Workflow has no trigger node"})),
            3,
        );

        let err = orchestrator.activate(&id).await.unwrap_err();
        assert_eq!(
            err.current_context(),
            &LifecycleError::Activation {
                status: Some(400),
                detail: "Workflow has no trigger node".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn activating_unknown_workflow_fails_fast() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);

        let err = orchestrator.activate("missing").await.unwrap_err();
        assert_eq!(err.current_context().status(), Some(404));
        assert_eq!(engine.count(FakeRoute::Get), 1);
        assert_eq!(engine.count(FakeRoute::Activate), 0);
    }

    #[tokio::test]
    async fn missing_webhook_triggers_one_reactivation() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, true);
        engine.script(
            FakeRoute::Execute,
            FakeReply::status(404, json!({"message": "webhook not registered"})),
            1,
        );

        let result = orchestrator.execute(&id, json!({"q": "x"})).await.unwrap();
        assert_eq!(result.output, json!({"q": "x"}));
        assert!(result.execution_id.is_some());
        assert_eq!(engine.count(FakeRoute::Execute), 2);
        assert_eq!(engine.count(FakeRoute::Activate), 1);
    }

    #[tokio::test]
    async fn second_missing_webhook_is_an_execution_error() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, true);
        engine.script(FakeRoute::Execute, FakeReply::status(404, Value::Null), 2);

        let err = orchestrator.execute(&id, json!({})).await.unwrap_err();
        assert_eq!(engine.count(FakeRoute::Execute), 2);
        assert!(matches!(
            err.current_context(),
            LifecycleError::Execution { status: Some(404), .. }
        ));
    }

    #[tokio::test]
    async fn execute_retries_server_errors() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, true);
        engine.script(FakeRoute::Execute, FakeReply::status(503, Value::Null), 1);

        let result = orchestrator.execute(&id, json!({"n": 1})).await.unwrap();
        assert_eq!(result.output, json!({"n": 1}));
        assert_eq!(engine.count(FakeRoute::Execute), 2);
        assert_eq!(engine.count(FakeRoute::Activate), 0);
    }

    #[tokio::test]
    async fn throttling_on_every_attempt_is_rate_limited() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, false);
        engine.script(
            FakeRoute::Activate,
            FakeReply::status(429, json!({"message": "slow down"})),
            3,
        );

        let err = orchestrator.activate(&id).await.unwrap_err();
        assert_eq!(engine.count(FakeRoute::Activate), 3);
        assert_eq!(
            err.current_context(),
            &LifecycleError::RateLimited {
                detail: "slow down".to_string()
            }
        );
        assert!(err.current_context().is_retryable());
    }

    #[tokio::test]
    async fn canonical_rate_limit_in_output_is_rate_limited() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, true);
        engine.script(
            FakeRoute::Execute,
            FakeReply::status(
                200,
                json!({
                    "executionId": "e9",
                    "data": [{"json": {"error": "Rate limit exceeded. Please try again later.", "code": 429, "retry": true}}]
                }),
            ),
            1,
        );

        let err = orchestrator.execute(&id, json!({})).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            LifecycleError::RateLimited { .. }
        ));
        assert_eq!(engine.count(FakeRoute::Execute), 1);
    }

    #[tokio::test]
    async fn unreachable_engine_fails_create_after_every_attempt() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        engine.set_unreachable(true);

        let err = orchestrator.create(&mail_workflow()).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            LifecycleError::ServiceUnavailable { .. }
        ));
        assert_eq!(engine.count(FakeRoute::Create), 3);
        assert_eq!(engine.requests().len(), 3);
    }

    #[tokio::test]
    async fn unreachable_engine_fails_activation_after_every_attempt() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 2);
        let id = stored(&engine, false);
        engine.script(FakeRoute::Activate, FakeReply::Unreachable, 2);

        let err = orchestrator.activate(&id).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            LifecycleError::ServiceUnavailable { .. }
        ));
        assert_eq!(engine.count(FakeRoute::Activate), 2);
        assert!(!engine.is_active(&id));
    }

    #[tokio::test]
    async fn canonical_auth_error_in_output_needs_reauthentication() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, true);
        engine.script(
            FakeRoute::Execute,
            FakeReply::status(
                200,
                json!({
                    "executionId": 17,
                    "data": [{"json": {"error": "Authentication failed", "code": 401, "retry": false}}]
                }),
            ),
            1,
        );

        let err = orchestrator.execute(&id, json!({})).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            LifecycleError::AuthenticationExpired { .. }
        ));
        assert!(err.current_context().requires_reauthentication());
    }

    #[tokio::test]
    async fn create_submits_transformed_workflow_and_activates() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);

        let created = orchestrator.create(&mail_workflow()).await.unwrap();
        assert!(created.handle.active);
        assert!(engine.is_active(&created.handle.external_id));
        assert!(created.metadata.contains_key("n1"));

        let submitted = engine
            .requests()
            .into_iter()
            .find(|r| FakeRoute::of(r).is_some_and(|(route, _)| route == FakeRoute::Create))
            .and_then(|r| r.body)
            .expect("create request");
        let nodes = submitted["nodes"].as_array().unwrap();
        assert!(nodes.iter().any(|n| n["id"] == "mantra_default_trigger"));
        assert!(nodes.iter().any(|n| n["id"] == "n1" && n["type"] == "n8n-nodes-base.httpRequest"));
        assert_eq!(submitted["settings"]["executionOrder"], "v1");
    }

    #[tokio::test]
    async fn create_survives_failed_activation() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 2);
        engine.script(FakeRoute::Activate, FakeReply::status(500, Value::Null), 2);

        let created = orchestrator.create(&mail_workflow()).await.unwrap();
        assert!(!created.handle.active);
        assert!(engine.exists(&created.handle.external_id));
    }

    #[tokio::test]
    async fn create_retries_server_errors_only() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        engine.script(FakeRoute::Create, FakeReply::status(503, Value::Null), 1);
        assert!(orchestrator.create(&mail_workflow()).await.is_ok());
        assert_eq!(engine.count(FakeRoute::Create), 2);

        engine.script(
            FakeRoute::Create,
            FakeReply::status(422, json!({"message": "nodes invalid"})),
            1,
        );
        let err = orchestrator.create(&mail_workflow()).await.unwrap_err();
        assert_eq!(engine.count(FakeRoute::Create), 3);
        assert_eq!(
            err.current_context(),
            &LifecycleError::Creation {
                status: Some(422),
                detail: "nodes invalid".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn invalid_documents_never_reach_the_engine() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);

        let err = orchestrator
            .create(&json!({"nodes": [], "connections": {}}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            LifecycleError::InvalidWorkflow(SchemaError::EmptyNodes)
        ));

        let err = orchestrator
            .create(&json!({
                "nodes": [{"id": "n1", "name": "Archive", "type": "n8n-nodes-base.gmail",
                           "parameters": {"operation": "archive"}}],
                "connections": {}
            }))
            .await
            .unwrap_err();
        assert_eq!(err.current_context().unsupported_operation(), Some(("gmail", "archive")));
        assert!(engine.requests().is_empty());
    }

    #[test]
    fn prepare_names_unnamed_workflows() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 1);
        let mut workflow = mail_workflow();
        workflow["name"] = json!("");

        let prepared = orchestrator.prepare(&workflow).unwrap();
        assert!(prepared.document.name.starts_with("Mantra workflow "));
        assert_eq!(prepared.dropped_edges, 0);
    }

    #[tokio::test]
    async fn unreachable_engine_is_reported() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 2);
        engine.set_unreachable(true);

        let status = orchestrator.check_connection().await;
        assert!(!status.connected);
        assert!(status.error.is_some());

        let err = orchestrator.get_workflow("1").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            LifecycleError::ServiceUnavailable { .. }
        ));
        assert_eq!(engine.requests().len(), 3);
    }

    #[tokio::test]
    async fn healthy_engine_reports_version() {
        let engine = FakeEngine::new();
        let status = orchestrator(&engine, 1).check_connection().await;
        assert!(status.connected);
        assert_eq!(status.version.as_deref(), Some("1.0.0-fake"));
    }

    #[tokio::test]
    async fn deactivate_and_delete_are_single_requests() {
        let engine = FakeEngine::new();
        let orchestrator = orchestrator(&engine, 3);
        let id = stored(&engine, true);

        orchestrator.deactivate(&id).await.unwrap();
        assert!(!engine.is_active(&id));
        let state = orchestrator.get_workflow(&id).await.unwrap();
        assert_eq!(state.name, "stored");
        assert!(!state.active);

        orchestrator.delete(&id).await.unwrap();
        let err = orchestrator.delete(&id).await.unwrap_err();
        assert_eq!(engine.count(FakeRoute::Delete), 2);
        assert!(matches!(
            err.current_context(),
            LifecycleError::Deletion { status: Some(404), .. }
        ));
    }
}
