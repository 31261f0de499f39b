//! Install, run and uninstall flows.

use crate::error::InstallError;
use mantra_core::{MantraId, Result, UserId};
use mantra_engine::{EngineTransport, ExecutionResult, LifecycleError, LifecycleOrchestrator};
use mantra_integration::{
    CredentialProvider, GoogleCredentials, InstallationRecord, InstallationStatus,
    InstallationStore,
};
use rootcause::prelude::Report;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

/// A request to deploy a mantra for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub mantra_id: MantraId,
    pub user_id: UserId,
    /// The mantra's workflow document as authored.
    pub workflow: Value,
    /// User-supplied installation settings, stored with the record.
    pub config: Value,
}

fn deployment(report: Report<LifecycleError>) -> Report<InstallError> {
    let kind = report.current_context().clone();
    report.context(InstallError::Deployment(kind))
}

/// Builds the input of a run: the caller's data plus the fields token nodes
/// read from `$json`. Non-object data is wrapped as `{"input": data}`.
fn run_input(credentials: &GoogleCredentials, user_id: UserId, data: Value) -> Value {
    let mut input = match data {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("input".to_string(), other);
            map
        }
    };
    input.extend(credentials.token_exchange_fields());
    input.insert("user_id".to_string(), Value::String(user_id.to_string()));
    Value::Object(input)
}

/// Deploys mantras using the injected collaborators.
pub struct MantraInstaller<C, S, T> {
    credentials: C,
    store: S,
    orchestrator: LifecycleOrchestrator<T>,
}

impl<C, S, T> MantraInstaller<C, S, T>
where
    C: CredentialProvider,
    S: InstallationStore,
    T: EngineTransport,
{
    #[must_use]
    pub fn new(credentials: C, store: S, orchestrator: LifecycleOrchestrator<T>) -> Self {
        Self {
            credentials,
            store,
            orchestrator,
        }
    }

    /// Deploys the mantra's workflow for the user and records the installation.
    ///
    /// The record is `active` when the engine activated the workflow and
    /// `created` otherwise.
    ///
    /// # Errors
    ///
    /// - `AlreadyInstalled` if a live installation exists
    /// - `AuthenticationExpired` if the user has no credentials
    /// - `MissingScopes` if the credentials cannot serve every service node
    /// - `Deployment` if the workflow is invalid or the engine failed
    /// - `Persistence` if the record could not be stored; the deployed
    ///   workflow is deleted first
    #[instrument(skip(self, request), fields(mantra_id = %request.mantra_id, user_id = %request.user_id))]
    pub async fn install(
        &self,
        request: InstallRequest,
    ) -> Result<InstallationRecord, InstallError> {
        let existing = self
            .store
            .find_installation(request.mantra_id, request.user_id)
            .await
            .map_err(|report| report.context(InstallError::Persistence))?;
        if existing.is_some_and(|record| record.status.is_live()) {
            return Err(InstallError::AlreadyInstalled {
                mantra_id: request.mantra_id,
                user_id: request.user_id,
            }
            .into());
        }

        let credentials = self.credentials_for(request.user_id).await?;
        let prepared = self
            .orchestrator
            .prepare(&request.workflow)
            .map_err(deployment)?;

        let missing = credentials.missing_scopes(
            prepared
                .metadata
                .values()
                .flat_map(|meta| meta.required_scopes.iter().map(String::as_str)),
        );
        if !missing.is_empty() {
            warn!(missing = ?missing, "credentials lack required scopes");
            return Err(InstallError::MissingScopes { scopes: missing }.into());
        }

        let created = self
            .orchestrator
            .create_prepared(prepared)
            .await
            .map_err(deployment)?;
        let status = if created.handle.active {
            InstallationStatus::Active
        } else {
            InstallationStatus::Created
        };
        let record = InstallationRecord::new(
            request.mantra_id,
            request.user_id,
            created.handle.external_id,
            status,
            request.config,
        );

        if let Err(report) = self.store.persist_installation(&record).await {
            warn!(
                external_id = %record.external_workflow_id,
                error = %report.current_context(),
                "failed to persist installation, removing deployed workflow"
            );
            if let Err(cleanup) = self.orchestrator.delete(&record.external_workflow_id).await {
                warn!(
                    external_id = %record.external_workflow_id,
                    error = %cleanup.current_context(),
                    "failed to remove orphaned workflow"
                );
            }
            return Err(report.context(InstallError::Persistence));
        }

        info!(
            installation_id = %record.id,
            external_id = %record.external_workflow_id,
            status = %record.status,
            "mantra installed"
        );
        Ok(record)
    }

    /// Runs an installation with the user's current credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationExpired` if the user has no credentials and
    /// `Deployment` if the engine run failed.
    #[instrument(skip(self, record, data), fields(installation_id = %record.id))]
    pub async fn execute(
        &self,
        record: &InstallationRecord,
        data: Value,
    ) -> Result<ExecutionResult, InstallError> {
        let credentials = self.credentials_for(record.user_id).await?;
        let input = run_input(&credentials, record.user_id, data);
        self.orchestrator
            .execute(&record.external_workflow_id, input)
            .await
            .map_err(deployment)
    }

    /// Removes the deployed workflow and marks the installation inactive.
    ///
    /// Engine failures are logged; the record is marked inactive regardless.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the status update failed.
    #[instrument(skip(self, record), fields(installation_id = %record.id))]
    pub async fn uninstall(&self, record: &InstallationRecord) -> Result<(), InstallError> {
        let external_id = &record.external_workflow_id;
        if let Err(report) = self.orchestrator.deactivate(external_id).await {
            warn!(external_id = %external_id, error = %report.current_context(), "deactivation failed");
        }
        if let Err(report) = self.orchestrator.delete(external_id).await {
            warn!(external_id = %external_id, error = %report.current_context(), "deletion failed");
        }

        self.store
            .update_status(record.id, InstallationStatus::Inactive)
            .await
            .map_err(|report| report.context(InstallError::Persistence))?;
        info!("mantra uninstalled");
        Ok(())
    }

    async fn credentials_for(
        &self,
        user_id: UserId,
    ) -> Result<GoogleCredentials, InstallError> {
        let credentials = self
            .credentials
            .get_credentials(user_id)
            .await
            .map_err(|report| report.context(InstallError::CredentialLookup))?;
        credentials.ok_or_else(|| InstallError::AuthenticationExpired { user_id }.into())
    }
}
