//! Installation records and their persistence.
//!
//! An installation ties one mantra to one user and to the workflow deployed
//! for them on the engine. At most one live installation exists per
//! `(mantra, user)` pair; the installer checks this through the store.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mantra_core::{InstallationId, MantraId, UserId};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle status of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStatus {
    /// Deployed but not activated on the engine.
    Created,
    /// Deployed and active.
    Active,
    /// Uninstalled.
    Inactive,
}

impl InstallationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Whether the installation still occupies its `(mantra, user)` slot.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Created | Self::Active)
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mantra deployed for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub id: InstallationId,
    pub mantra_id: MantraId,
    pub user_id: UserId,
    /// Id of the workflow on the engine.
    pub external_workflow_id: String,
    pub status: InstallationStatus,
    /// User-supplied installation settings.
    pub config: Value,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstallationRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        mantra_id: MantraId,
        user_id: UserId,
        external_workflow_id: impl Into<String>,
        status: InstallationStatus,
        config: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InstallationId::new(),
            mantra_id,
            user_id,
            external_workflow_id: external_workflow_id.into(),
            status,
            config,
            installed_at: now,
            updated_at: now,
        }
    }

    /// Changes the status and bumps `updated_at`.
    pub fn set_status(&mut self, status: InstallationStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Persists installation records.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::StorageFailed` if the write failed.
    async fn persist_installation(
        &self,
        record: &InstallationRecord,
    ) -> Result<(), Report<StoreError>>;

    /// Finds the most recent record for `(mantra_id, user_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::StorageFailed` if the read failed.
    async fn find_installation(
        &self,
        mantra_id: MantraId,
        user_id: UserId,
    ) -> Result<Option<InstallationRecord>, Report<StoreError>>;

    /// Changes the status of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has this id.
    async fn update_status(
        &self,
        installation_id: InstallationId,
        status: InstallationStatus,
    ) -> Result<(), Report<StoreError>>;
}
