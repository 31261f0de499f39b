//! Error types for the integration crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `CredentialError`: Failures looking up a user's credentials
//! - `StoreError`: Failures reading or writing installation records

use mantra_core::InstallationId;
use std::fmt;

/// Errors from credential lookup.
///
/// A user without credentials is not an error; providers return `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The backing store could not be queried.
    LookupFailed { reason: String },
    /// Stored credentials could not be decoded.
    InvalidFormat { reason: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupFailed { reason } => write!(f, "credential lookup failed: {reason}"),
            Self::InvalidFormat { reason } => write!(f, "invalid credential format: {reason}"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Errors from the installation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id exists.
    NotFound { installation_id: InstallationId },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { installation_id } => {
                write!(f, "installation not found: {installation_id}")
            }
            Self::StorageFailed { reason } => write!(f, "storage operation failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}
