//! Error types for the installer crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `InstallError`: An install, execute or uninstall flow failed
//!
//! Collaborator failures keep their original report underneath.

use mantra_core::{MantraId, UserId};
use mantra_engine::LifecycleError;
use std::fmt;

/// Errors from installation flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// The user already has a live installation of this mantra.
    AlreadyInstalled { mantra_id: MantraId, user_id: UserId },
    /// The user has no usable Google credentials.
    AuthenticationExpired { user_id: UserId },
    /// The credentials lack scopes the workflow needs.
    MissingScopes { scopes: Vec<String> },
    /// Credentials could not be loaded.
    CredentialLookup,
    /// The engine rejected or failed an operation.
    Deployment(LifecycleError),
    /// The installation record could not be written.
    Persistence,
}

impl InstallError {
    /// Whether the user must reconnect their Google account.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        match self {
            Self::AuthenticationExpired { .. } | Self::MissingScopes { .. } => true,
            Self::Deployment(err) => err.requires_reauthentication(),
            _ => false,
        }
    }
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInstalled { mantra_id, user_id } => {
                write!(f, "mantra {mantra_id} is already installed for {user_id}")
            }
            Self::AuthenticationExpired { user_id } => {
                write!(f, "google credentials for {user_id} are missing or expired")
            }
            Self::MissingScopes { scopes } => {
                write!(f, "missing required scopes: {}", scopes.join(", "))
            }
            Self::CredentialLookup => write!(f, "credential lookup failed"),
            Self::Deployment(err) => write!(f, "deployment failed: {err}"),
            Self::Persistence => write!(f, "failed to persist installation"),
        }
    }
}

impl std::error::Error for InstallError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reauthentication_follows_engine_status() {
        let expired = InstallError::Deployment(LifecycleError::AuthenticationExpired {
            detail: "revoked".to_string(),
        });
        assert!(expired.requires_reauthentication());
        assert!(
            InstallError::MissingScopes {
                scopes: vec!["https://mail.google.com/".to_string()]
            }
            .requires_reauthentication()
        );
        assert!(!InstallError::Persistence.requires_reauthentication());
    }

    #[test]
    fn display_lists_scopes() {
        let err = InstallError::MissingScopes {
            scopes: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "missing required scopes: a, b");
    }
}
