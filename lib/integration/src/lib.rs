//! Collaborators the deployment core consumes but does not implement.
//!
//! This crate provides:
//!
//! - **Credential lookup**: Google OAuth credentials for a user
//! - **Installation store**: Persistence of deployed mantra installations
//!
//! Both are traits; the web layer supplies database-backed implementations.

pub mod credential;
pub mod error;
pub mod installation;

pub use credential::{CredentialProvider, GOOGLE_TOKEN_URI, GoogleCredentials};
pub use error::{CredentialError, StoreError};
pub use installation::{InstallationRecord, InstallationStatus, InstallationStore};
