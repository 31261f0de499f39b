//! Mantra installation flows.
//!
//! [`MantraInstaller`] ties the credential provider, the installation store
//! and the lifecycle orchestrator together: it deploys a mantra's workflow
//! for one user, runs it with the user's credentials, and tears it down.

pub mod error;
pub mod installer;

pub use error::InstallError;
pub use installer::{InstallRequest, MantraInstaller};
