//! Core identifiers and error handling shared by the mantra crates.
//!
//! Every other crate in the workspace builds on the typed ids defined here
//! and on the rootcause-backed `Result` alias.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{InstallationId, MantraId, UserId};
