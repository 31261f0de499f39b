//! Error handling foundation for mantra deployment.
//!
//! Only the `Result` alias lives here. Each crate owns its error enums and
//! wraps lower reports with `.context()` as they cross a layer boundary.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
