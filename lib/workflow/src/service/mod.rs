//! Service-node transformers and the registry that selects them.
//!
//! Each supported third-party service turns one authored node into a chain
//! of engine-native nodes: an error normalizer, a token fetcher, an optional
//! preparation step and the HTTP call itself. The registry is resolved once
//! per node by the node's type, so a node can never match two services.

pub mod calendar;
pub mod chain;
pub mod drive;
pub mod error_handler;
pub mod mail;
pub mod sheets;

use crate::document::{Node, WorkflowDocument};
use crate::error::NodeTransformError;
use crate::transform::TransformOptions;
use crate::trigger::is_trigger_type;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub use chain::TokenSource;
pub use error_handler::CanonicalError;

/// Provider name recorded in node metadata.
pub const GOOGLE_PROVIDER: &str = "google";

/// A third-party service with a transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Mail,
    Calendar,
    Drive,
    Sheets,
}

impl ServiceKind {
    pub const ALL: [Self; 4] = [Self::Mail, Self::Calendar, Self::Drive, Self::Sheets];

    /// Short service name used in metadata and error messages.
    #[must_use]
    pub const fn service_name(self) -> &'static str {
        match self {
            Self::Mail => "gmail",
            Self::Calendar => "calendar",
            Self::Drive => "drive",
            Self::Sheets => "sheets",
        }
    }

    /// OAuth scope the user's credentials must grant.
    #[must_use]
    pub const fn required_scope(self) -> &'static str {
        match self {
            Self::Mail => "https://www.googleapis.com/auth/gmail.modify",
            Self::Calendar => "https://www.googleapis.com/auth/calendar",
            Self::Drive => "https://www.googleapis.com/auth/drive",
            Self::Sheets => "https://www.googleapis.com/auth/spreadsheets",
        }
    }

    /// Where the token node obtains an access token.
    #[must_use]
    pub const fn token_source(self) -> TokenSource {
        match self {
            Self::Mail => TokenSource::OAuthRefresh,
            Self::Calendar | Self::Drive | Self::Sheets => TokenSource::Broker,
        }
    }

    /// Registry key matched against a node type's last segment.
    const fn registry_key(self) -> &'static str {
        match self {
            Self::Mail => "gmail",
            Self::Calendar => "googlecalendar",
            Self::Drive => "googledrive",
            Self::Sheets => "googlesheets",
        }
    }

    fn default_transformer(self) -> TransformerFn {
        match self {
            Self::Mail => mail::transform,
            Self::Calendar => calendar::transform,
            Self::Drive => drive::transform,
            Self::Sheets => sheets::transform,
        }
    }
}

/// Read-only inputs available to a service transformer.
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    /// The workflow the node belongs to.
    pub workflow: &'a WorkflowDocument,
    pub options: &'a TransformOptions,
}

/// Expands one service node into its replacement chain.
///
/// The chain must contain a node carrying the original node's id.
pub type TransformerFn =
    fn(&Node, &ServiceContext<'_>) -> Result<Vec<Node>, NodeTransformError>;

/// What a transformed node needs from the user's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub provider: String,
    pub service: String,
    pub required_scopes: Vec<String>,
}

impl NodeMetadata {
    #[must_use]
    pub fn for_service(kind: ServiceKind) -> Self {
        Self {
            provider: GOOGLE_PROVIDER.to_string(),
            service: kind.service_name().to_string(),
            required_scopes: vec![kind.required_scope().to_string()],
        }
    }
}

/// Metadata for every transformed node, keyed by original node id.
pub type NodeMetadataMap = BTreeMap<String, NodeMetadata>;

/// Maps service kinds to transformers and node types to service kinds.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    transformers: HashMap<ServiceKind, TransformerFn>,
}

impl ServiceRegistry {
    /// A registry with no services; every node passes through unchanged.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the mail, calendar, drive and sheets transformers.
    #[must_use]
    pub fn google() -> Self {
        let mut registry = Self::empty();
        for kind in ServiceKind::ALL {
            registry.register(kind, kind.default_transformer());
        }
        registry
    }

    /// Installs `transformer` for `kind`, returning the one it replaced.
    pub fn register(
        &mut self,
        kind: ServiceKind,
        transformer: TransformerFn,
    ) -> Option<TransformerFn> {
        self.transformers.insert(kind, transformer)
    }

    /// Finds the service and transformer for a node type.
    ///
    /// The comparison key is the lowercased segment after the last `.`,
    /// with a trailing `tool` removed. Trigger types never match.
    #[must_use]
    pub fn resolve(&self, node_type: &str) -> Option<(ServiceKind, TransformerFn)> {
        if is_trigger_type(node_type) {
            return None;
        }
        let key = comparison_key(node_type);
        let kind = ServiceKind::ALL
            .into_iter()
            .find(|kind| kind.registry_key() == key)?;
        self.transformers
            .get(&kind)
            .map(|transformer| (kind, *transformer))
    }
}

fn comparison_key(node_type: &str) -> String {
    let segment = node_type.rsplit('.').next().unwrap_or(node_type);
    let key = segment.to_ascii_lowercase();
    match key.strip_suffix("tool") {
        Some(stripped) => stripped.to_string(),
        None => key,
    }
}
