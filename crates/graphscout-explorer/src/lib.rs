//! Graphscout explorer: asynchronous incremental graph builders
//!
//! Two builders populate a shared [`GraphStore`](graphscout_graph::GraphStore)
//! from a remote hierarchical data source:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       INCREMENTAL BUILD                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────┐  resolve / pages  ┌─────────────┐                  │
//! │  │  Entity  │◄─────────────────►│   Remote    │                  │
//! │  │ Explorer │                   │   Source    │                  │
//! │  └────┬─────┘                   └─────────────┘                  │
//! │       │ nodes / links                 ▲                          │
//! │       ▼                               │ schema                   │
//! │  ┌──────────┐                   ┌─────┴──────┐                   │
//! │  │  Graph   │◄──────────────────│   Schema   │                   │
//! │  │  Store   │   bulk build      │  Explorer  │                   │
//! │  └────┬─────┘                   └────────────┘                   │
//! │       │ snapshot                                                 │
//! │       ▼                                                          │
//! │  visibility engine → renderer                                    │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`Explorer`] loads lazily: entities resolve on demand, relations load
//! on the first expansion of a node, and multi-valued relations are paged
//! with "load more" sentinel nodes. The [`SchemaExplorer`](schema::SchemaExplorer)
//! builds the type-level graph eagerly in one pass.
//!
//! Soft failures (an entity that never resolves, a vetoed insertion, an empty
//! collection) produce empty results, never errors; only missing relation
//! metadata is a hard [`ExplorerError`].

pub mod collection;
pub mod explorer;
pub mod schema;

use async_trait::async_trait;
use graphscout_graph::Node;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use explorer::Explorer;
pub use schema::{Association, EntityType, SchemaExplorer, SchemaSource};

// ============================================================================
// Core Types
// ============================================================================

/// Path of an entity or collection within the remote source.
pub type EntityPath = String;

/// Outcome of a successful entity resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Stable key for the entity; doubles as the node key.
    pub key: String,
    /// The now-absolute path of the entity.
    pub path: EntityPath,
}

impl ResolvedEntity {
    /// The common case: the absolute path is the stable key.
    pub fn at(path: impl Into<EntityPath>) -> Self {
        let path = path.into();
        Self {
            key: path.clone(),
            path,
        }
    }
}

/// A named relation of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    /// Multi-valued relations are paged; single-valued ones resolve directly.
    pub multivalued: bool,
}

impl Relation {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multivalued: false,
        }
    }

    pub fn multi(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multivalued: true,
        }
    }
}

/// One page of a collection, plus the authoritative total count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<EntityPath>,
    pub total: usize,
}

impl Page {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

// ============================================================================
// Remote Source
// ============================================================================

/// The remote collaborator the builders load from.
///
/// Implementations own their wait/retry policy: `resolve` may consult the
/// backend repeatedly before settling and must be idempotent; returning
/// `None` means the entity never became available, which the builders treat
/// as a clean empty outcome rather than an error.
#[async_trait]
pub trait EntitySource: Send + Sync + 'static {
    /// Resolve an entity path to a stable key, or `None` if it never becomes
    /// available.
    async fn resolve(&self, path: &str) -> Option<ResolvedEntity>;

    /// Fetch one page of children of a collection path.
    async fn fetch_page(&self, collection: &str, offset: usize, count: usize) -> Page;

    /// Human-readable label for an entity, relation or collection path.
    /// `None` makes the builders fall back to the raw trailing name.
    async fn label(&self, path: &str) -> Option<String>;

    /// The named relations of an entity. Missing metadata is programmer
    /// misuse and must surface as an error.
    async fn relations(&self, entity: &str) -> Result<Vec<Relation>, ExplorerError>;
}

// ============================================================================
// Events and gates
// ============================================================================

/// Inspection events surfaced to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExplorerEvent {
    /// Detail requested on an entity node.
    DetailEntity { path: EntityPath },
    /// Detail requested on a collection or sentinel node.
    DetailRelation { entity: EntityPath, relation: String },
    /// Detail requested on a schema-level type node.
    DetailType { name: String },
}

/// Callback invoked for every emitted [`ExplorerEvent`].
pub type ExplorerEventHandler = Arc<dyn Fn(&ExplorerEvent) + Send + Sync>;

/// Host veto over entity insertion. A `false` return discards the node.
pub type EntityGate = Arc<dyn Fn(&str, &Node) -> bool + Send + Sync>;

/// Host veto over following a relation. A `false` return skips it entirely.
pub type RelationGate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

// ============================================================================
// Errors and configuration
// ============================================================================

/// The hard-failure surface of the builders.
///
/// Everything else (absent entities, vetoed insertions, empty collections)
/// resolves to empty values by design.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExplorerError {
    /// Relation metadata is absent for an entity that should carry it.
    #[error("missing relation metadata for `{path}`")]
    MissingRelationMetadata { path: String },
    /// The collaborator failed in a way it could not absorb.
    #[error("remote source failure for `{path}`: {message}")]
    Source { path: String, message: String },
}

/// Tuning knobs of the entity explorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplorerConfig {
    /// Maximum number of children loaded from a collection at once.
    pub page_size: usize,
    /// Label shown on "load more" sentinel nodes.
    pub more_label: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            more_label: "Load more".to_string(),
        }
    }
}

/// Raw-name fallback for paths without a label: the trailing `/` segment,
/// then the trailing `.` segment for qualified type names, with any key
/// selector (`Products(1)` → `Products`) stripped.
pub(crate) fn fallback_label(path: &str) -> String {
    let tail = path.rsplit('/').next().unwrap_or(path);
    let tail = tail.rsplit('.').next().unwrap_or(tail);
    let tail = tail.split('(').next().unwrap_or(tail);
    tail.to_string()
}
