//! Schema explorer
//!
//! The type-level counterpart of the entity explorer: one node per entity
//! type, one undirected link per association between two types, built
//! eagerly in a single pass from schema metadata. Nothing here is lazy or
//! paged; the interesting part is the origin policy.
//!
//! Origin policy, re-applied whenever the origin list changes:
//! - a non-empty list marks exactly its members as origins and leaves every
//!   node collapsed but expandable, so the schema is drilled into from the
//!   chosen roots;
//! - an empty list marks *every* node as an expanded, non-expandable origin,
//!   which makes the whole schema visible and frozen. This is the builder
//!   side of the "empty origin set" policy the visibility engine itself does
//!   not implement.

use crate::{fallback_label, ExplorerEvent, ExplorerEventHandler};
use async_trait::async_trait;
use graphscout_graph::{GraphStore, Link, Node, VisibleGraph};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// An entity type within the remote schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityType {
    /// Fully qualified type name; doubles as the node key.
    pub name: String,
}

impl EntityType {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An association between two entity types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Association {
    pub source: String,
    pub target: String,
}

impl Association {
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Schema metadata collaborator.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn entity_types(&self) -> Vec<EntityType>;
    async fn associations(&self) -> Vec<Association>;
    /// Human label for a type; `None` falls back to the raw trailing name.
    async fn label(&self, type_name: &str) -> Option<String>;
}

/// Eager explorer over the type-level schema graph.
pub struct SchemaExplorer<S: SchemaSource> {
    source: S,
    graph: GraphStore,
    origins: RwLock<Vec<String>>,
    handlers: RwLock<Vec<ExplorerEventHandler>>,
}

impl<S: SchemaSource> SchemaExplorer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            graph: GraphStore::new(),
            origins: RwLock::new(Vec::new()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// The schema graph is undirected.
    pub fn visible(&self) -> VisibleGraph {
        self.graph.visible(false)
    }

    pub fn on_event(&self, handler: ExplorerEventHandler) {
        self.handlers.write().push(handler);
    }

    /// Rebuild the graph from fresh schema metadata and re-apply the origin
    /// policy. Bulk-clears whatever was there before.
    pub async fn build(&self) {
        let types = self.source.entity_types().await;
        let associations = self.source.associations().await;
        self.graph.clear();
        for ty in types {
            let label = match self.source.label(&ty.name).await {
                Some(label) => label,
                None => fallback_label(&ty.name),
            };
            self.graph.add_node(Node::new(ty.name, label));
        }
        for association in associations {
            self.graph
                .add_link(Link::new(association.source, association.target));
        }
        self.apply_origins();
    }

    /// Replace the origin list and re-apply the policy.
    pub fn set_origins(&self, origins: Vec<String>) {
        *self.origins.write() = origins;
        self.apply_origins();
    }

    fn apply_origins(&self) {
        let origins = self.origins.read().clone();
        for node in self.graph.nodes() {
            if origins.is_empty() {
                self.graph.set_origin(&node.key, true);
                self.graph.set_expanded(&node.key, true);
                self.graph.set_expandable(&node.key, false);
            } else {
                self.graph.set_origin(&node.key, origins.contains(&node.key));
                self.graph.set_expanded(&node.key, false);
                self.graph.set_expandable(&node.key, true);
            }
        }
    }

    /// Toggle a type node; schema nodes never load anything lazily.
    pub fn toggle_expanded(&self, key: &str) -> bool {
        let Some(node) = self.graph.node(key) else {
            return false;
        };
        if node.label_only || !node.expandable || node.busy {
            return false;
        }
        self.graph.set_expanded(key, !node.expanded)
    }

    /// Fire the detail event for a type node.
    pub fn request_detail(&self, key: &str) {
        if !self.graph.contains_node(key) {
            return;
        }
        let event = ExplorerEvent::DetailType {
            name: key.to_string(),
        };
        let handlers: Vec<ExplorerEventHandler> = self.handlers.read().clone();
        for handler in &handlers {
            handler.as_ref()(&event);
        }
    }
}
