//! Graphscout graph store
//!
//! The store owns the current universe of nodes and links for one explored
//! graph. Builders (see `graphscout-explorer`) mutate it incrementally as
//! remote data arrives; the visibility engine (`visibility`) derives the
//! subgraph that should currently be shown from a snapshot of it.
//!
//! Design points:
//! - Nodes are addressed by a unique string key. Links store endpoint *keys*
//!   and are resolved through the store's key map at visibility time; there is
//!   no global lookup-by-identifier registry.
//! - A link whose endpoint is missing is inert, not an error. It is filtered
//!   out when the visible subgraph is computed and simply becomes live again
//!   if the endpoint later appears.
//! - All mutation goes through the store so that every change can be observed
//!   by listeners (typically: the renderer re-running the visibility engine).

pub mod visibility;


use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub use visibility::{visible_graph, VisibleGraph, VisibleLink};

// ============================================================================
// Core Types
// ============================================================================

/// Unique identifier of a node within one store.
pub type NodeKey = String;

/// A single graph node.
///
/// The flag trio drives the visibility engine and the interaction layer:
/// `expanded` permits traversal *through* the node, `expandable` permits the
/// user to toggle that flag, and `busy` blocks interaction while a load is in
/// flight. A `label_only` node is a pure annotation: it is never expandable
/// and never fires expansion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    /// Unique key of the node.
    pub key: NodeKey,
    /// Display label.
    pub label: String,
    /// Whether traversal may pass through this node.
    pub expanded: bool,
    /// Whether the expansion state may be toggled interactively.
    pub expandable: bool,
    /// Transient loading indicator.
    pub busy: bool,
    /// Pure annotation node without interactive semantics.
    pub label_only: bool,
    /// Whether this node seeds the visibility traversal.
    pub origin: bool,
    /// Path of the associated remote entity, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl Node {
    /// Create a node with the default flags (expanded, expandable, idle).
    pub fn new(key: impl Into<NodeKey>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            expanded: true,
            expandable: true,
            busy: false,
            label_only: false,
            origin: false,
            entity: None,
        }
    }

    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn with_expandable(mut self, expandable: bool) -> Self {
        self.expandable = expandable;
        self
    }

    pub fn with_label_only(mut self, label_only: bool) -> Self {
        self.label_only = label_only;
        self.expandable = !label_only && self.expandable;
        self
    }

    pub fn with_origin(mut self, origin: bool) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

/// A directed link between two node keys.
///
/// Orientation is always stored; undirected graphs ignore it during traversal
/// only. Identity is the (source, target, label) triple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub source: NodeKey,
    pub target: NodeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Link {
    pub fn new(source: impl Into<NodeKey>, target: impl Into<NodeKey>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A single observable store mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GraphChange {
    NodeAdded { key: NodeKey },
    NodeRemoved { key: NodeKey },
    NodeUpdated { key: NodeKey },
    LinkAdded { source: NodeKey, target: NodeKey },
    LinkRemoved { source: NodeKey, target: NodeKey },
    Cleared,
}

/// Callback invoked after every store mutation.
pub type ChangeListener = Arc<dyn Fn(&GraphChange) + Send + Sync>;

// ============================================================================
// Graph Store
// ============================================================================

struct GraphInner {
    /// Insertion order of node keys; visibility output preserves it.
    order: Vec<NodeKey>,
    /// Owned key → node mapping.
    nodes: HashMap<NodeKey, Node>,
    /// Links in insertion order.
    links: Vec<Link>,
}

/// Shared, mutable store of nodes and links.
///
/// Cloning is cheap and yields a handle onto the same store. Every mutation is
/// idempotent-safe: re-adding an existing key, re-removing a missing one or
/// flipping a flag to its current value are quiet no-ops.
#[derive(Clone)]
pub struct GraphStore {
    inner: Arc<RwLock<GraphInner>>,
    listeners: Arc<RwLock<Vec<ChangeListener>>>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(GraphInner {
                order: Vec::new(),
                nodes: HashMap::new(),
                links: Vec::new(),
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a mutation listener.
    pub fn on_change(&self, listener: ChangeListener) {
        self.listeners.write().push(listener);
    }

    fn notify(&self, change: GraphChange) {
        // Snapshot so a listener may mutate the store re-entrantly.
        let listeners: Vec<ChangeListener> = self.listeners.read().clone();
        for listener in &listeners {
            listener.as_ref()(&change);
        }
    }

    /// Add a node. Returns false (and leaves the store untouched) when the
    /// key is already present.
    pub fn add_node(&self, node: Node) -> bool {
        let key = node.key.clone();
        {
            let mut inner = self.inner.write();
            if inner.nodes.contains_key(&key) {
                return false;
            }
            inner.order.push(key.clone());
            inner.nodes.insert(key.clone(), node);
        }
        self.notify(GraphChange::NodeAdded { key });
        true
    }

    /// Remove a node by key. Links referencing it are kept and become inert.
    pub fn remove_node(&self, key: &str) -> bool {
        {
            let mut inner = self.inner.write();
            if inner.nodes.remove(key).is_none() {
                return false;
            }
            inner.order.retain(|k| k != key);
        }
        self.notify(GraphChange::NodeRemoved {
            key: key.to_string(),
        });
        true
    }

    /// Add a link. A link with identical source, target and label is only
    /// stored once.
    pub fn add_link(&self, link: Link) -> bool {
        let (source, target) = (link.source.clone(), link.target.clone());
        {
            let mut inner = self.inner.write();
            if inner.links.contains(&link) {
                return false;
            }
            inner.links.push(link);
        }
        self.notify(GraphChange::LinkAdded { source, target });
        true
    }

    /// Remove every link between the given endpoints (any label).
    pub fn remove_link(&self, source: &str, target: &str) -> bool {
        let removed = {
            let mut inner = self.inner.write();
            let before = inner.links.len();
            inner
                .links
                .retain(|l| !(l.source == source && l.target == target));
            inner.links.len() != before
        };
        if removed {
            self.notify(GraphChange::LinkRemoved {
                source: source.to_string(),
                target: target.to_string(),
            });
        }
        removed
    }

    /// Remove all nodes and links.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.write();
            inner.order.clear();
            inner.nodes.clear();
            inner.links.clear();
        }
        self.notify(GraphChange::Cleared);
    }

    fn update_node(&self, key: &str, apply: impl FnOnce(&mut Node)) -> bool {
        let changed = {
            let mut inner = self.inner.write();
            match inner.nodes.get_mut(key) {
                Some(node) => {
                    let before = node.clone();
                    apply(node);
                    *node != before
                }
                None => return false,
            }
        };
        if changed {
            self.notify(GraphChange::NodeUpdated {
                key: key.to_string(),
            });
        }
        true
    }

    /// Flip the expansion flag of a node. No-op on unknown keys.
    pub fn set_expanded(&self, key: &str, expanded: bool) -> bool {
        self.update_node(key, |n| n.expanded = expanded)
    }

    /// Flip the transient busy flag of a node. No-op on unknown keys.
    pub fn set_busy(&self, key: &str, busy: bool) -> bool {
        self.update_node(key, |n| n.busy = busy)
    }

    pub fn set_expandable(&self, key: &str, expandable: bool) -> bool {
        self.update_node(key, |n| n.expandable = expandable)
    }

    pub fn set_origin(&self, key: &str, origin: bool) -> bool {
        self.update_node(key, |n| n.origin = origin)
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn contains_node(&self, key: &str) -> bool {
        self.inner.read().nodes.contains_key(key)
    }

    /// Snapshot of a single node.
    pub fn node(&self, key: &str) -> Option<Node> {
        self.inner.read().nodes.get(key).cloned()
    }

    /// Snapshot of all nodes in insertion order.
    pub fn nodes(&self) -> Vec<Node> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|k| inner.nodes.get(k).cloned())
            .collect()
    }

    /// Snapshot of all links in insertion order.
    pub fn links(&self) -> Vec<Link> {
        self.inner.read().links.clone()
    }

    /// Keys of the nodes currently flagged as origins, in insertion order.
    pub fn origins(&self) -> Vec<NodeKey> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter(|k| inner.nodes.get(*k).map(|n| n.origin).unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.inner.read().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    /// Compute the currently visible subgraph from a consistent snapshot.
    pub fn visible(&self, directed: bool) -> VisibleGraph {
        let (nodes, links, origins) = {
            let inner = self.inner.read();
            let nodes: Vec<Node> = inner
                .order
                .iter()
                .filter_map(|k| inner.nodes.get(k).cloned())
                .collect();
            let origins: Vec<NodeKey> = nodes
                .iter()
                .filter(|n| n.origin)
                .map(|n| n.key.clone())
                .collect();
            (nodes, inner.links.clone(), origins)
        };
        visible_graph(&nodes, &links, &origins, directed)
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("GraphStore")
            .field("nodes", &inner.order.len())
            .field("links", &inner.links.len())
            .finish()
    }
}
