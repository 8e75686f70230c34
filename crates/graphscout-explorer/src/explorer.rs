//! Entity explorer
//!
//! The explorer owns one directed graph store rooted at a single entity path
//! and grows it on demand: an entity node's relations are discovered and
//! loaded on the *first* expansion signal the node receives, and each
//! relation either resolves a child entity directly or hands off to the
//! pagination machinery in [`crate::collection`].
//!
//! Every expansion forms a barrier over the relation-loading operations it
//! spawns: the node is busy from the moment the operations are registered
//! until the last one settles, and the links to the loaded children are only
//! created once the barrier resolves.

use crate::collection::CollectionCursor;
use crate::{
    fallback_label, EntityGate, EntityPath, EntitySource, ExplorerConfig, ExplorerError,
    ExplorerEvent, ExplorerEventHandler, RelationGate,
};
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use graphscout_graph::{GraphStore, Link, Node, NodeKey, VisibleGraph};
use parking_lot::RwLock;
use std::sync::Arc;

/// What a node does when its expansion trigger fires.
pub(crate) enum ExpandAction {
    /// One-shot relation discovery for an entity node.
    Relations { path: EntityPath, loaded: bool },
    /// Re-entrant next-page request for a "load more" sentinel.
    LoadMore { collection: String },
}

pub(crate) struct ExplorerInner<S> {
    pub(crate) source: S,
    pub(crate) graph: GraphStore,
    pub(crate) config: ExplorerConfig,
    /// Expansion triggers by node key.
    pub(crate) actions: DashMap<NodeKey, ExpandAction>,
    /// Live pagination cursors by collection path.
    pub(crate) cursors: DashMap<String, Arc<CollectionCursor>>,
    /// Detail events by node key.
    pub(crate) details: DashMap<NodeKey, ExplorerEvent>,
    pub(crate) handlers: RwLock<Vec<ExplorerEventHandler>>,
    pub(crate) entity_gate: RwLock<Option<EntityGate>>,
    pub(crate) relation_gate: RwLock<Option<RelationGate>>,
}

/// Incremental explorer over a remote entity source.
///
/// Cloning yields another handle onto the same exploration; the graph store,
/// expansion state and pagination cursors are shared.
pub struct Explorer<S: EntitySource> {
    pub(crate) inner: Arc<ExplorerInner<S>>,
}

impl<S: EntitySource> Clone for Explorer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: EntitySource> Explorer<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, ExplorerConfig::default())
    }

    pub fn with_config(source: S, config: ExplorerConfig) -> Self {
        Self {
            inner: Arc::new(ExplorerInner {
                source,
                graph: GraphStore::new(),
                config,
                actions: DashMap::new(),
                cursors: DashMap::new(),
                details: DashMap::new(),
                handlers: RwLock::new(Vec::new()),
                entity_gate: RwLock::new(None),
                relation_gate: RwLock::new(None),
            }),
        }
    }

    /// The shared store this explorer mutates.
    pub fn graph(&self) -> &GraphStore {
        &self.inner.graph
    }

    /// Snapshot of the currently visible subgraph.
    pub fn visible(&self, directed: bool) -> VisibleGraph {
        self.inner.graph.visible(directed)
    }

    /// Register an inspection-event handler.
    pub fn on_event(&self, handler: ExplorerEventHandler) {
        self.inner.handlers.write().push(handler);
    }

    /// Install the host veto over entity insertion.
    pub fn set_entity_gate(&self, gate: EntityGate) {
        *self.inner.entity_gate.write() = Some(gate);
    }

    /// Install the host veto over relation traversal.
    pub fn set_relation_gate(&self, gate: RelationGate) {
        *self.inner.relation_gate.write() = Some(gate);
    }

    pub(crate) fn emit(&self, event: &ExplorerEvent) {
        let handlers: Vec<ExplorerEventHandler> = self.inner.handlers.read().clone();
        for handler in &handlers {
            handler.as_ref()(event);
        }
    }

    pub(crate) fn allow_entity(&self, path: &str, node: &Node) -> bool {
        let gate = self.inner.entity_gate.read().clone();
        match gate {
            Some(gate) => gate.as_ref()(path, node),
            None => true,
        }
    }

    pub(crate) fn allow_relation(&self, entity: &str, relation: &str) -> bool {
        let gate = self.inner.relation_gate.read().clone();
        match gate {
            Some(gate) => gate.as_ref()(entity, relation),
            None => true,
        }
    }

    pub(crate) async fn display_label(&self, path: &str) -> String {
        match self.inner.source.label(path).await {
            Some(label) => label,
            None => fallback_label(path),
        }
    }

    // ------------------------------------------------------------------
    // Root management
    // ------------------------------------------------------------------

    /// Rebuild the exploration from a new root entity path.
    ///
    /// The store is bulk-cleared and all expansion and pagination state is
    /// forgotten. Operations still in flight from the previous root are
    /// abandoned, not cancelled; whatever they insert later is orphaned until
    /// the next rebuild.
    pub async fn set_root(&self, path: &str) -> Option<NodeKey> {
        self.inner.actions.clear();
        self.inner.cursors.clear();
        self.inner.details.clear();
        self.inner.graph.clear();
        self.expand_entity(path, true).await
    }

    // ------------------------------------------------------------------
    // Interaction dispatch
    // ------------------------------------------------------------------

    /// Toggle the expansion state of a node and fire its expansion trigger.
    ///
    /// Ignored (returns `Ok(false)`) for label-only, non-expandable or busy
    /// nodes. The returned future settles once any triggered loading has
    /// settled; callers that only care about the flag flip may drop it into a
    /// task of its own.
    pub async fn toggle_expanded(&self, key: &str) -> Result<bool, ExplorerError> {
        let Some(node) = self.inner.graph.node(key) else {
            return Ok(false);
        };
        if node.label_only || !node.expandable || node.busy {
            return Ok(false);
        }
        self.inner.graph.set_expanded(key, !node.expanded);

        enum Dispatch {
            Relations(EntityPath),
            More(String),
        }
        let dispatch = match self.inner.actions.get_mut(key) {
            Some(mut entry) => match entry.value_mut() {
                ExpandAction::Relations { path, loaded } if !*loaded => {
                    *loaded = true;
                    Some(Dispatch::Relations(path.clone()))
                }
                ExpandAction::Relations { .. } => None,
                ExpandAction::LoadMore { collection } => Some(Dispatch::More(collection.clone())),
            },
            None => None,
        };
        match dispatch {
            Some(Dispatch::Relations(path)) => self.load_relations(key, &path).await?,
            Some(Dispatch::More(collection)) => self.request_more(&collection).await,
            None => {}
        }
        Ok(true)
    }

    /// Fire the detail event registered for a node, if any.
    pub fn request_detail(&self, key: &str) {
        let event = self.inner.details.get(key).map(|e| e.value().clone());
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    // ------------------------------------------------------------------
    // Entity expansion
    // ------------------------------------------------------------------

    /// Resolve an entity path and insert its node.
    ///
    /// Resolves to `None` when the entity never becomes available or the
    /// host gate vetoes it; both are clean empty outcomes. An entity that is
    /// already in the store resolves to its existing key, so converging
    /// relations share one node.
    pub fn expand_entity(&self, path: &str, origin: bool) -> BoxFuture<'static, Option<NodeKey>> {
        let this = self.clone();
        let path = path.to_string();
        async move {
            let Some(resolved) = this.inner.source.resolve(&path).await else {
                tracing::debug!(path = %path, "entity never resolved, leaving it out");
                return None;
            };
            let key = resolved.key.clone();
            if this.inner.graph.contains_node(&key) {
                return Some(key);
            }
            let label = this.display_label(&resolved.path).await;
            let node = Node::new(key.clone(), label)
                .with_expanded(false)
                .with_origin(origin)
                .with_entity(resolved.path.clone());
            if !this.allow_entity(&resolved.path, &node) {
                return None;
            }
            if !this.inner.graph.add_node(node) {
                // Lost the race against a concurrent expansion of the same
                // entity; the stored node wins.
                return Some(key);
            }
            this.inner.actions.insert(
                key.clone(),
                ExpandAction::Relations {
                    path: resolved.path.clone(),
                    loaded: false,
                },
            );
            this.inner.details.insert(
                key.clone(),
                ExplorerEvent::DetailEntity {
                    path: resolved.path,
                },
            );
            Some(key)
        }
        .boxed()
    }

    /// Discover and load every relation of an entity, joined by one barrier.
    ///
    /// The node is busy from before the first operation starts until after
    /// the last one settles; links to the loaded children are created only
    /// once the barrier resolves. Relations vetoed by the host gate are
    /// skipped entirely and do not count towards the barrier.
    pub(crate) async fn load_relations(&self, key: &str, path: &str) -> Result<(), ExplorerError> {
        self.inner.graph.set_busy(key, true);
        let relations = match self.inner.source.relations(path).await {
            Ok(relations) => relations,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "relation discovery failed");
                self.inner.graph.set_busy(key, false);
                return Err(err);
            }
        };

        // Register every surviving operation before the barrier can resolve.
        let mut operations: Vec<BoxFuture<'static, (Option<NodeKey>, Option<String>)>> =
            Vec::new();
        for relation in relations {
            if !self.allow_relation(path, &relation.name) {
                continue;
            }
            let relation_path = format!("{}/{}", path, relation.name);
            let label = self.display_label(&relation_path).await;
            if relation.multivalued {
                // The link to the collection node carries no label; the
                // label lives on the collection node itself.
                let collection = self.load_collection(path, &relation.name, label);
                operations.push(async move { (collection.await, None) }.boxed());
            } else {
                let child = self.expand_entity(&relation_path, false);
                operations.push(async move { (child.await, Some(label)) }.boxed());
            }
        }

        let settled = join_all(operations).await;
        for (child, link_label) in settled {
            if let Some(child_key) = child {
                let mut link = Link::new(key.to_string(), child_key);
                if let Some(label) = link_label {
                    link = link.with_label(label);
                }
                self.inner.graph.add_link(link);
            }
        }
        self.inner.graph.set_busy(key, false);
        Ok(())
    }
}
