//! Collection pagination
//!
//! A multi-valued relation is represented by a container node (the "relation
//! node") whose children arrive one page at a time. Each live collection
//! keeps one cursor: the next offset, the authoritative total once the first
//! page arrived, and at most one "load more" sentinel node that re-triggers
//! the fetch at the advanced offset.
//!
//! Lifecycle per page:
//! - the first nonempty page creates the container node once and resolves
//!   the collection's future with it; an empty first page resolves empty and
//!   never creates anything;
//! - the previous sentinel (if any) is evicted and a fresh one is created
//!   while more items remain; once the offset reaches the total no sentinel
//!   survives;
//! - every child resolves independently and is linked to the container as
//!   soon as it is available.

use crate::explorer::ExpandAction;
use crate::{EntityPath, EntitySource, Explorer, ExplorerEvent, Page};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use graphscout_graph::{Link, Node, NodeKey};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Key suffix of the transient "load more" sentinel node.
const MORE_SUFFIX: &str = "/__more";

/// Pagination state of one live collection.
pub(crate) struct CollectionCursor {
    /// Collection path; doubles as the container node key.
    pub(crate) collection: String,
    /// Path of the entity owning the relation.
    pub(crate) owner: EntityPath,
    pub(crate) relation: String,
    /// Display label of the container node.
    pub(crate) label: String,
    pub(crate) page_size: usize,
    pub(crate) state: Mutex<CursorState>,
}

#[derive(Default)]
pub(crate) struct CursorState {
    /// Next offset to fetch.
    pub(crate) offset: usize,
    /// Authoritative collection size, known after the first page.
    pub(crate) total: Option<usize>,
    /// A fetch is currently awaiting remote data.
    pub(crate) in_flight: bool,
    /// Key of the container node, once created.
    pub(crate) container: Option<NodeKey>,
    /// Key of the live sentinel, if one exists.
    pub(crate) sentinel: Option<NodeKey>,
}

impl<S: EntitySource> Explorer<S> {
    /// Start loading a multi-valued relation.
    ///
    /// The returned future resolves with the container node's key as soon as
    /// the first nonempty page created it, or with `None` for an empty
    /// collection; it does not wait for the page's children. Loading then
    /// continues in the background and through the sentinel's trigger.
    pub(crate) fn load_collection(
        &self,
        owner: &str,
        relation: &str,
        label: String,
    ) -> BoxFuture<'static, Option<NodeKey>> {
        let cursor = Arc::new(CollectionCursor {
            collection: format!("{}/{}", owner, relation),
            owner: owner.to_string(),
            relation: relation.to_string(),
            label,
            page_size: self.inner.config.page_size,
            state: Mutex::new(CursorState::default()),
        });
        self.inner
            .cursors
            .insert(cursor.collection.clone(), cursor.clone());

        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        tokio::spawn(async move {
            this.request_next_page(&cursor, Some(tx)).await;
        });
        async move { rx.await.unwrap_or(None) }.boxed()
    }

    /// Sentinel trigger: fetch the next page of a collection.
    pub(crate) async fn request_more(&self, collection: &str) {
        let cursor = self.inner.cursors.get(collection).map(|c| Arc::clone(c.value()));
        if let Some(cursor) = cursor {
            self.request_next_page(&cursor, None).await;
        }
    }

    /// Fetch and apply one page. `notify` is resolved with the container key
    /// (or `None`) exactly once, as soon as that outcome is known.
    pub(crate) async fn request_next_page(
        &self,
        cursor: &Arc<CollectionCursor>,
        mut notify: Option<oneshot::Sender<Option<NodeKey>>>,
    ) {
        let offset = {
            let mut state = cursor.state.lock();
            if state.in_flight {
                // A fetch is already on its way; surface the wait instead of
                // duplicating the request.
                if let Some(sentinel) = &state.sentinel {
                    self.inner.graph.set_busy(sentinel, true);
                }
                return;
            }
            state.in_flight = true;
            state.offset
        };
        let refetching = cursor.state.lock().sentinel.clone();
        if let Some(sentinel) = &refetching {
            self.inner.graph.set_busy(sentinel, true);
        }

        let page = self
            .inner
            .source
            .fetch_page(&cursor.collection, offset, cursor.page_size)
            .await;

        self.apply_page(cursor, page, &mut notify).await;
        if let Some(tx) = notify {
            let _ = tx.send(None);
        }
    }

    async fn apply_page(
        &self,
        cursor: &Arc<CollectionCursor>,
        page: Page,
        notify: &mut Option<oneshot::Sender<Option<NodeKey>>>,
    ) {
        // Cursor bookkeeping happens before anything can suspend, so a
        // re-entrant "more" request observes the advanced offset.
        let (first_page, offset_after, total) = {
            let mut state = cursor.state.lock();
            state.in_flight = false;
            state.total = Some(page.total);
            if page.total == 0 && state.container.is_none() {
                drop(state);
                self.inner.cursors.remove(&cursor.collection);
                return;
            }
            let first_page = state.container.is_none();
            state.offset += cursor.page_size;
            (first_page, state.offset, page.total)
        };

        if first_page {
            let node = Node::new(cursor.collection.clone(), cursor.label.clone())
                .with_entity(cursor.owner.clone());
            self.inner.graph.add_node(node);
            self.inner.details.insert(
                cursor.collection.clone(),
                ExplorerEvent::DetailRelation {
                    entity: cursor.owner.clone(),
                    relation: cursor.relation.clone(),
                },
            );
            cursor.state.lock().container = Some(cursor.collection.clone());
        }
        if let Some(tx) = notify.take() {
            let _ = tx.send(Some(cursor.collection.clone()));
        }

        self.replace_sentinel(cursor, offset_after, total);

        // Children resolve last; each is linked to the container as soon as
        // it is available, independent of its siblings.
        let children: Vec<_> = page
            .items
            .iter()
            .map(|item| {
                let this = self.clone();
                let container = cursor.collection.clone();
                let item = item.clone();
                async move {
                    if let Some(child) = this.expand_entity(&item, false).await {
                        this.inner.graph.add_link(Link::new(container, child));
                    }
                }
            })
            .collect();
        join_all(children).await;
    }

    /// Evict the previous sentinel and create a fresh one while more items
    /// remain. At most one sentinel is ever live per collection.
    fn replace_sentinel(&self, cursor: &Arc<CollectionCursor>, offset: usize, total: usize) {
        let previous = cursor.state.lock().sentinel.take();
        if let Some(key) = previous {
            self.inner.graph.set_busy(&key, false);
            self.inner.graph.remove_link(&cursor.collection, &key);
            self.inner.graph.remove_node(&key);
            self.inner.actions.remove(&key);
            self.inner.details.remove(&key);
        }
        if offset < total {
            let key = format!("{}{}", cursor.collection, MORE_SUFFIX);
            let node = Node::new(key.clone(), self.inner.config.more_label.clone())
                .with_expanded(false)
                .with_entity(cursor.owner.clone());
            self.inner.graph.add_node(node);
            self.inner
                .graph
                .add_link(Link::new(cursor.collection.clone(), key.clone()));
            self.inner.actions.insert(
                key.clone(),
                ExpandAction::LoadMore {
                    collection: cursor.collection.clone(),
                },
            );
            self.inner.details.insert(
                key.clone(),
                ExplorerEvent::DetailRelation {
                    entity: cursor.owner.clone(),
                    relation: cursor.relation.clone(),
                },
            );
            cursor.state.lock().sentinel = Some(key);
        }
    }
}
