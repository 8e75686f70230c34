//! Scripted in-memory source shared by the explorer test suites.
#![allow(dead_code)]

use async_trait::async_trait;
use graphscout_explorer::{EntitySource, ExplorerError, Page, Relation, ResolvedEntity};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A scripted remote source. Everything responds immediately unless a path is
/// held with [`MockSource::hold`], in which case the response is delayed
/// until [`MockSource::release`].
#[derive(Clone, Default)]
pub struct MockSource {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    /// Resolvable entity paths.
    entities: RwLock<HashSet<String>>,
    /// Requested path → resolved absolute path.
    aliases: RwLock<HashMap<String, String>>,
    labels: RwLock<HashMap<String, String>>,
    relations: RwLock<HashMap<String, Vec<Relation>>>,
    /// Entities whose relation metadata is deliberately broken.
    broken_metadata: RwLock<HashSet<String>>,
    /// Collection path → every item path, in order.
    collections: RwLock<HashMap<String, Vec<String>>>,
    holds: RwLock<HashMap<String, Arc<Semaphore>>>,
    fetch_log: Mutex<Vec<(String, usize)>>,
    relations_log: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, path: &str) -> &Self {
        self.inner.entities.write().insert(path.to_string());
        self
    }

    /// Make `path` resolve to the absolute `target` (which is registered as
    /// an entity as well).
    pub fn alias(&self, path: &str, target: &str) -> &Self {
        self.inner
            .aliases
            .write()
            .insert(path.to_string(), target.to_string());
        self.entity(target)
    }

    pub fn label(&self, path: &str, label: &str) -> &Self {
        self.inner
            .labels
            .write()
            .insert(path.to_string(), label.to_string());
        self
    }

    pub fn relations(&self, path: &str, relations: Vec<Relation>) -> &Self {
        self.inner
            .relations
            .write()
            .insert(path.to_string(), relations);
        self
    }

    pub fn broken_metadata(&self, path: &str) -> &Self {
        self.inner.broken_metadata.write().insert(path.to_string());
        self
    }

    pub fn collection(&self, path: &str, items: Vec<&str>) -> &Self {
        for item in &items {
            self.entity(item);
        }
        self.inner.collections.write().insert(
            path.to_string(),
            items.into_iter().map(str::to_string).collect(),
        );
        self
    }

    /// Register a collection of `count` generated items, each resolvable.
    pub fn seed_collection(&self, path: &str, count: usize) -> Vec<String> {
        let items: Vec<String> = (0..count).map(|i| format!("{path}({i})")).collect();
        for item in &items {
            self.entity(item);
        }
        self.inner
            .collections
            .write()
            .insert(path.to_string(), items.clone());
        items
    }

    /// Drop a previously registered entity so it no longer resolves.
    pub fn forget_entity(&self, path: &str) -> &Self {
        self.inner.entities.write().remove(path);
        self
    }

    /// Delay every response touching `path` until [`MockSource::release`].
    pub fn hold(&self, path: &str) {
        self.inner
            .holds
            .write()
            .insert(path.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, path: &str) {
        if let Some(gate) = self.inner.holds.read().get(path) {
            gate.add_permits(1 << 20);
        }
    }

    async fn wait_if_held(&self, path: &str) {
        let gate = self.inner.holds.read().get(path).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.expect("hold gate never closes");
        }
    }

    /// Every `(collection, offset)` fetched, in order.
    pub fn fetches(&self) -> Vec<(String, usize)> {
        self.inner.fetch_log.lock().clone()
    }

    /// Every entity whose relations were enumerated, in order.
    pub fn relation_lookups(&self) -> Vec<String> {
        self.inner.relations_log.lock().clone()
    }
}

#[async_trait]
impl EntitySource for MockSource {
    async fn resolve(&self, path: &str) -> Option<ResolvedEntity> {
        self.wait_if_held(path).await;
        if let Some(target) = self.inner.aliases.read().get(path) {
            return Some(ResolvedEntity::at(target.clone()));
        }
        if self.inner.entities.read().contains(path) {
            return Some(ResolvedEntity::at(path));
        }
        None
    }

    async fn fetch_page(&self, collection: &str, offset: usize, count: usize) -> Page {
        self.inner
            .fetch_log
            .lock()
            .push((collection.to_string(), offset));
        self.wait_if_held(collection).await;
        let items = self.inner.collections.read().get(collection).cloned();
        match items {
            Some(items) => {
                let slice: Vec<String> = items
                    .iter()
                    .skip(offset)
                    .take(count)
                    .cloned()
                    .collect();
                Page {
                    items: slice,
                    total: items.len(),
                }
            }
            None => Page::empty(),
        }
    }

    async fn label(&self, path: &str) -> Option<String> {
        self.inner.labels.read().get(path).cloned()
    }

    async fn relations(&self, entity: &str) -> Result<Vec<Relation>, ExplorerError> {
        self.inner.relations_log.lock().push(entity.to_string());
        if self.inner.broken_metadata.read().contains(entity) {
            return Err(ExplorerError::MissingRelationMetadata {
                path: entity.to_string(),
            });
        }
        Ok(self
            .inner
            .relations
            .read()
            .get(entity)
            .cloned()
            .unwrap_or_default())
    }
}

/// Let background work (spawned page processing, held futures that were just
/// released) run to completion on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
