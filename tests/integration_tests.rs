//! Integration tests for the complete graphscout pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - remote source → explorer → graph store → visibility engine
//! - drilling through single- and multi-valued relations
//! - store mutation notifications driving visibility recomputation
//!
//! Run with: cargo test --test integration_tests

use async_trait::async_trait;
use graphscout_explorer::{
    EntitySource, Explorer, ExplorerError, Page, Relation, ResolvedEntity,
};
use graphscout_graph::GraphChange;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// A small scripted order-management backend
// ============================================================================

#[derive(Clone, Default)]
struct OrdersBackend {
    relations: Arc<HashMap<String, Vec<Relation>>>,
    collections: Arc<HashMap<String, Vec<String>>>,
    labels: Arc<HashMap<String, String>>,
}

fn backend() -> OrdersBackend {
    let mut relations: HashMap<String, Vec<Relation>> = HashMap::new();
    relations.insert(
        "/Customers(7)".into(),
        vec![Relation::multi("orders"), Relation::single("address")],
    );
    for i in 0..3 {
        relations.insert(
            format!("/Customers(7)/orders({i})"),
            vec![Relation::single("product")],
        );
    }

    let mut collections: HashMap<String, Vec<String>> = HashMap::new();
    collections.insert(
        "/Customers(7)/orders".into(),
        (0..3).map(|i| format!("/Customers(7)/orders({i})")).collect(),
    );

    let mut labels: HashMap<String, String> = HashMap::new();
    labels.insert("/Customers(7)".into(), "ACME Corp".into());
    labels.insert("/Customers(7)/orders".into(), "Orders".into());
    labels.insert("/Customers(7)/address".into(), "Ships to".into());

    OrdersBackend {
        relations: Arc::new(relations),
        collections: Arc::new(collections),
        labels: Arc::new(labels),
    }
}

#[async_trait]
impl EntitySource for OrdersBackend {
    async fn resolve(&self, path: &str) -> Option<ResolvedEntity> {
        Some(ResolvedEntity::at(path))
    }

    async fn fetch_page(&self, collection: &str, offset: usize, count: usize) -> Page {
        match self.collections.get(collection) {
            Some(items) => Page {
                items: items.iter().skip(offset).take(count).cloned().collect(),
                total: items.len(),
            },
            None => Page::empty(),
        }
    }

    async fn label(&self, path: &str) -> Option<String> {
        self.labels.get(path).cloned()
    }

    async fn relations(&self, entity: &str) -> Result<Vec<Relation>, ExplorerError> {
        Ok(self.relations.get(entity).cloned().unwrap_or_default())
    }
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// End-to-end flows
// ============================================================================

#[tokio::test]
async fn explore_expand_and_render_an_order_graph() {
    let explorer = Explorer::new(backend());
    let root = explorer.set_root("/Customers(7)").await;
    assert_eq!(root.as_deref(), Some("/Customers(7)"));

    // The renderer boundary: recompute visibility after every mutation.
    let recomputations = Arc::new(AtomicUsize::new(0));
    explorer.graph().on_change(Arc::new({
        let recomputations = recomputations.clone();
        move |change: &GraphChange| {
            assert!(!matches!(change, GraphChange::Cleared));
            recomputations.fetch_add(1, Ordering::SeqCst);
        }
    }));

    explorer.toggle_expanded("/Customers(7)").await.unwrap();
    settle().await;

    // Root + orders container + 3 orders + address child.
    assert_eq!(explorer.graph().node_count(), 6);
    assert!(recomputations.load(Ordering::SeqCst) > 0);

    let visible = explorer.visible(true);
    assert_eq!(visible.nodes.len(), 6);
    assert_eq!(
        visible.nodes[0].label, "ACME Corp",
        "insertion order puts the root first"
    );
    assert!(visible
        .links
        .iter()
        .any(|l| l.label.as_deref() == Some("Ships to")));

    // Drill into one order.
    explorer
        .toggle_expanded("/Customers(7)/orders(1)")
        .await
        .unwrap();
    settle().await;
    assert!(explorer
        .graph()
        .contains_node("/Customers(7)/orders(1)/product"));
    assert_eq!(explorer.visible(true).nodes.len(), 7);

    // Collapse the whole customer: only the origin remains visible, but the
    // store keeps everything for the next expansion.
    explorer.toggle_expanded("/Customers(7)").await.unwrap();
    assert_eq!(explorer.visible(true).nodes.len(), 1);
    assert_eq!(explorer.graph().node_count(), 7);
}

#[tokio::test]
async fn the_visible_snapshot_serializes_for_the_renderer() {
    let explorer = Explorer::new(backend());
    explorer.set_root("/Customers(7)").await;
    explorer.toggle_expanded("/Customers(7)").await.unwrap();
    settle().await;

    let visible = explorer.visible(true);
    let json = serde_json::to_value(&visible).unwrap();
    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), visible.nodes.len());
    assert!(nodes.iter().any(|n| n["label"] == "Orders"));
    // Links carry fully resolved endpoints, not bare keys.
    assert!(json["links"][0]["source"]["key"].is_string());
}

#[tokio::test]
async fn switching_roots_rebuilds_against_the_same_backend() {
    let explorer = Explorer::new(backend());
    explorer.set_root("/Customers(7)").await;
    explorer.toggle_expanded("/Customers(7)").await.unwrap();
    settle().await;
    assert_eq!(explorer.graph().node_count(), 6);

    explorer.set_root("/Customers(7)/orders(0)").await;
    assert_eq!(explorer.graph().node_count(), 1);
    let root = explorer.graph().node("/Customers(7)/orders(0)").unwrap();
    assert!(root.origin);

    // The new root expands cleanly.
    explorer
        .toggle_expanded("/Customers(7)/orders(0)")
        .await
        .unwrap();
    settle().await;
    assert!(explorer
        .graph()
        .contains_node("/Customers(7)/orders(0)/product"));
}
