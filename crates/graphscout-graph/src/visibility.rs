//! Visibility engine
//!
//! Pure derivation of the visible subgraph from a snapshot of nodes, links
//! and origins. A breadth-first traversal starts at the origin nodes and only
//! continues *through* nodes whose `expanded` flag is set; a reached node is
//! always shown, but a collapsed one stops the walk, which is what folds whole
//! subtrees away when the user collapses a node.
//!
//! The function keeps no state between runs and is safe to re-run after every
//! store mutation. An empty origin set yields an empty result; the policy of
//! "no origins means everything is an origin" belongs to the builder layer,
//! which materializes it by flagging every node (see the schema explorer).

use crate::{Link, Node, NodeKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A visible link with both endpoints resolved to node snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisibleLink {
    pub source: Node,
    pub target: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The derived subgraph handed to the renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisibleGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<VisibleLink>,
}

/// Compute the visible subgraph.
///
/// - `nodes` and `links` are taken in their stored order and the output
///   preserves that relative order.
/// - Origins missing from `nodes` are dropped.
/// - Links with a missing endpoint never contribute adjacency and never
///   appear in the output.
/// - When `directed` is false each link contributes adjacency both ways;
///   stored orientation is untouched.
pub fn visible_graph(
    nodes: &[Node],
    links: &[Link],
    origins: &[NodeKey],
    directed: bool,
) -> VisibleGraph {
    let index: HashMap<&str, &Node> = nodes.iter().map(|n| (n.key.as_str(), n)).collect();

    // Adjacency over links whose endpoints both exist.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for link in links {
        let (source, target) = (link.source.as_str(), link.target.as_str());
        if !index.contains_key(source) || !index.contains_key(target) {
            continue;
        }
        adjacency.entry(source).or_default().push(target);
        if !directed {
            adjacency.entry(target).or_default().push(source);
        }
    }

    // BFS from the origins; each key enters the queue at most once.
    let mut visited: HashSet<&str> = HashSet::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for origin in origins {
        if let Some(node) = index.get(origin.as_str()) {
            let key = node.key.as_str();
            if seen.insert(key) {
                queue.push_back(key);
            }
        }
    }
    while let Some(current) = queue.pop_front() {
        visited.insert(current);
        let expanded = index.get(current).map(|n| n.expanded).unwrap_or(false);
        if !expanded {
            continue;
        }
        if let Some(neighbors) = adjacency.get(current) {
            for neighbor in neighbors {
                if !visited.contains(neighbor) && seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    let visible_nodes: Vec<Node> = nodes
        .iter()
        .filter(|n| visited.contains(n.key.as_str()))
        .cloned()
        .collect();
    let visible_links: Vec<VisibleLink> = links
        .iter()
        .filter(|l| visited.contains(l.source.as_str()) && visited.contains(l.target.as_str()))
        .map(|l| VisibleLink {
            source: index[l.source.as_str()].clone(),
            target: index[l.target.as_str()].clone(),
            label: l.label.clone(),
        })
        .collect();

    VisibleGraph {
        nodes: visible_nodes,
        links: visible_links,
    }
}
