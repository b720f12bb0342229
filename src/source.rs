use std::collections::BTreeSet;

use crate::{error::Result, node::IndexedNode};

/// Read contract the indexer requires from the upstream content and media
/// services.
///
/// The indexer never writes through this interface; a content-tree
/// mutation happens upstream and is observed by re-reading the node.
pub trait DataSource {
    /// The node types this source serves, e.g. `["content", "media"]`.
    fn node_types(&self) -> Vec<String>;

    /// All nodes of one type, with resolved path and parent id.
    fn nodes(&self, node_type: &str) -> Result<Vec<IndexedNode>>;

    /// Whether a node must never appear in the index, regardless of any
    /// other criteria.
    fn is_protected(&self, node_id: i64) -> bool;
}

/// An in-memory node tree implementing [`DataSource`].
///
/// Used by tests and as the backing source for operations that never read
/// content (cascade deletes work from the index's own stored paths).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    nodes: Vec<IndexedNode>,
    protected: BTreeSet<i64>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any existing node with the same id.
    pub fn insert(&mut self, node: IndexedNode) {
        self.nodes.retain(|n| n.id != node.id);
        self.nodes.push(node);
    }

    pub fn get(&self, node_id: i64) -> Option<&IndexedNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Mark a node as protected.
    pub fn protect(&mut self, node_id: i64) {
        self.protected.insert(node_id);
    }

    /// Overwrite a node's location, mimicking an upstream move. The
    /// caller supplies the new path; descendants are not rewritten.
    ///
    /// Returns `false` if the node does not exist.
    pub fn set_location(
        &mut self,
        node_id: i64,
        parent_id: Option<i64>,
        path: &str,
    ) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => {
                node.parent_id = parent_id;
                node.path = path.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove a node and every node whose raw path mentions it,
    /// mimicking an upstream subtree delete.
    pub fn remove_subtree(&mut self, node_id: i64) {
        self.nodes.retain(|n| {
            n.parsed_path().map(|p| !p.contains(node_id)).unwrap_or(true)
        });
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl DataSource for MemorySource {
    fn node_types(&self) -> Vec<String> {
        let types: BTreeSet<&str> =
            self.nodes.iter().map(|n| n.node_type.as_str()).collect();
        types.into_iter().map(String::from).collect()
    }

    fn nodes(&self, node_type: &str) -> Result<Vec<IndexedNode>> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.node_type == node_type)
            .cloned()
            .collect())
    }

    fn is_protected(&self, node_id: i64) -> bool {
        self.protected.contains(&node_id)
    }
}
