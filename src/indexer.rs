use rayon::prelude::*;
use tantivy::IndexWriter;
use tracing::{debug, warn};

use crate::{
    criteria::IndexCriteria,
    error::{Error, Result},
    node::{IndexedNode, NodePath},
    source::DataSource,
    tantivy_index::ContentIndex,
};

/// Default memory budget for the index writer, in bytes.
pub const WRITER_BUDGET: usize = 50_000_000;

/// Orchestrates index synchronization against a content tree.
///
/// The indexer owns the single [`IndexWriter`] for its index: exactly one
/// indexer writes to a given index at a time (Tantivy's directory lock
/// enforces this). Readers run concurrently and observe each commit once
/// they re-acquire a fresh view; see [`ContentSearcher`].
///
/// [`ContentSearcher`]: crate::searcher::ContentSearcher
pub struct Indexer<S: DataSource> {
    index: ContentIndex,
    writer: IndexWriter,
    source: S,
    criteria: IndexCriteria,
}

impl<S: DataSource> Indexer<S> {
    pub fn new(
        index: ContentIndex,
        source: S,
        criteria: IndexCriteria,
    ) -> Result<Self> {
        let writer = index.writer(WRITER_BUDGET)?;
        Ok(Self {
            index,
            writer,
            source,
            criteria,
        })
    }

    pub fn criteria(&self) -> &IndexCriteria {
        &self.criteria
    }

    /// Replace the criteria wholesale.
    ///
    /// [`IndexCriteria`] is immutable, so rescoping is a swap of the whole
    /// value; operations already in flight finish under the criteria they
    /// started with. The new criteria apply from the next operation on.
    pub fn set_criteria(&mut self, criteria: IndexCriteria) {
        self.criteria = criteria;
    }

    /// Drop every document and re-derive the full index from the data
    /// source under the current criteria.
    ///
    /// The delete-all and every re-add land in a single commit, so a
    /// concurrent reader observes either the old complete index or the
    /// new complete index, never an empty intermediate state.
    ///
    /// Returns the number of documents indexed.
    pub fn rebuild(&mut self) -> Result<usize> {
        self.writer.delete_all_documents()?;

        let mut indexed = 0;
        for node_type in self.source.node_types() {
            indexed += self.index_type(&node_type)?;
        }

        self.writer.commit()?;
        debug!(indexed, "index rebuilt");
        Ok(indexed)
    }

    /// Re-derive only the documents of one node type, leaving other types
    /// untouched.
    ///
    /// Fails with [`Error::Config`] if the data source does not serve
    /// `node_type`.
    pub fn index_all(&mut self, node_type: &str) -> Result<usize> {
        if !self.source.node_types().iter().any(|t| t == node_type) {
            return Err(Error::Config(format!(
                "unknown node type: {node_type}"
            )));
        }

        self.index.delete_node_type(&self.writer, node_type);
        let indexed = self.index_type(node_type)?;

        self.writer.commit()?;
        debug!(node_type, indexed, "node type re-indexed");
        Ok(indexed)
    }

    /// Re-index a single node: delete any existing document for its id,
    /// then re-evaluate eligibility and add a fresh document only if the
    /// node still qualifies.
    ///
    /// The delete always runs, and the eligibility check runs after it.
    /// A node moved out of scope is therefore removed by the very call
    /// that re-indexes it. Calling this twice in the same state yields
    /// the same observable result.
    ///
    /// Returns whether a document was added.
    pub fn reindex_node(
        &mut self,
        node: &IndexedNode,
        node_type: &str,
    ) -> Result<bool> {
        let path = node.parsed_path()?;

        // Phase one: unconditional delete.
        self.index.delete_node(&self.writer, node.id);

        // Phase two: re-evaluate under the current criteria.
        let added = if self.is_eligible(node.id, node_type, &path) {
            self.index.add_node(&self.writer, node, node_type, &path)?;
            true
        } else {
            false
        };

        self.writer.commit()?;
        debug!(node_id = node.id, node_type, added, "node re-indexed");
        Ok(added)
    }

    /// Delete a node and all of its descendants from the index.
    ///
    /// The descendant set comes from the ancestor terms stored on each
    /// document, never from the source tree, which may already have
    /// forgotten the subtree.
    pub fn delete_from_index(&mut self, node_id: i64) -> Result<()> {
        self.index.delete_subtree(&self.writer, node_id);
        self.writer.commit()?;
        debug!(node_id, "subtree deleted from index");
        Ok(())
    }

    /// Low-level writer escape hatch for maintenance and test tooling.
    ///
    /// Writes made through this handle bypass the eligibility checks;
    /// production code should go through the indexer's own operations.
    pub fn index_writer(&mut self) -> &mut IndexWriter {
        &mut self.writer
    }

    pub fn index(&self) -> &ContentIndex {
        &self.index
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Pull all nodes of one type from the source and add the eligible
    /// ones. Does not commit; callers batch this into their own commit.
    fn index_type(&self, node_type: &str) -> Result<usize> {
        let nodes = self.source.nodes(node_type)?;

        // Parse and validate in parallel; the writer is fed sequentially.
        let prepared: Vec<(IndexedNode, NodePath)> = nodes
            .into_par_iter()
            .filter_map(|node| match node.parsed_path() {
                Ok(path) => Some((node, path)),
                Err(err) => {
                    warn!(node_id = node.id, %err, "skipping malformed node");
                    None
                }
            })
            .collect();

        let mut indexed = 0;
        for (node, path) in &prepared {
            if !self.is_eligible(node.id, node_type, path) {
                continue;
            }
            self.index.add_node(&self.writer, node, node_type, path)?;
            indexed += 1;
        }

        Ok(indexed)
    }

    /// The single eligibility gate shared by rebuilds and re-indexes:
    /// protected nodes never qualify, then the type filters, then the
    /// parent scope.
    fn is_eligible(
        &self,
        node_id: i64,
        node_type: &str,
        path: &NodePath,
    ) -> bool {
        !self.source.is_protected(node_id)
            && self.criteria.allows_node_type(node_type)
            && self.criteria.in_scope(path)
    }
}

impl<S: DataSource> std::fmt::Debug for Indexer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("criteria", &self.criteria)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        searcher::{ContentSearcher, NodeQuery},
        source::MemorySource,
    };

    fn node(
        id: i64,
        parent_id: i64,
        path: &str,
        node_type: &str,
    ) -> IndexedNode {
        IndexedNode {
            id,
            parent_id: Some(parent_id),
            path: path.to_string(),
            node_type: node_type.to_string(),
            fields: BTreeMap::from([(
                "nodeName".to_string(),
                format!("node {id}"),
            )]),
        }
    }

    fn fixture() -> MemorySource {
        let mut source = MemorySource::new();
        // Content tree.
        source.insert(node(1046, -1, "-1,1046", "content"));
        source.insert(node(1140, 1046, "-1,1046,1140", "content"));
        source.insert(node(1141, 1140, "-1,1046,1140,1141", "content"));
        source.insert(node(1142, 1140, "-1,1046,1140,1142", "content"));
        source.insert(node(1175, 1046, "-1,1046,1175", "content"));
        // Media tree.
        source.insert(node(1111, -1, "-1,1111", "media"));
        source.insert(node(2222, 1111, "-1,1111,2222", "media"));
        source.insert(node(2112, 2222, "-1,1111,2222,2112", "media"));
        source.insert(node(1116, 1111, "-1,1111,1116", "media"));
        source
    }

    fn indexer(source: MemorySource) -> Indexer<MemorySource> {
        let criteria = IndexCriteria::new().with_user_fields(["nodeName"]);
        let index = ContentIndex::open_in_ram(&criteria).unwrap();
        Indexer::new(index, source, criteria).unwrap()
    }

    fn count_id(indexer: &Indexer<MemorySource>, id: i64) -> usize {
        let searcher = ContentSearcher::new(indexer.index().clone()).unwrap();
        searcher.count(&NodeQuery::by_id(id)).unwrap()
    }

    #[test]
    fn rebuild_indexes_full_tree() {
        let mut indexer = indexer(fixture());
        assert_eq!(indexer.rebuild().unwrap(), 9);
        assert_eq!(count_id(&indexer, 1046), 1);
        assert_eq!(count_id(&indexer, 2112), 1);
    }

    #[test]
    fn rebuild_excludes_protected_nodes() {
        let mut source = fixture();
        source.protect(1175);
        let mut indexer = indexer(source);

        assert_eq!(indexer.rebuild().unwrap(), 8);
        assert_eq!(count_id(&indexer, 1175), 0);
        assert_eq!(count_id(&indexer, 1046), 1);
    }

    #[test]
    fn rebuild_applies_parent_scope() {
        let mut indexer = indexer(fixture());
        indexer.set_criteria(
            indexer.criteria().clone().with_parent_id(Some(1140)),
        );

        // Only 1140, 1141 and 1142 carry 1140 in their paths.
        assert_eq!(indexer.rebuild().unwrap(), 3);
        assert_eq!(count_id(&indexer, 1141), 1);
        assert_eq!(count_id(&indexer, 1046), 0);
        assert_eq!(count_id(&indexer, 2112), 0);
    }

    #[test]
    fn rebuild_applies_type_filters() {
        let mut indexer = indexer(fixture());
        indexer.set_criteria(
            indexer.criteria().clone().with_exclude_node_types(["media"]),
        );

        assert_eq!(indexer.rebuild().unwrap(), 5);
        assert_eq!(count_id(&indexer, 2222), 0);
        assert_eq!(count_id(&indexer, 1046), 1);
    }

    #[test]
    fn rebuild_skips_malformed_nodes() {
        let mut source = fixture();
        source.insert(IndexedNode {
            id: 7777,
            parent_id: Some(1046),
            path: "not,a,path".to_string(),
            node_type: "content".to_string(),
            fields: BTreeMap::new(),
        });
        let mut indexer = indexer(source);

        // The malformed node is skipped; the rest of the rebuild goes
        // through.
        assert_eq!(indexer.rebuild().unwrap(), 9);
        assert_eq!(count_id(&indexer, 7777), 0);
    }

    #[test]
    fn index_all_rejects_unknown_node_type() {
        let mut indexer = indexer(fixture());
        indexer.rebuild().unwrap();

        let err = indexer.index_all("member").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn index_all_restores_one_type_only() {
        let mut indexer = indexer(fixture());
        indexer.rebuild().unwrap();

        // Wipe content documents through the low-level writer, the way
        // maintenance tooling would.
        {
            let index = indexer.index().clone();
            let writer = indexer.index_writer();
            index.delete_node_type(writer, "content");
            writer.commit().unwrap();
        }
        assert_eq!(count_id(&indexer, 1046), 0);
        assert_eq!(count_id(&indexer, 1111), 1);

        assert_eq!(indexer.index_all("content").unwrap(), 5);
        assert_eq!(count_id(&indexer, 1046), 1);
        assert_eq!(count_id(&indexer, 1141), 1);
    }

    #[test]
    fn reindex_node_moved_into_scope_is_added() {
        let mut indexer = indexer(fixture());
        indexer.set_criteria(
            indexer.criteria().clone().with_parent_id(Some(1116)),
        );
        indexer.rebuild().unwrap();
        assert_eq!(count_id(&indexer, 2112), 0);

        indexer.source_mut().set_location(
            2112,
            Some(1116),
            "-1,1111,1116,2112",
        );
        let moved = indexer.source().get(2112).unwrap().clone();

        assert!(indexer.reindex_node(&moved, "media").unwrap());
        assert_eq!(count_id(&indexer, 2112), 1);
    }

    #[test]
    fn reindex_node_moved_out_of_scope_is_removed() {
        let mut indexer = indexer(fixture());
        indexer.set_criteria(
            indexer.criteria().clone().with_parent_id(Some(2222)),
        );
        indexer.rebuild().unwrap();
        assert_eq!(count_id(&indexer, 2112), 1);

        indexer.source_mut().set_location(
            2112,
            Some(1116),
            "-1,1111,1116,2112",
        );
        let moved = indexer.source().get(2112).unwrap().clone();

        // The delete happens before the eligibility re-check, so the
        // same call that re-indexes the node removes it.
        assert!(!indexer.reindex_node(&moved, "media").unwrap());
        assert_eq!(count_id(&indexer, 2112), 0);
    }

    #[test]
    fn reindex_node_is_idempotent() {
        let mut indexer = indexer(fixture());
        indexer.rebuild().unwrap();

        let node = indexer.source().get(2112).unwrap().clone();
        assert!(indexer.reindex_node(&node, "media").unwrap());
        assert!(indexer.reindex_node(&node, "media").unwrap());
        assert_eq!(count_id(&indexer, 2112), 1);
    }

    #[test]
    fn reindex_node_respects_protection() {
        let mut indexer = indexer(fixture());
        indexer.rebuild().unwrap();
        assert_eq!(count_id(&indexer, 1175), 1);

        indexer.source_mut().protect(1175);
        let node = indexer.source().get(1175).unwrap().clone();

        assert!(!indexer.reindex_node(&node, "content").unwrap());
        assert_eq!(count_id(&indexer, 1175), 0);
    }

    #[test]
    fn reindex_node_rejects_malformed_path() {
        let mut indexer = indexer(fixture());
        indexer.rebuild().unwrap();

        let bad = IndexedNode {
            id: 2112,
            parent_id: Some(2222),
            path: "garbage".to_string(),
            node_type: "media".to_string(),
            fields: BTreeMap::new(),
        };
        assert!(matches!(
            indexer.reindex_node(&bad, "media").unwrap_err(),
            Error::InvalidPath { .. }
        ));
        // Nothing was deleted: the path is rejected before phase one.
        assert_eq!(count_id(&indexer, 2112), 1);
    }

    #[test]
    fn delete_from_index_cascades_to_descendants() {
        let mut indexer = indexer(fixture());
        indexer.rebuild().unwrap();

        // Mimic the source forgetting the subtree before the index hears
        // about it.
        indexer.source_mut().remove_subtree(1140);
        indexer.delete_from_index(1140).unwrap();

        assert_eq!(count_id(&indexer, 1140), 0);
        assert_eq!(count_id(&indexer, 1141), 0);
        assert_eq!(count_id(&indexer, 1142), 0);
        assert_eq!(count_id(&indexer, 1175), 1);
        assert_eq!(count_id(&indexer, 2112), 1);
    }

    #[test]
    fn criteria_swap_does_not_disturb_existing_documents() {
        let mut indexer = indexer(fixture());
        indexer.rebuild().unwrap();
        assert_eq!(count_id(&indexer, 2112), 1);

        // Swapping criteria alone changes nothing until the next index
        // operation.
        indexer.set_criteria(
            indexer.criteria().clone().with_parent_id(Some(1116)),
        );
        assert_eq!(count_id(&indexer, 2112), 1);

        indexer.rebuild().unwrap();
        assert_eq!(count_id(&indexer, 2112), 0);
    }
}
