use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A content or media node as supplied by the upstream data source.
///
/// Nodes are read-only from the index's point of view: mutations (moves,
/// renames, field edits) happen upstream and are observed by re-reading
/// the node and re-indexing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    /// Ancestor chain in the upstream encoding, e.g. `"-1,1111,2222,2112"`.
    /// Runs from the root to the node itself.
    pub path: String,
    /// Type discriminator, e.g. `"content"` or `"media"`.
    pub node_type: String,
    /// Field name to value. Only fields named by the current criteria are
    /// indexed; the rest are ignored.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl IndexedNode {
    /// Parse this node's raw path string into an ordered ancestor list.
    pub fn parsed_path(&self) -> Result<NodePath> {
        NodePath::parse(&self.path, self.id)
    }
}

/// An ordered list of ancestor ids, from the root down to the node itself.
///
/// # Examples
///
/// ```
/// use treedex::NodePath;
///
/// let path = NodePath::parse("-1,1111,2222,2112", 2112).unwrap();
/// assert!(path.contains(2222));
/// assert!(!path.contains(1116));
/// assert_eq!(path.to_string(), "-1,1111,2222,2112");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath(Vec<i64>);

impl NodePath {
    /// Parse a comma-delimited path string.
    ///
    /// The path must be non-empty, every component must be an integer, and
    /// the last component must equal `node_id` (a node's path always ends
    /// with its own id).
    pub fn parse(raw: &str, node_id: i64) -> Result<Self> {
        let invalid = |reason| Error::InvalidPath {
            node_id,
            path: raw.to_string(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("path is empty"));
        }

        let ids = raw
            .split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect::<std::result::Result<Vec<i64>, _>>()
            .map_err(|_| invalid("path contains a non-numeric component"))?;

        if ids.last() != Some(&node_id) {
            return Err(invalid("path does not end with the node's own id"));
        }

        Ok(Self(ids))
    }

    /// Whether `id` appears anywhere in the chain (including the node
    /// itself). This is the test for "is a descendant of, or is, `id`".
    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, path: &str) -> IndexedNode {
        IndexedNode {
            id,
            parent_id: None,
            path: path.to_string(),
            node_type: "content".to_string(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn parse_roundtrip() {
        let path = NodePath::parse("-1,1111,2222,2112", 2112).unwrap();
        assert_eq!(path.ids(), &[-1, 1111, 2222, 2112]);
        assert_eq!(path.to_string(), "-1,1111,2222,2112");
    }

    #[test]
    fn parse_tolerates_whitespace() {
        let path = NodePath::parse("-1, 1046", 1046).unwrap();
        assert_eq!(path.ids(), &[-1, 1046]);
    }

    #[test]
    fn contains_self_and_ancestors() {
        let path = NodePath::parse("-1,1111,2222,2112", 2112).unwrap();
        assert!(path.contains(2112));
        assert!(path.contains(1111));
        assert!(path.contains(-1));
        assert!(!path.contains(9999));
    }

    #[test]
    fn empty_path_rejected() {
        assert!(NodePath::parse("", 1).is_err());
        assert!(NodePath::parse("   ", 1).is_err());
    }

    #[test]
    fn non_numeric_component_rejected() {
        let err = NodePath::parse("-1,abc,2112", 2112).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { node_id: 2112, .. }));
    }

    #[test]
    fn path_must_end_with_own_id() {
        assert!(NodePath::parse("-1,1111,2222", 2112).is_err());
    }

    #[test]
    fn node_parsed_path_uses_own_id() {
        assert!(node(2112, "-1,1111,2222,2112").parsed_path().is_ok());
        assert!(node(2112, "-1,1111,2222").parsed_path().is_err());
    }

    #[test]
    fn node_serde_roundtrip() {
        let json = r#"{
            "id": 2112,
            "parentId": 2222,
            "path": "-1,1111,2222,2112",
            "nodeType": "media",
            "fields": { "nodeName": "Sample" }
        }"#;
        let n: IndexedNode = serde_json::from_str(json).unwrap();
        assert_eq!(n.id, 2112);
        assert_eq!(n.parent_id, Some(2222));
        assert_eq!(n.node_type, "media");
        assert_eq!(n.fields.get("nodeName").unwrap(), "Sample");

        let back = serde_json::to_string(&n).unwrap();
        let again: IndexedNode = serde_json::from_str(&back).unwrap();
        assert_eq!(n, again);
    }

    #[test]
    fn fields_default_to_empty() {
        let json = r#"{
            "id": 1,
            "parentId": -1,
            "path": "-1,1",
            "nodeType": "content"
        }"#;
        let n: IndexedNode = serde_json::from_str(json).unwrap();
        assert!(n.fields.is_empty());
    }
}
