use std::{collections::BTreeSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    node::IndexedNode,
    source::DataSource,
};

/// A node tree loaded from a JSON export, used as the CLI's
/// [`DataSource`].
///
/// # Format
///
/// ```json
/// {
///   "protected": [1125],
///   "nodes": [
///     {
///       "id": 1046,
///       "parentId": -1,
///       "path": "-1,1046",
///       "nodeType": "content",
///       "fields": { "nodeName": "Home", "bodyText": "Welcome" }
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentFile {
    pub protected: BTreeSet<i64>,
    pub nodes: Vec<IndexedNode>,
}

impl ContentFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, node_id: i64) -> Option<&IndexedNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Mark an additional node as protected (on top of the file's own
    /// protected set).
    pub fn protect(&mut self, node_id: i64) {
        self.protected.insert(node_id);
    }
}

impl DataSource for ContentFile {
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
