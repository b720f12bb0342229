use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::node::NodePath;

/// Immutable description of which nodes and fields are eligible for
/// indexing.
///
/// Rescoping is always construct-and-swap: the `with_*` builders return a
/// new value and the old one is replaced wholesale, so no reader can ever
/// observe a half-updated criteria.
///
/// # Examples
///
/// ```
/// use treedex::IndexCriteria;
///
/// let criteria = IndexCriteria::new()
///     .with_user_fields(["nodeName", "bodyText"])
///     .with_parent_id(Some(1116));
///
/// // Swapping the scope leaves the field sets untouched.
/// let rescoped = criteria.clone().with_parent_id(None);
/// assert_eq!(rescoped.user_fields, criteria.user_fields);
/// assert_eq!(rescoped.parent_id, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexCriteria {
    /// System-level fields indexed for every node type.
    pub standard_fields: BTreeSet<String>,
    /// Editor-defined fields.
    pub user_fields: BTreeSet<String>,
    /// Node types to index. Empty means all types.
    pub include_node_types: BTreeSet<String>,
    /// Node types to always skip. Takes precedence over the include set.
    pub exclude_node_types: BTreeSet<String>,
    /// When set, only nodes whose path contains this id are indexed.
    pub parent_id: Option<i64>,
}

impl IndexCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_standard_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.standard_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include_node_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_node_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_node_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_node_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// All indexable text fields, standard then user, deduplicated.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.standard_fields
            .iter()
            .chain(
                self.user_fields
                    .iter()
                    .filter(|f| !self.standard_fields.contains(*f)),
            )
            .map(String::as_str)
    }

    /// Whether a field is named by these criteria.
    pub fn indexes_field(&self, name: &str) -> bool {
        self.standard_fields.contains(name) || self.user_fields.contains(name)
    }

    /// Whether a node type passes the include/exclude filters.
    pub fn allows_node_type(&self, node_type: &str) -> bool {
        if self.exclude_node_types.contains(node_type) {
            return false;
        }
        self.include_node_types.is_empty()
            || self.include_node_types.contains(node_type)
    }

    /// Whether a node at `path` is inside the configured parent scope.
    pub fn in_scope(&self, path: &NodePath) -> bool {
        match self.parent_id {
            Some(parent_id) => path.contains(parent_id),
            None => true,
        }
    }
}
