//! treedex - keeps a [Tantivy](https://github.com/quickwit-oss/tantivy)
//! full-text index synchronized with a hierarchical content tree.
//!
//! A content repository supplies nodes with id, parent id, path and typed
//! fields; treedex derives one index document per node under an immutable
//! [`IndexCriteria`] policy (field sets, node-type filters, parent-id
//! scoping, protected nodes) and keeps the index in step with tree
//! mutations: full rebuilds, per-node re-indexing, and cascading subtree
//! deletes driven by the paths stored on the documents themselves.
//!
//! # Quick start
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use treedex::{
//!     ContentIndex, ContentSearcher, IndexCriteria, IndexedNode, Indexer,
//!     MemorySource, NodeQuery,
//! };
//!
//! let criteria = IndexCriteria::new().with_user_fields(["bodyText"]);
//!
//! let mut source = MemorySource::new();
//! source.insert(IndexedNode {
//!     id: 1046,
//!     parent_id: Some(-1),
//!     path: "-1,1046".to_string(),
//!     node_type: "content".to_string(),
//!     fields: BTreeMap::from([(
//!         "bodyText".to_string(),
//!         "welcome home".to_string(),
//!     )]),
//! });
//!
//! let index = ContentIndex::open_in_ram(&criteria).unwrap();
//! let mut indexer = Indexer::new(index.clone(), source, criteria).unwrap();
//! indexer.rebuild().unwrap();
//!
//! let searcher = ContentSearcher::new(index).unwrap();
//! let matches = searcher.search(&NodeQuery::text("welcome")).unwrap();
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].node_id, 1046);
//! ```

pub mod cli;
pub mod config_db;
pub mod content_file;
pub mod criteria;
pub mod data_dir;
pub mod error;
pub mod indexer;
pub mod node;
pub mod searcher;
pub mod source;
pub mod tantivy_index;

pub use config_db::ConfigDb;
pub use content_file::ContentFile;
pub use criteria::IndexCriteria;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use indexer::Indexer;
pub use node::{IndexedNode, NodePath};
pub use searcher::{ContentSearcher, NodeMatch, NodeQuery};
pub use source::{DataSource, MemorySource};
pub use tantivy_index::ContentIndex;
