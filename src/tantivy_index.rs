use std::path::Path;

use tantivy::{
    Index,
    IndexWriter,
    TantivyDocument,
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::{
    criteria::IndexCriteria,
    error::{Error, Result},
    node::{IndexedNode, NodePath},
};

/// System field names used in the schema.
///
/// Criteria fields may not collide with these.
pub mod fields {
    pub const NODE_ID: &str = "node_id";
    pub const NODE_TYPE: &str = "node_type";
    pub const PARENT_ID: &str = "parent_id";
    pub const PATH: &str = "path";
    /// One indexed term per ancestor id in the node's path (including the
    /// node itself). Cascade deletes are a single delete-by-term on this
    /// field, so they stay correct even after the source tree has
    /// forgotten the subtree.
    pub const ANCESTOR: &str = "ancestor";
}

const RESERVED: &[&str] = &[
    fields::NODE_ID,
    fields::NODE_TYPE,
    fields::PARENT_ID,
    fields::PATH,
    fields::ANCESTOR,
];

/// Resolved handles for the system fields.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub node_id: Field,
    pub node_type: Field,
    pub parent_id: Field,
    pub path: Field,
    pub ancestor: Field,
}

/// Write-side adapter over a Tantivy index holding one document per node.
///
/// The schema carries the system fields plus one text field per criteria
/// field. Every mutation goes through a caller-held [`IndexWriter`]; no
/// mutation is visible to readers until that writer commits, which is
/// what makes a full rebuild atomic from the searcher's point of view.
#[derive(Clone)]
pub struct ContentIndex {
    index: Index,
    schema: Schema,
    fields: SchemaFields,
    text_fields: Vec<(String, Field)>,
}

fn build_schema(criteria: &IndexCriteria) -> Result<Schema> {
    let mut builder = Schema::builder();

    builder.add_i64_field(fields::NODE_ID, INDEXED | STORED | FAST);
    builder.add_text_field(fields::NODE_TYPE, STRING | STORED | FAST);
    builder.add_i64_field(fields::PARENT_ID, INDEXED | STORED);
    builder.add_text_field(fields::PATH, STRING | STORED);
    builder.add_i64_field(fields::ANCESTOR, INDEXED);

    let text_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("en_stem")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );

    for name in criteria.text_fields() {
        if RESERVED.contains(&name) {
            return Err(Error::Config(format!(
                "criteria field '{name}' collides with a system field"
            )));
        }
        builder.add_text_field(name, text_opts.clone());
    }

    Ok(builder.build())
}

fn resolve_fields(
    schema: &Schema,
    criteria: &IndexCriteria,
) -> Result<(SchemaFields, Vec<(String, Field)>)> {
    let system = |name: &str| {
        schema.get_field(name).map_err(|_| {
            Error::Config(format!(
                "index is missing the system field '{name}'"
            ))
        })
    };

    let resolved = SchemaFields {
        node_id: system(fields::NODE_ID)?,
        node_type: system(fields::NODE_TYPE)?,
        parent_id: system(fields::PARENT_ID)?,
        path: system(fields::PATH)?,
        ancestor: system(fields::ANCESTOR)?,
    };

    let mut text_fields = Vec::new();
    for name in criteria.text_fields() {
        let field = schema.get_field(name).map_err(|_| {
            Error::Config(format!(
                "criteria field '{name}' is not in the index schema; \
                 a rebuild with matching criteria is required"
            ))
        })?;
        text_fields.push((name.to_string(), field));
    }

    Ok((resolved, text_fields))
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);
}

impl ContentIndex {
    /// Open or create an index at the given directory.
    ///
    /// When the directory already holds an index its stored schema wins;
    /// every field named by `criteria` must resolve against it, otherwise
    /// this fails with [`Error::Config`].
    pub fn open(dir: &Path, criteria: &IndexCriteria) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        let exists = Index::exists(&mmap_dir)
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        let index = if exists {
            Index::open(mmap_dir)
                .map_err(|e| Error::IndexUnavailable(e.to_string()))?
        } else {
            let schema = build_schema(criteria)?;
            Index::create(
                mmap_dir,
                schema,
                tantivy::IndexSettings::default(),
            )
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?
        };

        register_tokenizers(&index);
        let schema = index.schema();
        let (fields, text_fields) = resolve_fields(&schema, criteria)?;

        Ok(Self {
            index,
            schema,
            fields,
            text_fields,
        })
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram(criteria: &IndexCriteria) -> Result<Self> {
        let schema = build_schema(criteria)?;
        let index = Index::create_in_ram(schema.clone());
        register_tokenizers(&index);
        let (fields, text_fields) = resolve_fields(&schema, criteria)?;

        Ok(Self {
            index,
            schema,
            fields,
            text_fields,
        })
    }

    /// Create a writer with the given memory budget (in bytes).
    ///
    /// Tantivy enforces the single-writer model through a directory lock;
    /// contention surfaces as [`Error::IndexUnavailable`].
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        self.index.writer(memory_budget).map_err(|e| match e {
            err @ tantivy::TantivyError::LockFailure(..) => {
                Error::IndexUnavailable(err.to_string())
            }
            err => Error::Tantivy(err),
        })
    }

    /// Add a document for `node` via the given writer, replacing any
    /// existing document with the same node id.
    ///
    /// Only criteria-named fields present on the node are indexed. The
    /// replacement is not visible until the writer commits.
    pub fn add_node(
        &self,
        writer: &IndexWriter,
        node: &IndexedNode,
        node_type: &str,
        path: &NodePath,
    ) -> Result<()> {
        let f = self.fields;

        // At most one live document per node id.
        writer.delete_term(Term::from_field_i64(f.node_id, node.id));

        let mut doc = TantivyDocument::new();
        doc.add_i64(f.node_id, node.id);
        doc.add_text(f.node_type, node_type);
        if let Some(parent_id) = node.parent_id {
            doc.add_i64(f.parent_id, parent_id);
        }
        doc.add_text(f.path, path.to_string());
        for id in path.ids() {
            doc.add_i64(f.ancestor, *id);
        }
        for (name, field) in &self.text_fields {
            if let Some(value) = node.fields.get(name) {
                doc.add_text(*field, value);
            }
        }

        writer.add_document(doc)?;
        Ok(())
    }

    /// Delete the document for a single node id, descendants untouched.
    pub fn delete_node(&self, writer: &IndexWriter, node_id: i64) {
        writer.delete_term(Term::from_field_i64(self.fields.node_id, node_id));
    }

    /// Delete the documents for `node_id` and every node whose stored path
    /// contains it.
    pub fn delete_subtree(&self, writer: &IndexWriter, node_id: i64) {
        writer
            .delete_term(Term::from_field_i64(self.fields.ancestor, node_id));
    }

    /// Delete all documents of one node type.
    pub fn delete_node_type(&self, writer: &IndexWriter, node_type: &str) {
        writer.delete_term(Term::from_field_text(
            self.fields.node_type,
            node_type,
        ));
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Resolved handles for the system fields.
    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    /// Resolved criteria text fields, in schema order.
    pub fn text_fields(&self) -> &[(String, Field)] {
        &self.text_fields
    }
}

impl std::fmt::Debug for ContentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentIndex").finish_non_exhaustive()
    }
}
