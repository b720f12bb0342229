use serde::Serialize;
use tantivy::{
    IndexReader,
    TantivyDocument,
    collector::{Count, TopDocs},
    query::{
        AllQuery,
        BooleanQuery,
        Occur,
        Query,
        QueryParser,
        TermQuery,
    },
    schema::{Field, IndexRecordOption, Term, Value},
};

use crate::{
    error::{Error, Result},
    tantivy_index::ContentIndex,
};

/// A query against the content index.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    /// Free-text query over the criteria text fields.
    pub text: Option<String>,
    /// Restrict to one node type.
    pub node_type: Option<String>,
    /// Restrict to one node id.
    pub node_id: Option<i64>,
    /// Maximum number of matches. Zero means the default (100).
    pub limit: usize,
}

impl NodeQuery {
    pub fn by_id(node_id: i64) -> Self {
        Self {
            node_id: Some(node_id),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn effective_limit(&self) -> usize {
        if self.limit == 0 { 100 } else { self.limit }
    }
}

/// A single match from the index.
#[derive(Debug, Clone, Serialize)]
pub struct NodeMatch {
    pub score: f32,
    pub node_id: i64,
    pub node_type: String,
    pub parent_id: Option<i64>,
    pub path: String,
}

/// Read-only facade over the content index.
///
/// Every query re-acquires a fresh read view first, so a search issued
/// after a writer commit always observes that commit. The searcher never
/// mutates the index.
pub struct ContentSearcher {
    index: ContentIndex,
    reader: IndexReader,
}

impl ContentSearcher {
    pub fn new(index: ContentIndex) -> Result<Self> {
        let reader = index.index().reader()?;
        Ok(Self { index, reader })
    }

    /// Run a query and return matches ordered by descending score.
    pub fn search(&self, query: &NodeQuery) -> Result<Vec<NodeMatch>> {
        let compiled = self.compile(query)?;
        let searcher = self.fresh_searcher()?;

        let top_docs = searcher
            .search(&compiled, &TopDocs::with_limit(query.effective_limit()))?;

        let f = self.index.fields();
        let mut matches = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            matches.push(NodeMatch {
                score,
                node_id: extract_i64(&doc, f.node_id).unwrap_or(0),
                node_type: extract_text(&doc, f.node_type),
                parent_id: extract_i64(&doc, f.parent_id),
                path: extract_text(&doc, f.path),
            });
        }

        Ok(matches)
    }

    /// Count the documents matching a query.
    pub fn count(&self, query: &NodeQuery) -> Result<usize> {
        let compiled = self.compile(query)?;
        let searcher = self.fresh_searcher()?;
        Ok(searcher.search(&compiled, &Count)?)
    }

    /// Total number of documents in the index.
    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.fresh_searcher()?.num_docs())
    }

    /// A freshly opened low-level read handle, for tooling that needs to
    /// issue raw Tantivy queries.
    pub fn fresh_searcher(&self) -> Result<tantivy::Searcher> {
        self.reader.reload()?;
        Ok(self.reader.searcher())
    }

    fn compile(&self, query: &NodeQuery) -> Result<Box<dyn Query>> {
        let f = self.index.fields();
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Some(node_id) = query.node_id {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_i64(f.node_id, node_id),
                    IndexRecordOption::Basic,
                )),
            ));
        }

        if let Some(ref node_type) = query.node_type {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(f.node_type, node_type),
                    IndexRecordOption::Basic,
                )),
            ));
        }

        if let Some(ref text) = query.text {
            let text_fields: Vec<Field> = self
                .index
                .text_fields()
                .iter()
                .map(|(_, field)| *field)
                .collect();
            if text_fields.is_empty() {
                return Err(Error::Config(
                    "no text fields configured; cannot run a free-text query"
                        .to_string(),
                ));
            }

            let parser =
                QueryParser::for_index(self.index.index(), text_fields);
            let (parsed, _errors) = parser.parse_query_lenient(text);
            clauses.push((Occur::Must, parsed));
        }

        Ok(match clauses.len() {
            0 => Box::new(AllQuery),
            1 => clauses.pop().map(|(_, q)| q).unwrap_or(Box::new(AllQuery)),
            _ => Box::new(BooleanQuery::new(clauses)),
        })
    }
}

impl std::fmt::Debug for ContentSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSearcher").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_i64(doc: &TantivyDocument, field: Field) -> Option<i64> {
    doc.get_first(field).and_then(|v| v.as_i64())
}
