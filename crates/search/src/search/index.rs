//! Per-kind Tantivy index wrapper

use std::path::Path;
use std::sync::{RwLock, RwLockWriteGuard};

use anyhow::{Context, Result, anyhow};
use log::debug;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::TermQuery;
use tantivy::schema::{Field, IndexRecordOption, Term, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use super::query::QueryNode;
use super::schema::{IndexKind, build_schema};

/// Default heap size for an index writer (50MB)
pub const DEFAULT_HEAP_SIZE: usize = 50_000_000;

/// Smallest writer heap Tantivy accepts
pub const MIN_HEAP_SIZE: usize = 15_000_000;

/// Thread-safe wrapper around one of the three indexes
///
/// Every write is committed before it returns, so a document is searchable
/// as soon as `upsert` succeeds and gone as soon as `delete` does.
pub struct SearchIndex {
    kind: IndexKind,
    index: Index,
    reader: IndexReader,
    id_field: Field,
    heap_size: usize,
    /// Created on first write; holds the directory lock while open
    writer: RwLock<Option<IndexWriter>>,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("kind", &self.kind)
            .field("index", &"<tantivy::Index>")
            .finish()
    }
}

impl SearchIndex {
    /// Open the index at `path`, creating it with the kind's schema if absent
    ///
    /// Opening an existing index whose schema differs from the current field
    /// table fails; such an index has to be rebuilt.
    pub fn open(path: impl AsRef<Path>, kind: IndexKind, heap_size: usize) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create index directory {}", path.display()))?;

        let dir = MmapDirectory::open(path)
            .with_context(|| format!("Failed to open index directory {}", path.display()))?;
        let index = Index::open_or_create(dir, build_schema(kind))
            .with_context(|| format!("Failed to open or create {} index", kind))?;

        Self::from_index(index, kind, heap_size)
    }

    /// Create an in-memory index (for testing)
    pub fn in_memory(kind: IndexKind) -> Result<Self> {
        let index = Index::create_in_ram(build_schema(kind));
        Self::from_index(index, kind, DEFAULT_HEAP_SIZE)
    }

    fn from_index(index: Index, kind: IndexKind, heap_size: usize) -> Result<Self> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;

        let id_field = index
            .schema()
            .get_field(kind.id_field())
            .context("Index schema has no id field")?;

        Ok(Self {
            kind,
            index,
            reader,
            id_field,
            heap_size,
            writer: RwLock::new(None),
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Get or create the writer
    fn get_writer(&self) -> Result<RwLockWriteGuard<'_, Option<IndexWriter>>> {
        let mut guard = self
            .writer
            .write()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        if guard.is_none() {
            *guard = Some(
                self.index
                    .writer(self.heap_size)
                    .context("Failed to create index writer")?,
            );
        }
        Ok(guard)
    }

    /// Run `f` with the writer, then commit and make the change visible
    fn write_with<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut IndexWriter) -> Result<()>,
    {
        let mut guard = self.get_writer()?;
        let writer = guard
            .as_mut()
            .ok_or_else(|| anyhow!("Index writer unavailable"))?;
        f(writer)?;
        writer.commit().context("Commit failed")?;
        self.reader.reload().context("Reader reload failed")?;
        Ok(())
    }

    fn id_term(&self, id: &str) -> Term {
        Term::from_field_text(self.id_field, id)
    }

    /// Insert or replace the document keyed by `id`
    pub fn upsert(&self, id: &str, doc: TantivyDocument) -> Result<()> {
        self.write_with(|writer| {
            writer.delete_term(self.id_term(id));
            writer.add_document(doc)?;
            Ok(())
        })
    }

    /// Remove the document keyed by `id`; deleting a missing id is not an error
    pub fn delete(&self, id: &str) -> Result<()> {
        self.write_with(|writer| {
            writer.delete_term(self.id_term(id));
            Ok(())
        })
    }

    /// Remove every document matching `node`
    pub fn delete_matching(&self, node: &QueryNode) -> Result<()> {
        let query = node.compile(&self.index, self.kind)?;
        self.write_with(|writer| {
            writer.delete_query(query)?;
            Ok(())
        })
    }

    /// Remove all documents
    pub fn clear(&self) -> Result<()> {
        self.write_with(|writer| {
            writer.delete_all_documents()?;
            Ok(())
        })
    }

    /// Run `node` and return matching ids in relevance order
    ///
    /// A zero `limit`, or a window that ends past `usize::MAX`, selects no
    /// documents.
    pub fn search(&self, node: &QueryNode, limit: usize, offset: usize) -> Result<Vec<String>> {
        if limit == 0 || offset.checked_add(limit).is_none() {
            return Ok(Vec::new());
        }

        let query = node.compile(&self.index, self.kind)?;
        let searcher = self.reader.searcher();

        let collector = TopDocs::with_limit(limit).and_offset(offset);
        let top_docs = searcher
            .search(&query, &collector)
            .context("Search execution failed")?;

        let mut ids = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) {
                ids.push(id.to_string());
            }
        }

        debug!("{} search returned {} ids", self.kind, ids.len());
        Ok(ids)
    }

    /// Fetch the stored document keyed by `id`
    pub fn get(&self, id: &str) -> Result<Option<TantivyDocument>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(self.id_term(id), IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;

        match top_docs.into_iter().next() {
            Some((_score, address)) => Ok(Some(searcher.doc(address)?)),
            None => Ok(None),
        }
    }

    /// Number of live documents
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Pick up segments committed by other writers
    pub fn reload(&self) -> Result<()> {
        self.reader.reload().context("Reader reload failed")
    }

    /// Release the writer and wait for background merges to finish
    pub fn close(&self) -> Result<()> {
        let writer = self
            .writer
            .write()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?
            .take();
        if let Some(writer) = writer {
            writer
                .wait_merging_threads()
                .context("Failed waiting for merge threads")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::schema::{ChannelFields, channel};

    fn channel_doc(fields: &ChannelFields, id: &str, team: &str, names: &[&str]) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(fields.id, id);
        doc.add_text(fields.team_id, team);
        for name in names {
            doc.add_text(fields.name_suggest, name);
        }
        doc
    }

    fn channels_index() -> Result<(SearchIndex, ChannelFields)> {
        let index = SearchIndex::in_memory(IndexKind::Channels)?;
        let fields = ChannelFields::new(&index.index().schema())?;
        Ok((index, fields))
    }

    #[test]
    fn test_upsert_and_search() -> Result<()> {
        let (index, fields) = channels_index()?;
        index.upsert("c1", channel_doc(&fields, "c1", "T1", &["general"]))?;
        index.upsert("c2", channel_doc(&fields, "c2", "T2", &["random"]))?;

        let ids = index.search(&QueryNode::term(channel::TEAM_ID, "T1"), 10, 0)?;
        assert_eq!(ids, vec!["c1"]);
        Ok(())
    }

    #[test]
    fn test_upsert_replaces_existing_document() -> Result<()> {
        let (index, fields) = channels_index()?;
        index.upsert("c1", channel_doc(&fields, "c1", "T1", &["general"]))?;
        index.upsert("c1", channel_doc(&fields, "c1", "T2", &["general"]))?;

        assert_eq!(index.num_docs(), 1);
        let ids = index.search(&QueryNode::term(channel::TEAM_ID, "T2"), 10, 0)?;
        assert_eq!(ids, vec!["c1"]);
        assert!(index.search(&QueryNode::term(channel::TEAM_ID, "T1"), 10, 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_delete() -> Result<()> {
        let (index, fields) = channels_index()?;
        index.upsert("c1", channel_doc(&fields, "c1", "T1", &["general"]))?;
        index.delete("c1")?;
        index.delete("never-indexed")?;

        assert_eq!(index.num_docs(), 0);
        assert!(index.get("c1")?.is_none());
        Ok(())
    }

    #[test]
    fn test_prefix_search() -> Result<()> {
        let (index, fields) = channels_index()?;
        index.upsert("c1", channel_doc(&fields, "c1", "T1", &["engineering", "eng"]))?;
        index.upsert("c2", channel_doc(&fields, "c2", "T1", &["marketing"]))?;

        let ids = index.search(&QueryNode::prefix(channel::NAME_SUGGEST, "eng"), 10, 0)?;
        assert_eq!(ids, vec!["c1"]);
        Ok(())
    }

    #[test]
    fn test_limit_and_offset() -> Result<()> {
        let (index, fields) = channels_index()?;
        for i in 0..5 {
            let id = format!("c{}", i);
            index.upsert(&id, channel_doc(&fields, &id, "T1", &["chan"]))?;
        }

        let all = index.search(&QueryNode::MatchAll, 10, 0)?;
        assert_eq!(all.len(), 5);

        let page = index.search(&QueryNode::MatchAll, 2, 2)?;
        assert_eq!(page.len(), 2);
        assert_eq!(page, all[2..4].to_vec());
        Ok(())
    }

    #[test]
    fn test_zero_limit_returns_nothing() -> Result<()> {
        let (index, fields) = channels_index()?;
        index.upsert("c1", channel_doc(&fields, "c1", "T1", &["chan"]))?;

        assert!(index.search(&QueryNode::MatchAll, 0, 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_window_past_usize_max_returns_nothing() -> Result<()> {
        let (index, fields) = channels_index()?;
        index.upsert("c1", channel_doc(&fields, "c1", "T1", &["chan"]))?;

        assert!(index.search(&QueryNode::MatchAll, 10, usize::MAX - 5)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_delete_matching_and_clear() -> Result<()> {
        let (index, fields) = channels_index()?;
        index.upsert("c1", channel_doc(&fields, "c1", "T1", &["a"]))?;
        index.upsert("c2", channel_doc(&fields, "c2", "T2", &["b"]))?;
        index.upsert("c3", channel_doc(&fields, "c3", "T2", &["c"]))?;

        index.delete_matching(&QueryNode::term(channel::TEAM_ID, "T2"))?;
        assert_eq!(index.num_docs(), 1);

        index.clear()?;
        assert_eq!(index.num_docs(), 0);
        Ok(())
    }

    #[test]
    fn test_open_on_disk_persists() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("channels");
        {
            let index = SearchIndex::open(&path, IndexKind::Channels, DEFAULT_HEAP_SIZE)?;
            let fields = ChannelFields::new(&index.index().schema())?;
            index.upsert("c1", channel_doc(&fields, "c1", "T1", &["general"]))?;
            index.close()?;
        }

        let reopened = SearchIndex::open(&path, IndexKind::Channels, DEFAULT_HEAP_SIZE)?;
        assert_eq!(reopened.num_docs(), 1);
        assert!(reopened.get("c1")?.is_some());
        Ok(())
    }

    #[test]
    fn test_open_with_different_schema_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("index");
        SearchIndex::open(&path, IndexKind::Channels, DEFAULT_HEAP_SIZE)?.close()?;

        assert!(SearchIndex::open(&path, IndexKind::Users, DEFAULT_HEAP_SIZE).is_err());
        Ok(())
    }
}
