//! Persisted guideline index combining tantivy metadata with an
//! embedding sidecar.
//!
//! The artifact is a directory: `tantivy/` holds chunk metadata and text,
//! `vectors.json` holds one embedding per chunk keyed by sequence number,
//! and `meta.json` records enough about the build (model, dimensions,
//! source fingerprint) to validate later opens. Ingestion rebuilds the
//! whole artifact; nothing mutates it afterwards, so readers can share
//! the index freely across threads.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::directory::error::OpenDirectoryError;
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument as Document, Term,
};
use thiserror::Error;

use super::schema::GuidelineSchema;
use crate::chunk::Chunk;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::outline::UrgencyLevel;

/// Artifact layout version. Bump when the schema or sidecar format
/// changes shape.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Default batch size for embedding generation.
/// Smaller batches reduce memory pressure and provide smoother progress.
const EMBEDDING_BATCH_SIZE: usize = 32;

/// Tantivy writer heap.
const TANTIVY_HEAP_BYTES: usize = 50_000_000; // 50MB

const TANTIVY_DIR: &str = "tantivy";
const VECTORS_FILE: &str = "vectors.json";
const META_FILE: &str = "meta.json";

/// Errors from index construction and queries.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("cannot build an index from zero chunks")]
    Empty,

    #[error("index at {path} is not ready: {reason}")]
    NotReady { path: PathBuf, reason: String },

    #[error("query vector has {query} dimensions but the index stores {index}")]
    DimensionMismatch { query: usize, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Directory error: {0}")]
    Directory(#[from] OpenDirectoryError),

    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Progress updates during index construction.
#[derive(Debug, Clone, Copy)]
pub enum BuildProgress {
    /// Generating embeddings for chunk batches.
    GeneratingEmbeddings { current: usize, total: usize },
    /// Writing chunk metadata into tantivy.
    StoringChunks { current: usize, total: usize },
}

/// Metadata persisted beside the index artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Artifact layout version.
    pub version: u32,
    /// Short label for the indexed guideline (e.g. `ng12`).
    pub document_label: String,
    /// Number of chunks in the index.
    pub chunk_count: usize,
    /// Identifier of the embedding model used at build time.
    pub embedding_model: String,
    /// Embedding vector width.
    pub embedding_dimensions: usize,
    /// Hash of the source page texts the index was built from.
    pub source_fingerprint: String,
    /// Build timestamp (UTC seconds).
    pub created_at: u64,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity clamped into [0, 1], highest first.
    pub score: f32,
}

/// Aggregate counts over an index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatistics {
    /// Label of the indexed guideline.
    pub document_label: String,
    /// Total chunks in the index.
    pub total_chunks: usize,
    /// Sorted distinct section identifiers seen across chunks.
    pub sections: Vec<String>,
    /// Sorted distinct subsection identifiers seen across chunks.
    pub subsections: Vec<String>,
    /// Whether any chunk carries an urgency tier above `none`.
    pub has_urgency: bool,
    /// Chunk count per urgency tier name.
    pub urgency_counts: BTreeMap<String, usize>,
    /// Identifier of the embedding model used at build time.
    pub embedding_model: String,
    /// Embedding vector width.
    pub embedding_dimensions: usize,
    /// Build timestamp (UTC seconds).
    pub created_at: u64,
}

/// Embedding sidecar file contents.
#[derive(Serialize, Deserialize)]
struct VectorSidecar {
    model: String,
    dimensions: usize,
    /// `(seq, embedding)` pairs, one per chunk.
    vectors: Vec<(u64, Vec<f32>)>,
}

/// Read-only guideline index.
pub struct GuidelineIndex {
    index: Index,
    reader: IndexReader,
    schema: GuidelineSchema,
    /// Chunk embeddings sorted by sequence number.
    vectors: Vec<(u64, Vec<f32>)>,
    meta: IndexMeta,
}

impl std::fmt::Debug for GuidelineIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidelineIndex")
            .field("document_label", &self.meta.document_label)
            .field("chunk_count", &self.meta.chunk_count)
            .field("embedding_model", &self.meta.embedding_model)
            .finish()
    }
}

impl GuidelineIndex {
    /// Build a fresh index artifact at `path` from the given chunks.
    ///
    /// Embeddings are generated first; only once every chunk has a vector
    /// is the previous artifact (if any) replaced, so a mid-build failure
    /// leaves an existing index untouched.
    pub fn build(
        path: &Path,
        chunks: &[Chunk],
        label: &str,
        source_fingerprint: &str,
        provider: &dyn EmbeddingProvider,
        mut on_progress: impl FnMut(BuildProgress),
    ) -> IndexResult<Self> {
        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }

        // Phase 1: embeddings, batched.
        let total = chunks.len();
        let mut vectors: Vec<(u64, Vec<f32>)> = Vec::with_capacity(total);
        for batch in chunks.chunks(EMBEDDING_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
            let embeddings = provider.embed_batch(&texts)?;
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                vectors.push((u64::from(chunk.seq), embedding));
            }
            on_progress(BuildProgress::GeneratingEmbeddings {
                current: vectors.len(),
                total,
            });
        }

        // Phase 2: replace the artifact wholesale.
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        let tantivy_path = path.join(TANTIVY_DIR);
        fs::create_dir_all(&tantivy_path)?;

        let (tantivy_schema, schema) = GuidelineSchema::build();
        let dir = MmapDirectory::open(&tantivy_path)?;
        let index = Index::create(dir, tantivy_schema, IndexSettings::default())?;

        let mut writer: IndexWriter<Document> = index.writer(TANTIVY_HEAP_BYTES)?;
        for (idx, chunk) in chunks.iter().enumerate() {
            writer.add_document(chunk_document(&schema, chunk))?;
            on_progress(BuildProgress::StoringChunks {
                current: idx + 1,
                total,
            });
        }
        writer.commit()?;
        drop(writer);

        let meta = IndexMeta {
            version: INDEX_FORMAT_VERSION,
            document_label: label.to_string(),
            chunk_count: total,
            embedding_model: provider.model_id(),
            embedding_dimensions: provider.dimensions(),
            source_fingerprint: source_fingerprint.to_string(),
            created_at: unix_timestamp(),
        };
        fs::write(path.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;

        let sidecar = VectorSidecar {
            model: provider.model_id(),
            dimensions: provider.dimensions(),
            vectors,
        };
        fs::write(path.join(VECTORS_FILE), serde_json::to_string(&sidecar)?)?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            schema,
            vectors: sidecar.vectors,
            meta,
        })
    }

    /// Open an existing index artifact.
    ///
    /// Returns [`IndexError::NotReady`] when the artifact is missing or
    /// internally inconsistent, with a reason naming what was wrong.
    pub fn open(path: &Path) -> IndexResult<Self> {
        let meta_path = path.join(META_FILE);
        if !meta_path.exists() {
            return Err(not_ready(path, "no index metadata found; run ingest first"));
        }
        let meta: IndexMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)
            .map_err(|e| not_ready(path, &format!("index metadata is corrupt ({e}); re-run ingest")))?;
        if meta.version != INDEX_FORMAT_VERSION {
            return Err(not_ready(
                path,
                &format!(
                    "index format version {} is not supported (expected {INDEX_FORMAT_VERSION}); re-run ingest",
                    meta.version
                ),
            ));
        }

        let sidecar_path = path.join(VECTORS_FILE);
        if !sidecar_path.exists() {
            return Err(not_ready(path, "embedding sidecar is missing; re-run ingest"));
        }
        let sidecar: VectorSidecar = serde_json::from_str(&fs::read_to_string(&sidecar_path)?)
            .map_err(|e| not_ready(path, &format!("embedding sidecar is corrupt ({e}); re-run ingest")))?;
        if sidecar.model != meta.embedding_model
            || sidecar.dimensions != meta.embedding_dimensions
            || sidecar.vectors.len() != meta.chunk_count
        {
            return Err(not_ready(
                path,
                "embedding sidecar does not match index metadata; re-run ingest",
            ));
        }

        let tantivy_path = path.join(TANTIVY_DIR);
        if !tantivy_path.join("meta.json").exists() {
            return Err(not_ready(path, "tantivy segment data is missing; re-run ingest"));
        }
        let index = Index::open_in_dir(&tantivy_path)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        reader.reload()?;

        // Field handles are positional, so rebuilding the schema matches
        // the one the artifact was created with (the version check above
        // guards layout drift).
        let (_, schema) = GuidelineSchema::build();

        let mut vectors = sidecar.vectors;
        vectors.sort_unstable_by_key(|(seq, _)| *seq);

        Ok(Self {
            index,
            reader,
            schema,
            vectors,
            meta,
        })
    }

    /// Metadata recorded when the index was built.
    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.meta.chunk_count
    }

    pub fn is_empty(&self) -> bool {
        self.meta.chunk_count == 0
    }

    /// Rank all chunks against a query embedding and return the top `k`.
    pub fn search_vector(&self, query: &[f32], top_k: NonZeroUsize) -> IndexResult<Vec<SearchHit>> {
        if query.len() != self.meta.embedding_dimensions {
            return Err(IndexError::DimensionMismatch {
                query: query.len(),
                index: self.meta.embedding_dimensions,
            });
        }

        let mut scored: Vec<(u64, f32)> = self
            .vectors
            .iter()
            .map(|(seq, vector)| (*seq, unit_score(cosine_similarity(query, vector))))
            .collect();
        // Highest score first; equal scores fall back to document order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k.get());

        let mut hits = Vec::with_capacity(scored.len());
        for (seq, score) in scored {
            if let Some(chunk) = self.chunk_by_seq(seq)? {
                hits.push(SearchHit { chunk, score });
            }
        }
        Ok(hits)
    }

    /// All chunks belonging to a section, in document order.
    ///
    /// An unknown section yields an empty list, not an error.
    pub fn section_chunks(&self, section_id: &str) -> IndexResult<Vec<Chunk>> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.schema.section, section_id);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(self.doc_limit()))?;

        let mut chunks = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: Document = searcher.doc(address)?;
            chunks.push(self.read_chunk(&doc));
        }
        chunks.sort_by_key(|chunk| chunk.seq);
        Ok(chunks)
    }

    /// Chunks in actionable urgency tiers, most urgent tier first and in
    /// document order within a tier.
    pub fn urgent_chunks(&self, limit: usize) -> IndexResult<Vec<Chunk>> {
        let searcher = self.reader.searcher();
        let mut ordered = Vec::new();

        for level in [
            UrgencyLevel::VeryUrgent,
            UrgencyLevel::SuspectedCancer,
            UrgencyLevel::Urgent,
        ] {
            let term = Term::from_field_text(self.schema.urgency, level.as_str());
            let query = TermQuery::new(term, IndexRecordOption::Basic);
            let top_docs = searcher.search(&query, &TopDocs::with_limit(self.doc_limit()))?;

            let mut tier = Vec::with_capacity(top_docs.len());
            for (_score, address) in top_docs {
                let doc: Document = searcher.doc(address)?;
                tier.push(self.read_chunk(&doc));
            }
            tier.sort_by_key(|chunk| chunk.seq);
            ordered.extend(tier);
        }

        ordered.truncate(limit);
        Ok(ordered)
    }

    /// Aggregate counts over the indexed chunks.
    pub fn statistics(&self) -> IndexResult<IndexStatistics> {
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&AllQuery, &TopDocs::with_limit(self.doc_limit()))?;

        let mut sections = BTreeSet::new();
        let mut subsections = BTreeSet::new();
        let mut urgency_counts: BTreeMap<String, usize> = BTreeMap::new();
        for (_score, address) in top_docs {
            let doc: Document = searcher.doc(address)?;
            let chunk = self.read_chunk(&doc);
            if let Some(section) = chunk.section {
                sections.insert(section);
            }
            if let Some(subsection) = chunk.subsection {
                subsections.insert(subsection);
            }
            *urgency_counts
                .entry(chunk.urgency.as_str().to_string())
                .or_insert(0) += 1;
        }

        let has_urgency = urgency_counts
            .iter()
            .any(|(name, count)| name != UrgencyLevel::None.as_str() && *count > 0);

        Ok(IndexStatistics {
            document_label: self.meta.document_label.clone(),
            total_chunks: self.meta.chunk_count,
            sections: sections.into_iter().collect(),
            subsections: subsections.into_iter().collect(),
            has_urgency,
            urgency_counts,
            embedding_model: self.meta.embedding_model.clone(),
            embedding_dimensions: self.meta.embedding_dimensions,
            created_at: self.meta.created_at,
        })
    }

    fn doc_limit(&self) -> usize {
        self.meta.chunk_count.max(1)
    }

    fn chunk_by_seq(&self, seq: u64) -> IndexResult<Option<Chunk>> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_u64(self.schema.seq, seq);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;

        let Some((_score, address)) = top_docs.first() else {
            return Ok(None);
        };
        let doc: Document = searcher.doc(*address)?;
        Ok(Some(self.read_chunk(&doc)))
    }

    fn read_chunk(&self, doc: &Document) -> Chunk {
        let text_of = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let u64_of = |field: Field| doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0);

        Chunk {
            id: text_of(self.schema.chunk_id).unwrap_or_default(),
            seq: u64_of(self.schema.seq) as u32,
            page: u64_of(self.schema.page) as u32,
            text: text_of(self.schema.text).unwrap_or_default(),
            overlap_chars: u64_of(self.schema.overlap_chars) as usize,
            section: text_of(self.schema.section),
            subsection: text_of(self.schema.subsection),
            recommendation_id: text_of(self.schema.recommendation_id),
            urgency: doc
                .get_first(self.schema.urgency)
                .and_then(|v| v.as_str())
                .and_then(UrgencyLevel::parse)
                .unwrap_or(UrgencyLevel::None),
        }
    }
}

fn chunk_document(schema: &GuidelineSchema, chunk: &Chunk) -> Document {
    let mut doc = Document::new();
    doc.add_text(schema.chunk_id, &chunk.id);
    doc.add_u64(schema.seq, u64::from(chunk.seq));
    doc.add_u64(schema.page, u64::from(chunk.page));
    doc.add_text(schema.text, &chunk.text);
    doc.add_u64(schema.overlap_chars, chunk.overlap_chars as u64);
    if let Some(ref section) = chunk.section {
        doc.add_text(schema.section, section);
    }
    if let Some(ref subsection) = chunk.subsection {
        doc.add_text(schema.subsection, subsection);
    }
    if let Some(ref recommendation) = chunk.recommendation_id {
        doc.add_text(schema.recommendation_id, recommendation);
    }
    doc.add_text(schema.urgency, chunk.urgency.as_str());
    doc
}

fn not_ready(path: &Path, reason: &str) -> IndexError {
    IndexError::NotReady {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Cosine similarity between two vectors of equal length.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Map raw cosine output into the documented [0, 1] score range.
fn unit_score(cosine: f32) -> f32 {
    cosine.clamp(0.0, 1.0)
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use tempfile::TempDir;

    fn sample_chunk(seq: u32, text: &str, urgency: UrgencyLevel) -> Chunk {
        Chunk {
            id: format!("ng12_p1_c{seq}"),
            seq,
            page: 1,
            text: text.to_string(),
            overlap_chars: 0,
            section: Some("1.1".to_string()),
            subsection: None,
            recommendation_id: None,
            urgency,
        }
    }

    fn build_index(temp: &TempDir, chunks: &[Chunk]) -> GuidelineIndex {
        let embedder = HashedEmbedder::new(16);
        GuidelineIndex::build(temp.path(), chunks, "ng12", "test-fingerprint", &embedder, |_| {})
            .unwrap()
    }

    #[test]
    fn test_build_rejects_empty_chunk_list() {
        let temp = TempDir::new().unwrap();
        let embedder = HashedEmbedder::new(16);
        let result = GuidelineIndex::build(temp.path(), &[], "ng12", "fp", &embedder, |_| {});
        assert!(matches!(result, Err(IndexError::Empty)));
        assert!(
            !temp.path().join(META_FILE).exists(),
            "failed build should not leave artifact files behind"
        );
    }

    #[test]
    fn test_search_ranks_matching_text_first() {
        let temp = TempDir::new().unwrap();
        let index = build_index(
            &temp,
            &[
                sample_chunk(0, "refer adults with haemoptysis urgently", UrgencyLevel::Urgent),
                sample_chunk(1, "renal ultrasound booking procedure", UrgencyLevel::None),
                sample_chunk(2, "dental follow-up scheduling", UrgencyLevel::None),
            ],
        );

        let embedder = HashedEmbedder::new(16);
        let query = embedder.embed("refer adults with haemoptysis urgently").unwrap();
        let hits = index
            .search_vector(&query, NonZeroUsize::new(2).unwrap())
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.seq, 0, "exact text should rank first");
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score), "score {} out of range", hit.score);
        }
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let temp = TempDir::new().unwrap();
        let index = build_index(&temp, &[sample_chunk(0, "single chunk", UrgencyLevel::None)]);

        let embedder = HashedEmbedder::new(16);
        let query = embedder.embed("single chunk").unwrap();
        let hits = index
            .search_vector(&query, NonZeroUsize::new(50).unwrap())
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let index = build_index(&temp, &[sample_chunk(0, "text", UrgencyLevel::None)]);

        let result = index.search_vector(&[0.0; 8], NonZeroUsize::new(1).unwrap());
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch { query: 8, index: 16 })
        ));
    }

    #[test]
    fn test_open_round_trips_chunks_and_meta() {
        let temp = TempDir::new().unwrap();
        let original = Chunk {
            id: "ng12_p4_c7".to_string(),
            seq: 0,
            page: 4,
            text: "overlap tail\n1.3.2 Offer urgent referral for dysphagia.".to_string(),
            overlap_chars: 13,
            section: Some("1.3".to_string()),
            subsection: Some("1.3.2".to_string()),
            recommendation_id: Some("1.3.2".to_string()),
            urgency: UrgencyLevel::Urgent,
        };
        {
            build_index(&temp, std::slice::from_ref(&original));
        }

        let reopened = GuidelineIndex::open(temp.path()).unwrap();
        let meta = reopened.meta();
        assert_eq!(meta.version, INDEX_FORMAT_VERSION);
        assert_eq!(meta.document_label, "ng12");
        assert_eq!(meta.chunk_count, 1);
        assert_eq!(meta.embedding_model, "hashed:xx64:d16");
        assert_eq!(meta.embedding_dimensions, 16);
        assert_eq!(meta.source_fingerprint, "test-fingerprint");

        let chunks = reopened.section_chunks("1.3").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], original, "every chunk field should survive persistence");
    }

    #[test]
    fn test_open_missing_directory_is_not_ready() {
        let temp = TempDir::new().unwrap();
        let result = GuidelineIndex::open(&temp.path().join("nowhere"));
        assert!(matches!(result, Err(IndexError::NotReady { .. })));
    }

    #[test]
    fn test_open_detects_missing_sidecar() {
        let temp = TempDir::new().unwrap();
        build_index(&temp, &[sample_chunk(0, "text", UrgencyLevel::None)]);

        std::fs::remove_file(temp.path().join(VECTORS_FILE)).unwrap();
        let result = GuidelineIndex::open(temp.path());
        assert!(matches!(result, Err(IndexError::NotReady { .. })));
    }

    #[test]
    fn test_open_detects_corrupt_metadata() {
        let temp = TempDir::new().unwrap();
        build_index(&temp, &[sample_chunk(0, "text", UrgencyLevel::None)]);

        std::fs::write(temp.path().join(META_FILE), "{ not json").unwrap();
        match GuidelineIndex::open(temp.path()) {
            Err(IndexError::NotReady { reason, .. }) => {
                assert!(reason.contains("corrupt"), "reason was: {reason}");
            }
            Err(other) => panic!("expected NotReady for corrupt metadata, got {other:?}"),
            Ok(_) => panic!("corrupt metadata should not open"),
        }
    }

    #[test]
    fn test_open_detects_corrupt_sidecar() {
        let temp = TempDir::new().unwrap();
        build_index(&temp, &[sample_chunk(0, "text", UrgencyLevel::None)]);

        std::fs::write(temp.path().join(VECTORS_FILE), "[[0,").unwrap();
        let result = GuidelineIndex::open(temp.path());
        assert!(matches!(result, Err(IndexError::NotReady { .. })));
    }

    #[test]
    fn test_rebuild_replaces_previous_artifact() {
        let temp = TempDir::new().unwrap();
        build_index(
            &temp,
            &[
                sample_chunk(0, "first", UrgencyLevel::None),
                sample_chunk(1, "second", UrgencyLevel::None),
            ],
        );
        build_index(&temp, &[sample_chunk(0, "only survivor", UrgencyLevel::None)]);

        let reopened = GuidelineIndex::open(temp.path()).unwrap();
        assert_eq!(reopened.meta().chunk_count, 1);
        let chunks = reopened.section_chunks("1.1").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "only survivor");
    }

    #[test]
    fn test_section_chunks_orders_and_filters() {
        let temp = TempDir::new().unwrap();
        let mut other = sample_chunk(1, "different section", UrgencyLevel::None);
        other.section = Some("2.4".to_string());
        let index = build_index(
            &temp,
            &[
                sample_chunk(2, "later chunk", UrgencyLevel::None),
                other,
                sample_chunk(0, "earlier chunk", UrgencyLevel::None),
            ],
        );

        let chunks = index.section_chunks("1.1").unwrap();
        let seqs: Vec<u32> = chunks.iter().map(|chunk| chunk.seq).collect();
        assert_eq!(seqs, vec![0, 2]);

        assert!(index.section_chunks("9.9").unwrap().is_empty());
    }

    #[test]
    fn test_urgent_chunks_tier_then_document_order() {
        let temp = TempDir::new().unwrap();
        let index = build_index(
            &temp,
            &[
                sample_chunk(0, "urgent first", UrgencyLevel::Urgent),
                sample_chunk(1, "very urgent later", UrgencyLevel::VeryUrgent),
                sample_chunk(2, "plain text", UrgencyLevel::None),
                sample_chunk(3, "cancer pathway", UrgencyLevel::SuspectedCancer),
            ],
        );

        let chunks = index.urgent_chunks(10).unwrap();
        let seqs: Vec<u32> = chunks.iter().map(|chunk| chunk.seq).collect();
        assert_eq!(seqs, vec![1, 3, 0], "very_urgent, then suspected_cancer, then urgent");

        let limited = index.urgent_chunks(1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].seq, 1);
    }

    #[test]
    fn test_statistics_counts() {
        let temp = TempDir::new().unwrap();
        let mut unsectioned = sample_chunk(3, "intro text", UrgencyLevel::None);
        unsectioned.section = None;
        let mut second_section = sample_chunk(2, "very urgent rec", UrgencyLevel::VeryUrgent);
        second_section.section = Some("1.2".to_string());
        let index = build_index(
            &temp,
            &[
                sample_chunk(0, "plain", UrgencyLevel::None),
                sample_chunk(1, "urgent rec", UrgencyLevel::Urgent),
                second_section,
                unsectioned,
            ],
        );

        let stats = index.statistics().unwrap();
        assert_eq!(stats.document_label, "ng12");
        assert_eq!(stats.total_chunks, 4);
        assert_eq!(stats.sections, vec!["1.1".to_string(), "1.2".to_string()]);
        assert!(stats.subsections.is_empty());
        assert!(stats.has_urgency);
        assert_eq!(stats.urgency_counts.get("none"), Some(&2));
        assert_eq!(stats.urgency_counts.get("urgent"), Some(&1));
        assert_eq!(stats.urgency_counts.get("very_urgent"), Some(&1));
        assert_eq!(stats.embedding_dimensions, 16);
    }
}
