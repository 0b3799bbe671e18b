//! One-shot ingestion pipeline: page texts in, persisted index out.
//!
//! Segments the pages into an outline, assembles chunks, fingerprints the
//! source, and builds the index artifact at the configured path. Ingestion
//! is batch-only; callers wanting a fresh index run it again, and callers
//! must not run two ingestions against the same path concurrently.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::chunk::ChunkBuilder;
use crate::config::Settings;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{BuildProgress, GuidelineIndex, IndexError};
use crate::outline::{OutlineAnomaly, PageText, SegmentError, Segmenter};

/// Errors from the ingestion pipeline.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error(transparent)]
    Index(IndexError),

    #[error(transparent)]
    Embedding(EmbeddingError),
}

// Embedding failures are worth distinguishing for callers (retry with a
// different provider vs. fix the artifact path), so unwrap them from the
// index error they arrive in.
impl From<IndexError> for IngestError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Embedding(inner) => Self::Embedding(inner),
            other => Self::Index(other),
        }
    }
}

/// Result type for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Counts and anomalies from one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Input pages processed.
    pub pages: usize,
    /// Sections detected.
    pub sections: usize,
    /// Subsections detected.
    pub subsections: usize,
    /// Recommendations detected.
    pub recommendations: usize,
    /// Recommendations in an actionable urgency tier.
    pub urgent_recommendations: usize,
    /// Chunks written to the index.
    pub chunks: usize,
    /// Structural anomalies found while segmenting (non-fatal).
    pub anomalies: Vec<OutlineAnomaly>,
}

/// Run the full pipeline and persist the index at `settings.index_path`.
///
/// Returns the ready index together with a report of what was ingested.
pub fn ingest_pages(
    pages: &[PageText],
    settings: &Settings,
    provider: &dyn EmbeddingProvider,
    on_progress: impl FnMut(BuildProgress),
) -> IngestResult<(GuidelineIndex, IngestReport)> {
    let outline = Segmenter::new().segment(pages)?;
    info!(
        "segmented {} pages: {} sections, {} subsections, {} recommendations ({} anomalies)",
        pages.len(),
        outline.sections(),
        outline.subsections(),
        outline.recommendations(),
        outline.anomalies.len()
    );

    let chunks = ChunkBuilder::new(settings.chunking, &settings.document_label).build(&outline);
    let fingerprint = fingerprint_pages(pages);

    let index = GuidelineIndex::build(
        &settings.index_path,
        &chunks,
        &settings.document_label,
        &fingerprint,
        provider,
        on_progress,
    )?;

    let report = IngestReport {
        pages: pages.len(),
        sections: outline.sections(),
        subsections: outline.subsections(),
        recommendations: outline.recommendations(),
        urgent_recommendations: outline.urgent_recommendations(),
        chunks: chunks.len(),
        anomalies: outline.anomalies,
    };
    info!(
        "ingest complete: {} chunks indexed at {}",
        report.chunks,
        settings.index_path.display()
    );

    Ok((index, report))
}

/// SHA-256 over the page numbers and texts, hex-encoded.
///
/// Stored in the index metadata so a rebuilt index can be traced back to
/// its exact source extraction.
pub fn fingerprint_pages(pages: &[PageText]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.number.to_le_bytes());
        hasher.update(page.text.as_bytes());
        // Keep page splits distinguishable from concatenated text.
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
