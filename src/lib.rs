//! Retrieval core for the NICE NG12 suspected-cancer guideline: outline
//! segmentation, overlap-aware chunking, embedding index persistence, and
//! symptom-aware semantic queries.

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod outline;

pub use chunk::{Chunk, ChunkBuilder, ChunkingConfig};
pub use config::Settings;
pub use embedding::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashedEmbedder};
pub use engine::{Gender, QueryError, RetrievalEngine};
pub use index::{GuidelineIndex, IndexError, IndexStatistics, SearchHit};
pub use ingest::{IngestError, IngestReport, fingerprint_pages, ingest_pages};
pub use outline::{Outline, OutlineNode, PageText, SegmentError, Segmenter, UrgencyLevel};
