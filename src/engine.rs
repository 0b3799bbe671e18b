//! Query-side API over a built guideline index.
//!
//! The engine pairs an immutable [`GuidelineIndex`] with the embedding
//! provider used to build it, validating at construction that both sides
//! live in the same embedding space. All query methods take `&self`, so a
//! single engine can serve concurrent callers.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, bounded};
use thiserror::Error;
use tracing::debug;

use crate::chunk::Chunk;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{GuidelineIndex, IndexError, IndexStatistics, SearchHit};

/// Upper bound accepted for patient age in symptom queries.
const MAX_AGE: u32 = 150;

/// Errors from query operations.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("age {0} is outside the supported range (0-{MAX_AGE})")]
    InvalidAge(u32),

    #[error("query embedding exceeded the {}ms deadline", limit.as_millis())]
    EmbeddingTimeout { limit: Duration },

    #[error("embedding provider '{provider}' does not match index model '{index}'")]
    ModelMismatch { provider: String, index: String },

    #[error("embedding provider produces {provider}-dimensional vectors but the index stores {index}")]
    DimensionMismatch { provider: usize, index: usize },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Patient gender for symptom queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Self::Male),
            "f" | "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(format!(
                "unrecognized gender '{value}' (expected M, F, or Other)"
            )),
        }
    }
}

/// Read-only retrieval API over one guideline index.
pub struct RetrievalEngine {
    index: Arc<GuidelineIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("index", &self.index)
            .field("embedding_model", &self.embedder.model_id())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RetrievalEngine {
    /// Pair an index with an embedding provider.
    ///
    /// Fails when the provider's model id or dimensions differ from what
    /// the index was built with; mixing embedding spaces would produce
    /// meaningless scores.
    pub fn new(
        index: Arc<GuidelineIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> QueryResult<Self> {
        let meta = index.meta();
        if embedder.model_id() != meta.embedding_model {
            return Err(QueryError::ModelMismatch {
                provider: embedder.model_id(),
                index: meta.embedding_model.clone(),
            });
        }
        if embedder.dimensions() != meta.embedding_dimensions {
            return Err(QueryError::DimensionMismatch {
                provider: embedder.dimensions(),
                index: meta.embedding_dimensions,
            });
        }
        Ok(Self {
            index,
            embedder,
            timeout: None,
        })
    }

    /// Bound the time spent embedding each query.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The underlying index.
    pub fn index(&self) -> &GuidelineIndex {
        &self.index
    }

    /// Free-text semantic search.
    ///
    /// `top_k` is clamped to at least 1; blank text is rejected rather
    /// than matched against everything.
    pub fn query_text(&self, text: &str, top_k: usize) -> QueryResult<Vec<SearchHit>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let k = NonZeroUsize::new(top_k).unwrap_or(NonZeroUsize::MIN);

        debug!("query ({} chars, k={k})", trimmed.len());
        let vector = self.embed_query(trimmed)?;
        Ok(self.index.search_vector(&vector, k)?)
    }

    /// Symptom-profile search.
    ///
    /// The symptom set, age band, and gender are composed into one
    /// deterministic query string; because symptoms are sorted, the same
    /// set always retrieves the same chunks regardless of input order.
    pub fn query_by_symptoms(
        &self,
        symptoms: &BTreeSet<String>,
        age: u32,
        gender: Gender,
        top_k: usize,
    ) -> QueryResult<Vec<SearchHit>> {
        if symptoms.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if age > MAX_AGE {
            return Err(QueryError::InvalidAge(age));
        }

        let query = compose_symptom_query(symptoms, age, gender);
        debug!("symptom query: {query}");
        self.query_text(&query, top_k)
    }

    /// Every chunk of a section, in document order.
    ///
    /// An unknown section id yields an empty list, not an error.
    pub fn section_context(&self, section_id: &str) -> QueryResult<Vec<Chunk>> {
        Ok(self.index.section_chunks(section_id)?)
    }

    /// Chunks in actionable urgency tiers, most urgent first, truncated to
    /// `limit`. A limit of 0 yields an empty list.
    pub fn urgent_recommendations(&self, limit: usize) -> QueryResult<Vec<Chunk>> {
        Ok(self.index.urgent_chunks(limit)?)
    }

    /// Aggregate counts over the index.
    pub fn statistics(&self) -> QueryResult<IndexStatistics> {
        Ok(self.index.statistics()?)
    }

    /// Embed query text, honoring the configured deadline.
    ///
    /// With a timeout set, the embedding runs on a worker thread so a
    /// stalled model surfaces as [`QueryError::EmbeddingTimeout`] instead
    /// of hanging the caller. The worker's late result is dropped with the
    /// channel.
    fn embed_query(&self, text: &str) -> QueryResult<Vec<f32>> {
        let Some(limit) = self.timeout else {
            return Ok(self.embedder.embed(text)?);
        };

        let (sender, receiver) = bounded(1);
        let embedder = Arc::clone(&self.embedder);
        let owned = text.to_string();
        std::thread::spawn(move || {
            let _ = sender.send(embedder.embed(&owned));
        });

        match receiver.recv_timeout(limit) {
            Ok(result) => Ok(result?),
            Err(RecvTimeoutError::Timeout) => Err(QueryError::EmbeddingTimeout { limit }),
            Err(RecvTimeoutError::Disconnected) => Err(QueryError::Embedding(
                EmbeddingError::Failed("embedding worker exited without a result".to_string()),
            )),
        }
    }
}

/// Compose the deterministic query string for a symptom profile.
///
/// Mirrors the retrieval text the guideline was written against: sorted
/// symptoms, an age band, gender terms, then fixed risk-factor context.
fn compose_symptom_query(symptoms: &BTreeSet<String>, age: u32, gender: Gender) -> String {
    let mut terms: Vec<&str> = symptoms.iter().map(String::as_str).collect();

    terms.push(if age < 40 {
        "young patient"
    } else if age < 60 {
        "middle-aged"
    } else {
        "older adult elderly"
    });

    match gender {
        Gender::Female => terms.push("women female"),
        Gender::Male => terms.push("men male"),
        Gender::Other => {}
    }

    terms.extend([
        "smoking history",
        "family history",
        "cancer risk factors",
        "referral pathway",
    ]);

    terms.join(" ")
}
