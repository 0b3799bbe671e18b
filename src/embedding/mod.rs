//! Pluggable embedding backends.
//!
//! The index never prescribes a model; it consumes any
//! [`EmbeddingProvider`] and records its identity in the index metadata so
//! queries always compare vectors from a single embedding space.

pub mod hashed;
pub mod local;

pub use hashed::HashedEmbedder;
pub use local::FastEmbedProvider;

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use std::sync::Arc;
use thiserror::Error;

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("failed to initialize embedding model '{model}': {message}")]
    ModelInit { model: String, message: String },

    #[error("embedding generation failed: {0}")]
    Failed(String),

    #[error("embedding backend returned {got} vector(s), expected {expected}")]
    WrongShape { expected: usize, got: usize },
}

/// Text-to-vector capability. Implementations must be shareable across
/// threads; interior mutability is the implementation's concern.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier recorded in index metadata (e.g.
    /// `fastembed:AllMiniLML6V2`).
    fn model_id(&self) -> String;

    /// Output vector dimension.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in order.
    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::WrongShape {
                expected: 1,
                got: vectors.len(),
            });
        }
        Ok(vectors.swap_remove(0))
    }
}

/// Build the provider selected by configuration.
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::Fastembed => Ok(Arc::new(FastEmbedProvider::new(
            &config.model,
            config.cache_dir.as_deref(),
        )?)),
        EmbeddingProviderKind::Hashed => {
            Ok(Arc::new(HashedEmbedder::new(config.hashed_dimensions)))
        }
    }
}
