//! Local ONNX embedding models via fastembed.
//!
//! First use downloads the model into the cache directory; subsequent runs
//! load from disk. The model handle is not `Sync`, so a mutex serializes
//! access and batches amortize the locking cost.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;

/// Embedding provider backed by a locally cached fastembed model.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load (downloading on first use) the named model.
    ///
    /// The dimension is probed with a throwaway embedding rather than
    /// hard-coded per model, so adding a model name below is all it takes
    /// to support a new one.
    pub fn new(model_name: &str, cache_dir: Option<&Path>) -> EmbeddingResult<Self> {
        let model = parse_model(model_name).ok_or_else(|| EmbeddingError::ModelInit {
            model: model_name.to_string(),
            message: "unknown model name".to_string(),
        })?;

        let mut options = InitOptions::new(model).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir.to_path_buf());
        }

        let mut text_model =
            TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelInit {
                model: model_name.to_string(),
                message: e.to_string(),
            })?;

        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbeddingError::Failed(e.to_string()))?;
        let dimensions = probe
            .first()
            .map(Vec::len)
            .ok_or(EmbeddingError::WrongShape {
                expected: 1,
                got: 0,
            })?;

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn model_id(&self) -> String {
        format!("fastembed:{}", self.model_name)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::Failed("embedding model lock poisoned".to_string()))?;
        let vectors = model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Failed(e.to_string()))?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::WrongShape {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        for vector in &vectors {
            if vector.len() != self.dimensions {
                return Err(EmbeddingError::Failed(format!(
                    "model produced {}-dimensional vector, expected {}",
                    vector.len(),
                    self.dimensions
                )));
            }
        }
        Ok(vectors)
    }
}

fn parse_model(name: &str) -> Option<EmbeddingModel> {
    match name {
        "AllMiniLML6V2" => Some(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML6V2Q" => Some(EmbeddingModel::AllMiniLML6V2Q),
        "BGESmallENV15" => Some(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Some(EmbeddingModel::BGEBaseENV15),
        _ => None,
    }
}
