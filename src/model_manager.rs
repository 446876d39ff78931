use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Manages the ColBERT model lifecycle, loading it on first use.
///
/// Serves as both the [`Embedder`](crate::embedding::Embedder) and the
/// [`Reranker`](crate::reranker::Reranker) of the `colbert` backend so the
/// weights are only loaded once per process.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::with_model_id(DEFAULT_MODEL_ID.to_string())
    }
}

impl ModelManager {
    /// Creates a `ModelManager` for a HuggingFace model ID or a local path.
    ///
    /// Nothing is downloaded or loaded until the first encode call.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// Returns the model ID that will be (or has been) loaded.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            info!(model = %self.model_id, "loading ColBERT model");
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(default_device())
                .try_into()
                .map_err(|e| {
                    Error::Embedding(format!(
                        "failed to load model '{}': {e}",
                        self.model_id
                    ))
                })?;
            self.model = Some(colbert);
        }

        self.model
            .as_mut()
            .ok_or_else(|| Error::Embedding("model not loaded".to_string()))
    }

    /// Encodes document texts into token-level embeddings.
    ///
    /// Returns a 3D tensor of shape `[B, T, D]`.
    pub fn encode_documents(&mut self, texts: &[String]) -> Result<Tensor> {
        let model = self.ensure_loaded()?;
        model
            .encode(texts, false)
            .map_err(|e| Error::Embedding(format!("document encoding failed: {e}")))
    }

    /// Encodes a query string into token-level embeddings.
    ///
    /// Returns a 2D tensor of shape `[Q, D]`.
    pub fn encode_query(&mut self, query: &str) -> Result<Tensor> {
        let model = self.ensure_loaded()?;
        let embeddings = model
            .encode(&[query.to_string()], true)
            .map_err(|e| Error::Embedding(format!("query encoding failed: {e}")))?;
        // [1, Q, D] -> [Q, D]
        embeddings.squeeze(0).map_err(crate::embedding::map_candle_err)
    }
}
