use std::io::IsTerminal;

use candle_core::{DType, Tensor};
use kdam::{BarExt, tqdm};
use tracing::debug;

use crate::{
    document::Document,
    error::{Error, Result},
    model_manager::ModelManager,
};

/// Maps text to fixed-dimension dense vectors.
///
/// Documents and queries must land in the same vector space so that cosine
/// similarity between them is meaningful.
pub trait Embedder {
    /// Embed a batch of document texts, one vector per input, in order.
    fn embed_documents(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>>;
}

impl Embedder for ModelManager {
    fn embed_documents(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // One text per forward pass keeps other documents' padding out of
        // the mean: [1, T, D] -> [T, D] -> [D]
        texts
            .iter()
            .map(|text| {
                let tokens = self
                    .encode_documents(std::slice::from_ref(text))?
                    .squeeze(0)
                    .map_err(map_candle_err)?;
                pool_tokens(&tokens)
            })
            .collect()
    }

    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        // [Q, D] -> [D]
        let tokens = self.encode_query(text)?;
        pool_tokens(&tokens)
    }
}

/// Mean of the non-zero rows of a `[T, D]` token matrix, L2-normalised.
///
/// All-zero rows are padding and do not count towards the mean. A matrix
/// with no non-zero rows pools to the zero vector.
fn pool_tokens(tokens: &Tensor) -> Result<Vec<f32>> {
    let tokens = tokens.to_dtype(DType::F32).map_err(map_candle_err)?;
    let mask = tokens
        .sqr()
        .and_then(|s| s.sum_keepdim(1))
        .and_then(|s| s.gt(0f64))
        .and_then(|m| m.to_dtype(DType::F32))
        .map_err(map_candle_err)?;
    let count = mask
        .sum_all()
        .and_then(|c| c.to_scalar::<f32>())
        .map_err(map_candle_err)?
        .max(1.0);
    let mean = tokens
        .broadcast_mul(&mask)
        .and_then(|t| t.sum_keepdim(0))
        .and_then(|t| t.affine(1.0 / f64::from(count), 0.0))
        .map_err(map_candle_err)?;
    l2_normalize_rows(&mean)?
        .squeeze(0)
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(map_candle_err)
}

/// Divide each row of a `[N, D]` tensor by its L2 norm.
fn l2_normalize_rows(t: &Tensor) -> Result<Tensor> {
    let norms = t
        .sqr()
        .and_then(|s| s.sum_keepdim(1))
        .and_then(|s| s.sqrt())
        .and_then(|n| n.affine(1.0, 1e-12))
        .map_err(map_candle_err)?;
    t.broadcast_div(&norms).map_err(map_candle_err)
}

pub(crate) fn map_candle_err(e: candle_core::Error) -> Error {
    Error::Embedding(format!("tensor computation error: {e}"))
}

/// Embed documents in batches of `batch_size`, attaching each vector.
///
/// All-or-nothing: if any batch fails, the error is returned and no
/// embedded documents escape. A vector count that does not match the batch
/// is reported as an embedding error.
pub fn embed_documents(
    embedder: &mut dyn Embedder,
    documents: Vec<Document>,
    batch_size: usize,
) -> Result<Vec<Document>> {
    if documents.is_empty() {
        return Ok(documents);
    }

    let batch_size = batch_size.max(1);
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(documents.len());

    let mut progress = std::io::stderr().is_terminal().then(|| {
        tqdm!(total = documents.len(), desc = "Embedding", leave = false)
    });

    for batch in documents.chunks(batch_size) {
        let texts: Vec<String> =
            batch.iter().map(|d| d.content.clone()).collect();
        let embedded = embedder.embed_documents(&texts)?;
        if embedded.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} documents",
                embedded.len(),
                batch.len()
            )));
        }
        vectors.extend(embedded);

        if let Some(bar) = progress.as_mut() {
            bar.update(batch.len())?;
        }
    }

    debug!(documents = documents.len(), "embedded documents");

    Ok(documents
        .into_iter()
        .zip(vectors)
        .map(|(doc, vector)| doc.with_embedding(vector))
        .collect())
}
