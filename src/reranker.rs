use std::sync::Arc;

use candle_core::{Device, Tensor};
use rayon::prelude::*;

use crate::{
    document::Document,
    embedding::map_candle_err,
    error::{Error, Result},
    hash_embedder::HashEmbedder,
    model_manager::ModelManager,
};

/// Second-pass scorer that looks at each (query, document) pair jointly.
pub trait Reranker {
    /// Score every text against the query. The returned scores are aligned
    /// with `texts`.
    fn score(&mut self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

/// A document with its re-rank score.
#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub document: Arc<Document>,
    pub score: f32,
}

/// Re-rank candidates and sort them by score descending.
///
/// The sort is stable: candidates with equal scores keep their input order.
pub fn rerank<R: Reranker + ?Sized>(
    reranker: &mut R,
    query: &str,
    candidates: Vec<Arc<Document>>,
) -> Result<Vec<RankedDocument>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> =
        candidates.iter().map(|d| d.content.clone()).collect();
    let scores = reranker.score(query, &texts)?;
    if scores.len() != candidates.len() {
        return Err(Error::Validation(format!(
            "reranker returned {} scores for {} candidates",
            scores.len(),
            candidates.len()
        )));
    }

    let mut ranked: Vec<RankedDocument> = candidates
        .into_iter()
        .zip(scores)
        .map(|(document, score)| RankedDocument { document, score })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(ranked)
}

impl Reranker for ModelManager {
    /// Late interaction: MaxSim between the query token matrix and each
    /// document's token matrix.
    fn score(&mut self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = self.encode_query(query)?;
        let doc_embeddings = self.encode_documents(texts)?;

        (0..texts.len())
            .into_par_iter()
            .map(|i| {
                let doc = doc_embeddings.get(i).map_err(map_candle_err)?;
                maxsim(&query_embedding, &doc)
            })
            .collect()
    }
}

impl Reranker for HashEmbedder {
    /// MaxSim over hashed token vectors: roughly the number of query tokens
    /// that occur in the document.
    fn score(&mut self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let embedder = &*self;
        let dim = embedder.dimension();
        let (q_rows, q_data) = embedder.token_matrix(query);
        if q_rows == 0 {
            return Ok(vec![0.0; texts.len()]);
        }
        let query_embedding =
            Tensor::from_vec(q_data, (q_rows, dim), &Device::Cpu)
                .map_err(map_candle_err)?;

        texts
            .par_iter()
            .map(|text| {
                let (rows, data) = embedder.token_matrix(text);
                if rows == 0 {
                    return Ok(0.0);
                }
                let doc = Tensor::from_vec(data, (rows, dim), &Device::Cpu)
                    .map_err(map_candle_err)?;
                maxsim(&query_embedding, &doc)
            })
            .collect()
    }
}

/// Compute the MaxSim score between a query embedding and a document embedding.
///
/// query_embedding: [Q, D] where Q = query tokens, D = embedding dimension
/// doc_embedding: [T, D] where T = document tokens, D = embedding dimension
///
/// MaxSim = sum over query tokens of max(query_token . doc_token for all doc tokens)
fn maxsim(query_embedding: &Tensor, doc_embedding: &Tensor) -> Result<f32> {
    let doc_t = doc_embedding.t().map_err(map_candle_err)?;
    let sim_matrix = query_embedding.matmul(&doc_t).map_err(map_candle_err)?;

    // Best document token per query token.
    let row_maxes = sim_matrix.max(1).map_err(map_candle_err)?;

    row_maxes
        .sum_all()
        .and_then(|s| s.to_scalar::<f32>())
        .map_err(map_candle_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc_id::DocumentId, document::Metadata};

    fn make_tensor(data: &[f32], shape: (usize, usize)) -> Tensor {
        Tensor::from_vec(data.to_vec(), shape, &Device::Cpu).unwrap()
    }

    fn doc(text: &str) -> Arc<Document> {
        Arc::new(Document::new(
            DocumentId::new("t", text, text),
            text,
            Arc::new(Metadata::new()),
        ))
    }

    /// Scores are looked up from a fixed table keyed by text.
    struct TableReranker(Vec<(&'static str, f32)>);

    impl Reranker for TableReranker {
        fn score(&mut self, _query: &str, texts: &[String]) -> Result<Vec<f32>> {
            Ok(texts
                .iter()
                .map(|t| {
                    self.0
                        .iter()
                        .find(|(k, _)| *k == t.as_str())
                        .map(|(_, s)| *s)
                        .unwrap_or(0.0)
                })
                .collect())
        }
    }

    struct ShortReranker;

    impl Reranker for ShortReranker {
        fn score(&mut self, _query: &str, _texts: &[String]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    #[test]
    fn maxsim_identical_vectors() {
        let q = make_tensor(&[1.0, 0.0, 0.0], (1, 3));
        let d = make_tensor(&[1.0, 0.0, 0.0], (1, 3));
        let score = maxsim(&q, &d).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn maxsim_orthogonal_vectors() {
        let q = make_tensor(&[1.0, 0.0, 0.0], (1, 3));
        let d = make_tensor(&[0.0, 1.0, 0.0], (1, 3));
        let score = maxsim(&q, &d).unwrap();
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn maxsim_multiple_query_tokens() {
        // sim_matrix [2, 3]:
        // q[0]=[1,0] . d = [1.0, 0.0, 0.5]
        // q[1]=[0,1] . d = [0.0, 1.0, 0.5]
        // row maxes: [1.0, 1.0], sum = 2.0
        let q = make_tensor(&[1.0, 0.0, 0.0, 1.0], (2, 2));
        let d = make_tensor(&[1.0, 0.0, 0.0, 1.0, 0.5, 0.5], (3, 2));
        let score = maxsim(&q, &d).unwrap();
        assert!((score - 2.0).abs() < 1e-6);
    }

    #[test]
    fn rerank_sorts_descending() {
        let mut reranker =
            TableReranker(vec![("low", 0.1), ("high", 0.9), ("mid", 0.5)]);
        let ranked =
            rerank(&mut reranker, "q", vec![doc("low"), doc("high"), doc("mid")])
                .unwrap();
        let order: Vec<_> =
            ranked.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn rerank_is_stable_for_ties() {
        let mut reranker = TableReranker(vec![]);
        let ranked =
            rerank(&mut reranker, "q", vec![doc("b"), doc("a"), doc("c")])
                .unwrap();
        let order: Vec<_> =
            ranked.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn rerank_rejects_misaligned_scores() {
        let err = rerank(&mut ShortReranker, "q", vec![doc("a"), doc("b")])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn rerank_empty_candidates() {
        let ranked = rerank(&mut ShortReranker, "q", Vec::new()).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn hash_reranker_prefers_matching_tokens() {
        let mut reranker = HashEmbedder::default();
        let scores = reranker
            .score(
                "foo",
                &["foo bar".to_string(), "baz qux".to_string()],
            )
            .unwrap();
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn hash_reranker_handles_tokenless_text() {
        let mut reranker = HashEmbedder::default();
        let scores = reranker
            .score("foo", &["...".to_string(), "foo".to_string()])
            .unwrap();
        assert_eq!(scores[0], 0.0);
        assert!((scores[1] - 1.0).abs() < 1e-6);

        let scores = reranker.score("!!!", &["foo".to_string()]).unwrap();
        assert_eq!(scores, vec![0.0]);
    }
}
