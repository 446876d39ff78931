//! Deterministic feature-hashing backend.
//!
//! Every token is hashed to a signed one-hot vector; a text embedding is the
//! L2-normalised sum of its token vectors. No model weights are involved, so
//! this backend runs offline and gives identical results across runs.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use crate::{embedding::Embedder, error::Result};

pub const DEFAULT_DIMENSION: usize = 384;

/// Lowercased alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Bucket index and sign for a token.
    fn slot(&self, token: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % self.dimension as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    /// One signed one-hot row per token, flattened row-major as `[T, D]`.
    pub fn token_matrix(&self, text: &str) -> (usize, Vec<f32>) {
        let tokens = tokenize(text);
        let mut data = vec![0.0f32; tokens.len() * self.dimension];
        for (row, token) in tokens.iter().enumerate() {
            let (idx, sign) = self.slot(token);
            data[row * self.dimension + idx] = sign;
        }
        (tokens.len(), data)
    }

    /// Normalised sum of token vectors. Texts without tokens map to the
    /// zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let (idx, sign) = self.slot(&token);
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embed_documents(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn tokenize_lowercases_and_splits_punctuation() {
        assert_eq!(
            tokenize("Hello, World! rust-lang 2024"),
            vec!["hello", "world", "rust", "lang", "2024"]
        );
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn embeddings_are_deterministic_and_unit_length() {
        let e = HashEmbedder::new(64);
        let a = e.embed("foo bar");
        let b = e.embed("foo bar");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_tokens_increase_similarity() {
        let e = HashEmbedder::default();
        let q = e.embed("foo");
        assert!(cosine(&q, &e.embed("foo bar")) > 0.5);
        assert!(cosine(&q, &e.embed("foo bar")) > cosine(&q, &e.embed("baz qux")));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedder::new(16);
        assert!(e.embed("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn token_matrix_has_one_row_per_token() {
        let e = HashEmbedder::new(8);
        let (rows, data) = e.token_matrix("a b c");
        assert_eq!(rows, 3);
        assert_eq!(data.len(), 24);
        for row in data.chunks(8) {
            assert_eq!(row.iter().filter(|x| **x != 0.0).count(), 1);
        }
    }

    #[test]
    fn batch_and_query_share_space() {
        let mut e = HashEmbedder::new(32);
        let docs = e.embed_documents(&["hello world".to_string()]).unwrap();
        let q = e.embed_query("hello world").unwrap();
        assert_eq!(docs[0], q);
    }
}
