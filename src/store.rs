//! In-memory document store with lexical and vector lookup.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use rayon::prelude::*;
use tracing::debug;

use crate::{
    document::{Document, ScoredDocument},
    error::{Error, Result},
    tantivy_index::{self, LexicalHit, LexicalIndex},
};

/// Owns every document and the index structures derived from them.
///
/// Documents are kept in insertion order (`seq`). Re-inserting an id
/// replaces the stored document but keeps its original position, so tie
/// breaking stays stable across re-indexing.
#[derive(Debug)]
pub struct DocumentStore {
    lexical: LexicalIndex,
    by_seq: BTreeMap<u64, Arc<Document>>,
    seq_of: HashMap<u64, u64>,
    next_seq: u64,
    dimension: Option<usize>,
}

impl DocumentStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            lexical: LexicalIndex::open_in_ram()?,
            by_seq: BTreeMap::new(),
            seq_of: HashMap::new(),
            next_seq: 0,
            dimension: None,
        })
    }

    /// Number of stored documents.
    pub fn count(&self) -> usize {
        self.by_seq.len()
    }

    /// Dimensionality of stored embeddings, fixed by the first embedded
    /// insert.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Insert documents, overwriting any with the same id.
    ///
    /// Either every document becomes visible to both lexical and vector
    /// search or, on error, the store is left exactly as it was.
    pub fn insert(&mut self, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let dimension = self.check_dimensions(&documents)?;

        // Assign positions without touching the store yet; a later duplicate
        // in the same batch reuses the position of the first.
        let mut pending: HashMap<u64, u64> = HashMap::new();
        let mut next_seq = self.next_seq;
        let mut placed = Vec::with_capacity(documents.len());
        for doc in documents {
            let numeric = doc.id.numeric;
            let seq = match self
                .seq_of
                .get(&numeric)
                .or_else(|| pending.get(&numeric))
            {
                Some(seq) => *seq,
                None => {
                    let seq = next_seq;
                    next_seq += 1;
                    pending.insert(numeric, seq);
                    seq
                }
            };
            placed.push((seq, doc));
        }

        if let Err(e) = self.stage_all(&placed) {
            self.lexical.rollback()?;
            return Err(e);
        }
        if let Err(e) = self.lexical.commit() {
            self.lexical.rollback()?;
            return Err(e);
        }

        let inserted = placed.len();
        for (seq, doc) in placed {
            self.seq_of.insert(doc.id.numeric, seq);
            self.by_seq.insert(seq, Arc::new(doc));
        }
        self.next_seq = next_seq;
        if self.dimension.is_none() {
            self.dimension = dimension;
        }

        debug!(inserted, total = self.count(), "store updated");
        Ok(())
    }

    fn stage_all(&self, placed: &[(u64, Document)]) -> Result<()> {
        for (seq, doc) in placed {
            self.lexical.stage(&doc.id.full_hex(), *seq, &doc.content)?;
        }
        Ok(())
    }

    /// All embeddings in the batch must agree with each other and with the
    /// store. Returns the batch dimension, if any document is embedded.
    fn check_dimensions(
        &self,
        documents: &[Document],
    ) -> Result<Option<usize>> {
        let mut expected = self.dimension;
        for doc in documents {
            let Some(embedding) = &doc.embedding else {
                continue;
            };
            match expected {
                Some(dim) if dim != embedding.len() => {
                    return Err(Error::Validation(format!(
                        "document {} has embedding dimension {}, expected {dim}",
                        doc.id,
                        embedding.len()
                    )));
                }
                Some(_) => {}
                None => expected = Some(embedding.len()),
            }
        }
        Ok(expected)
    }

    /// Top `top_k` documents by BM25 relevance, best first. Equal scores
    /// are ordered by insertion.
    pub fn lexical_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let hits = self.lexical.search(query, top_k)?;
        Ok(self.resolve_hits(hits))
    }

    /// Like [`lexical_search`](Self::lexical_search), but every query term
    /// also matches indexed terms within edit distance one.
    pub fn lexical_search_fuzzy(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let hits = self.lexical.search_fuzzy(query, top_k)?;
        Ok(self.resolve_hits(hits))
    }

    /// Up to `top_k` documents whose content contains `needle` verbatim,
    /// ignoring case, in insertion order.
    ///
    /// Needles of three or more characters are narrowed down through the
    /// trigram field first; shorter ones fall back to a scan.
    pub fn substring_search(
        &self,
        needle: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let needle = needle.trim();
        if needle.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let grams = tantivy_index::ngrams(needle);
        let candidates = if grams.is_empty() {
            self.by_seq
                .values()
                .map(|document| ScoredDocument {
                    document: Arc::clone(document),
                    score: 1.0,
                })
                .collect()
        } else {
            let mut hits = self
                .lexical
                .search_ngrams(&grams, self.by_seq.len().max(1))?;
            hits.sort_by_key(|hit| hit.seq);
            self.resolve_hits(hits)
        };

        let lowered = needle.to_lowercase();
        Ok(candidates
            .into_iter()
            .filter(|hit| {
                hit.document.content.to_lowercase().contains(&lowered)
            })
            .take(top_k)
            .collect())
    }

    fn resolve_hits(&self, hits: Vec<LexicalHit>) -> Vec<ScoredDocument> {
        hits.into_iter()
            .filter_map(|hit| {
                self.by_seq.get(&hit.seq).map(|document| ScoredDocument {
                    document: Arc::clone(document),
                    score: hit.score,
                })
            })
            .collect()
    }

    /// Top `top_k` embedded documents by cosine similarity to `query`.
    ///
    /// With `scale_score` the similarity is mapped from `[-1, 1]` onto
    /// `[0, 1]`. Equal scores are ordered by insertion. A query whose length
    /// differs from the stored dimension is a validation error.
    pub fn vector_search(
        &self,
        query: &[f32],
        top_k: usize,
        scale_score: bool,
    ) -> Result<Vec<ScoredDocument>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(Error::Validation(format!(
                "query vector has dimension {}, expected {dimension}",
                query.len()
            )));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let entries: Vec<(&u64, &Arc<Document>)> =
            self.by_seq.iter().collect();

        let mut scored: Vec<(f32, u64, &Arc<Document>)> = entries
            .par_iter()
            .filter_map(|(seq, doc)| {
                let embedding = doc.embedding.as_deref()?;
                let cos = cosine(query, query_norm, embedding);
                let score = if scale_score { scale(cos) } else { cos };
                Some((score, **seq, *doc))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, _, document)| ScoredDocument {
                document: Arc::clone(document),
                score,
            })
            .collect())
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; zero-norm vectors score 0.
fn cosine(query: &[f32], query_norm: f32, other: &[f32]) -> f32 {
    let other_norm = norm(other);
    if query_norm == 0.0 || other_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(other).map(|(a, b)| a * b).sum();
    dot / (query_norm * other_norm)
}

fn scale(cos: f32) -> f32 {
    ((cos + 1.0) / 2.0).clamp(0.0, 1.0)
}
