use std::{collections::HashSet, io::Write, sync::Arc};

use tracing::{debug, warn};

use crate::{
    document::{Document, ScoredDocument},
    embedding::Embedder,
    error::Result,
    reranker::{self, Reranker},
    store::DocumentStore,
};

/// Tunables for one query.
#[derive(Debug, Clone, Copy)]
pub struct QueryParams {
    /// Candidates taken from each retriever before the join.
    pub top_k: usize,
    /// Add typo-tolerant clauses to the lexical branch.
    pub fuzzy: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            fuzzy: true,
        }
    }
}

/// One line of a query answer.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub rank: usize,
    /// Re-rank score, absent when re-ranking failed and the join order was
    /// kept.
    pub score: Option<f32>,
    pub document: Arc<Document>,
}

/// Execute the full query pipeline.
///
/// 1. Lexical retrieval (BM25, optionally fuzzy), top `top_k`, followed by
///    documents containing the query text verbatim
/// 2. Vector retrieval on the embedded query, top `top_k`, scaled scores
/// 3. Join: dedup by id, lexical hits first
/// 4. Re-rank every joined candidate, no truncation
///
/// A failing branch contributes nothing and the rest of the pipeline still
/// runs; a failing re-ranker keeps the join order.
pub fn execute_query<M>(
    text: &str,
    params: QueryParams,
    store: &DocumentStore,
    model: &mut M,
) -> Vec<QueryHit>
where
    M: Embedder + Reranker + ?Sized,
{
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lexical = match lexical_branch(text, params, store) {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "lexical retrieval failed, continuing without it");
            Vec::new()
        }
    };

    let vector = match vector_branch(text, params, store, model) {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "vector retrieval failed, continuing without it");
            Vec::new()
        }
    };

    debug!(
        lexical = lexical.len(),
        vector = vector.len(),
        "first-stage candidates"
    );

    let candidates = join(lexical, vector);
    if candidates.is_empty() {
        return Vec::new();
    }

    match reranker::rerank(model, text, candidates.clone()) {
        Ok(ranked) => ranked
            .into_iter()
            .enumerate()
            .map(|(i, r)| QueryHit {
                rank: i + 1,
                score: Some(r.score),
                document: r.document,
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "re-ranking failed, keeping join order");
            candidates
                .into_iter()
                .enumerate()
                .map(|(i, document)| QueryHit {
                    rank: i + 1,
                    score: None,
                    document,
                })
                .collect()
        }
    }
}

fn lexical_branch(
    text: &str,
    params: QueryParams,
    store: &DocumentStore,
) -> Result<Vec<ScoredDocument>> {
    let mut hits = if params.fuzzy {
        store.lexical_search_fuzzy(text, params.top_k)?
    } else {
        store.lexical_search(text, params.top_k)?
    };
    hits.extend(store.substring_search(text, params.top_k)?);
    Ok(hits)
}

fn vector_branch<E: Embedder + ?Sized>(
    text: &str,
    params: QueryParams,
    store: &DocumentStore,
    embedder: &mut E,
) -> Result<Vec<ScoredDocument>> {
    // Nothing embedded means nothing to compare against; skip the backend.
    if store.dimension().is_none() {
        return Ok(Vec::new());
    }
    let query_vector = embedder.embed_query(text)?;
    store.vector_search(&query_vector, params.top_k, true)
}

/// Union of both candidate lists by document id, first occurrence wins,
/// lexical before vector. Scores are dropped.
pub fn join(
    lexical: Vec<ScoredDocument>,
    vector: Vec<ScoredDocument>,
) -> Vec<Arc<Document>> {
    let mut seen = HashSet::new();
    lexical
        .into_iter()
        .chain(vector)
        .filter(|hit| seen.insert(hit.document.id.numeric))
        .map(|hit| hit.document)
        .collect()
}

/// Render results as `N. <content> (see: <source>)` lines.
pub fn write_human(out: &mut dyn Write, results: &[QueryHit]) -> Result<()> {
    if results.is_empty() {
        writeln!(out, "No results found.")?;
        return Ok(());
    }

    for r in results {
        writeln!(
            out,
            "{}. {} (see: {})",
            r.rank,
            r.document.content,
            r.document.source_label()
        )?;
    }
    Ok(())
}
