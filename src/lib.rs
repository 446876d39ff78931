//! kite - Keyword Insight and Term Extraction.
//!
//! kite indexes text files and JSON bullet records into an in-memory store
//! and answers free-text queries with hybrid retrieval: BM25 keyword search
//! via [Tantivy](https://github.com/quickwit-oss/tantivy) and cosine
//! similarity over dense embeddings, joined and re-ranked with late
//! interaction in the style of
//! [ColBERT](https://github.com/stanford-futuredata/ColBERT).
//!
//! # Quick start
//!
//! ```
//! use std::io::Write;
//!
//! use kite::{Config, HashEmbedder, Kite};
//!
//! let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
//! write!(
//!     file,
//!     r#"[{{"company":"A","bullets":["foo bar"]}},
//!         {{"company":"B","bullets":["baz qux"]}}]"#
//! )
//! .unwrap();
//!
//! let mut kite = Kite::new(HashEmbedder::default(), Config::default()).unwrap();
//! assert_eq!(kite.index_path(file.path()).unwrap(), 2);
//!
//! let hits = kite.query("foo");
//! assert_eq!(hits[0].document.content, "foo bar");
//! assert_eq!(hits[0].document.source_label(), "company=A");
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod doc_id;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hash_embedder;
pub mod indexing;
pub mod model_manager;
pub mod reranker;
pub mod search;
pub mod shell;
pub mod store;
pub mod tantivy_index;
pub mod walker;

pub use chunking::Source;
pub use config::{Backend, Config};
pub use doc_id::DocumentId;
pub use document::{Document, MetaValue, Metadata};
pub use embedding::Embedder;
pub use engine::Kite;
pub use error::{Error, Result};
pub use hash_embedder::HashEmbedder;
pub use model_manager::ModelManager;
pub use reranker::Reranker;
pub use search::QueryHit;
pub use shell::Shell;
pub use store::DocumentStore;
