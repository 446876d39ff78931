//! Splitting sources into retrievable documents.
//!
//! Two shapes of input are supported:
//!
//! - plain text files, where every non-blank line becomes one document whose
//!   metadata records the originating `file_path`;
//! - JSON files holding an array of records, where every string in a
//!   record's `bullets` array becomes one document and the record's remaining
//!   scalar fields become the (shared) metadata.
//!
//! # Examples
//!
//! ```
//! use kite::chunking::chunk_records;
//! use serde_json::json;
//!
//! let records = json!([
//!     {"company": "A", "bullets": ["foo bar"]},
//!     {"company": "B", "bullets": ["baz qux"]},
//!     {"company": "C"},
//! ]);
//! let docs = chunk_records(records.as_array().unwrap(), "data.json");
//! assert_eq!(docs.len(), 2);
//! assert_eq!(docs[0].content, "foo bar");
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    doc_id::DocumentId,
    document::{Document, FILE_PATH_KEY, MetaValue, Metadata},
    error::{Error, Result},
    walker,
};

/// Field of a record that holds the bullet strings.
pub const BULLETS_FIELD: &str = "bullets";

/// Something the indexing pipeline can turn into documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A single text file, chunked by line.
    File(PathBuf),
    /// Several text files, chunked by line in the given order.
    Files(Vec<PathBuf>),
    /// Every file under `root` whose relative path matches `pattern`.
    Directory { root: PathBuf, pattern: String },
    /// A JSON file containing an array of bullet records.
    Records(PathBuf),
}

impl Source {
    /// Classify a user-supplied path.
    ///
    /// Directories are walked with `pattern`, `.json` files are read as
    /// records, anything else is a line-chunked text file.
    pub fn resolve(path: &Path, pattern: &str) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .map_err(|e| Error::from_io_at(e, "source", path))?;

        if meta.is_dir() {
            return Ok(Self::Directory {
                root: path.to_path_buf(),
                pattern: pattern.to_string(),
            });
        }

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Ok(Self::Records(path.to_path_buf()))
        } else {
            Ok(Self::File(path.to_path_buf()))
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(p) | Self::Records(p) => write!(f, "{}", p.display()),
            Self::Files(paths) => write!(f, "{} files", paths.len()),
            Self::Directory { root, pattern } => {
                write!(f, "{}/{pattern}", root.display())
            }
        }
    }
}

/// Produce the documents for a source, in discovery order.
pub fn produce(source: &Source) -> Result<Vec<Document>> {
    match source {
        Source::File(path) => chunk_file(path),
        Source::Files(paths) => chunk_files(paths),
        Source::Directory { root, pattern } => {
            let matcher = walker::compile_pattern(pattern)?;
            let files = walker::discover_files(root, &matcher)?;
            debug!(root = %root.display(), files = files.len(), "discovered files");
            // Keep the path as the user spelled it so labels stay readable.
            let paths: Vec<PathBuf> =
                files.iter().map(|f| root.join(&f.relative_path)).collect();
            chunk_files(&paths)
        }
        Source::Records(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| Error::from_io_at(e, "file", path))?;
            chunk_records_json(&text, &path.to_string_lossy())
        }
    }
}

/// Read and chunk one text file by line.
pub fn chunk_file(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::from_io_at(e, "file", path))?;
    Ok(chunk_lines(&text, &path.to_string_lossy()))
}

/// Read several files in parallel and chunk them, preserving input order.
///
/// Fails on the first file that cannot be read; nothing is returned for the
/// others in that case.
pub fn chunk_files(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let per_file: Vec<Vec<Document>> = paths
        .par_iter()
        .map(|path| chunk_file(path))
        .collect::<Result<_>>()?;
    Ok(per_file.into_iter().flatten().collect())
}

/// Split text into one document per non-blank line.
///
/// Line terminators are not part of the content. The locator used for the
/// document id is the 1-based line number.
pub fn chunk_lines(text: &str, file_path: &str) -> Vec<Document> {
    let mut metadata = Metadata::new();
    metadata.insert(
        FILE_PATH_KEY.to_string(),
        MetaValue::Text(file_path.to_string()),
    );
    let metadata = Arc::new(metadata);

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let locator = (idx + 1).to_string();
            Document::new(
                DocumentId::new(file_path, &locator, line),
                line,
                Arc::clone(&metadata),
            )
        })
        .collect()
}

/// Parse a JSON array of records and chunk its bullets.
pub fn chunk_records_json(text: &str, origin: &str) -> Result<Vec<Document>> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;

    let records = value.as_array().ok_or_else(|| Error::Parse {
        origin: origin.to_string(),
        message: "expected a JSON array of records".to_string(),
    })?;

    Ok(chunk_records(records, origin))
}

/// Emit one document per bullet string across all records.
///
/// Records without a `bullets` array contribute nothing. The remaining scalar
/// fields of a record form one metadata map shared by all of its bullets.
pub fn chunk_records(
    records: &[serde_json::Value],
    origin: &str,
) -> Vec<Document> {
    let mut documents = Vec::new();

    for (record_idx, record) in records.iter().enumerate() {
        let Some(fields) = record.as_object() else {
            warn!(origin, record = record_idx, "skipping non-object record");
            continue;
        };

        let Some(bullets) =
            fields.get(BULLETS_FIELD).and_then(|b| b.as_array())
        else {
            debug!(origin, record = record_idx, "record has no bullets");
            continue;
        };

        let metadata = Arc::new(record_metadata(fields, origin, record_idx));

        for (bullet_idx, bullet) in bullets.iter().enumerate() {
            let Some(text) = bullet.as_str() else {
                warn!(
                    origin,
                    record = record_idx,
                    bullet = bullet_idx,
                    "skipping non-string bullet"
                );
                continue;
            };
            let locator = format!("{record_idx}:{bullet_idx}");
            documents.push(Document::new(
                DocumentId::new(origin, &locator, text),
                text,
                Arc::clone(&metadata),
            ));
        }
    }

    documents
}

fn record_metadata(
    fields: &serde_json::Map<String, serde_json::Value>,
    origin: &str,
    record_idx: usize,
) -> Metadata {
    let mut metadata = Metadata::new();
    for (key, value) in fields {
        if key == BULLETS_FIELD {
            continue;
        }
        match MetaValue::from_json(value) {
            Some(v) => {
                metadata.insert(key.clone(), v);
            }
            None => {
                debug!(
                    origin,
                    record = record_idx,
                    field = %key,
                    "skipping non-scalar field"
                );
            }
        }
    }
    metadata
}
