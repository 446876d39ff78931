use tracing::info;

use crate::{
    chunking::{self, Source},
    embedding::{self, Embedder},
    error::Result,
    store::DocumentStore,
};

/// Chunk, embed and store a source. Returns the number of documents produced.
///
/// Each stage runs to completion before the next starts, so a failure while
/// reading or embedding leaves the store untouched. A source that yields no
/// documents is not an error.
pub fn index(
    source: &Source,
    embedder: &mut dyn Embedder,
    store: &mut DocumentStore,
    batch_size: usize,
) -> Result<usize> {
    let documents = chunking::produce(source)?;
    let produced = documents.len();
    if produced == 0 {
        info!(source = %source, "source produced no documents");
        return Ok(0);
    }

    let embedded = embedding::embed_documents(embedder, documents, batch_size)?;
    store.insert(embedded)?;

    info!(
        source = %source,
        documents = produced,
        total = store.count(),
        "indexed source"
    );
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{error::Error, hash_embedder::HashEmbedder};

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed_documents(
            &mut self,
            _texts: &[String],
        ) -> Result<Vec<Vec<f32>>> {
            Err(Error::Embedding("backend unavailable".to_string()))
        }

        fn embed_query(&mut self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::Embedding("backend unavailable".to_string()))
        }
    }

    fn records_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn indexes_records_with_embeddings() {
        let file = records_file(
            r#"[{"company":"A","bullets":["foo bar"]},
                {"company":"B","bullets":["baz qux"]}]"#,
        );
        let source = Source::Records(file.path().to_path_buf());
        let mut store = DocumentStore::new().unwrap();
        let mut embedder = HashEmbedder::new(32);

        let n = index(&source, &mut embedder, &mut store, 8).unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.count(), 2);
        assert_eq!(store.dimension(), Some(32));
    }

    #[test]
    fn reindexing_does_not_duplicate() {
        let file = records_file(r#"[{"bullets":["foo bar","baz"]}]"#);
        let source = Source::Records(file.path().to_path_buf());
        let mut store = DocumentStore::new().unwrap();
        let mut embedder = HashEmbedder::new(16);

        index(&source, &mut embedder, &mut store, 1).unwrap();
        index(&source, &mut embedder, &mut store, 1).unwrap();
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn embedding_failure_leaves_store_unchanged() {
        let file = records_file(r#"[{"bullets":["foo"]}]"#);
        let source = Source::Records(file.path().to_path_buf());
        let mut store = DocumentStore::new().unwrap();

        let err =
            index(&source, &mut FailingEmbedder, &mut store, 4).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn empty_source_is_zero_not_error() {
        let file = records_file(r#"[{"company":"A"},{"bullets":[]}]"#);
        let source = Source::Records(file.path().to_path_buf());
        let mut store = DocumentStore::new().unwrap();

        let n = index(&source, &mut FailingEmbedder, &mut store, 4).unwrap();
        assert_eq!(n, 0);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::File(dir.path().join("absent.md"));
        let mut store = DocumentStore::new().unwrap();
        let err = index(&source, &mut HashEmbedder::default(), &mut store, 4)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let file = records_file("[{\"bullets\": [");
        let source = Source::Records(file.path().to_path_buf());
        let mut store = DocumentStore::new().unwrap();
        let err = index(&source, &mut HashEmbedder::default(), &mut store, 4)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
