pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("parse error in {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map an I/O error on `path` to [`Error::NotFound`] when the path is
    /// missing, keeping every other failure as [`Error::Io`].
    pub fn from_io_at(
        err: std::io::Error,
        kind: &'static str,
        path: &std::path::Path,
    ) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound {
                kind,
                name: path.display().to_string(),
            }
        } else {
            Error::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn missing_path_becomes_not_found() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let mapped = Error::from_io_at(err, "file", Path::new("nope.md"));
        assert!(matches!(mapped, Error::NotFound { kind: "file", .. }));
        assert_eq!(mapped.to_string(), "file not found: nope.md");
    }

    #[test]
    fn other_io_errors_stay_io() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let mapped = Error::from_io_at(err, "file", Path::new("locked.md"));
        assert!(matches!(mapped, Error::Io(_)));
    }
}
