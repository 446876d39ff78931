use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

/// A stable document identifier derived from (origin, locator, content).
///
/// The origin names the source file, the locator pins the unit inside it
/// (a line number or a `record:bullet` pair). Deriving the id from all three
/// makes re-indexing the same source overwrite rather than duplicate, while
/// repeated text at different positions stays distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId {
    /// The numeric ID used as the store key.
    pub numeric: u64,
    /// The short hex string for human display (e.g. "a1b2c3").
    pub short: String,
}

impl DocumentId {
    /// Generate a stable document ID.
    pub fn new(origin: &str, locator: &str, content: &str) -> Self {
        let numeric = Self::hash_parts(origin, locator, content);
        let short = Self::short_hex(numeric, 6);
        Self { numeric, short }
    }

    fn hash_parts(origin: &str, locator: &str, content: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        origin.hash(&mut hasher);
        locator.hash(&mut hasher);
        content.hash(&mut hasher);
        hasher.finish()
    }

    fn short_hex(value: u64, len: usize) -> String {
        let full = format!("{value:016x}");
        full[..len].to_string()
    }

    /// Full 16-character hex form, used as the lexical index key.
    pub fn full_hex(&self) -> String {
        format!("{:016x}", self.numeric)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short)
    }
}
