use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

use crate::error::{Error, Result};

/// A discovered source file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the directory being walked.
    pub relative_path: PathBuf,
}

/// Compile a glob pattern such as `*.md` into a matcher.
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| {
            Error::Config(format!("invalid glob pattern '{pattern}': {e}"))
        })
}

/// Recursively walk a directory and collect files matching `pattern`.
///
/// The pattern is matched against the path relative to `root`. Hidden files
/// and directories (names starting with `.`) are skipped. Results are sorted
/// by relative path so discovery order is stable across runs.
pub fn discover_files(
    root: &Path,
    pattern: &GlobMatcher,
) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| Error::from_io_at(e, "directory", root))?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, pattern, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    pattern: &GlobMatcher,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            walk_dir(root, &path, pattern, results)?;
        } else if file_type.is_symlink() {
            // Broken links are skipped, linked directories are not followed.
            let Ok(resolved) = path.canonicalize() else {
                continue;
            };
            if resolved.is_file() {
                push_if_matching(root, &path, pattern, results);
            }
        } else if file_type.is_file() {
            push_if_matching(root, &path, pattern, results);
        }
    }

    Ok(())
}

fn push_if_matching(
    root: &Path,
    original_path: &Path,
    pattern: &GlobMatcher,
    results: &mut Vec<DiscoveredFile>,
) {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    if pattern.is_match(&relative_path) {
        results.push(DiscoveredFile { relative_path });
    }
}
