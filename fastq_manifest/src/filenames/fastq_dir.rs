//! Scan a directory tree for FASTQ files by filename suffix.

use crate::errors::ManifestError;
use crate::filenames::FastqNamePatterns;
use itertools::Itertools;
use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Every file at any depth under `root` ending in `.{ext}` for one of the
/// configured extensions, as absolute paths.
///
/// Files are grouped by extension in the configured order and sorted by path
/// within a group. A file matching two extensions is listed once. When a
/// filter is set, paths not containing it are dropped. Hidden files and
/// directories (leading `.`) are skipped.
pub fn find_fastqs(root: &Path, patterns: &FastqNamePatterns) -> Result<Vec<PathBuf>, ManifestError> {
    if !root.is_dir() {
        return Err(ManifestError::InputDirMissing {
            path: root.to_path_buf(),
        });
    }
    let root = std::path::absolute(root).map_err(ManifestError::io(root))?;
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());

    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..Default::default()
    };

    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for ext in &patterns.extensions {
        let pattern = format!("{escaped_root}/**/*.{ext}");
        let entries = glob::glob_with(&pattern, options).map_err(|source| ManifestError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;

        let mut matched = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                ManifestError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if path.is_file() {
                matched.push(path);
            }
        }
        matched.sort();
        debug!("{} files ending in .{ext} under {}", matched.len(), root.display());

        for path in matched {
            if let Some(filter) = &patterns.filter {
                if !path.to_string_lossy().contains(filter.as_str()) {
                    continue;
                }
            }
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        return Err(ManifestError::NoFastqs {
            path: root,
            extensions: patterns.extensions.iter().map(|e| format!(".{e}")).join(", "),
        });
    }
    Ok(files)
}
