//! Recursive discovery of the entries a listing is built from.
//!
//! Walks the source tree in deterministic name order, applies the configured
//! filter rules, and turns every regular file into one entry. Files
//! recognized as archive containers are expanded into one entry per member
//! instead of an entry for the container itself.

use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::archive::{self, ArchiveError, ArchiveKind};
use crate::config::CompiledFilters;
use crate::entry::Entry;

/// Errors produced while scanning the source tree.
#[derive(Debug)]
pub enum ScanError {
    /// The directory walk failed.
    Walk { source: walkdir::Error },
    /// An archive container could not be enumerated.
    Archive { source: ArchiveError },
    /// A walked path was not inside the scan root.
    OutsideRoot { path: PathBuf },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Walk { source } => write!(f, "Failed to scan directory: {}", source),
            ScanError::Archive { source } => write!(f, "{}", source),
            ScanError::OutsideRoot { path } => {
                write!(f, "Path {} is outside the scan root", path.display())
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Discovers entries beneath a source root.
pub struct Scanner {
    filters: CompiledFilters,
}

impl Scanner {
    /// Creates a scanner applying the given filter rules.
    pub fn new(filters: CompiledFilters) -> Self {
        Self { filters }
    }

    /// Walks `root` and returns its entries in deterministic order. Regular
    /// files become one entry each; recognized archives contribute one entry
    /// per member. Filter rules are matched against paths relative to the
    /// root.
    pub fn scan(&self, root: &Path) -> Result<Vec<Entry>, ScanError> {
        let mut entries = Vec::new();

        for item in WalkDir::new(root).sort_by_file_name() {
            let item = item.map_err(|source| ScanError::Walk { source })?;
            if !item.file_type().is_file() {
                continue;
            }
            let path = item.path();
            let relative = path
                .strip_prefix(root)
                .map_err(|_| ScanError::OutsideRoot {
                    path: path.to_path_buf(),
                })?;
            if !self.filters.should_include(relative) {
                continue;
            }

            match ArchiveKind::detect(path) {
                Some(kind) if kind.confirm(path) => {
                    let members = archive::list_members(kind, path)
                        .map_err(|source| ScanError::Archive { source })?;
                    for member in members {
                        entries.push(Entry::archive_member(relative, &member));
                    }
                }
                _ => entries.push(Entry::file(relative)),
            }
        }

        Ok(entries)
    }
}
