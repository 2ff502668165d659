//! Pairing of original entries with edited lines into classified operations.
//!
//! Entries and edited lines are paired strictly by position: entry *i* goes
//! with line *i*. The codec guarantees equal counts before this module runs.
//! Each pair becomes one [`Operation`]: an unchanged line keeps the entry, a
//! rewritten line moves it, an emptied line deletes it. Destinations are
//! resolved against the target directory and validated before any planning
//! happens, so a bad edit never reaches the filesystem.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::entry::{Entry, EntryId, Origin};
use crate::listing::EditedLine;

/// How destination paths are compared against each other.
///
/// On a case-insensitive filesystem two spellings of one path name the same
/// file; collision and ordering decisions have to follow suit. The default is
/// case-sensitive comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseSensitivity {
    /// Paths differing only in letter case are distinct.
    #[default]
    Sensitive,
    /// Paths differing only in letter case name the same file.
    Insensitive,
}

impl CaseSensitivity {
    /// Produces the comparison key for a path under this policy.
    pub fn key(&self, path: &Path) -> String {
        let text = path.to_string_lossy();
        match self {
            CaseSensitivity::Sensitive => text.into_owned(),
            CaseSensitivity::Insensitive => text.to_lowercase(),
        }
    }
}

/// The classified intent derived from one entry and its edited line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// The line was left unchanged.
    Keep,
    /// The line was rewritten to a new destination path.
    Move,
    /// The line was emptied.
    Delete,
}

/// The result of reconciling one entry with its edited line.
///
/// Created once here, consumed once by the plan builder, never mutated.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Position of the entry in the original listing.
    pub index: usize,
    /// Identity of the entry this operation acts on.
    pub id: EntryId,
    /// What the edit asks for.
    pub kind: OperationKind,
    /// Source location with all paths resolved to absolute form.
    pub source: Origin,
    /// Absolute destination under the target directory. `None` for deletions
    /// and for kept archive members, which stay inside their container.
    pub destination: Option<PathBuf>,
}

/// Errors produced while reconciling a listing.
#[derive(Debug)]
pub enum ReconcileError {
    /// Entry and line counts differ. The codec normally catches this first.
    LineCountMismatch { expected: usize, actual: usize },
    /// An edited line does not name a usable destination inside the target
    /// directory.
    InvalidDestination {
        line: usize,
        text: String,
        reason: String,
    },
    /// Two or more entries were directed at the same destination path.
    DuplicateDestination {
        destination: PathBuf,
        first_line: usize,
        second_line: usize,
    },
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::LineCountMismatch { expected, actual } => {
                write!(
                    f,
                    "Listing has {} lines but {} entries were scanned",
                    actual, expected
                )
            }
            ReconcileError::InvalidDestination { line, text, reason } => {
                write!(
                    f,
                    "Invalid destination on line {}: '{}' ({})",
                    line + 1,
                    text,
                    reason
                )
            }
            ReconcileError::DuplicateDestination {
                destination,
                first_line,
                second_line,
            } => {
                write!(
                    f,
                    "Lines {} and {} both resolve to {}",
                    first_line + 1,
                    second_line + 1,
                    destination.display()
                )
            }
        }
    }
}

impl std::error::Error for ReconcileError {}

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Pairs entries with edited lines and classifies the outcome.
pub struct Reconciler {
    source_root: PathBuf,
    target_root: PathBuf,
    case: CaseSensitivity,
}

impl Reconciler {
    /// Creates a reconciler resolving sources against `source_root` and
    /// destinations against `target_root`.
    pub fn new(source_root: &Path, target_root: &Path, case: CaseSensitivity) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            target_root: target_root.to_path_buf(),
            case,
        }
    }

    /// Turns each entry/line pair into an [`Operation`] and validates the
    /// full set for destination collisions.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidDestination`] for a line that escapes
    /// the target directory, names an absolute path outside it, or holds only
    /// whitespace, and [`ReconcileError::DuplicateDestination`] when two
    /// non-deletion operations resolve to one path.
    pub fn reconcile(
        &self,
        entries: &[Entry],
        lines: &[EditedLine],
    ) -> ReconcileResult<Vec<Operation>> {
        if entries.len() != lines.len() {
            return Err(ReconcileError::LineCountMismatch {
                expected: entries.len(),
                actual: lines.len(),
            });
        }

        let mut operations = Vec::with_capacity(entries.len());
        for (index, (entry, line)) in entries.iter().zip(lines.iter()).enumerate() {
            operations.push(self.classify(index, entry, line)?);
        }

        self.check_collisions(&operations)?;

        Ok(operations)
    }

    fn classify(&self, index: usize, entry: &Entry, line: &EditedLine) -> ReconcileResult<Operation> {
        let source = self.resolve_source(entry.origin());

        if line.is_delete_marker() {
            return Ok(Operation {
                index,
                id: entry.id().clone(),
                kind: OperationKind::Delete,
                source,
                destination: None,
            });
        }

        if line.text() == entry.display_line() {
            let destination = match entry.origin() {
                Origin::File { path } => Some(self.target_root.join(path)),
                // A kept member stays inside its container.
                Origin::ArchiveMember { .. } => None,
            };
            return Ok(Operation {
                index,
                id: entry.id().clone(),
                kind: OperationKind::Keep,
                source,
                destination,
            });
        }

        let destination = self.resolve_destination(index, line.text())?;
        Ok(Operation {
            index,
            id: entry.id().clone(),
            kind: OperationKind::Move,
            source,
            destination: Some(destination),
        })
    }

    fn resolve_source(&self, origin: &Origin) -> Origin {
        match origin {
            Origin::File { path } => Origin::File {
                path: self.source_root.join(path),
            },
            Origin::ArchiveMember { container, member } => Origin::ArchiveMember {
                container: self.source_root.join(container),
                member: member.clone(),
            },
        }
    }

    /// Resolves edited text into an absolute destination under the target
    /// directory, refusing anything that would land outside it.
    fn resolve_destination(&self, line: usize, text: &str) -> ReconcileResult<PathBuf> {
        let invalid = |reason: &str| ReconcileError::InvalidDestination {
            line,
            text: text.to_string(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(invalid("line holds only whitespace"));
        }

        let raw = Path::new(text);
        let relative = if raw.is_absolute() {
            raw.strip_prefix(&self.target_root)
                .map_err(|_| invalid("absolute path outside the target directory"))?
                .to_path_buf()
        } else {
            raw.to_path_buf()
        };

        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(invalid("path escapes the target directory"));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("unsupported path component"));
                }
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(invalid("path resolves to the target directory itself"));
        }

        Ok(self.target_root.join(normalized))
    }

    fn check_collisions(&self, operations: &[Operation]) -> ReconcileResult<()> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for operation in operations {
            if operation.kind == OperationKind::Delete {
                continue;
            }
            let Some(destination) = &operation.destination else {
                continue;
            };
            let key = self.case.key(destination);
            if let Some(&first_line) = seen.get(&key) {
                return Err(ReconcileError::DuplicateDestination {
                    destination: destination.clone(),
                    first_line,
                    second_line: operation.index,
                });
            }
            seen.insert(key, operation.index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{decode, encode};

    fn reconciler() -> Reconciler {
        Reconciler::new(
            Path::new("/data/src"),
            Path::new("/data/dst"),
            CaseSensitivity::Sensitive,
        )
    }

    fn entries() -> Vec<Entry> {
        vec![
            Entry::file(Path::new("a.txt")),
            Entry::file(Path::new("sub/b.txt")),
        ]
    }

    #[test]
    fn test_unedited_listing_yields_only_keeps() {
        let entries = entries();
        let lines = decode(&encode(&entries), entries.len()).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert!(
            operations
                .iter()
                .all(|op| op.kind == OperationKind::Keep)
        );
        assert_eq!(
            operations[1].destination.as_deref(),
            Some(Path::new("/data/dst/sub/b.txt"))
        );
    }

    #[test]
    fn test_rewritten_line_becomes_move() {
        let entries = entries();
        let lines = decode("renamed.txt\nsub/b.txt\n", 2).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert_eq!(operations[0].kind, OperationKind::Move);
        assert_eq!(
            operations[0].destination.as_deref(),
            Some(Path::new("/data/dst/renamed.txt"))
        );
        assert_eq!(operations[1].kind, OperationKind::Keep);
    }

    #[test]
    fn test_emptied_line_becomes_delete() {
        let entries = entries();
        let lines = decode("\nsub/b.txt\n", 2).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert_eq!(operations[0].kind, OperationKind::Delete);
        assert!(operations[0].destination.is_none());
        assert_eq!(
            operations[0].source,
            Origin::File {
                path: PathBuf::from("/data/src/a.txt")
            }
        );
    }

    #[test]
    fn test_parent_escape_is_rejected() {
        let entries = entries();
        let lines = decode("../evil.txt\nsub/b.txt\n", 2).expect("decode failed");
        let result = reconciler().reconcile(&entries, &lines);

        assert!(matches!(
            result,
            Err(ReconcileError::InvalidDestination { line: 0, .. })
        ));
    }

    #[test]
    fn test_interior_parent_segments_are_normalized() {
        let entries = entries();
        let lines = decode("sub/../renamed.txt\nsub/b.txt\n", 2).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert_eq!(
            operations[0].destination.as_deref(),
            Some(Path::new("/data/dst/renamed.txt"))
        );
    }

    #[test]
    fn test_absolute_path_inside_target_is_accepted() {
        let entries = entries();
        let lines = decode("/data/dst/kept/a.txt\nsub/b.txt\n", 2).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert_eq!(
            operations[0].destination.as_deref(),
            Some(Path::new("/data/dst/kept/a.txt"))
        );
    }

    #[test]
    fn test_absolute_path_outside_target_is_rejected() {
        let entries = entries();
        let lines = decode("/etc/passwd\nsub/b.txt\n", 2).expect("decode failed");
        let result = reconciler().reconcile(&entries, &lines);

        assert!(matches!(
            result,
            Err(ReconcileError::InvalidDestination { line: 0, .. })
        ));
    }

    #[test]
    fn test_whitespace_only_line_is_rejected() {
        let entries = entries();
        let lines = decode("   \nsub/b.txt\n", 2).expect("decode failed");
        let result = reconciler().reconcile(&entries, &lines);

        assert!(matches!(
            result,
            Err(ReconcileError::InvalidDestination { line: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_destination_is_rejected() {
        let entries = entries();
        let lines = decode("same.txt\nsame.txt\n", 2).expect("decode failed");
        let result = reconciler().reconcile(&entries, &lines);

        assert!(matches!(
            result,
            Err(ReconcileError::DuplicateDestination {
                first_line: 0,
                second_line: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_case_sensitive_spellings_are_distinct() {
        let entries = entries();
        let lines = decode("Same.txt\nsame.txt\n", 2).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert_eq!(operations.len(), 2);
    }

    #[test]
    fn test_case_insensitive_spellings_collide() {
        let entries = entries();
        let lines = decode("Same.txt\nsame.txt\n", 2).expect("decode failed");
        let reconciler = Reconciler::new(
            Path::new("/data/src"),
            Path::new("/data/dst"),
            CaseSensitivity::Insensitive,
        );
        let result = reconciler.reconcile(&entries, &lines);

        assert!(matches!(
            result,
            Err(ReconcileError::DuplicateDestination { .. })
        ));
    }

    #[test]
    fn test_move_collides_with_kept_destination() {
        let entries = entries();
        // The second entry keeps its place while the first is moved onto it.
        let lines = decode("sub/b.txt\nsub/b.txt\n", 2).expect("decode failed");
        let reconciler = Reconciler::new(
            Path::new("/data/dst"),
            Path::new("/data/dst"),
            CaseSensitivity::Sensitive,
        );
        let result = reconciler.reconcile(&entries, &lines);

        assert!(matches!(
            result,
            Err(ReconcileError::DuplicateDestination { .. })
        ));
    }

    #[test]
    fn test_kept_archive_member_has_no_destination() {
        let entries = vec![Entry::archive_member(
            Path::new("bundle.tar"),
            Path::new("inner.txt"),
        )];
        let lines = decode("bundle.tar!/inner.txt\n", 1).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert_eq!(operations[0].kind, OperationKind::Keep);
        assert!(operations[0].destination.is_none());
    }

    #[test]
    fn test_moved_archive_member_resolves_container() {
        let entries = vec![Entry::archive_member(
            Path::new("bundle.tar"),
            Path::new("inner.txt"),
        )];
        let lines = decode("flattened.txt\n", 1).expect("decode failed");
        let operations = reconciler()
            .reconcile(&entries, &lines)
            .expect("reconcile failed");

        assert_eq!(operations[0].kind, OperationKind::Move);
        assert_eq!(
            operations[0].source,
            Origin::ArchiveMember {
                container: PathBuf::from("/data/src/bundle.tar"),
                member: PathBuf::from("inner.txt"),
            }
        );
        assert_eq!(
            operations[0].destination.as_deref(),
            Some(Path::new("/data/dst/flattened.txt"))
        );
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let entries = entries();
        let lines = decode("a.txt\n", 1).expect("decode failed");
        let result = reconciler().reconcile(&entries, &lines);

        assert!(matches!(
            result,
            Err(ReconcileError::LineCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }
}
