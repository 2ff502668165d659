//! Data model for the items a listing is made of.
//!
//! An [`Entry`] is one movable unit discovered at scan time: either a plain
//! file or a single member stored inside an archive. Every entry carries a
//! stable [`EntryId`] assigned on creation and never changed afterwards, plus
//! the exact text line shown to the user in the editable listing.

use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between a container path and a member path in display lines.
///
/// A line such as `photos.zip!/2024/beach.jpg` addresses the member
/// `2024/beach.jpg` inside the archive `photos.zip`.
pub const MEMBER_SEPARATOR: &str = "!/";

/// Stable, opaque identity of an entry.
///
/// Derived from the source location at scan time. Two entries in the same
/// listing never share an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(String);

impl EntryId {
    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the bytes of an entry currently live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A regular file on disk.
    File {
        /// Path of the file. Relative to the scan root on entries produced by
        /// the scanner; absolute once resolved into an operation.
        path: PathBuf,
    },
    /// A member stored inside an archive container.
    ArchiveMember {
        /// Path of the archive file holding the member.
        container: PathBuf,
        /// Path of the member inside the archive.
        member: PathBuf,
    },
}

impl Origin {
    /// The on-disk path this origin occupies: the file itself, or the
    /// container the member is stored in.
    pub fn occupied_path(&self) -> &Path {
        match self {
            Origin::File { path } => path,
            Origin::ArchiveMember { container, .. } => container,
        }
    }
}

/// One movable unit known to the listing.
#[derive(Debug, Clone)]
pub struct Entry {
    id: EntryId,
    origin: Origin,
    display_line: String,
}

impl Entry {
    /// Creates an entry for a regular file, addressed relative to the scan
    /// root. The display line is the relative path itself.
    pub fn file(path: &Path) -> Self {
        let display_line = path.to_string_lossy().into_owned();
        Self {
            id: EntryId(display_line.clone()),
            origin: Origin::File {
                path: path.to_path_buf(),
            },
            display_line,
        }
    }

    /// Creates an entry for an archive member. The display line is the
    /// container path and the member path joined by [`MEMBER_SEPARATOR`].
    pub fn archive_member(container: &Path, member: &Path) -> Self {
        let display_line = format!(
            "{}{}{}",
            container.display(),
            MEMBER_SEPARATOR,
            member.display()
        );
        Self {
            id: EntryId(display_line.clone()),
            origin: Origin::ArchiveMember {
                container: container.to_path_buf(),
                member: member.to_path_buf(),
            },
            display_line,
        }
    }

    /// The stable identity of this entry.
    pub fn id(&self) -> &EntryId {
        &self.id
    }

    /// The source location of this entry.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The text line representing this entry in the listing, prior to editing.
    pub fn display_line(&self) -> &str {
        &self.display_line
    }

    /// Returns true if this entry lives inside an archive.
    pub fn is_archive_member(&self) -> bool {
        matches!(self.origin, Origin::ArchiveMember { .. })
    }
}
