//! Archive container access: member enumeration and extraction.
//!
//! Supports tar archives (plain and gzip, bzip2, or xz compressed) and zip
//! archives. Containers are recognized by filename suffix and the choice is
//! checked against the file's leading magic bytes, so a text file named
//! `notes.zip` is treated as a plain file instead of failing enumeration.
//! Archives nested inside other archives are not expanded.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// The supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

impl ArchiveKind {
    /// Recognizes a container by its filename suffix.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.bz2") {
            Some(ArchiveKind::TarBz2)
        } else if name.ends_with(".tar.xz") {
            Some(ArchiveKind::TarXz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }

    /// The MIME type the container's magic bytes should identify as.
    fn container_mime(&self) -> &'static str {
        match self {
            ArchiveKind::Tar => "application/x-tar",
            ArchiveKind::TarGz => "application/gzip",
            ArchiveKind::TarBz2 => "application/x-bzip2",
            ArchiveKind::TarXz => "application/x-xz",
            ArchiveKind::Zip => "application/zip",
        }
    }

    /// Checks the file content against the format suggested by its name.
    /// An unreadable file or an inconclusive sniff trusts the suffix; the
    /// real open will surface any problem.
    pub fn confirm(&self, path: &Path) -> bool {
        let Ok(mut file) = File::open(path) else {
            return true;
        };
        let mut head = [0u8; 8192];
        let read = file.read(&mut head).unwrap_or(0);
        match infer::get(&head[..read]) {
            Some(found) => found.mime_type() == self.container_mime(),
            None => true,
        }
    }
}

/// Errors produced while reading a container.
#[derive(Debug)]
pub enum ArchiveError {
    /// The container file could not be opened.
    Open { path: PathBuf, source: io::Error },
    /// The container's structure could not be read.
    Enumerate { path: PathBuf, reason: String },
    /// A member's bytes could not be read.
    MemberRead {
        path: PathBuf,
        member: PathBuf,
        reason: String,
    },
    /// The requested member does not exist in the container.
    MemberNotFound { path: PathBuf, member: PathBuf },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Open { path, source } => {
                write!(f, "Failed to open archive {}: {}", path.display(), source)
            }
            ArchiveError::Enumerate { path, reason } => {
                write!(f, "Failed to read archive {}: {}", path.display(), reason)
            }
            ArchiveError::MemberRead {
                path,
                member,
                reason,
            } => write!(
                f,
                "Failed to read member {} of {}: {}",
                member.display(),
                path.display(),
                reason
            ),
            ArchiveError::MemberNotFound { path, member } => write!(
                f,
                "Archive {} has no member {}",
                path.display(),
                member.display()
            ),
        }
    }
}

impl std::error::Error for ArchiveError {}

/// Result type for archive access.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Lists the regular-file members of a container, in container order.
pub fn list_members(kind: ArchiveKind, container: &Path) -> ArchiveResult<Vec<PathBuf>> {
    match kind {
        ArchiveKind::Zip => list_zip_members(container),
        _ => list_tar_members(kind, container),
    }
}

/// Opens one member as a readable byte stream. The stream is fully buffered
/// before this returns, so it stays readable regardless of what happens to
/// the container afterwards.
pub fn open_member(
    kind: ArchiveKind,
    container: &Path,
    member: &Path,
) -> ArchiveResult<Box<dyn Read>> {
    let bytes = match kind {
        ArchiveKind::Zip => read_zip_member(container, member)?,
        _ => read_tar_member(kind, container, member)?,
    };
    Ok(Box::new(Cursor::new(bytes)))
}

fn open_container(container: &Path) -> ArchiveResult<File> {
    File::open(container).map_err(|source| ArchiveError::Open {
        path: container.to_path_buf(),
        source,
    })
}

fn tar_stream(kind: ArchiveKind, file: File) -> Box<dyn Read> {
    match kind {
        ArchiveKind::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveKind::TarBz2 => Box::new(BzDecoder::new(file)),
        ArchiveKind::TarXz => Box::new(XzDecoder::new(file)),
        _ => Box::new(file),
    }
}

fn list_tar_members(kind: ArchiveKind, container: &Path) -> ArchiveResult<Vec<PathBuf>> {
    let enumerate = |reason: String| ArchiveError::Enumerate {
        path: container.to_path_buf(),
        reason,
    };

    let file = open_container(container)?;
    let mut archive = tar::Archive::new(tar_stream(kind, file));
    let mut members = Vec::new();
    for entry in archive.entries().map_err(|e| enumerate(e.to_string()))? {
        let entry = entry.map_err(|e| enumerate(e.to_string()))?;
        if entry.header().entry_type().is_file() {
            let path = entry.path().map_err(|e| enumerate(e.to_string()))?;
            members.push(path.into_owned());
        }
    }
    Ok(members)
}

fn read_tar_member(kind: ArchiveKind, container: &Path, member: &Path) -> ArchiveResult<Vec<u8>> {
    let read_error = |reason: String| ArchiveError::MemberRead {
        path: container.to_path_buf(),
        member: member.to_path_buf(),
        reason,
    };

    let file = open_container(container)?;
    let mut archive = tar::Archive::new(tar_stream(kind, file));
    let entries = archive.entries().map_err(|e| read_error(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| read_error(e.to_string()))?;
        let path = entry.path().map_err(|e| read_error(e.to_string()))?;
        if path.as_ref() == member {
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| read_error(e.to_string()))?;
            return Ok(bytes);
        }
    }
    Err(ArchiveError::MemberNotFound {
        path: container.to_path_buf(),
        member: member.to_path_buf(),
    })
}

fn list_zip_members(container: &Path) -> ArchiveResult<Vec<PathBuf>> {
    let enumerate = |reason: String| ArchiveError::Enumerate {
        path: container.to_path_buf(),
        reason,
    };

    let file = open_container(container)?;
    let mut archive = ZipArchive::new(file).map_err(|e| enumerate(e.to_string()))?;
    let mut members = Vec::new();
    for index in 0..archive.len() {
        let member = archive
            .by_index(index)
            .map_err(|e| enumerate(e.to_string()))?;
        if member.is_file() {
            members.push(PathBuf::from(member.name()));
        }
    }
    Ok(members)
}

fn read_zip_member(container: &Path, member: &Path) -> ArchiveResult<Vec<u8>> {
    let read_error = |reason: String| ArchiveError::MemberRead {
        path: container.to_path_buf(),
        member: member.to_path_buf(),
        reason,
    };

    let file = open_container(container)?;
    let mut archive = ZipArchive::new(file).map_err(|e| read_error(e.to_string()))?;
    let name = member.to_string_lossy();
    let mut entry = match archive.by_name(&name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ArchiveError::MemberNotFound {
                path: container.to_path_buf(),
                member: member.to_path_buf(),
            });
        }
        Err(e) => return Err(read_error(e.to_string())),
    };
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| read_error(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tar(dir: &Path, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).expect("Failed to create tar");
        let mut builder = tar::Builder::new(file);
        for (member, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, member, *data)
                .expect("Failed to append member");
        }
        builder.finish().expect("Failed to finish tar");
        path
    }

    fn write_zip(dir: &Path, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).expect("Failed to create zip");
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (member, data) in members {
            writer
                .start_file(member.to_string(), options)
                .expect("Failed to start member");
            writer.write_all(data).expect("Failed to write member");
        }
        writer.finish().expect("Failed to finish zip");
        path
    }

    #[test]
    fn test_detect_by_suffix() {
        assert_eq!(
            ArchiveKind::detect(Path::new("a.tar")),
            Some(ArchiveKind::Tar)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("a.tar.gz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("a.tgz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("a.tar.bz2")),
            Some(ArchiveKind::TarBz2)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("a.tar.xz")),
            Some(ArchiveKind::TarXz)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("A.ZIP")),
            Some(ArchiveKind::Zip)
        );
        assert_eq!(ArchiveKind::detect(Path::new("a.txt")), None);
        assert_eq!(ArchiveKind::detect(Path::new("tarball")), None);
    }

    #[test]
    fn test_tar_members_are_listed_in_order() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let tar = write_tar(
            dir.path(),
            "bundle.tar",
            &[("one.txt", b"1"), ("sub/two.txt", b"22")],
        );

        let members = list_members(ArchiveKind::Tar, &tar).expect("list failed");
        assert_eq!(
            members,
            vec![PathBuf::from("one.txt"), PathBuf::from("sub/two.txt")]
        );
    }

    #[test]
    fn test_tar_member_bytes_round_trip() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let tar = write_tar(dir.path(), "bundle.tar", &[("data.bin", b"payload")]);

        let mut reader =
            open_member(ArchiveKind::Tar, &tar, Path::new("data.bin")).expect("open failed");
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).expect("read failed");
        assert_eq!(bytes, b"payload");
    }

    #[test]
    fn test_zip_members_and_bytes() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let zip = write_zip(
            dir.path(),
            "bundle.zip",
            &[("a.txt", b"alpha"), ("nested/b.txt", b"beta")],
        );

        let members = list_members(ArchiveKind::Zip, &zip).expect("list failed");
        assert_eq!(
            members,
            vec![PathBuf::from("a.txt"), PathBuf::from("nested/b.txt")]
        );

        let mut reader =
            open_member(ArchiveKind::Zip, &zip, Path::new("nested/b.txt")).expect("open failed");
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).expect("read failed");
        assert_eq!(bytes, b"beta");
    }

    #[test]
    fn test_missing_member_is_reported() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let tar = write_tar(dir.path(), "bundle.tar", &[("present.txt", b"x")]);

        let result = open_member(ArchiveKind::Tar, &tar, Path::new("absent.txt"));
        assert!(matches!(result, Err(ArchiveError::MemberNotFound { .. })));
    }

    #[test]
    fn test_confirm_rejects_mislabeled_file() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let fake = dir.path().join("fake.zip");
        std::fs::write(&fake, b"%PDF-1.4 not really a zip").expect("Failed to write file");

        assert!(!ArchiveKind::Zip.confirm(&fake));
    }

    #[test]
    fn test_confirm_accepts_real_zip() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let zip = write_zip(dir.path(), "real.zip", &[("a.txt", b"alpha")]);

        assert!(ArchiveKind::Zip.confirm(&zip));
    }
}
