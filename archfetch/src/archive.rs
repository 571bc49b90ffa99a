//! Reading members out of `.tar.gz` archives.
//!
//! [`TarGzReader`] opens an archive and checks that it decompresses at all;
//! [`TarGzArchive::extract`] then streams through the tarball looking for a
//! single member. Each extraction re-reads the archive from the start, which
//! keeps the handle free of borrowed state and lets a corrupt tail surface
//! as [`ExtractError::Corrupt`] on whichever member hits it.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::traits::{ArchiveHandle, ArchiveReader};

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors raised while opening or extracting an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive does not contain the requested member.
    #[error("archive has no member {member}")]
    MemberAbsent { member: String },

    /// The member name would escape the destination directory.
    #[error("refusing to extract unsafe member path {member}")]
    UnsafeMember { member: String },

    /// The archive is missing, truncated or otherwise unreadable.
    #[error("archive {} is unreadable: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Writing the extracted member failed.
    #[error("failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl ExtractError {
    /// Whether re-fetching the archive could fix this error.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Size of the gzip probe done on open.
const PROBE_SIZE: usize = 512;

/// Copy buffer size.
const BUFFER_SIZE: usize = 64 * 1024;

/// Opens `.tar.gz` archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzReader;

impl TarGzReader {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveReader for TarGzReader {
    type Handle = TarGzArchive;

    fn open(&self, path: &Path) -> ExtractResult<TarGzArchive> {
        let file = open_archive(path)?;

        let mut decoder = GzDecoder::new(file);
        let mut probe = [0u8; PROBE_SIZE];
        match decoder.read(&mut probe) {
            Ok(0) => Err(corrupt(path, "archive is empty")),
            Ok(_) => Ok(TarGzArchive {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(corrupt(path, e)),
        }
    }
}

/// An opened `.tar.gz` archive.
#[derive(Debug, Clone)]
pub struct TarGzArchive {
    path: PathBuf,
}

impl TarGzArchive {
    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveHandle for TarGzArchive {
    fn extract(&mut self, member: &str, dest_dir: &Path) -> ExtractResult<PathBuf> {
        let wanted = sanitize_member(member)?;

        let file = open_archive(&self.path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let entries = archive.entries().map_err(|e| corrupt(&self.path, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| corrupt(&self.path, e))?;
            let matches = normalize(&entry.path().map_err(|e| corrupt(&self.path, e))?) == wanted;
            if !matches {
                continue;
            }
            if !entry.header().entry_type().is_file() {
                return Err(ExtractError::MemberAbsent {
                    member: member.to_string(),
                });
            }

            let dest = dest_dir.join(&wanted);
            write_entry(&mut entry, &self.path, &dest)?;
            return Ok(dest);
        }

        Err(ExtractError::MemberAbsent {
            member: member.to_string(),
        })
    }
}

fn open_archive(path: &Path) -> ExtractResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => corrupt(path, "archive file is missing"),
        _ => ExtractError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn corrupt(path: &Path, reason: impl ToString) -> ExtractError {
    ExtractError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Validate a member name and reduce it to its normal components.
///
/// Absolute paths, parent references and empty names are rejected.
fn sanitize_member(member: &str) -> ExtractResult<PathBuf> {
    let unsafe_member = || ExtractError::UnsafeMember {
        member: member.to_string(),
    };

    let mut clean = PathBuf::new();
    for component in Path::new(member).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_member())
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(unsafe_member());
    }
    Ok(clean)
}

/// Entry path with `.` components dropped, for comparison only.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Stream one entry to `dest`.
///
/// Read failures mean the archive is damaged; write failures are local I/O.
fn write_entry(entry: &mut impl Read, archive: &Path, dest: &Path) -> ExtractResult<()> {
    let io_error = |e| ExtractError::Io {
        path: dest.to_path_buf(),
        source: e,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut out = File::create(dest).map_err(io_error)?;

    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = entry.read(&mut buffer).map_err(|e| corrupt(archive, e))?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n]).map_err(io_error)?;
    }
    out.flush().map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn build_archive(path: &Path, members: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extract_member() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("PMC1.tar.gz");
        build_archive(
            &archive,
            &[("PMC1/fig1.jpg", b"one"), ("PMC1/fig2.jpg", b"two")],
        );

        let mut handle = TarGzReader::new().open(&archive).unwrap();
        let out = handle.extract("PMC1/fig2.jpg", temp.path()).unwrap();

        assert_eq!(out, temp.path().join("PMC1/fig2.jpg"));
        assert_eq!(fs::read(&out).unwrap(), b"two");
    }

    #[test]
    fn test_extract_matches_dot_prefixed_entries() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("PMC1.tar.gz");
        build_archive(&archive, &[("./PMC1/fig1.jpg", b"one")]);

        let mut handle = TarGzReader::new().open(&archive).unwrap();
        let out = handle.extract("PMC1/fig1.jpg", temp.path()).unwrap();

        assert_eq!(fs::read(out).unwrap(), b"one");
    }

    #[test]
    fn test_missing_member() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("PMC1.tar.gz");
        build_archive(&archive, &[("PMC1/fig1.jpg", b"one")]);

        let mut handle = TarGzReader::new().open(&archive).unwrap();
        let err = handle.extract("PMC1/nope.jpg", temp.path()).unwrap_err();

        assert!(matches!(err, ExtractError::MemberAbsent { .. }));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("PMC1.tar.gz");
        fs::write(&archive, b"this is not gzip").unwrap();

        let err = TarGzReader::new().open(&archive).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_open_missing_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let err = TarGzReader::new()
            .open(&temp.path().join("absent.tar.gz"))
            .unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_truncated_archive_is_corrupt_on_extract() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("PMC1.tar.gz");
        // Incompressible payload so truncation lands inside it
        let mut seed = 0x2545_f491_u32;
        let big: Vec<u8> = (0..256 * 1024)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                seed as u8
            })
            .collect();
        build_archive(&archive, &[("PMC1/a.bin", big.as_slice()), ("PMC1/b.jpg", &b"b"[..])]);

        let full = fs::read(&archive).unwrap();
        fs::write(&archive, &full[..full.len() / 2]).unwrap();

        let mut handle = TarGzReader::new().open(&archive).unwrap();
        let err = handle.extract("PMC1/b.jpg", temp.path()).unwrap_err();
        assert!(err.is_corrupt(), "got {err}");
    }

    #[test]
    fn test_unsafe_members_rejected() {
        for member in ["../escape.jpg", "/etc/passwd", "", "PMC1/../../x"] {
            let err = sanitize_member(member).unwrap_err();
            assert!(matches!(err, ExtractError::UnsafeMember { .. }), "{member}");
        }
        assert_eq!(
            sanitize_member("./PMC1/fig.jpg").unwrap(),
            PathBuf::from("PMC1/fig.jpg")
        );
    }
}
