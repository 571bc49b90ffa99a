//! Manifest entries and the line layout rule.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Archive suffixes stripped when deriving an archive id.
const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz"];

/// Number of tab-separated columns in a manifest line.
const COLUMN_COUNT: usize = 3;

/// Why a single manifest line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected 3 tab-separated columns, found {found}")]
    WrongColumnCount { found: usize },

    #[error("missing entry id")]
    MissingId,

    #[error("missing archive location")]
    MissingLocation,

    #[error("cannot derive an archive id from '{0}'")]
    InvalidLocation(String),

    #[error("missing member name")]
    MissingMember,
}

/// One requested file: where its archive lives, its path inside the
/// archive, and where it must end up locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    id: String,
    archive_location: String,
    archive_id: String,
    member_name: String,
    target_path: PathBuf,
}

impl ManifestEntry {
    /// Create an entry, deriving the archive id from the location.
    pub fn new(
        id: impl Into<String>,
        archive_location: impl Into<String>,
        member_name: impl Into<String>,
        target_path: impl Into<PathBuf>,
    ) -> Result<Self, LineError> {
        let id = id.into();
        let archive_location = archive_location.into();
        let member_name = member_name.into();

        if id.is_empty() {
            return Err(LineError::MissingId);
        }
        if archive_location.is_empty() {
            return Err(LineError::MissingLocation);
        }
        if member_name.is_empty() {
            return Err(LineError::MissingMember);
        }
        let archive_id = archive_id_from_location(&archive_location)
            .ok_or_else(|| LineError::InvalidLocation(archive_location.clone()))?;

        Ok(Self {
            id,
            archive_location,
            archive_id,
            member_name,
            target_path: target_path.into(),
        })
    }

    /// Manifest identifier of this entry (first column).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Location of the archive as listed in the manifest.
    pub fn archive_location(&self) -> &str {
        &self.archive_location
    }

    /// Stable archive identifier derived from the manifest location.
    pub fn archive_id(&self) -> &str {
        &self.archive_id
    }

    /// Path of the wanted file inside the archive.
    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    /// Final destination of the file.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Whether the target file already exists.
    pub fn is_placed(&self) -> bool {
        self.target_path.is_file()
    }
}

/// Last path segment of an archive location.
pub fn archive_basename(location: &str) -> &str {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(location)
}

/// Derive the archive id from a location.
///
/// `ftp://host/pub/PMC176545.tar.gz` becomes `PMC176545`. Returns `None`
/// when the location has no usable basename.
pub fn archive_id_from_location(location: &str) -> Option<String> {
    let basename = archive_basename(location);
    let id = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| basename.strip_suffix(suffix))
        .unwrap_or_else(|| basename.split('.').next().unwrap_or(basename));

    if id.is_empty() || id.contains(':') {
        None
    } else {
        Some(id.to_string())
    }
}

/// Parse one manifest line.
///
/// Layout: `<id>\t<command>\t<image>` where the last whitespace-separated
/// token of `<command>` is the archive location (`wget <url>` or `<url>`).
/// The member is `<archive id>/<image>` and the target is
/// `<image_dir>/<archive id>_<image>`.
pub fn parse_line(line: &str, image_dir: &Path) -> Result<ManifestEntry, LineError> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() != COLUMN_COUNT {
        return Err(LineError::WrongColumnCount {
            found: columns.len(),
        });
    }

    let id = columns[0].trim();
    let location = columns[1]
        .split_whitespace()
        .last()
        .ok_or(LineError::MissingLocation)?;
    let image = columns[2].trim();
    if image.is_empty() {
        return Err(LineError::MissingMember);
    }

    let archive_id = archive_id_from_location(location)
        .ok_or_else(|| LineError::InvalidLocation(location.to_string()))?;
    let member_name = format!("{}/{}", archive_id, image);
    let target = image_dir.join(format!("{}_{}", archive_id, image));

    ManifestEntry::new(id, location, member_name, target)
}
