//! Reading `dlinks.txt` manifests from repository folders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::entry::{parse_line, ManifestEntry};
use super::{ManifestError, ManifestResult};

/// File name of a manifest inside each folder.
pub const MANIFEST_FILENAME: &str = "dlinks.txt";

/// Manifest folders of the ROCO dataset layout.
pub const DEFAULT_FOLDERS: &[&str] = &[
    "data/test/radiology",
    "data/test/non-radiology",
    "data/train/radiology",
    "data/train/non-radiology",
    "data/validation/radiology",
    "data/validation/non-radiology",
];

/// Reads manifests below a repository root.
#[derive(Debug, Clone)]
pub struct ManifestReader {
    repository_dir: PathBuf,
    subdir: String,
}

impl ManifestReader {
    /// Create a reader for the given repository root and image subdirectory.
    pub fn new(repository_dir: impl Into<PathBuf>, subdir: impl Into<String>) -> Self {
        Self {
            repository_dir: repository_dir.into(),
            subdir: subdir.into(),
        }
    }

    /// Path of a folder's manifest.
    pub fn manifest_path(&self, folder: &str) -> PathBuf {
        self.repository_dir.join(folder).join(MANIFEST_FILENAME)
    }

    /// Directory placed files of a folder go to.
    pub fn image_dir(&self, folder: &str) -> PathBuf {
        self.repository_dir.join(folder).join(&self.subdir)
    }

    /// Read and parse one folder's manifest.
    ///
    /// Creates the folder's image directory if it does not exist yet.
    pub fn read_folder(&self, folder: &str) -> ManifestResult<Vec<ManifestEntry>> {
        let entries = self.parse_folder(folder)?;
        self.ensure_image_dir(folder)?;
        Ok(entries)
    }

    /// Read every folder's manifest, concatenated in folder order.
    ///
    /// All manifests are parsed before any image directory is created, so a
    /// malformed manifest leaves the repository untouched.
    pub fn read_all<S: AsRef<str>>(&self, folders: &[S]) -> ManifestResult<Vec<ManifestEntry>> {
        let mut entries = Vec::new();
        for folder in folders {
            let folder_entries = self.parse_folder(folder.as_ref())?;
            tracing::debug!(
                folder = folder.as_ref(),
                entries = folder_entries.len(),
                "Read manifest"
            );
            entries.extend(folder_entries);
        }

        for folder in folders {
            self.ensure_image_dir(folder.as_ref())?;
        }
        Ok(entries)
    }

    /// Number of lines in a folder's manifest.
    pub fn count_entries(&self, folder: &str) -> ManifestResult<usize> {
        let path = self.manifest_path(folder);
        Ok(read_manifest(&path)?.lines().count())
    }

    fn parse_folder(&self, folder: &str) -> ManifestResult<Vec<ManifestEntry>> {
        let path = self.manifest_path(folder);
        let content = read_manifest(&path)?;
        parse_manifest(&content, &path, &self.image_dir(folder))
    }

    fn ensure_image_dir(&self, folder: &str) -> ManifestResult<()> {
        let image_dir = self.image_dir(folder);
        if image_dir.exists() {
            return Ok(());
        }
        fs::create_dir_all(&image_dir).map_err(|e| ManifestError::CreateDirFailed {
            path: image_dir.clone(),
            source: e,
        })
    }
}

fn read_manifest(path: &Path) -> ManifestResult<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ManifestError::MissingManifest {
            path: path.to_path_buf(),
        },
        _ => ManifestError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Parse manifest text, placing targets under `image_dir`.
///
/// Blank lines are skipped. The first malformed line aborts parsing with
/// its 1-based line number.
pub fn parse_manifest(
    content: &str,
    source: &Path,
    image_dir: &Path,
) -> ManifestResult<Vec<ManifestEntry>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            parse_line(line, image_dir).map_err(|e| ManifestError::MalformedLine {
                path: source.to_path_buf(),
                line: index + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}
