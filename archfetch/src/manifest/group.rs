//! Grouping manifest entries by source archive.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::entry::{archive_basename, ManifestEntry};

/// All manifest entries whose members live in the same archive.
///
/// The archive id always reflects the manifest's original location, even
/// after [`relocate`](Self::relocate) rewrites where the archive is fetched
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveGroup {
    archive_id: String,
    original_location: String,
    archive_location: String,
    entries: Vec<ManifestEntry>,
}

impl ArchiveGroup {
    /// Start a group from its first entry.
    pub fn new(first: ManifestEntry) -> Self {
        Self {
            archive_id: first.archive_id().to_string(),
            original_location: first.archive_location().to_string(),
            archive_location: first.archive_location().to_string(),
            entries: vec![first],
        }
    }

    /// Add an entry belonging to the same archive.
    ///
    /// Returns the entry back if its archive id differs from the group's.
    pub fn push(&mut self, entry: ManifestEntry) -> Result<(), ManifestEntry> {
        if entry.archive_id() != self.archive_id {
            return Err(entry);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Stable identifier of the archive.
    pub fn archive_id(&self) -> &str {
        &self.archive_id
    }

    /// Current location the archive is fetched from.
    pub fn archive_location(&self) -> &str {
        &self.archive_location
    }

    /// Location listed in the manifest.
    pub fn original_location(&self) -> &str {
        &self.original_location
    }

    /// Whether the location was rewritten after a relocation lookup.
    pub fn is_relocated(&self) -> bool {
        self.archive_location != self.original_location
    }

    /// Point the group at a new archive location.
    pub fn relocate(&mut self, location: impl Into<String>) {
        self.archive_location = location.into();
    }

    /// Member entries in manifest order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Number of member entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group has no entries (never true for grouped manifests).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Where the archive lands in the staging directory.
    pub fn local_archive_path(&self, staging_root: &Path) -> PathBuf {
        staging_root.join(archive_basename(&self.archive_location))
    }

    /// Whether every target file of this group already exists.
    pub fn is_satisfied(&self) -> bool {
        self.entries.iter().all(ManifestEntry::is_placed)
    }
}

/// Group entries by archive id.
///
/// Every entry ends up in exactly one group. The first location seen for an
/// archive id becomes the group's location.
pub fn group_entries<I>(entries: I) -> BTreeMap<String, ArchiveGroup>
where
    I: IntoIterator<Item = ManifestEntry>,
{
    let mut groups: BTreeMap<String, ArchiveGroup> = BTreeMap::new();

    for entry in entries {
        match groups.get_mut(entry.archive_id()) {
            Some(group) => {
                if entry.archive_location() != group.original_location() {
                    tracing::debug!(
                        archive_id = %group.archive_id(),
                        location = %entry.archive_location(),
                        "Entry lists a different location for a known archive"
                    );
                }
                // Keys are archive ids, so the push cannot be rejected.
                let _ = group.push(entry);
            }
            None => {
                let id = entry.archive_id().to_string();
                groups.insert(id, ArchiveGroup::new(entry));
            }
        }
    }

    groups
}
