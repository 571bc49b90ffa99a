//! Collaborator interfaces used by the pipeline.
//!
//! These traits enable dependency injection: the pipeline only sees the
//! contracts, so tests can drive it with in-memory stubs while production
//! uses [`WgetDownloader`](crate::fetch::WgetDownloader),
//! [`TarGzReader`](crate::archive::TarGzReader) and
//! [`OaResolver`](crate::resolver::OaResolver).

use std::path::{Path, PathBuf};

use crate::archive::ExtractResult;
use crate::fetch::DownloadResult;
use crate::resolver::ResolveResult;

/// Fetches a remote archive into a local directory.
pub trait Downloader: Send + Sync {
    /// Fetch `url` into `dest_dir`, keeping the remote basename as file name.
    ///
    /// Must continue a partial file rather than restart it, and must not
    /// overwrite a complete one.
    fn fetch(&self, url: &str, dest_dir: &Path) -> DownloadResult<()>;
}

impl<T: Downloader + ?Sized> Downloader for Box<T> {
    fn fetch(&self, url: &str, dest_dir: &Path) -> DownloadResult<()> {
        (**self).fetch(url, dest_dir)
    }
}

/// Opens local archive files.
pub trait ArchiveReader: Send + Sync {
    /// Handle to an opened archive.
    type Handle: ArchiveHandle;

    /// Open an archive, failing with
    /// [`ExtractError::Corrupt`](crate::archive::ExtractError::Corrupt) when
    /// it is unreadable.
    fn open(&self, path: &Path) -> ExtractResult<Self::Handle>;
}

/// An opened archive.
pub trait ArchiveHandle {
    /// Extract one member below `dest_dir`, returning the written path.
    ///
    /// Fails with
    /// [`ExtractError::MemberAbsent`](crate::archive::ExtractError::MemberAbsent)
    /// when the archive has no such member.
    fn extract(&mut self, member: &str, dest_dir: &Path) -> ExtractResult<PathBuf>;
}

/// Answer of a relocation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The archive moved; fetch from this location instead.
    NewLocation(String),
    /// The archive still lives where it was; the failure was transient.
    Unchanged,
    /// The archive is gone for good (withdrawn or unknown id).
    PermanentlyUnavailable(String),
}

/// Looks up the current location of an archive.
pub trait ResolverService: Send + Sync {
    /// Resolve `archive_id`, given the location that just failed.
    fn resolve(&self, archive_id: &str, current_location: &str) -> ResolveResult<Resolution>;
}

impl<T: ResolverService + ?Sized> ResolverService for Box<T> {
    fn resolve(&self, archive_id: &str, current_location: &str) -> ResolveResult<Resolution> {
        (**self).resolve(archive_id, current_location)
    }
}
