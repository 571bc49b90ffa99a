//! archfetch - Download archives once, extract only the members you need
//!
//! This library implements the download-extract-reconciliation engine behind
//! the `archfetch` command. Given `dlinks.txt` manifests listing remote
//! archives and the files wanted from each, it:
//!
//! - groups manifest entries by source archive (`manifest`)
//! - prepares and tears down the shared staging directory (`staging`)
//! - acquires each archive with bounded retries and resolver fallback
//!   (`pipeline`)
//! - extracts and places members idempotently (`pipeline`)
//! - runs groups on a bounded worker pool and reports progress (`pipeline`)
//!
//! The transfer tool, archive format, and relocation lookup sit behind the
//! traits in [`traits`], with production implementations in [`fetch`],
//! [`archive`], and [`resolver`].

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod resolver;
pub mod staging;
pub mod traits;

pub use config::{DownloaderKind, FetchConfig};
pub use error::{FetchError, FetchResult};
pub use pipeline::{Fetcher, GroupOutcome, GroupStatus, RunSummary};

/// Version of the archfetch library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
