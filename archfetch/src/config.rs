//! Configuration for a fetch run.
//!
//! [`FetchConfig`] is the read-only configuration handed to every worker.
//! It is built from defaults, then an optional INI file ([`ConfigFile`]),
//! then command-line overrides, in that order of increasing precedence.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::manifest::DEFAULT_FOLDERS;
use crate::pipeline::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_SECS,
};
use crate::resolver::DEFAULT_SERVICE_URL;

/// Default name of the image subdirectory, relative to each manifest folder.
pub const DEFAULT_SUBDIR: &str = "images";

/// Default name of the staging directory inside the system temp dir.
pub const DEFAULT_STAGING_DIR_NAME: &str = "roco-dataset";

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Section of the INI file holding fetch settings.
const FETCH_SECTION: &str = "fetch";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[error("failed to load config file {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// A configuration value is not valid for its key.
    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Which transfer backend fetches archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloaderKind {
    /// External `wget` process (http, https, ftp).
    #[default]
    Wget,
    /// Built-in HTTP client (http, https).
    Http,
}

impl FromStr for DownloaderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wget" => Ok(Self::Wget),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown downloader '{}', expected wget or http", other)),
        }
    }
}

impl fmt::Display for DownloaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wget => write!(f, "wget"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for a fetch run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Repository root; manifest folders are relative to it.
    pub repository_dir: PathBuf,

    /// Folders (relative to the repository root) that hold a `dlinks.txt`.
    pub folders: Vec<String>,

    /// Image subdirectory name, relative to each manifest folder.
    pub subdir: String,

    /// Shared directory for downloaded archives and extracted members.
    pub staging_dir: PathBuf,

    /// Keep downloaded archives after extraction.
    pub keep_archives: bool,

    /// Allow deleting the contents of a non-empty staging directory.
    pub confirm_cleanup: bool,

    /// Number of parallel workers.
    pub workers: usize,

    /// Maximum transfer attempts per archive group.
    pub max_retries: u32,

    /// Delay after the first failed transfer; doubles on each further failure.
    pub retry_base_delay: Duration,

    /// Upper bound for the retry delay.
    pub retry_max_delay: Duration,

    /// Base URL of the relocation lookup service; the archive id is appended.
    pub resolver_url: String,

    /// Transfer backend.
    pub downloader: DownloaderKind,

    /// HTTP timeout for the built-in client and the resolver.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            repository_dir: PathBuf::from("."),
            folders: DEFAULT_FOLDERS.iter().map(|f| f.to_string()).collect(),
            subdir: DEFAULT_SUBDIR.to_string(),
            staging_dir: std::env::temp_dir().join(DEFAULT_STAGING_DIR_NAME),
            keep_archives: false,
            confirm_cleanup: false,
            workers: default_workers(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_secs(DEFAULT_RETRY_MAX_DELAY_SECS),
            resolver_url: DEFAULT_SERVICE_URL.to_string(),
            downloader: DownloaderKind::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FetchConfig {
    /// Create a new configuration rooted at the given repository directory.
    pub fn new(repository_dir: impl Into<PathBuf>) -> Self {
        Self {
            repository_dir: repository_dir.into(),
            ..Default::default()
        }
    }

    /// Set the manifest folders.
    pub fn with_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folders = folders.into_iter().map(Into::into).collect();
        self
    }

    /// Set the image subdirectory name.
    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_dir = path.into();
        self
    }

    /// Enable or disable keeping downloaded archives.
    pub fn with_keep_archives(mut self, keep: bool) -> Self {
        self.keep_archives = keep;
        self
    }

    /// Confirm (or not) that a non-empty staging directory may be emptied.
    pub fn with_confirm_cleanup(mut self, confirm: bool) -> Self {
        self.confirm_cleanup = confirm;
        self
    }

    /// Set the worker count (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the per-group transfer attempt limit (minimum 1).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the retry backoff delays.
    pub fn with_retry_delay(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    /// Set the resolver base URL.
    pub fn with_resolver_url(mut self, url: impl Into<String>) -> Self {
        self.resolver_url = url.into();
        self
    }

    /// Set the transfer backend.
    pub fn with_downloader(mut self, kind: DownloaderKind) -> Self {
        self.downloader = kind;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Number of workers used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Settings read from the `[fetch]` section of `config.ini`.
///
/// Every field is optional; absent keys leave the current value untouched
/// when applied with [`ConfigFile::apply_to`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub repository_dir: Option<PathBuf>,
    pub folders: Option<Vec<String>>,
    pub subdir: Option<String>,
    pub staging_dir: Option<PathBuf>,
    pub keep_archives: Option<bool>,
    pub confirm_cleanup: Option<bool>,
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_secs: Option<u64>,
    pub resolver_url: Option<String>,
    pub downloader: Option<DownloaderKind>,
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Default location: `<config dir>/archfetch/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("archfetch").join("config.ini"))
    }

    /// Load from the default location, returning an empty config if absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Load {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let Some(section) = ini.section(Some(FETCH_SECTION)) else {
            return Ok(Self::default());
        };

        let text = |key: &str| {
            section
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            repository_dir: text("repository_dir").map(PathBuf::from),
            folders: text("folders").map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            subdir: text("subdir"),
            staging_dir: text("staging_dir").map(PathBuf::from),
            keep_archives: parse_value("keep_archives", text("keep_archives"), parse_bool)?,
            confirm_cleanup: parse_value("confirm_cleanup", text("confirm_cleanup"), parse_bool)?,
            workers: parse_value("workers", text("workers"), |v| {
                v.parse::<usize>().map_err(|e| e.to_string())
            })?,
            max_retries: parse_value("max_retries", text("max_retries"), |v| {
                v.parse::<u32>().map_err(|e| e.to_string())
            })?,
            retry_base_delay_ms: parse_value(
                "retry_base_delay_ms",
                text("retry_base_delay_ms"),
                |v| v.parse::<u64>().map_err(|e| e.to_string()),
            )?,
            retry_max_delay_secs: parse_value(
                "retry_max_delay_secs",
                text("retry_max_delay_secs"),
                |v| v.parse::<u64>().map_err(|e| e.to_string()),
            )?,
            resolver_url: text("resolver_url"),
            downloader: parse_value("downloader", text("downloader"), |v| v.parse())?,
            timeout_secs: parse_value("timeout_secs", text("timeout_secs"), |v| {
                v.parse::<u64>().map_err(|e| e.to_string())
            })?,
        })
    }

    /// Overlay the values present in this file onto `config`.
    pub fn apply_to(&self, config: &mut FetchConfig) {
        if let Some(ref dir) = self.repository_dir {
            config.repository_dir = dir.clone();
        }
        if let Some(ref folders) = self.folders {
            config.folders = folders.clone();
        }
        if let Some(ref subdir) = self.subdir {
            config.subdir = subdir.clone();
        }
        if let Some(ref dir) = self.staging_dir {
            config.staging_dir = dir.clone();
        }
        if let Some(keep) = self.keep_archives {
            config.keep_archives = keep;
        }
        if let Some(confirm) = self.confirm_cleanup {
            config.confirm_cleanup = confirm;
        }
        if let Some(workers) = self.workers {
            config.workers = workers.max(1);
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries.max(1);
        }
        if let Some(ms) = self.retry_base_delay_ms {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = self.retry_max_delay_secs {
            config.retry_max_delay = Duration::from_secs(secs);
        }
        if let Some(ref url) = self.resolver_url {
            config.resolver_url = url.clone();
        }
        if let Some(kind) = self.downloader {
            config.downloader = kind;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
    }
}

fn parse_value<T>(
    key: &str,
    value: Option<String>,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            parse(&v).map_err(|reason| ConfigError::InvalidValue {
                key: key.to_string(),
                value: v.clone(),
                reason,
            })
        })
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.subdir, "images");
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.folders.len(), 6);
        assert!(!config.keep_archives);
        assert!(!config.confirm_cleanup);
        assert!(config.workers >= 1);
        assert!(config.staging_dir.ends_with("roco-dataset"));
        assert_eq!(config.downloader, DownloaderKind::Wget);
    }

    #[test]
    fn test_builder_pattern() {
        let config = FetchConfig::new("/data/roco")
            .with_folders(["data/test/radiology"])
            .with_subdir("pics")
            .with_staging_dir("/scratch")
            .with_keep_archives(true)
            .with_workers(0)
            .with_max_retries(0)
            .with_downloader(DownloaderKind::Http);

        assert_eq!(config.repository_dir, PathBuf::from("/data/roco"));
        assert_eq!(config.folders, vec!["data/test/radiology".to_string()]);
        assert_eq!(config.subdir, "pics");
        assert_eq!(config.staging_dir, PathBuf::from("/scratch"));
        assert!(config.keep_archives);
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.downloader, DownloaderKind::Http);
    }

    #[test]
    fn test_downloader_kind_from_str() {
        assert_eq!("wget".parse::<DownloaderKind>(), Ok(DownloaderKind::Wget));
        assert_eq!(" HTTP ".parse::<DownloaderKind>(), Ok(DownloaderKind::Http));
        assert!("curl".parse::<DownloaderKind>().is_err());
    }

    #[test]
    fn test_config_file_parse_and_apply() {
        let file = ConfigFile::parse(
            "[fetch]\n\
             subdir = figures\n\
             keep_archives = yes\n\
             confirm_cleanup = on\n\
             workers = 3\n\
             max_retries = 5\n\
             folders = a/b, c/d\n\
             downloader = http\n",
        )
        .unwrap();

        let mut config = FetchConfig::default();
        file.apply_to(&mut config);

        assert_eq!(config.subdir, "figures");
        assert!(config.keep_archives);
        assert!(config.confirm_cleanup);
        assert_eq!(config.workers, 3);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.folders, vec!["a/b".to_string(), "c/d".to_string()]);
        assert_eq!(config.downloader, DownloaderKind::Http);
    }

    #[test]
    fn test_config_file_without_section_is_empty() {
        let file = ConfigFile::parse("[other]\nkey = value\n").unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn test_config_file_invalid_number() {
        let err = ConfigFile::parse("[fetch]\nworkers = many\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "workers"));
    }

    #[test]
    fn test_config_file_invalid_bool() {
        let err = ConfigFile::parse("[fetch]\nkeep_archives = maybe\n").unwrap_err();
        assert!(err.to_string().contains("keep_archives"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigFile::load_from(Path::new("/nonexistent/archfetch.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }
}
