//! Transfers through an external `wget` process.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{DownloadError, DownloadResult};
use crate::traits::Downloader;

/// Default transfer tool.
const WGET: &str = "wget";

/// Downloader that shells out to `wget`.
///
/// Runs `wget -nc -nd -c -q -P <dest> <url>`: no-clobber, flat layout,
/// continue partial files, quiet. Supports http, https and ftp.
#[derive(Debug, Clone)]
pub struct WgetDownloader {
    program: PathBuf,
}

impl Default for WgetDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl WgetDownloader {
    /// Create a downloader using `wget` from `PATH`.
    pub fn new() -> Self {
        Self::with_program(WGET)
    }

    /// Create a downloader using a specific executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Executable this downloader runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check that the tool is installed and runs.
    pub fn check_available(&self) -> DownloadResult<()> {
        let tool = self.program.display().to_string();
        match Command::new(&self.program).arg("--version").output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(DownloadError::ToolMissing {
                tool,
                reason: format!("'--version' exited with {}", output.status),
            }),
            Err(e) => Err(DownloadError::ToolMissing {
                tool,
                reason: format!("{}. Please install it using your package manager", e),
            }),
        }
    }

    fn command(&self, url: &str, dest_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-nc", "-nd", "-c", "-q", "-P"])
            .arg(dest_dir)
            .arg(url);
        command
    }
}

impl Downloader for WgetDownloader {
    fn fetch(&self, url: &str, dest_dir: &Path) -> DownloadResult<()> {
        let tool = self.program.display().to_string();
        let status = self
            .command(url, dest_dir)
            .status()
            .map_err(|e| DownloadError::Transfer {
                url: url.to_string(),
                reason: format!("failed to run {}: {}", tool, e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DownloadError::ExitStatus {
                tool,
                url: url.to_string(),
                code: status.code(),
            })
        }
    }
}
