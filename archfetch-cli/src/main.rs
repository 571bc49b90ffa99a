//! archfetch CLI - Command-line interface
//!
//! Downloads the archives listed in `dlinks.txt` manifests and places the
//! requested members next to each manifest.

mod commands;
mod error;
mod output;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use archfetch::DownloaderKind;
use clap::{Parser, ValueEnum};

use commands::fetch::FetchArgs;

/// Transfer backend selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum DownloaderArg {
    /// External wget process (http, https, ftp)
    Wget,
    /// Built-in HTTP client (http, https)
    Http,
}

impl From<DownloaderArg> for DownloaderKind {
    fn from(arg: DownloaderArg) -> Self {
        match arg {
            DownloaderArg::Wget => DownloaderKind::Wget,
            DownloaderArg::Http => DownloaderKind::Http,
        }
    }
}

/// Download packages and extract images based on dlinks.txt files.
#[derive(Debug, Parser)]
#[command(name = "archfetch", version, about)]
struct Cli {
    /// Print configuration and exit
    #[arg(short = 'c', long)]
    print_config: bool,

    /// Name of image subdirectory, relative to dlinks.txt location
    #[arg(short = 's', long)]
    subdir: Option<String>,

    /// Directory where downloaded archives and extracted images are staged
    #[arg(short = 'e', long, value_name = "DIR")]
    extraction_dir: Option<PathBuf>,

    /// Confirm that all data in a non-empty extraction directory may be deleted
    #[arg(short = 'd', long)]
    delete_extraction_dir: bool,

    /// Keep downloaded archives after extraction
    #[arg(short = 'k', long)]
    keep_archives: bool,

    /// Number of parallel workers; reduce this if the remote host locks you out
    #[arg(short = 'n', long, value_name = "N")]
    num_processes: Option<usize>,

    /// Number of download attempts per archive before giving up
    #[arg(short = 'r', long, value_name = "N")]
    num_retries: Option<u32>,

    /// Repository root holding the manifest folders
    #[arg(long, value_name = "DIR")]
    repository_dir: Option<PathBuf>,

    /// Manifest folder relative to the repository root (repeatable)
    #[arg(long = "folder", value_name = "FOLDER")]
    folders: Vec<String>,

    /// Transfer backend
    #[arg(long, value_enum)]
    downloader: Option<DownloaderArg>,

    /// Base URL of the archive relocation service
    #[arg(long, value_name = "URL")]
    resolver_url: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Configuration file (default: <config dir>/archfetch/config.ini)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl From<Cli> for FetchArgs {
    fn from(cli: Cli) -> Self {
        FetchArgs {
            print_config: cli.print_config,
            subdir: cli.subdir,
            extraction_dir: cli.extraction_dir,
            delete_extraction_dir: cli.delete_extraction_dir,
            keep_archives: cli.keep_archives,
            num_processes: cli.num_processes,
            num_retries: cli.num_retries,
            repository_dir: cli.repository_dir,
            folders: cli.folders,
            downloader: cli.downloader.map(Into::into),
            resolver_url: cli.resolver_url,
            timeout: cli.timeout,
            config: cli.config,
            log_file: cli.log_file,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match commands::fetch::run(cli.into()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", console::style("Error:").red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}
