//! Fetch command - download archives and place the listed members.

use std::path::PathBuf;
use std::time::Duration;

use archfetch::config::{ConfigFile, FetchConfig};
use archfetch::logging::{init_logging, DEFAULT_LOG_FILTER};
use archfetch::staging::StagingArea;
use archfetch::{DownloaderKind, Fetcher};

use crate::error::{CliError, EXIT_INTERRUPTED};
use crate::output;
use crate::progress::ProgressReporter;

/// Arguments for the fetch command.
#[derive(Debug, Default)]
pub struct FetchArgs {
    pub print_config: bool,
    pub subdir: Option<String>,
    pub extraction_dir: Option<PathBuf>,
    pub delete_extraction_dir: bool,
    pub keep_archives: bool,
    pub num_processes: Option<usize>,
    pub num_retries: Option<u32>,
    pub repository_dir: Option<PathBuf>,
    pub folders: Vec<String>,
    pub downloader: Option<DownloaderKind>,
    pub resolver_url: Option<String>,
    pub timeout: Option<u64>,
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

/// Run the fetch command.
pub fn run(args: FetchArgs) -> Result<(), CliError> {
    let config = resolve_config(&args)?;
    let fetcher = Fetcher::new(config);

    output::print_config(fetcher.config(), &fetcher.manifest_reader());
    if args.print_config {
        return Ok(());
    }

    let _log_guard =
        init_logging(args.log_file.as_deref(), DEFAULT_LOG_FILTER).map_err(CliError::Logging)?;
    tracing::info!(version = archfetch::VERSION, "archfetch starting");

    install_interrupt_handler(fetcher.staging(), fetcher.config().keep_archives)?;

    println!();
    println!("Fetching archive members...");

    let progress = ProgressReporter::new();
    let callback = progress.callback();
    let summary = fetcher.run(Some(&callback))?;
    progress.finish();

    output::print_summary(&summary);
    Ok(())
}

/// Build the configuration: defaults, then config file, then flags.
pub fn resolve_config(args: &FetchArgs) -> Result<FetchConfig, CliError> {
    let file = match args.config {
        Some(ref path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load_default()?,
    };

    let mut config = FetchConfig::default();
    file.apply_to(&mut config);
    apply_flags(args, &mut config)?;
    Ok(config)
}

fn apply_flags(args: &FetchArgs, config: &mut FetchConfig) -> Result<(), CliError> {
    if let Some(ref dir) = args.repository_dir {
        config.repository_dir = dir.clone();
    }
    if !args.folders.is_empty() {
        config.folders = args.folders.clone();
    }
    if let Some(ref subdir) = args.subdir {
        config.subdir = subdir.clone();
    }
    if let Some(ref dir) = args.extraction_dir {
        config.staging_dir = dir.clone();
    }
    if args.keep_archives {
        config.keep_archives = true;
    }
    if args.delete_extraction_dir {
        config.confirm_cleanup = true;
    }
    if let Some(n) = args.num_processes {
        if n == 0 {
            return Err(CliError::Config(
                "--num-processes must be at least 1".to_string(),
            ));
        }
        config.workers = n;
    }
    if let Some(r) = args.num_retries {
        if r == 0 {
            return Err(CliError::Config("--num-retries must be at least 1".to_string()));
        }
        config.max_retries = r;
    }
    if let Some(kind) = args.downloader {
        config.downloader = kind;
    }
    if let Some(ref url) = args.resolver_url {
        config.resolver_url = url.clone();
    }
    if let Some(secs) = args.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(())
}

/// Tear down the staging directory on Ctrl+C unless archives are kept.
fn install_interrupt_handler(staging: StagingArea, keep_archives: bool) -> Result<(), CliError> {
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Interrupted, cleaning up...");
        if !keep_archives {
            if let Err(e) = staging.teardown() {
                eprintln!("Could not remove {}: {}", staging.root().display(), e);
            }
        }
        std::process::exit(EXIT_INTERRUPTED);
    })
    .map_err(CliError::Signal)
}
