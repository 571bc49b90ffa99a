//! Configuration printout and end-of-run summary.

use archfetch::config::FetchConfig;
use archfetch::manifest::ManifestReader;
use archfetch::{GroupStatus, RunSummary};
use console::style;

/// Print the resolved configuration.
pub fn print_config(config: &FetchConfig, reader: &ManifestReader) {
    println!("{}", style("Configuration:").bold());
    println!("  Repository directory:     {}", config.repository_dir.display());
    println!("  Subdirectory:             {}", config.subdir);
    println!("  Extraction directory:     {}", config.staging_dir.display());
    println!("  Keep archives:            {}", config.keep_archives);
    println!("  Delete extraction dir:    {}", config.confirm_cleanup);
    println!("  Number of workers:        {}", config.workers);
    println!("  Download attempts:        {}", config.max_retries);
    println!("  Downloader:               {}", config.downloader);
    println!("  Manifests:");
    for folder in &config.folders {
        match reader.count_entries(folder) {
            Ok(n) => println!("    {:<32} {} entries", folder, n),
            Err(_) => println!("    {:<32} {}", folder, style("missing").yellow()),
        }
    }
}

/// Print the end-of-run summary with failed and skipped groups.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", style("Summary:").bold());
    println!("  Archives:          {}", summary.total());
    println!("  Already present:   {}", summary.already_present().count());
    println!("  Files placed:      {}", summary.placed_count());
    println!("  Transfers:         {}", summary.transfer_count());

    if summary.skipped_count() > 0 {
        println!();
        println!(
            "{}",
            style(format!("Archives with skipped files ({}):", summary.skipped_count())).yellow()
        );
        for outcome in summary.with_skips() {
            for skip in &outcome.skipped {
                println!("  {} {}: {}", outcome.archive_id, skip.member, skip.reason);
            }
        }
    }

    if summary.failed_count() > 0 {
        println!();
        println!(
            "{}",
            style(format!("Failed archives ({}):", summary.failed_count())).red()
        );
        for outcome in summary.failed() {
            if let GroupStatus::Failed(ref reason) = outcome.status {
                println!("  {}: {}", outcome.archive_id, reason);
            }
        }
    } else {
        println!();
        println!("{}", style("All archives processed.").green());
    }
}
