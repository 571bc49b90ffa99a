//! Progress display for a running fetch.
//!
//! On a terminal, a bar tracks finished groups and each completion is
//! printed above it. Otherwise only the completion lines are printed.

use archfetch::pipeline::{ProgressCallback, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};

pub struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = console::Term::stderr().is_term().then(|| {
            let bar = ProgressBar::new(0);
            if let Ok(style) =
                ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {elapsed_precise}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        });
        Self { bar }
    }

    /// Callback to hand to the fetcher.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |event: &ProgressEvent| {
            let line = format_progress_line(event);
            match bar {
                Some(ref bar) => {
                    bar.set_length(event.total as u64);
                    bar.set_position(event.completed as u64);
                    bar.println(line);
                }
                None => println!("{}", line),
            }
        })
    }

    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

/// `<percent> | <n>/<total> | <archive id> (<status>)`
pub fn format_progress_line(event: &ProgressEvent) -> String {
    format!(
        "{:.3}% | {}/{} | {} ({})",
        event.percent(),
        event.completed,
        event.total,
        event.outcome.archive_id,
        event.outcome.status.label()
    )
}
