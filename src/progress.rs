//! Progress reporting utilities using indicatif.
//!
//! The engine reports through the [`ProgressCallback`] trait; [`Progress`] is
//! the terminal implementation, showing one spinner per walked tree with a
//! running count of linked files and reclaimed bytes.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::dedup::FileOutcome;

/// Progress callback for the index and dedup phases.
///
/// All methods except the phase boundaries have no-op defaults.
pub trait ProgressCallback: Send + Sync {
    /// Called when a tree walk starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - `"index"` for reference trees, `"dedup"` for the target
    /// * `root` - Root of the walked tree
    fn on_phase_start(&self, phase: &str, root: &Path);

    /// Called once a file has been decided on.
    fn on_outcome(&self, _path: &Path, _outcome: &FileOutcome) {}

    /// Called when a file could not be processed.
    fn on_failure(&self, _path: &Path, _message: &str) {}

    /// Called when a tree walk completes.
    fn on_phase_end(&self, phase: &str);
}

#[derive(Debug, Default)]
struct Tally {
    files: u64,
    linked: u64,
    failed: u64,
    bytes: u64,
}

/// Spinner-based progress reporter.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    tally: Mutex<Tally>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkdupe::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            tally: Mutex::new(Tally::default()),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {prefix} {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tally(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self) {
        let message = {
            let tally = self.tally();
            format_tally(&tally)
        };
        if let Some(pb) = self.bar().as_ref() {
            pb.set_position(self.tally().files);
            pb.set_message(message);
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, root: &Path) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::style());
        pb.set_prefix(format!("{} {}", phase, truncate_path(&root.to_string_lossy(), 30)));
        pb.enable_steady_tick(Duration::from_millis(100));
        *self.tally() = Tally::default();
        *self.bar() = Some(pb);
    }

    fn on_outcome(&self, _path: &Path, outcome: &FileOutcome) {
        if self.quiet {
            return;
        }

        {
            let mut tally = self.tally();
            tally.files += 1;
            match outcome {
                FileOutcome::Linked { bytes, .. } | FileOutcome::WouldLink { bytes, .. } => {
                    tally.linked += 1;
                    tally.bytes += bytes;
                }
                _ => {}
            }
        }
        self.refresh();
    }

    fn on_failure(&self, _path: &Path, _message: &str) {
        if self.quiet {
            return;
        }

        {
            let mut tally = self.tally();
            tally.files += 1;
            tally.failed += 1;
        }
        self.refresh();
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.bar().take() {
            pb.finish_with_message(format!("{} complete", phase));
        }
    }
}

fn format_tally(tally: &Tally) -> String {
    let mut message = format!("({} linked, {})", tally.linked, ByteSize::b(tally.bytes));
    if tally.failed > 0 {
        message.push_str(&format!(" {} failed", tally.failed));
    }
    message
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let chars = file_name.chars().count();
    if chars >= max_len {
        let tail: String = file_name.chars().skip(chars + 3 - max_len).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
