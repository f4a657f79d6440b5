// UI layer: renders upload progress with `indicatif`.
// One bar per file, driven by the transport's progress hook. Rendering is a
// side effect only and never influences the transfer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::transport::{ProgressHook, UploadProgress};

/// Minimum time between two progress callbacks for one file.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(10);

const BAR_TEMPLATE: &str = "{msg:30} [{bar:30.cyan/blue}] {pos:>3}%";

/// Per-file progress bars, keyed by the part index reported by the
/// transport. Files sharing a base name still get their own bar.
#[derive(Clone)]
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<usize, ProgressBar>>>,
}

impl ProgressReporter {
    /// Draw to stderr.
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The hook handed to the transport.
    pub fn hook(&self) -> ProgressHook {
        let reporter = self.clone();
        ProgressHook::new(PROGRESS_INTERVAL, move |progress: &UploadProgress| {
            reporter.update(progress)
        })
    }

    pub fn update(&self, progress: &UploadProgress) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let bar = bars
            .entry(progress.index)
            .or_insert_with(|| self.add_bar(&progress.file_name));
        bar.set_position(progress.percent().floor() as u64);
    }

    /// Leave finished bars on screen.
    pub fn finish(&self) {
        if let Ok(bars) = self.bars.lock() {
            for bar in bars.values() {
                bar.finish();
            }
        }
    }

    #[cfg(test)]
    fn percent_of(&self, index: usize) -> Option<u64> {
        let bars = self.bars.lock().ok()?;
        bars.get(&index).map(|bar| bar.position())
    }

    #[cfg(test)]
    fn bar_count(&self) -> usize {
        self.bars.lock().map(|bars| bars.len()).unwrap_or(0)
    }

    fn add_bar(&self, file_name: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(100));
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(file_name.to_string());
        bar
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
