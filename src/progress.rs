//! Progress reporting and display
//!
//! The upload pipeline reports through [`ProgressReporter`] so it stays
//! decoupled from how (or whether) progress is drawn.

use std::sync::Arc;

/// Status of a single file in an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Write in flight
    Uploading,
    /// Written and resolved
    Done,
    /// Failed with error
    Failed(String),
}

/// Phase of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    /// Reading selected files and building previews
    Previewing,
    /// Writing blobs to the object store
    Uploading,
    /// Appending records to the local index
    Indexing,
    /// Removing blobs left behind by a failed batch
    RollingBack,
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed(String),
}

pub trait ProgressReporter: Send + Sync {
    fn set_phase(&self, phase: UploadPhase);

    /// Register the files of a batch (call before writes start).
    fn register_files(&self, files: Vec<String>);

    fn update_file(&self, file: &str, status: FileStatus);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: UploadPhase) {}
    fn register_files(&self, _files: Vec<String>) {}
    fn update_file(&self, _file: &str, _status: FileStatus) {}
    fn finish(&self) {}
}

/// Statistics collected during a batch.
#[derive(Debug, Default)]
struct Stats {
    total_files: usize,
    uploaded: usize,
    failed: usize,
    start_time: Option<std::time::Instant>,
}

impl Stats {
    fn started() -> Self {
        Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        }
    }

    fn print_summary(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();

        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   🖼️  Files:      {} total", self.total_files);
        eprintln!("   ✅ Uploaded:   {}", self.uploaded);
        if self.failed > 0 {
            eprintln!("   ❌ Failed:     {}", self.failed);
        }
        eprintln!("   ⏱️  Duration:   {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    fn record(&mut self, status: &FileStatus) {
        match status {
            FileStatus::Done => self.uploaded += 1,
            FileStatus::Failed(_) => self.failed += 1,
            _ => {}
        }
    }
}

fn phase_message(phase: &UploadPhase) -> String {
    match phase {
        UploadPhase::Previewing => "🔍 Reading selected files...".into(),
        UploadPhase::Uploading => "☁️  Uploading to storage...".into(),
        UploadPhase::Indexing => "🗂️  Updating image index...".into(),
        UploadPhase::RollingBack => "🧹 Removing partial uploads...".into(),
        UploadPhase::Completed => "✅ Completed!".into(),
        UploadPhase::Failed(e) => format!("❌ Failed: {e}"),
    }
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: std::sync::Mutex<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: std::sync::Mutex::new(Stats::started()),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: UploadPhase) {
        eprintln!("{}", phase_message(&phase));
    }

    fn register_files(&self, files: Vec<String>) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.total_files = files.len();
        }
        eprintln!("   {} files selected", files.len());
    }

    fn update_file(&self, file: &str, status: FileStatus) {
        match &status {
            FileStatus::Done => eprintln!("   ✓ {file}"),
            FileStatus::Failed(e) => eprintln!("   ✗ {file}: {e}"),
            _ => {}
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.record(&status);
        }
    }

    fn finish(&self) {
        if let Ok(stats) = self.stats.lock() {
            stats.print_summary();
        }
    }
}

/// Interactive reporter with a progress bar (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    files_bar: std::sync::Mutex<Option<indicatif::ProgressBar>>,
    stats: std::sync::Mutex<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        if let Ok(style) = indicatif::ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")
        {
            phase_bar.set_style(style);
        }
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            phase_bar,
            files_bar: std::sync::Mutex::new(None),
            stats: std::sync::Mutex::new(Stats::started()),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: UploadPhase) {
        let msg = phase_message(&phase);
        if matches!(phase, UploadPhase::Completed | UploadPhase::Failed(_)) {
            self.phase_bar.finish_with_message(msg);
        } else {
            self.phase_bar.set_message(msg);
        }
    }

    fn register_files(&self, files: Vec<String>) {
        let total = files.len();
        if let Ok(mut stats) = self.stats.lock() {
            stats.total_files = total;
        }

        let bar = self.multi.add(indicatif::ProgressBar::new(total as u64));
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("   {bar:40.cyan/blue} {pos}/{len} files {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        if let Ok(mut slot) = self.files_bar.lock() {
            *slot = Some(bar);
        }
    }

    fn update_file(&self, file: &str, status: FileStatus) {
        if let Some(bar) = self.files_bar.lock().ok().and_then(|slot| slot.clone()) {
            match &status {
                FileStatus::Uploading => bar.set_message(file.to_owned()),
                FileStatus::Done => bar.inc(1),
                FileStatus::Failed(e) => {
                    bar.inc(1);
                    self.multi.println(format!("❌ {file}: {e}")).ok();
                }
            }
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.record(&status);
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.files_bar.lock().ok().and_then(|slot| slot.clone()) {
            bar.finish_and_clear();
        }
        self.phase_bar.finish_and_clear();
        if let Ok(stats) = self.stats.lock() {
            stats.print_summary();
        }
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}
