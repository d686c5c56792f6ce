//! Progress reporting and display
//!
//! The crawler only talks to [`ProgressReporter`]; the terminal decides which
//! implementation is used.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

/// Status of a single crawl entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Waiting in the worker queue
    Queued,
    /// Picked up by a worker
    Processing,
    /// Written to disk
    Done,
    /// Dropped after cancellation
    Skipped,
    /// Failed with error
    Failed(String),
}

/// Phase of the overall run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    /// Resolving the source URL
    Resolving,
    /// Walking the hierarchy and downloading leaves
    Crawling,
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed(String),
}

pub trait ProgressReporter: Send + Sync {
    fn set_phase(&self, phase: RunPhase);

    /// A new leaf was discovered and queued.
    fn add_entry(&self, entry: &str);

    fn update_entry(&self, entry: &str, status: EntryStatus);

    fn log_warn(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: RunPhase) {}
    fn add_entry(&self, _entry: &str) {}
    fn update_entry(&self, _entry: &str, _status: EntryStatus) {}
    fn log_warn(&self, _message: &str) {}
    fn finish(&self) {}
}

#[derive(Debug, Default)]
struct Stats {
    total: usize,
    done: usize,
    skipped: usize,
    failed: usize,
    start_time: Option<Instant>,
}

impl Stats {
    fn started() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record(&mut self, status: &EntryStatus) {
        match status {
            EntryStatus::Done => self.done += 1,
            EntryStatus::Skipped => self.skipped += 1,
            EntryStatus::Failed(_) => self.failed += 1,
            _ => {}
        }
    }

    fn print(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();
        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   📄 Documents:  {} total", self.total);
        eprintln!("   ✅ Written:    {}", self.done);
        if self.skipped > 0 {
            eprintln!("   ⏭️  Skipped:    {}", self.skipped);
        }
        if self.failed > 0 {
            eprintln!("   ❌ Failed:     {}", self.failed);
        }
        eprintln!("   ⏱️  Duration:   {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

fn phase_message(phase: &RunPhase) -> String {
    match phase {
        RunPhase::Resolving => "🔎 Resolving source...".to_string(),
        RunPhase::Crawling => "📄 Downloading documents...".to_string(),
        RunPhase::Completed => "✅ Completed!".to_string(),
        RunPhase::Failed(e) => format!("❌ Failed: {e}"),
    }
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(Stats::started()),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: RunPhase) {
        eprintln!("{}", phase_message(&phase));
    }

    fn add_entry(&self, _entry: &str) {
        self.stats.write().unwrap().total += 1;
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        self.stats.write().unwrap().record(&status);
        match status {
            EntryStatus::Done => eprintln!("   ✓ {entry}"),
            EntryStatus::Failed(ref e) => eprintln!("   ✗ {entry}: {e}"),
            _ => {}
        }
    }

    fn log_warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn finish(&self) {
        self.stats.read().unwrap().print();
    }
}

/// Interactive reporter with progress bars (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    main_bar: indicatif::ProgressBar,
    entries: RwLock<HashMap<String, indicatif::ProgressBar>>,
    stats: RwLock<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        phase_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase_bar.enable_steady_tick(Duration::from_millis(100));

        let main_bar = multi.add(indicatif::ProgressBar::new(0));
        main_bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos}/{len} documents")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );

        Self {
            multi,
            phase_bar,
            main_bar,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(Stats::started()),
        }
    }

    fn status_detail(status: &EntryStatus) -> String {
        match status {
            EntryStatus::Queued => "⏳ queued".to_string(),
            EntryStatus::Processing => "⚙️  rendering".to_string(),
            EntryStatus::Done => "✅ done".to_string(),
            EntryStatus::Skipped => "⏭️  skipped".to_string(),
            EntryStatus::Failed(e) => format!("❌ {e}"),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: RunPhase) {
        let msg = phase_message(&phase);
        if matches!(phase, RunPhase::Completed | RunPhase::Failed(_)) {
            self.phase_bar.finish_with_message(msg);
        } else {
            self.phase_bar.set_message(msg);
        }
    }

    fn add_entry(&self, _entry: &str) {
        self.stats.write().unwrap().total += 1;
        self.main_bar.inc_length(1);
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        let mut map = self.entries.write().unwrap();

        if matches!(
            status,
            EntryStatus::Done | EntryStatus::Skipped | EntryStatus::Failed(_)
        ) {
            if let Some(pb) = map.remove(entry) {
                pb.finish_and_clear();
            }
            if let EntryStatus::Failed(ref e) = status {
                self.multi.println(format!("❌ {entry}: {e}")).ok();
            }
            self.main_bar.inc(1);
            self.stats.write().unwrap().record(&status);
            return;
        }

        // Spinners only exist while a worker holds the entry.
        if matches!(status, EntryStatus::Queued) {
            return;
        }
        let message = format!("{entry}: {}", Self::status_detail(&status));
        map.entry(entry.to_owned())
            .or_insert_with(|| {
                let pb = self.multi.add(indicatif::ProgressBar::new_spinner());
                pb.set_style(
                    indicatif::ProgressStyle::default_spinner()
                        .template("   {msg}")
                        .unwrap(),
                );
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            })
            .set_message(message);
    }

    fn log_warn(&self, message: &str) {
        self.multi.println(format!("⚠️  {message}")).ok();
    }

    fn finish(&self) {
        for pb in self.entries.read().unwrap().values() {
            pb.finish_and_clear();
        }
        self.main_bar.finish_and_clear();
        self.phase_bar.finish_and_clear();
        self.stats.read().unwrap().print();
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
