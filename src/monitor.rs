//! Polling monitor: one pass, report, wait, repeat.
//!
//! The monitor never runs passes concurrently and only looks at its stop flag between
//! passes, so a pass in progress always runs to completion. Hosts with their own event
//! loop call [`Monitor::tick`] from a timer; the CLI uses [`Monitor::run_blocking`].

use crate::config::OrganizerConfig;
use crate::file_organizer::{FileOrganizer, PassReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Seconds between passes when none is given.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Granularity of the wait between passes, so a stop request is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(200);

/// Cloneable handle used to ask a running monitor to stop after the current pass.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives progress from [`Monitor::run_blocking`].
///
/// All methods have empty defaults so hosts only implement what they display.
pub trait MonitorObserver {
    /// Called after every completed pass.
    fn on_pass(&mut self, _pass_number: usize, _report: &PassReport) {}

    /// Called repeatedly while waiting for the next pass.
    fn on_wait(&mut self, _remaining: Duration) {}

    /// Called once the wait is over, before the next pass starts.
    fn on_wait_end(&mut self) {}
}

/// Observer that ignores everything.
impl MonitorObserver for () {}

/// Repeats organizing passes with a fixed delay between them.
#[derive(Debug, Clone)]
pub struct Monitor {
    interval: Duration,
    max_passes: Option<usize>,
    stop: StopHandle,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_INTERVAL_SECS))
    }
}

impl Monitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_passes: None,
            stop: StopHandle::default(),
        }
    }

    /// Stop on its own after `passes` passes instead of running until stopped.
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = Some(passes);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs a single pass unless a stop was requested.
    ///
    /// Timer-driven hosts call this, then schedule the next call `interval()` later.
    pub fn tick(
        &self,
        organizer: &FileOrganizer,
        config: &OrganizerConfig,
    ) -> Option<PassReport> {
        if self.stop.is_stopped() {
            return None;
        }
        Some(organizer.run_pass(config))
    }

    /// Blocks the calling thread, running passes until stopped.
    ///
    /// `config_source` is asked for the configuration before every pass, which lets the
    /// host reload it from disk. Returns the number of passes completed.
    pub fn run_blocking<F, O>(
        &self,
        organizer: &FileOrganizer,
        mut config_source: F,
        observer: &mut O,
    ) -> usize
    where
        F: FnMut() -> OrganizerConfig,
        O: MonitorObserver + ?Sized,
    {
        let mut passes = 0;

        loop {
            let config = config_source();
            let Some(report) = self.tick(organizer, &config) else {
                break;
            };
            passes += 1;
            observer.on_pass(passes, &report);

            if self.max_passes.is_some_and(|max| passes >= max) {
                break;
            }
            if !self.wait(observer) {
                break;
            }
        }

        log::debug!("Monitor finished after {} passes", passes);
        passes
    }

    /// Sleeps for one interval. Returns false if a stop was requested meanwhile.
    fn wait<O: MonitorObserver + ?Sized>(&self, observer: &mut O) -> bool {
        let deadline = Instant::now() + self.interval;

        loop {
            if self.stop.is_stopped() {
                observer.on_wait_end();
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            observer.on_wait(remaining);
            thread::sleep(remaining.min(WAIT_SLICE));
        }

        observer.on_wait_end();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        passes: Vec<usize>,
        moved: usize,
        waits_ended: usize,
    }

    impl MonitorObserver for Recorder {
        fn on_pass(&mut self, pass_number: usize, report: &PassReport) {
            self.passes.push(pass_number);
            self.moved += report.moved_count();
        }

        fn on_wait_end(&mut self) {
            self.waits_ended += 1;
        }
    }

    fn pdf_config(watch: &std::path::Path, dest: &std::path::Path) -> OrganizerConfig {
        let mut config = OrganizerConfig {
            watch_dirs: vec![watch.to_path_buf()],
            ..Default::default()
        };
        config
            .extension_dirs
            .insert(".pdf".to_string(), Some(dest.to_path_buf()));
        config
    }

    #[test]
    fn test_run_blocking_stops_after_max_passes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watch = temp_dir.path().join("watch");
        let dest: PathBuf = temp_dir.path().join("dest");
        fs::create_dir_all(&watch).unwrap();
        fs::write(watch.join("a.pdf"), "a").unwrap();

        let monitor = Monitor::new(Duration::ZERO).with_max_passes(3);
        let mut recorder = Recorder::default();
        let config = pdf_config(&watch, &dest);

        let passes =
            monitor.run_blocking(&FileOrganizer::new(), || config.clone(), &mut recorder);

        assert_eq!(passes, 3);
        assert_eq!(recorder.passes, vec![1, 2, 3]);
        assert_eq!(recorder.moved, 1);
        assert_eq!(recorder.waits_ended, 2);
        assert!(dest.join("a.pdf").exists());
    }

    #[test]
    fn test_config_source_is_consulted_every_pass() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watch = temp_dir.path().join("watch");
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&watch).unwrap();
        fs::write(watch.join("late.pdf"), "l").unwrap();

        let mut calls = 0;
        let monitor = Monitor::new(Duration::ZERO).with_max_passes(2);
        monitor.run_blocking(
            &FileOrganizer::new(),
            || {
                calls += 1;
                // The mapping only shows up for the second pass.
                if calls == 1 {
                    OrganizerConfig::default()
                } else {
                    pdf_config(&watch, &dest)
                }
            },
            &mut (),
        );

        assert_eq!(calls, 2);
        assert!(dest.join("late.pdf").exists());
    }

    #[test]
    fn test_stop_before_start_runs_nothing() {
        let monitor = Monitor::new(Duration::from_secs(60));
        monitor.stop_handle().stop();

        let passes =
            monitor.run_blocking(&FileOrganizer::new(), OrganizerConfig::default, &mut ());

        assert_eq!(passes, 0);
        assert!(monitor.tick(&FileOrganizer::new(), &OrganizerConfig::default()).is_none());
    }

    #[test]
    fn test_stop_from_another_thread_interrupts_wait() {
        let monitor = Monitor::new(Duration::from_secs(3600));
        let handle = monitor.stop_handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.stop();
        });

        let started = Instant::now();
        let passes =
            monitor.run_blocking(&FileOrganizer::new(), OrganizerConfig::default, &mut ());
        stopper.join().unwrap();

        assert_eq!(passes, 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(Monitor::default().interval(), Duration::from_secs(5));
    }
}
