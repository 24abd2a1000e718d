//! Fixed-size worker pool that materializes commits in parallel.
//!
//! Every job is queued up front on a bounded channel sized to the number of
//! commits, then the queue is closed. `workers` scoped threads drain it; each
//! publishes exactly one outcome per job it picks up. The collector stops when
//! the last worker drops its result sender.

use crate::error::ExtractError;
use crate::extractor::outcome::{collect_outcomes, ExtractionOutcome, ExtractionRun};
use crate::extractor::FolderFormat;
use crate::git::Commit;
use crate::ui::{ProgressConfig, ProgressReporter, ShutdownSignal};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread;

/// Turns one commit into a directory on disk.
///
/// Implementations run on worker threads, one call per job, and must not
/// share mutable state between calls.
pub trait Materializer: Send + Sync {
    fn materialize(&self, commit: &Commit, destination: &Path) -> Result<(), ExtractError>;
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub output_dir: PathBuf,
    /// Number of worker threads; 0 means one per available CPU.
    pub workers: usize,
    pub folder_format: FolderFormat,
    pub verbose: bool,
    pub quiet: bool,
}

impl ExtractorConfig {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            workers: 0,
            folder_format: FolderFormat::default(),
            verbose: false,
            quiet: false,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_folder_format(mut self, format: FolderFormat) -> Self {
        self.folder_format = format;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

struct Job<'a> {
    commit: &'a Commit,
    index: usize,
}

pub struct Extractor<M> {
    config: ExtractorConfig,
    materializer: M,
}

impl<M: Materializer> Extractor<M> {
    pub fn new(config: ExtractorConfig, materializer: M) -> Self {
        let mut config = config;
        if config.workers == 0 {
            config.workers = num_cpus::get();
        }
        Self {
            config,
            materializer,
        }
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Destination of the commit at `index` out of `total`.
    pub fn destination(&self, commit: &Commit, index: usize, total: usize) -> PathBuf {
        self.config
            .output_dir
            .join(self.config.folder_format.folder_name(commit, index, total))
    }

    /// Extract every commit, reporting progress to stderr.
    pub fn run<'a>(&self, commits: &'a [Commit], shutdown: &ShutdownSignal) -> ExtractionRun<'a> {
        let reporter = ProgressReporter::new(ProgressConfig {
            total: commits.len(),
            verbose: self.config.verbose,
            quiet: self.config.quiet,
        });
        self.run_with_reporter(commits, shutdown, &reporter)
    }

    pub fn run_with_reporter<'a>(
        &self,
        commits: &'a [Commit],
        shutdown: &ShutdownSignal,
        reporter: &ProgressReporter,
    ) -> ExtractionRun<'a> {
        let total = commits.len();
        if total == 0 {
            return ExtractionRun::empty();
        }

        let workers = self.config.workers.max(1);
        tracing::info!(
            total,
            workers,
            output = %self.config.output_dir.display(),
            "starting extraction"
        );

        let (job_tx, job_rx) = bounded::<Job<'a>>(total);
        for (index, commit) in commits.iter().enumerate() {
            // The queue holds every job and the receiver is alive, so this cannot fail.
            let _ = job_tx.send(Job { commit, index });
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<ExtractionOutcome<'a>>();

        reporter.start();
        let outcomes = thread::scope(|scope| {
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    self.work(worker, total, &job_rx, &result_tx, shutdown, reporter)
                });
            }
            drop(result_tx);

            collect_outcomes(&result_rx, total)
        });
        reporter.finish();

        let run = ExtractionRun {
            outcomes,
            total,
            cancelled: shutdown.is_cancelled(),
        };

        tracing::info!(
            succeeded = run.succeeded(),
            failed = run.failed(),
            skipped = run.skipped(),
            "extraction finished"
        );

        run
    }

    fn work<'a>(
        &self,
        worker: usize,
        total: usize,
        jobs: &Receiver<Job<'a>>,
        results: &Sender<ExtractionOutcome<'a>>,
        shutdown: &ShutdownSignal,
        reporter: &ProgressReporter,
    ) {
        loop {
            if shutdown.is_cancelled() {
                tracing::debug!(worker, "shutdown requested, worker exiting");
                return;
            }

            let Ok(job) = jobs.recv() else {
                return;
            };

            let outcome = self.extract_one(job, total);
            match &outcome.error {
                None => {
                    let folder = outcome
                        .output_path
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_default();
                    reporter.increment(Some(&format!(
                        "✓ {} → {}",
                        outcome.commit.short_hash, folder
                    )));
                }
                Some(error) => {
                    tracing::debug!(
                        worker,
                        hash = %outcome.commit.short_hash,
                        error = %error,
                        "extraction failed"
                    );
                    reporter.increment(Some(&format!(
                        "✗ {}: {}",
                        outcome.commit.short_hash, error
                    )));
                }
            }

            if results.send(outcome).is_err() {
                return;
            }
        }
    }

    fn extract_one<'a>(&self, job: Job<'a>, total: usize) -> ExtractionOutcome<'a> {
        let output_path = self.destination(job.commit, job.index, total);
        let error = self
            .materializer
            .materialize(job.commit, &output_path)
            .err();

        ExtractionOutcome {
            commit: job.commit,
            index: job.index,
            output_path,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn commits(count: usize) -> Vec<Commit> {
        let when = DateTime::<FixedOffset>::parse_from_rfc3339("2024-01-15T10:30:00Z").unwrap();
        (0..count)
            .map(|i| {
                let short = format!("{:07x}", i + 1);
                Commit {
                    hash: format!("{short}{}", "0".repeat(33)),
                    short_hash: short,
                    author: "Test User".to_string(),
                    author_email: "test@example.com".to_string(),
                    author_date: when,
                    committer: "Test User".to_string(),
                    committer_email: "test@example.com".to_string(),
                    commit_date: when,
                    subject: format!("commit {i}"),
                    full_message: format!("commit {i}"),
                    parent_hashes: Vec::new(),
                    signed: false,
                }
            })
            .collect()
    }

    /// Creates the folder; fails for the listed short hashes.
    struct FakeMaterializer {
        failing: HashSet<String>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeMaterializer {
        fn new() -> Self {
            Self {
                failing: HashSet::new(),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn failing(hashes: &[&str]) -> Self {
            Self {
                failing: hashes.iter().map(|h| h.to_string()).collect(),
                ..Self::new()
            }
        }
    }

    impl Materializer for FakeMaterializer {
        fn materialize(&self, commit: &Commit, destination: &Path) -> Result<(), ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if self.failing.contains(&commit.short_hash) {
                return Err(ExtractError::Pipe);
            }
            std::fs::create_dir_all(destination).map_err(|source| {
                ExtractError::CreateDestination {
                    path: destination.to_path_buf(),
                    source,
                }
            })
        }
    }

    fn extractor(out: &TempDir, workers: usize, materializer: FakeMaterializer) -> Extractor<FakeMaterializer> {
        Extractor::new(
            ExtractorConfig::new(out.path()).with_workers(workers).with_quiet(true),
            materializer,
        )
    }

    #[test]
    fn test_every_job_yields_one_outcome() {
        let out = TempDir::new().unwrap();
        let commits = commits(17);
        let pool = extractor(&out, 4, FakeMaterializer::new());

        let run = pool.run_with_reporter(&commits, &ShutdownSignal::detached(), &ProgressReporter::hidden(17));

        assert_eq!(run.outcomes.len(), 17);
        let mut indices: Vec<_> = run.outcomes.iter().map(|o| o.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..17).collect::<Vec<_>>());
        assert!(run.verdict().is_ok());
        assert_eq!(pool.materializer.calls.load(Ordering::SeqCst), 17);
    }

    #[test]
    fn test_empty_input() {
        let out = TempDir::new().unwrap();
        let pool = extractor(&out, 4, FakeMaterializer::new());

        let run = pool.run(&[], &ShutdownSignal::detached());
        assert!(run.outcomes.is_empty());
        assert!(run.verdict().is_ok());
        assert_eq!(pool.materializer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_more_workers_than_jobs() {
        let out = TempDir::new().unwrap();
        let commits = commits(2);
        let pool = extractor(&out, 16, FakeMaterializer::new());

        let run = pool.run_with_reporter(&commits, &ShutdownSignal::detached(), &ProgressReporter::hidden(2));
        assert_eq!(run.succeeded(), 2);
    }

    #[test]
    fn test_failures_are_aggregated() {
        let out = TempDir::new().unwrap();
        let commits = commits(5);
        let pool = extractor(&out, 2, FakeMaterializer::failing(&["0000003"]));

        let run = pool.run_with_reporter(&commits, &ShutdownSignal::detached(), &ProgressReporter::hidden(5));

        assert_eq!(run.outcomes.len(), 5);
        assert_eq!(run.failed(), 1);
        let error = run.verdict().unwrap_err();
        assert!(error.to_string().contains("1 of 5"));
        assert_eq!(error.causes[0].0, 2);

        for outcome in run.outcomes.iter().filter(|o| o.is_success()) {
            assert!(outcome.output_path.is_dir());
        }
    }

    #[test]
    fn test_zero_workers_means_cpu_count() {
        let out = TempDir::new().unwrap();
        let pool = extractor(&out, 0, FakeMaterializer::new());
        assert_eq!(pool.workers(), num_cpus::get());
    }

    #[test]
    fn test_cancelled_before_start_runs_nothing() {
        let out = TempDir::new().unwrap();
        let commits = commits(4);
        let pool = extractor(&out, 2, FakeMaterializer::new());
        let shutdown = ShutdownSignal::detached();
        shutdown.request_shutdown();

        let run = pool.run_with_reporter(&commits, &shutdown, &ProgressReporter::hidden(4));
        assert!(run.cancelled);
        assert!(run.outcomes.is_empty());
        assert_eq!(run.skipped(), 4);
        assert!(run.verdict().is_err());
    }

    #[test]
    fn test_cancellation_lets_running_jobs_finish() {
        struct CancelOnFirst<'s> {
            shutdown: &'s ShutdownSignal,
            seen: Mutex<Vec<String>>,
        }

        impl Materializer for CancelOnFirst<'_> {
            fn materialize(&self, commit: &Commit, _destination: &Path) -> Result<(), ExtractError> {
                self.seen.lock().unwrap().push(commit.short_hash.clone());
                self.shutdown.request_shutdown();
                Ok(())
            }
        }

        let out = TempDir::new().unwrap();
        let commits = commits(10);
        let shutdown = ShutdownSignal::detached();
        let pool = Extractor::new(
            ExtractorConfig::new(out.path()).with_workers(1).with_quiet(true),
            CancelOnFirst {
                shutdown: &shutdown,
                seen: Mutex::new(Vec::new()),
            },
        );

        let run = pool.run_with_reporter(&commits, &shutdown, &ProgressReporter::hidden(10));
        assert_eq!(*pool.materializer.seen.lock().unwrap(), vec!["0000001".to_string()]);
        assert_eq!(run.outcomes.len(), 1);
        assert!(run.outcomes[0].is_success());
        assert_eq!(run.skipped(), 9);
    }

    #[test]
    fn test_destination_follows_folder_format() {
        let out = TempDir::new().unwrap();
        let commits = commits(12);
        let pool = Extractor::new(
            ExtractorConfig::new(out.path())
                .with_workers(3)
                .with_folder_format(FolderFormat::IndexHash)
                .with_quiet(true),
            FakeMaterializer::new(),
        );

        let run = pool.run_with_reporter(&commits, &ShutdownSignal::detached(), &ProgressReporter::hidden(12));
        let ordered = run.into_ordered();
        assert_eq!(ordered[0].output_path, out.path().join("01_0000001"));
        assert_eq!(ordered[11].output_path, out.path().join("12_000000c"));
    }
}
