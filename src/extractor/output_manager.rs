use crate::error::{AggregateError, Result, XplodeError};
use crate::extractor::{ExtractionRun, FolderFormat};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const METADATA_DIR: &str = ".repoxplode";

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub repository: String,
    pub output_directory: PathBuf,
    pub folder_format: FolderFormat,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
    pub branches: Vec<BranchReport>,
    #[serde(skip)]
    verdicts: Vec<AggregateError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    /// `None` when a single ref (or HEAD) was extracted.
    pub branch: Option<String>,
    pub output_directory: PathBuf,
    pub total: usize,
    pub snapshots: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRecord {
    pub index: usize,
    pub hash: String,
    pub short_hash: String,
    pub subject: String,
    pub folder: String,
    pub error: Option<String>,
}

impl RunReport {
    pub fn start(
        repository: &str,
        output_directory: &Path,
        folder_format: FolderFormat,
        workers: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            repository: repository.to_string(),
            output_directory: output_directory.to_path_buf(),
            folder_format,
            workers,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            cancelled: false,
            branches: Vec::new(),
            verdicts: Vec::new(),
        }
    }

    /// Add the outcomes of one extraction run.
    pub fn record(&mut self, branch: Option<&str>, output_directory: &Path, run: &ExtractionRun<'_>) {
        let mut snapshots: Vec<SnapshotRecord> = run
            .outcomes
            .iter()
            .map(|outcome| SnapshotRecord {
                index: outcome.index,
                hash: outcome.commit.hash.clone(),
                short_hash: outcome.commit.short_hash.clone(),
                subject: outcome.commit.subject.clone(),
                folder: outcome
                    .output_path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default(),
                error: outcome.error.as_ref().map(ToString::to_string),
            })
            .collect();
        snapshots.sort_by_key(|s| s.index);

        self.total += run.total;
        self.succeeded += run.succeeded();
        self.failed += run.failed();
        self.skipped += run.skipped();
        self.cancelled |= run.cancelled;
        if let Err(verdict) = run.verdict() {
            self.verdicts.push(verdict);
        }

        self.branches.push(BranchReport {
            branch: branch.map(str::to_string),
            output_directory: output_directory.to_path_buf(),
            total: run.total,
            snapshots,
        });
    }

    pub fn complete(&mut self) {
        self.finished_at = Utc::now();
        self.duration_ms = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
    }

    pub fn is_success(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Combined verdict across every recorded run.
    pub fn verdict(&self) -> std::result::Result<(), AggregateError> {
        match AggregateError::merge(self.verdicts.iter().cloned()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Owns the layout of the output directory.
pub struct OutputManager {
    output_directory: PathBuf,
    force_overwrite: bool,
    /// Never removed, even with `force_overwrite`.
    source_repository: Option<PathBuf>,
}

impl OutputManager {
    /// `<base>/<repo-name>-exploded`.
    pub fn new(base_path: &Path, repo_name: &str) -> Self {
        Self {
            output_directory: base_path.join(format!("{}-exploded", sanitize_repo_name(repo_name))),
            force_overwrite: false,
            source_repository: None,
        }
    }

    pub fn with_output_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.output_directory = directory.into();
        self
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn with_source_repository<P: Into<PathBuf>>(mut self, repository: P) -> Self {
        self.source_repository = Some(repository.into());
        self
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.output_directory.join(METADATA_DIR)
    }

    /// Subdirectory for a branch in all-branches mode, named by [`crate::extractor::naming::BranchDirectories`].
    pub fn branch_directory(&self, directory_name: &str) -> PathBuf {
        self.output_directory.join(directory_name)
    }

    /// Fails if the directory exists and overwriting was not requested.
    pub fn check_available(&self) -> Result<()> {
        if self.output_directory.exists() && !self.force_overwrite {
            return Err(XplodeError::OutputDirectoryExists {
                path: self.output_directory.display().to_string(),
            });
        }
        Ok(())
    }

    /// Fails if removing the output directory would remove the source repository.
    fn check_not_source(&self) -> Result<()> {
        let Some(repository) = &self.source_repository else {
            return Ok(());
        };

        let output = fs::canonicalize(&self.output_directory)?;
        let repository = fs::canonicalize(repository).unwrap_or_else(|_| repository.clone());
        if repository.starts_with(&output) {
            return Err(XplodeError::Config {
                message: format!(
                    "Output directory {} contains the repository being extracted",
                    output.display()
                ),
            });
        }
        Ok(())
    }

    pub fn initialize(&self) -> Result<()> {
        if self.output_directory.exists() {
            self.check_not_source()?;
        }
        self.check_available()?;

        if self.output_directory.exists() {
            tracing::info!(path = %self.output_directory.display(), "removing existing output directory");
            fs::remove_dir_all(&self.output_directory)?;
        }

        fs::create_dir_all(&self.output_directory)?;
        Ok(())
    }

    /// Write `report.json` and `report.txt` into the metadata directory.
    pub fn save_report(&self, report: &RunReport) -> Result<PathBuf> {
        let metadata_dir = self.metadata_dir();
        fs::create_dir_all(&metadata_dir)?;

        let json_path = metadata_dir.join("report.json");
        let json_content =
            serde_json::to_string_pretty(report).map_err(|e| XplodeError::Config {
                message: format!("Failed to serialize report to JSON: {}", e),
            })?;
        fs::write(&json_path, json_content)?;

        self.save_report_text(report, &metadata_dir.join("report.txt"))?;

        Ok(json_path)
    }

    fn save_report_text(&self, report: &RunReport, path: &Path) -> Result<()> {
        let mut file = fs::File::create(path)?;

        writeln!(file, "repoxplode run report")?;
        writeln!(file, "=====================")?;
        writeln!(file)?;
        writeln!(file, "Repository: {}", report.repository)?;
        writeln!(file, "Output: {}", report.output_directory.display())?;
        writeln!(file, "Folder format: {}", report.folder_format)?;
        writeln!(file, "Workers: {}", report.workers)?;
        writeln!(
            file,
            "Started: {}",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(file, "Duration: {} ms", report.duration_ms)?;
        writeln!(file)?;
        writeln!(
            file,
            "Snapshots: {} total, {} extracted, {} failed, {} skipped",
            report.total, report.succeeded, report.failed, report.skipped
        )?;
        if report.cancelled {
            writeln!(file, "The run was cancelled before every snapshot was started.")?;
        }

        for branch in &report.branches {
            writeln!(file)?;
            match &branch.branch {
                Some(name) => writeln!(file, "Branch {} ({} snapshots):", name, branch.total)?,
                None => writeln!(file, "Snapshots ({}):", branch.total)?,
            }
            for snapshot in &branch.snapshots {
                match &snapshot.error {
                    None => writeln!(
                        file,
                        "  ✓ {} {} -> {}",
                        snapshot.short_hash, snapshot.subject, snapshot.folder
                    )?,
                    Some(error) => writeln!(
                        file,
                        "  ✗ {} {}: {}",
                        snapshot.short_hash, snapshot.subject, error
                    )?,
                }
            }
        }

        Ok(())
    }
}

fn sanitize_repo_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| match ch {
            c if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' => c,
            _ => '_',
        })
        .collect();

    let sanitized = sanitized.trim_matches(|c| c == '.' || c == '_');
    if sanitized.is_empty() {
        "repository".to_string()
    } else {
        sanitized.to_string()
    }
}
