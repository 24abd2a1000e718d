pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod git;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, ToolPaths};
pub use error::{AggregateError, ExtractError, Result, UserFriendlyError, XplodeError};

// Core functionality re-exports
pub use extractor::{
    ExtractionOutcome, ExtractionRun, Extractor, ExtractorConfig, FolderFormat, Materializer,
    OutputManager, RunReport,
};
pub use git::{
    AnnotatedSnapshot, Commit, GitRepository, ListOptions, SignatureStatus, SnapshotArchiver,
};
pub use ui::{OutputFormatter, OutputMode, ProgressReporter, ShutdownSignal};

use crate::extractor::BranchDirectories;
use std::path::{Path, PathBuf};
use tokio::task;

/// Commits to extract into one directory.
#[derive(Debug, Clone)]
pub struct ExtractionTarget {
    /// Set in all-branches mode.
    pub branch: Option<String>,
    pub output_directory: PathBuf,
    pub commits: Vec<Commit>,
    /// Snapshot folder name of each commit, in the same order.
    pub folders: Vec<String>,
}

/// Everything a run will do, resolved before any directory is created.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub repository_name: String,
    pub repository_root: PathBuf,
    /// Branch or revision the commits come from; the checked-out branch by default.
    pub reference: String,
    pub output_directory: PathBuf,
    pub targets: Vec<ExtractionTarget>,
    /// Branches without any commit, left out in all-branches mode.
    pub skipped_branches: Vec<String>,
}

impl ExtractionPlan {
    pub fn total_commits(&self) -> usize {
        self.targets.iter().map(|t| t.commits.len()).sum()
    }
}

/// Main library interface: explodes a repository into one folder per commit.
pub struct RepoXplode {
    config: Config,
    output_formatter: OutputFormatter,
    shutdown: ShutdownSignal,
    verbose: u8,
    quiet: bool,
}

impl RepoXplode {
    /// Create an instance wired to Ctrl+C.
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = ShutdownSignal::new()?;
        Ok(Self::with_shutdown(config, output_mode, verbose, quiet, shutdown))
    }

    pub fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            shutdown,
            verbose,
            quiet,
        }
    }

    /// Create an instance for testing (no signal handler registration)
    #[cfg(test)]
    pub fn new_for_test(config: Config) -> Self {
        Self::with_shutdown(config, OutputMode::Plain, 0, true, ShutdownSignal::detached())
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            cli_args.output_format.into(),
            cli_args.verbose,
            cli_args.quiet,
        )
    }

    /// Resolve the repository, the output layout and the commits to extract.
    pub fn plan<P: AsRef<Path>>(&self, repository: P) -> Result<ExtractionPlan> {
        build_plan(&self.config, repository.as_ref())
    }

    /// Extract every planned commit. Failed snapshots do not make this return
    /// an error; check [`RunReport::verdict`].
    pub async fn explode<P: AsRef<Path>>(&self, repository: P) -> Result<RunReport> {
        self.shutdown.check_shutdown()?;
        self.config.validate()?;

        let tools = self.config.tools.resolve()?;
        tracing::debug!(git = %tools.git.display(), tar = %tools.tar.display(), "resolved tools");

        let config = self.config.clone();
        let repository = repository.as_ref().to_path_buf();
        let plan = task::spawn_blocking(move || build_plan(&config, &repository))
            .await
            .map_err(|e| XplodeError::Config {
                message: format!("Planning task failed: {}", e),
            })??;
        self.shutdown.check_shutdown()?;

        for branch in &plan.skipped_branches {
            self.output_formatter
                .warning(&format!("Skipping branch {}: no commits", branch));
        }

        let output_manager = output_manager(&self.config, &plan.repository_name)
            .with_source_repository(&plan.repository_root);
        output_manager.initialize()?;

        let workers = self.config.worker_count();
        self.output_formatter.print_run_header(&plan, workers);

        let folder_format = self.config.folder_format()?;
        let snapshot = AnnotatedSnapshot::new(
            SnapshotArchiver::new(&plan.repository_root, &tools)
                .with_exclude_binaries(self.config.extraction.exclude_binaries),
        )
        .with_metadata(self.config.extraction.write_metadata);

        let mut report = RunReport::start(
            &plan.repository_name,
            &plan.output_directory,
            folder_format,
            workers,
        );

        for target in plan.targets {
            if let Some(branch) = &target.branch {
                self.output_formatter.info(&format!(
                    "Extracting {} commits from {}",
                    target.commits.len(),
                    branch
                ));
            }

            let extractor = Extractor::new(
                ExtractorConfig::new(&target.output_directory)
                    .with_workers(workers)
                    .with_folder_format(folder_format)
                    .with_verbose(self.verbose > 0)
                    .with_quiet(self.quiet),
                snapshot.clone(),
            );
            let shutdown = self.shutdown.clone();

            report = task::spawn_blocking(move || {
                let run = extractor.run(&target.commits, &shutdown);
                report.record(target.branch.as_deref(), &target.output_directory, &run);
                report
            })
            .await
            .map_err(|e| XplodeError::Config {
                message: format!("Extraction task failed: {}", e),
            })?;
        }

        report.complete();

        if self.config.output.generate_report {
            match output_manager.save_report(&report) {
                Ok(path) => tracing::debug!(path = %path.display(), "wrote run report"),
                Err(e) => self
                    .output_formatter
                    .warning(&format!("Could not write run report: {}", e)),
            }
        }

        self.output_formatter.print_run_summary(&report);

        Ok(report)
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        std::fs::write(output_path.as_ref(), Config::create_sample_config())?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &XplodeError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

fn output_manager(config: &Config, repository_name: &str) -> OutputManager {
    let manager = OutputManager::new(&config.output.base_directory, repository_name)
        .with_force_overwrite(config.output.force);
    match &config.output.directory {
        Some(directory) => manager.with_output_directory(directory),
        None => manager,
    }
}

fn build_plan(config: &Config, repository: &Path) -> Result<ExtractionPlan> {
    let folder_format = config.folder_format()?;
    let repo = GitRepository::open(repository)?;
    let repository_name = repo.name();
    let output = output_manager(config, &repository_name);

    let target = |branch: Option<String>, output_directory: PathBuf, commits: Vec<Commit>| {
        let total = commits.len();
        let folders = commits
            .iter()
            .enumerate()
            .map(|(index, commit)| folder_format.folder_name(commit, index, total))
            .collect();
        ExtractionTarget {
            branch,
            output_directory,
            commits,
            folders,
        }
    };

    let mut targets = Vec::new();
    let mut skipped_branches = Vec::new();

    if config.git.all_branches {
        let mut directories = BranchDirectories::new();
        for branch in repo.list_branches()? {
            let commits = repo.list_commits(&ListOptions {
                branch: Some(branch.clone()),
                limit: config.git.limit,
                reverse: true,
            })?;
            if commits.is_empty() {
                skipped_branches.push(branch);
                continue;
            }
            let directory = output.branch_directory(&directories.assign(&branch));
            targets.push(target(Some(branch), directory, commits));
        }
    } else {
        let commits = repo.list_commits(&ListOptions {
            branch: config.git.branch.clone(),
            limit: config.git.limit,
            reverse: true,
        })?;
        if !commits.is_empty() {
            targets.push(target(None, output.output_directory().to_path_buf(), commits));
        }
    }

    if targets.is_empty() {
        return Err(XplodeError::NoCommits {
            reference: config.git.branch.clone(),
        });
    }

    let reference = if config.git.all_branches {
        "all local branches".to_string()
    } else {
        config
            .git
            .branch
            .clone()
            .unwrap_or_else(|| repo.current_branch())
    };

    let plan = ExtractionPlan {
        repository_name,
        repository_root: repo.root().to_path_buf(),
        reference,
        output_directory: output.output_directory().to_path_buf(),
        targets,
        skipped_branches,
    };

    tracing::debug!(
        repository = %plan.repository_root.display(),
        targets = plan.targets.len(),
        commits = plan.total_commits(),
        "planned extraction"
    );

    Ok(plan)
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "repoxplode {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::metadata::METADATA_FILE_NAME;
    use crate::test_support::TestRepo;
    use tempfile::TempDir;

    fn config_into(out: &TempDir) -> Config {
        let mut config = Config::default();
        config.output.base_directory = out.path().to_path_buf();
        config.extraction.workers = 2;
        config
    }

    #[test]
    fn test_plan_default_output_directory() {
        let fixture = TestRepo::with_commits(&["one", "two", "three"]);
        let out = TempDir::new().unwrap();
        let app = RepoXplode::new_for_test(config_into(&out));

        let plan = app.plan(fixture.path()).unwrap();
        let expected_name = format!("{}-exploded", plan.repository_name);
        assert_eq!(plan.output_directory, out.path().join(expected_name));
        assert_eq!(plan.total_commits(), 3);
        assert_eq!(plan.reference, "main");
        assert_eq!(plan.targets[0].commits[0].subject, "one");
        assert_eq!(plan.targets[0].folders[0], plan.targets[0].commits[0].short_hash);
    }

    #[test]
    fn test_plan_all_branches() {
        let fixture = TestRepo::with_commits(&["one", "two"]);
        fixture.git(&["checkout", "-q", "-b", "feature/x"]);
        fixture.write("feature.txt", "feature");
        fixture.commit("three");

        let out = TempDir::new().unwrap();
        let mut config = config_into(&out);
        config.git.all_branches = true;
        let app = RepoXplode::new_for_test(config);

        let plan = app.plan(fixture.path()).unwrap();
        let branches: Vec<_> = plan.targets.iter().map(|t| t.branch.clone().unwrap()).collect();
        assert_eq!(branches, vec!["feature/x".to_string(), "main".to_string()]);
        assert_eq!(plan.targets[0].commits.len(), 3);
        assert_eq!(plan.targets[1].commits.len(), 2);
        assert!(plan.targets[0].output_directory.ends_with("feature_x"));
    }

    #[test]
    fn test_plan_colliding_branch_directories() {
        let fixture = TestRepo::with_commits(&["one"]);
        fixture.git(&["branch", "a/b"]);
        fixture.git(&["branch", "a_b"]);

        let out = TempDir::new().unwrap();
        let mut config = config_into(&out);
        config.git.all_branches = true;
        let app = RepoXplode::new_for_test(config);

        let plan = app.plan(fixture.path()).unwrap();
        let directories: Vec<_> = plan
            .targets
            .iter()
            .map(|t| t.output_directory.clone())
            .collect();
        let unique: std::collections::HashSet<_> = directories.iter().collect();
        assert_eq!(directories.len(), 3);
        assert_eq!(unique.len(), 3);
        assert!(directories[0].ends_with("a_b"));
        assert!(directories[1].ends_with("a_b-2"));
    }

    #[test]
    fn test_plan_empty_repository() {
        let fixture = TestRepo::empty();
        let out = TempDir::new().unwrap();
        let app = RepoXplode::new_for_test(config_into(&out));

        assert!(matches!(
            app.plan(fixture.path()),
            Err(XplodeError::NoCommits { .. })
        ));
    }

    #[test]
    fn test_plan_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let app = RepoXplode::new_for_test(config_into(&out));

        assert!(matches!(
            app.plan(dir.path()),
            Err(XplodeError::NotARepository { .. })
        ));
    }

    #[tokio::test]
    async fn test_explode_repository() {
        let fixture = TestRepo::with_commits(&["one", "two", "three"]);
        let out = TempDir::new().unwrap();
        let app = RepoXplode::new_for_test(config_into(&out));

        let report = app.explode(fixture.path()).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.succeeded, 3);

        let first = &report.branches[0].snapshots[0];
        let snapshot = report.output_directory.join(&first.folder);
        assert!(snapshot.join("file1.txt").exists());
        assert!(!snapshot.join("file2.txt").exists());
        assert!(snapshot.join(METADATA_FILE_NAME).exists());
        assert!(report.output_directory.join(".repoxplode/report.json").exists());
    }

    #[tokio::test]
    async fn test_explode_refuses_existing_output() {
        let fixture = TestRepo::with_commits(&["one"]);
        let out = TempDir::new().unwrap();
        let mut config = config_into(&out);
        let existing = out.path().join("taken");
        std::fs::create_dir_all(&existing).unwrap();
        config.output.directory = Some(existing.clone());

        let app = RepoXplode::new_for_test(config.clone());
        assert!(matches!(
            app.explode(fixture.path()).await,
            Err(XplodeError::OutputDirectoryExists { .. })
        ));

        config.output.force = true;
        let app = RepoXplode::new_for_test(config);
        let report = app.explode(fixture.path()).await.unwrap();
        assert_eq!(report.output_directory, existing);
    }

    #[tokio::test]
    async fn test_explode_force_keeps_repository() {
        let fixture = TestRepo::with_commits(&["one"]);
        let out = TempDir::new().unwrap();
        let mut config = config_into(&out);
        config.output.directory = Some(fixture.path().to_path_buf());
        config.output.force = true;

        let app = RepoXplode::new_for_test(config);
        assert!(matches!(
            app.explode(fixture.path()).await,
            Err(XplodeError::Config { .. })
        ));
        assert!(fixture.path().join(".git").exists());
        assert!(fixture.path().join("file1.txt").exists());
    }

    #[tokio::test]
    async fn test_explode_after_shutdown() {
        let fixture = TestRepo::with_commits(&["one"]);
        let out = TempDir::new().unwrap();
        let app = RepoXplode::new_for_test(config_into(&out));
        app.request_shutdown();

        assert!(matches!(
            app.explode(fixture.path()).await,
            Err(XplodeError::Cancelled)
        ));
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        RepoXplode::generate_sample_config(&config_path).unwrap();
        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[extraction]"));
    }

    #[test]
    fn test_build_info_display() {
        let build_info = build_info();
        let display_string = build_info.to_string();
        assert!(display_string.contains("repoxplode"));
        assert!(display_string.contains(version_info()));
    }
}
