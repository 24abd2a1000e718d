use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::extractor::FolderFormat;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "repoxplode")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract every commit of a git repository into its own folder")]
#[command(
    long_about = "repoxplode materializes the tree of every commit of a local git repository \
                  into a separate directory, running `git archive | tar -x` pipelines in parallel. \
                  The repository's work tree is never touched."
)]
#[command(after_help = "EXAMPLES:\n  \
    repoxplode .\n  \
    repoxplode -n 10 -o ./versions /path/to/repo\n  \
    repoxplode -f date-hash -w 4 /path/to/repo\n  \
    repoxplode --all-branches --exclude-binaries /path/to/repo\n  \
    repoxplode --generate-config --config repoxplode.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Path to the git repository
    #[arg(required_unless_present = "generate_config")]
    pub repository: Option<PathBuf>,

    /// Output directory (defaults to ./<repo-name>-exploded)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel workers; 0 or less uses every CPU
    #[arg(short, long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// Maximum number of commits to extract, newest first (0 = all)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Branch, tag or revision to extract from (default: current HEAD)
    #[arg(short, long, conflicts_with = "all_branches")]
    pub branch: Option<String>,

    /// Extract every local branch into its own subdirectory
    #[arg(long)]
    pub all_branches: bool,

    /// Snapshot folder naming
    #[arg(short = 'f', long = "format", value_parser = parse_folder_format)]
    pub folder_format: Option<FolderFormat>,

    /// Leave binary files out of every snapshot
    #[arg(long)]
    pub exclude_binaries: bool,

    /// Do not write COMMIT_INFO.txt into snapshots
    #[arg(long)]
    pub no_metadata: bool,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v per snapshot lines, -vv debug logging)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress and non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Replace an existing output directory
    #[arg(long, help = "Overwrite existing output directory")]
    pub force: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "List the snapshots that would be extracted without extracting them")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let output_dir = self.output.as_ref().map(|o| {
            if o.is_absolute() {
                o.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(o)
            }
        });

        CliOverrides::new()
            .with_workers(self.worker_override())
            .with_folder_format(self.folder_format.map(|f| f.as_str().to_string()))
            .with_exclude_binaries(self.exclude_binaries)
            .with_no_metadata(self.no_metadata)
            .with_output_dir(output_dir)
            .with_force(self.force)
            .with_branch(self.branch.clone())
            .with_all_branches(self.all_branches)
            .with_limit(self.limit)
    }

    /// Non-positive worker counts fall back to one worker per CPU.
    fn worker_override(&self) -> Option<usize> {
        self.workers.map(|w| usize::try_from(w).unwrap_or(0))
    }

    pub fn repository_path(&self) -> PathBuf {
        self.repository.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

fn parse_folder_format(s: &str) -> std::result::Result<FolderFormat, String> {
    s.parse::<FolderFormat>().map_err(|_| {
        format!("invalid folder format '{}' (valid: hash, date-hash, index-hash)", s)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("repoxplode").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["/path/to/repo"]);
        assert_eq!(cli.repository_path(), PathBuf::from("/path/to/repo"));
        assert!(cli.workers.is_none());
        assert!(cli.folder_format.is_none());
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_all_flags() {
        let cli = parse(&[
            "-o", "/tmp/out", "-w", "4", "-n", "10", "-b", "develop", "-f", "index-hash", "-vv",
            "--exclude-binaries", "--no-metadata", "--force", "repo",
        ]);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.limit, Some(10));
        assert_eq!(cli.branch.as_deref(), Some("develop"));
        assert_eq!(cli.folder_format, Some(FolderFormat::IndexHash));
        assert_eq!(cli.verbosity_level(), 2);

        let overrides = cli.create_cli_overrides();
        assert_eq!(overrides.workers, Some(4));
        assert_eq!(overrides.folder_format.as_deref(), Some("index-hash"));
        assert_eq!(overrides.output_dir, Some(PathBuf::from("/tmp/out")));
        assert!(overrides.exclude_binaries);
        assert!(overrides.no_metadata);
        assert!(overrides.force);
    }

    #[test]
    fn test_non_positive_workers_use_all_cpus() {
        assert_eq!(parse(&["-w", "0", "repo"]).create_cli_overrides().workers, Some(0));
        assert_eq!(parse(&["-w", "-3", "repo"]).create_cli_overrides().workers, Some(0));
    }

    #[test]
    fn test_invalid_folder_format() {
        let result = Cli::try_parse_from(["repoxplode", "-f", "by-author", "repo"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_branch_conflicts_with_all_branches() {
        let result = Cli::try_parse_from(["repoxplode", "-b", "main", "--all-branches", "repo"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_generate_config_without_repository() {
        let cli = parse(&["--generate-config"]);
        assert!(cli.generate_config);
        assert!(cli.repository.is_none());
    }

    #[test]
    fn test_relative_output_is_resolved() {
        let cli = parse(&["-o", "versions", "repo"]);
        let overrides = cli.create_cli_overrides();
        let output = overrides.output_dir.unwrap();
        assert!(output.is_absolute());
        assert!(output.ends_with("versions"));
    }
}
