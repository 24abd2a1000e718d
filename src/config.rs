use crate::error::{XplodeError, Result};
use crate::extractor::FolderFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
    pub git: GitConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Number of parallel workers; 0 means one per available CPU.
    pub workers: usize,
    pub folder_format: String,
    pub exclude_binaries: bool,
    pub write_metadata: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub base_directory: PathBuf,
    /// Explicit output directory; defaults to `<repo-name>-exploded` under `base_directory`.
    pub directory: Option<PathBuf>,
    pub generate_report: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    pub branch: Option<String>,
    pub all_branches: bool,
    /// Maximum number of commits per branch; 0 extracts all of them.
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub git: PathBuf,
    pub tar: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            folder_format: "hash".to_string(),
            exclude_binaries: false,
            write_metadata: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            directory: None,
            generate_report: true,
            force: false,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: PathBuf::from("git"),
            tar: PathBuf::from("tar"),
        }
    }
}

/// Absolute locations of the external programs the extraction pipeline drives.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub git: PathBuf,
    pub tar: PathBuf,
}

impl ToolsConfig {
    pub fn resolve(&self) -> Result<ToolPaths> {
        let locate = |program: &Path| {
            which::which(program).map_err(|_| XplodeError::ToolNotFound {
                tool: program.display().to_string(),
            })
        };

        Ok(ToolPaths {
            git: locate(&self.git)?,
            tar: locate(&self.tar)?,
        })
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(XplodeError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| XplodeError::Config {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| XplodeError::Config {
                message: format!("Failed to parse config file {}: {}", path.display(), e),
            })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["repoxplode.toml", ".repoxplode.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(workers) = cli_args.workers {
            self.extraction.workers = workers;
        }

        if let Some(ref format) = cli_args.folder_format {
            self.extraction.folder_format = format.clone();
        }

        if cli_args.exclude_binaries {
            self.extraction.exclude_binaries = true;
        }

        if cli_args.no_metadata {
            self.extraction.write_metadata = false;
        }

        if let Some(ref output_dir) = cli_args.output_dir {
            self.output.directory = Some(output_dir.clone());
        }

        if cli_args.force {
            self.output.force = true;
        }

        if let Some(ref branch) = cli_args.branch {
            self.git.branch = Some(branch.clone());
        }

        if cli_args.all_branches {
            self.git.all_branches = true;
        }

        if let Some(limit) = cli_args.limit {
            self.git.limit = limit;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| XplodeError::Config {
                message: format!("Failed to serialize config: {}", e),
            })?;

        std::fs::write(path, content)
            .map_err(|e| XplodeError::Config {
                message: format!("Failed to write config file {}: {}", path.display(), e),
            })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.folder_format()?;

        if self.git.all_branches && self.git.branch.is_some() {
            return Err(XplodeError::Config {
                message: "--branch and --all-branches cannot be used together".to_string(),
            });
        }

        if let Some(branch) = &self.git.branch {
            if branch.trim().is_empty() {
                return Err(XplodeError::Config {
                    message: "Branch name must not be empty".to_string(),
                });
            }
        }

        if self.output.directory.is_none() && !self.output.base_directory.is_dir() {
            return Err(XplodeError::Config {
                message: format!(
                    "Base directory does not exist: {}",
                    self.output.base_directory.display()
                ),
            });
        }

        Ok(())
    }

    pub fn folder_format(&self) -> Result<FolderFormat> {
        self.extraction.folder_format.parse()
    }

    /// Worker count with the "0 means all CPUs" rule applied.
    pub fn worker_count(&self) -> usize {
        if self.extraction.workers == 0 {
            num_cpus::get()
        } else {
            self.extraction.workers
        }
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub workers: Option<usize>,
    pub folder_format: Option<String>,
    pub exclude_binaries: bool,
    pub no_metadata: bool,
    pub output_dir: Option<PathBuf>,
    pub force: bool,
    pub branch: Option<String>,
    pub all_branches: bool,
    pub limit: Option<usize>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_folder_format(mut self, format: Option<String>) -> Self {
        self.folder_format = format;
        self
    }

    pub fn with_exclude_binaries(mut self, exclude: bool) -> Self {
        self.exclude_binaries = exclude;
        self
    }

    pub fn with_no_metadata(mut self, no_metadata: bool) -> Self {
        self.no_metadata = no_metadata;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn with_all_branches(mut self, all_branches: bool) -> Self {
        self.all_branches = all_branches;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.extraction.workers, 0);
        assert_eq!(config.extraction.folder_format, "hash");
        assert!(config.extraction.write_metadata);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.extraction.folder_format = "by-author".to_string();
        assert!(matches!(
            config.validate(),
            Err(XplodeError::InvalidFolderFormat { .. })
        ));

        let mut config = Config::default();
        config.git.branch = Some("main".to_string());
        config.git.all_branches = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.extraction.workers = 3;
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.extraction.workers, 3);
        assert_eq!(loaded_config.tools.tar, PathBuf::from("tar"));
    }

    #[test]
    fn test_partial_config_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[git]\nlimit = 7\n").unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.git.limit, 7);
        assert_eq!(config.extraction.folder_format, "hash");
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_workers(Some(4))
            .with_folder_format(Some("date-hash".to_string()))
            .with_no_metadata(true)
            .with_limit(Some(10));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.folder_format().unwrap(), FolderFormat::DateHash);
        assert!(!config.extraction.write_metadata);
        assert_eq!(config.git.limit, 10);
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(sample.contains("[extraction]"));
        assert!(sample.contains("[output]"));
        assert!(sample.contains("[git]"));
        assert!(sample.contains("[tools]"));
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let tools = ToolsConfig {
            git: PathBuf::from("git-does-not-exist-xyz"),
            tar: PathBuf::from("tar"),
        };
        assert!(matches!(
            tools.resolve(),
            Err(XplodeError::ToolNotFound { .. })
        ));
    }
}
