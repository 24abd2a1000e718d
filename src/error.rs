use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XplodeError {
    #[error("Git operation failed: {message}")]
    Git {
        message: String,
        #[source]
        source: git2::Error,
    },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a git repository: {path}")]
    NotARepository { path: String },

    #[error("Unknown revision or branch: {reference}")]
    RefNotFound { reference: String },

    #[error("No commits found")]
    NoCommits { reference: Option<String> },

    #[error("Required tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid folder format: {value}")]
    InvalidFolderFormat { value: String },

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("Output directory already exists: {path}")]
    OutputDirectoryExists { path: String },

    #[error(transparent)]
    Extraction(#[from] AggregateError),
}

/// Failure of a single snapshot. Never aborts sibling extractions.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create pipe between git archive and tar")]
    Pipe,

    #[error("failed to start git archive: {source}")]
    SpawnArchiver {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start tar: {source}")]
    SpawnUnpacker {
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {process}: {source}")]
    Wait {
        process: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("git archive failed ({status}): {stderr}")]
    ArchiverFailed { status: ExitStatus, stderr: String },

    #[error("tar extraction failed ({status}): {stderr}")]
    UnpackerFailed { status: ExitStatus, stderr: String },

    #[error("failed to write metadata file {path}: {message}")]
    Metadata { path: PathBuf, message: String },
}

/// Verdict of a run in which at least one snapshot failed or was skipped.
#[derive(Error, Debug, Clone)]
pub struct AggregateError {
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    /// (index, short hash, message) for every failed snapshot.
    pub causes: Vec<(usize, String, String)>,
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} extractions failed", self.failed, self.total)?;
        if self.skipped > 0 {
            write!(f, "; {} not started after cancellation", self.skipped)?;
        }
        Ok(())
    }
}

impl AggregateError {
    /// Merge verdicts of several runs (one per branch).
    pub fn merge(errors: impl IntoIterator<Item = AggregateError>) -> Option<AggregateError> {
        errors.into_iter().reduce(|mut acc, other| {
            acc.failed += other.failed;
            acc.skipped += other.skipped;
            acc.total += other.total;
            acc.causes.extend(other.causes);
            acc
        })
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for XplodeError {
    fn user_message(&self) -> String {
        match self {
            XplodeError::Git { message, .. } => {
                format!("Git operation failed: {}", message)
            }
            XplodeError::NotARepository { path } => {
                format!("Not a git repository: {}", path)
            }
            XplodeError::RefNotFound { reference } => {
                format!("Could not resolve '{}' to a commit", reference)
            }
            XplodeError::NoCommits { reference } => match reference {
                Some(reference) => format!("No commits found on {}", reference),
                None => "No commits found".to_string(),
            },
            XplodeError::ToolNotFound { tool } => {
                format!("Required tool '{}' was not found", tool)
            }
            XplodeError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            XplodeError::InvalidFolderFormat { value } => {
                format!(
                    "Invalid folder format '{}' (valid: hash, date-hash, index-hash)",
                    value
                )
            }
            XplodeError::Cancelled => "Operation was cancelled by user".to_string(),
            XplodeError::OutputDirectoryExists { path } => {
                format!("Output directory already exists: {}", path)
            }
            XplodeError::Extraction(aggregate) => {
                let mut message = aggregate.to_string();
                for (index, short_hash, cause) in &aggregate.causes {
                    message.push_str(&format!("\n  #{} {}: {}", index + 1, short_hash, cause));
                }
                message
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            XplodeError::NotARepository { .. } => Some(
                "Point repoxplode at the root of a git working tree or a bare repository.".to_string()
            ),
            XplodeError::RefNotFound { .. } => Some(
                "Check the branch name with `git branch --list`, or omit --branch to use HEAD.".to_string()
            ),
            XplodeError::ToolNotFound { tool } => Some(format!(
                "Install '{}' or set its path in the [tools] section of the configuration file.",
                tool
            )),
            XplodeError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            XplodeError::InvalidFolderFormat { .. } => Some(
                "Use --format hash, --format date-hash or --format index-hash.".to_string()
            ),
            XplodeError::OutputDirectoryExists { .. } => Some(
                "Remove the existing directory, choose a different one with --output, or use --force to overwrite.".to_string()
            ),
            XplodeError::Extraction(_) => Some(
                "Successfully extracted snapshots were kept. Re-run with --verbose to see each failure as it happens.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<git2::Error> for XplodeError {
    fn from(error: git2::Error) -> Self {
        use git2::ErrorCode;

        match error.code() {
            ErrorCode::NotFound if error.class() == git2::ErrorClass::Repository => {
                XplodeError::NotARepository {
                    path: error.message().to_string(),
                }
            }
            _ => XplodeError::Git {
                message: error.message().to_string(),
                source: error,
            },
        }
    }
}

impl From<toml::de::Error> for XplodeError {
    fn from(error: toml::de::Error) -> Self {
        XplodeError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, XplodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_friendly_messages() {
        let error = XplodeError::OutputDirectoryExists {
            path: "/tmp/out".to_string(),
        };
        assert!(error.user_message().contains("already exists"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_aggregate_message() {
        let error = AggregateError {
            failed: 1,
            skipped: 0,
            total: 5,
            causes: vec![(2, "abc1234".to_string(), "git archive failed".to_string())],
        };
        assert_eq!(error.to_string(), "1 of 5 extractions failed");

        let wrapped = XplodeError::from(error);
        assert!(wrapped.user_message().contains("#3 abc1234"));
    }

    #[test]
    fn test_aggregate_mentions_skipped() {
        let error = AggregateError {
            failed: 0,
            skipped: 3,
            total: 4,
            causes: Vec::new(),
        };
        assert!(error.to_string().contains("3 not started"));
    }

    #[test]
    fn test_merge_aggregates() {
        let merged = AggregateError::merge(vec![
            AggregateError { failed: 1, skipped: 0, total: 3, causes: Vec::new() },
            AggregateError { failed: 2, skipped: 1, total: 4, causes: Vec::new() },
        ])
        .unwrap();
        assert_eq!(merged.failed, 3);
        assert_eq!(merged.skipped, 1);
        assert_eq!(merged.total, 7);
        assert!(AggregateError::merge(Vec::new()).is_none());
    }

    #[test]
    fn test_git_error_conversion() {
        let git_error = git2::Error::from_str("test error");
        let error = XplodeError::from(git_error);
        assert!(matches!(error, XplodeError::Git { .. }));
    }
}
