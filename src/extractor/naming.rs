use crate::error::XplodeError;
use crate::git::Commit;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How a snapshot folder is named inside the output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FolderFormat {
    /// `<short-hash>`
    #[default]
    Hash,
    /// `<YYYYMMDD-HHMMSS>_<short-hash>`, committer time in UTC
    DateHash,
    /// `<position>_<short-hash>`, position zero-padded to the width of the total
    IndexHash,
}

impl FolderFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderFormat::Hash => "hash",
            FolderFormat::DateHash => "date-hash",
            FolderFormat::IndexHash => "index-hash",
        }
    }

    /// Folder name for the commit at zero-based `index` out of `total`.
    pub fn folder_name(&self, commit: &Commit, index: usize, total: usize) -> String {
        match self {
            FolderFormat::Hash => commit.short_hash.clone(),
            FolderFormat::DateHash => format!(
                "{}_{}",
                commit.commit_date.with_timezone(&Utc).format("%Y%m%d-%H%M%S"),
                commit.short_hash
            ),
            FolderFormat::IndexHash => {
                let width = total.max(1).to_string().len();
                format!("{:0width$}_{}", index + 1, commit.short_hash, width = width)
            }
        }
    }
}

impl fmt::Display for FolderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderFormat {
    type Err = XplodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hash" => Ok(FolderFormat::Hash),
            "date-hash" => Ok(FolderFormat::DateHash),
            "index-hash" => Ok(FolderFormat::IndexHash),
            _ => Err(XplodeError::InvalidFolderFormat {
                value: s.to_string(),
            }),
        }
    }
}

/// Directory name for a branch: `feature/login` becomes `feature_login`.
pub fn sanitize_branch_name(branch: &str) -> String {
    branch.replace('/', "_")
}

/// Hands out one distinct directory name per branch. Names that collide after
/// sanitizing (`a/b` and `a_b`) get a `-2`, `-3`, ... suffix in call order.
#[derive(Debug, Default)]
pub struct BranchDirectories {
    taken: HashSet<String>,
}

impl BranchDirectories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, branch: &str) -> String {
        let base = sanitize_branch_name(branch);
        let mut name = base.clone();
        let mut suffix = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        name
    }
}
