use crate::error::{XplodeError, Result};
use git2::{BranchType, Repository};
use std::path::{Path, PathBuf};

/// An opened repository together with the directory `git archive` runs in.
pub struct GitRepository {
    root: PathBuf,
    repo: Repository,
}

impl GitRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let absolute = std::fs::canonicalize(path).map_err(|_| XplodeError::NotARepository {
            path: path.display().to_string(),
        })?;

        if !absolute.is_dir() {
            return Err(XplodeError::NotARepository {
                path: absolute.display().to_string(),
            });
        }

        let repo = Repository::open(&absolute).map_err(|_| XplodeError::NotARepository {
            path: absolute.display().to_string(),
        })?;

        // Bare repositories have no work tree; archive from the git dir instead.
        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .components()
            .collect::<PathBuf>();

        tracing::debug!(root = %root.display(), bare = repo.is_bare(), "opened repository");

        Ok(Self { root, repo })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the repository, without a trailing `.git`.
    pub fn name(&self) -> String {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string());

        match name.strip_suffix(".git") {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => name,
        }
    }

    pub fn current_branch(&self) -> String {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.shorthand().map(str::to_string))
            .unwrap_or_else(|| "HEAD".to_string())
    }

    pub fn list_branches(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub(crate) fn inner(&self) -> &Repository {
        &self.repo
    }
}
