use crate::error::{XplodeError, Result};
use crate::git::GitRepository;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use git2::Sort;
use serde::Serialize;
use std::fmt;

/// A commit as enumerated from the repository. Read-only once listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub author_email: String,
    pub author_date: DateTime<FixedOffset>,
    pub committer: String,
    pub committer_email: String,
    pub commit_date: DateTime<FixedOffset>,
    pub subject: String,
    pub full_message: String,
    pub parent_hashes: Vec<String>,
    /// Whether the commit object carries a `gpgsig` header. The signature is not verified.
    pub signed: bool,
}

impl Commit {
    fn from_git(commit: &git2::Commit<'_>) -> Result<Self> {
        let short_id = commit.as_object().short_id()?;
        let author = commit.author();
        let committer = commit.committer();

        Ok(Self {
            hash: commit.id().to_string(),
            short_hash: short_id.as_str().unwrap_or_default().to_string(),
            author: author.name().unwrap_or_default().to_string(),
            author_email: author.email().unwrap_or_default().to_string(),
            author_date: to_datetime(author.when()),
            committer: committer.name().unwrap_or_default().to_string(),
            committer_email: committer.email().unwrap_or_default().to_string(),
            commit_date: to_datetime(committer.when()),
            subject: commit.summary().unwrap_or_default().to_string(),
            full_message: commit.message().unwrap_or_default().trim_end().to_string(),
            parent_hashes: commit.parent_ids().map(|id| id.to_string()).collect(),
            signed: commit.header_field_bytes("gpgsig").is_ok(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.parent_hashes.is_empty()
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.short_hash, self.subject)
    }
}

fn to_datetime(time: git2::Time) -> DateTime<FixedOffset> {
    let utc = Utc
        .timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_default();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .unwrap_or_else(|| Utc.fix());
    utc.with_timezone(&offset)
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Branch, tag or revision to start from; HEAD when unset.
    pub branch: Option<String>,
    /// Keep only the newest `limit` commits; 0 keeps all of them.
    pub limit: usize,
    /// Oldest first when set.
    pub reverse: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            branch: None,
            limit: 0,
            reverse: true,
        }
    }
}

impl GitRepository {
    pub fn list_commits(&self, options: &ListOptions) -> Result<Vec<Commit>> {
        let repo = self.inner();
        let mut walk = repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        match &options.branch {
            Some(reference) => {
                let target = repo
                    .revparse_single(reference)
                    .and_then(|object| object.peel_to_commit())
                    .map_err(|_| XplodeError::RefNotFound {
                        reference: reference.clone(),
                    })?;
                walk.push(target.id())?;
            }
            None => {
                // An unborn HEAD simply has no history.
                if repo.head().is_err() {
                    return Ok(Vec::new());
                }
                walk.push_head()?;
            }
        }

        let mut commits = Vec::new();
        for oid in walk {
            if options.limit > 0 && commits.len() >= options.limit {
                break;
            }
            let commit = repo.find_commit(oid?)?;
            commits.push(Commit::from_git(&commit)?);
        }

        if options.reverse {
            commits.reverse();
        }

        tracing::debug!(
            count = commits.len(),
            branch = options.branch.as_deref().unwrap_or("HEAD"),
            "listed commits"
        );

        Ok(commits)
    }
}
