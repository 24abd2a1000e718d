use crate::error::ExtractError;
use crate::extractor::Materializer;
use crate::git::{metadata, Commit, CommitStats, SignatureStatus, SnapshotArchiver};
use filetime::FileTime;
use std::path::Path;

/// Archives a commit, then annotates the snapshot with `COMMIT_INFO.txt`
/// and stamps the folder with the commit date.
#[derive(Debug, Clone)]
pub struct AnnotatedSnapshot {
    archiver: SnapshotArchiver,
    write_metadata: bool,
}

impl AnnotatedSnapshot {
    pub fn new(archiver: SnapshotArchiver) -> Self {
        Self {
            archiver,
            write_metadata: true,
        }
    }

    pub fn with_metadata(mut self, write_metadata: bool) -> Self {
        self.write_metadata = write_metadata;
        self
    }

    fn stats(&self, commit: &Commit) -> CommitStats {
        CommitStats::collect(
            self.archiver.git_program(),
            self.archiver.repo_root(),
            &commit.hash,
        )
        .unwrap_or_else(|e| {
            tracing::debug!(hash = %commit.short_hash, error = %e, "could not collect change statistics");
            CommitStats::default()
        })
    }

    fn signature(&self, commit: &Commit) -> SignatureStatus {
        SignatureStatus::collect(
            self.archiver.git_program(),
            self.archiver.repo_root(),
            &commit.hash,
        )
        .unwrap_or_else(|e| {
            tracing::debug!(hash = %commit.short_hash, error = %e, "could not check signature");
            SignatureStatus::from_header(commit)
        })
    }
}

impl Materializer for AnnotatedSnapshot {
    fn materialize(&self, commit: &Commit, destination: &Path) -> Result<(), ExtractError> {
        self.archiver.extract(&commit.hash, destination)?;

        if self.write_metadata {
            metadata::write_metadata_file(
                commit,
                &self.stats(commit),
                &self.signature(commit),
                destination,
            )?;
        }

        let mtime = FileTime::from_unix_time(commit.commit_date.timestamp(), 0);
        if let Err(e) = filetime::set_file_mtime(destination, mtime) {
            tracing::debug!(path = %destination.display(), error = %e, "could not set folder time");
        }

        Ok(())
    }
}
