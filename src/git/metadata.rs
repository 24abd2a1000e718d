use crate::error::ExtractError;
use crate::git::Commit;
use chrono::SecondsFormat;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

pub const METADATA_FILE_NAME: &str = "COMMIT_INFO.txt";

/// Line statistics of a commit relative to its first parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl CommitStats {
    pub fn collect(git: &Path, repo_root: &Path, hash: &str) -> io::Result<Self> {
        let output = Command::new(git)
            .args(["show", "--numstat", "--format=", hash])
            .current_dir(repo_root)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "git show exited with {} for {}",
                output.status, hash
            )));
        }

        Ok(Self::parse_numstat(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Parse `--numstat` lines. Binary files (`-` counts) are counted as changed only.
    pub fn parse_numstat(output: &str) -> Self {
        let mut stats = Self::default();

        for line in output.lines() {
            let mut fields = line.split_whitespace();
            let (Some(added), Some(deleted), Some(_path)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };

            stats.files_changed += 1;
            if added == "-" || deleted == "-" {
                continue;
            }
            stats.insertions += added.parse::<usize>().unwrap_or(0);
            stats.deletions += deleted.parse::<usize>().unwrap_or(0);
        }

        stats
    }
}

/// Verification result of a commit signature, as reported by `git log --format=%G?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Good,
    Bad,
    UnknownKey,
    Expired,
    ExpiredKey,
    RevokedKey,
    MissingKey,
    NotSigned,
    /// A signature header is present but git could not be asked about it.
    Unverified,
    Other(String),
}

impl SignatureStatus {
    pub fn collect(git: &Path, repo_root: &Path, hash: &str) -> io::Result<Self> {
        let output = Command::new(git)
            .args(["log", "-1", "--format=%G?", hash])
            .current_dir(repo_root)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "git log exited with {} for {}",
                output.status, hash
            )));
        }

        Ok(Self::from_code(String::from_utf8_lossy(&output.stdout).trim()))
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "G" => Self::Good,
            "B" => Self::Bad,
            "U" => Self::UnknownKey,
            "X" => Self::Expired,
            "Y" => Self::ExpiredKey,
            "R" => Self::RevokedKey,
            "E" => Self::MissingKey,
            "N" | "" => Self::NotSigned,
            other => Self::Other(other.to_string()),
        }
    }

    /// Status from the commit header alone.
    pub fn from_header(commit: &Commit) -> Self {
        if commit.signed {
            Self::Unverified
        } else {
            Self::NotSigned
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Good => "Valid signature (good)".to_string(),
            Self::Bad => "Bad signature".to_string(),
            Self::UnknownKey => "Valid signature, unknown key".to_string(),
            Self::Expired => "Valid signature, expired".to_string(),
            Self::ExpiredKey => "Valid signature, expired key".to_string(),
            Self::RevokedKey => "Valid signature, revoked key".to_string(),
            Self::MissingKey => "Cannot verify (missing key)".to_string(),
            Self::NotSigned => "Not signed".to_string(),
            Self::Unverified => "Signed (signature not verified)".to_string(),
            Self::Other(code) => format!("Unknown ({})", code),
        }
    }
}

pub fn render_metadata(
    commit: &Commit,
    stats: &CommitStats,
    signature: &SignatureStatus,
) -> String {
    let mut doc = String::new();
    let rfc3339 = |date: &chrono::DateTime<chrono::FixedOffset>| {
        date.to_rfc3339_opts(SecondsFormat::Secs, true)
    };

    // Writing into a String cannot fail.
    let _ = writeln!(doc, "COMMIT INFORMATION");
    let _ = writeln!(doc, "==================");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Hash:           {}", commit.hash);
    let _ = writeln!(doc, "Short Hash:     {}", commit.short_hash);
    let _ = writeln!(doc);

    let _ = writeln!(doc, "AUTHOR");
    let _ = writeln!(doc, "------");
    let _ = writeln!(doc, "Name:           {}", commit.author);
    let _ = writeln!(doc, "Email:          {}", commit.author_email);
    let _ = writeln!(doc, "Date:           {}", rfc3339(&commit.author_date));
    let _ = writeln!(doc, "Timestamp:      {}", commit.author_date.timestamp());
    let _ = writeln!(doc);

    let _ = writeln!(doc, "COMMITTER");
    let _ = writeln!(doc, "---------");
    let _ = writeln!(doc, "Name:           {}", commit.committer);
    let _ = writeln!(doc, "Email:          {}", commit.committer_email);
    let _ = writeln!(doc, "Date:           {}", rfc3339(&commit.commit_date));
    let _ = writeln!(doc, "Timestamp:      {}", commit.commit_date.timestamp());
    if commit.author != commit.committer {
        let _ = writeln!(doc);
        let _ = writeln!(doc, "NOTE: Author and committer are different.");
    }
    let _ = writeln!(doc);

    let _ = writeln!(doc, "SIGNATURE");
    let _ = writeln!(doc, "---------");
    let _ = writeln!(doc, "GPG Signature:  {}", signature.describe());
    let _ = writeln!(doc);

    let _ = writeln!(doc, "LINEAGE");
    let _ = writeln!(doc, "-------");
    if commit.is_root() {
        let _ = writeln!(doc, "Parents:        (root commit - no parents)");
    } else {
        let _ = writeln!(doc, "Parents:        {}", commit.parent_hashes.join(" "));
    }
    let _ = writeln!(doc);

    let _ = writeln!(doc, "CHANGE STATISTICS");
    let _ = writeln!(doc, "-----------------");
    let _ = writeln!(doc, "Files Changed:  {}", stats.files_changed);
    let _ = writeln!(doc, "Insertions:     +{}", stats.insertions);
    let _ = writeln!(doc, "Deletions:      -{}", stats.deletions);
    let _ = writeln!(doc);

    let _ = writeln!(doc, "COMMIT MESSAGE");
    let _ = writeln!(doc, "--------------");
    let _ = writeln!(doc, "Subject:");
    let _ = writeln!(doc, "{}", commit.subject);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Full Message:");
    let _ = writeln!(doc, "{}", commit.full_message);

    doc
}

pub fn write_metadata_file(
    commit: &Commit,
    stats: &CommitStats,
    signature: &SignatureStatus,
    destination: &Path,
) -> Result<(), ExtractError> {
    let path = destination.join(METADATA_FILE_NAME);
    std::fs::write(&path, render_metadata(commit, stats, signature)).map_err(|e| {
        ExtractError::Metadata {
            path,
            message: e.to_string(),
        }
    })
}
