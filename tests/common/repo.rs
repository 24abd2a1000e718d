//! Throwaway git repositories driven through the `git` binary. Shared by the
//! unit tests and the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// An initialized repository on `main` with no commits yet.
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().expect("create temp dir"),
        };
        repo.git(&["init", "-q"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    pub fn empty() -> Self {
        Self::new()
    }

    /// One commit per subject, each adding its own file.
    pub fn with_commits(subjects: &[&str]) -> Self {
        let repo = Self::new();
        for (i, subject) in subjects.iter().enumerate() {
            repo.write(&format!("file{}.txt", i + 1), &format!("content of {subject}\n"));
            repo.commit(subject);
        }
        repo
    }

    /// `count` commits, the i-th adding `file{i}.txt` and rewriting `README.md`.
    pub fn with_history(count: usize) -> Self {
        let repo = Self::new();
        for i in 1..=count {
            repo.write(&format!("file{i}.txt"), &format!("file {i}\n"));
            repo.write("README.md", &format!("# revision {i}\n"));
            repo.commit(&format!("commit {i}"));
        }
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        self.write_bytes(relative, contents.as_bytes());
    }

    pub fn write_bytes(&self, relative: &str, contents: &[u8]) {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, contents).expect("write fixture file");
    }

    /// Stage everything and commit; returns the new full hash.
    pub fn commit(&self, message: &str) -> String {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "--allow-empty", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    /// Run git in the repository, panicking on failure; returns trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .expect("run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}
