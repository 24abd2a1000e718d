//! Snapshot materialization: `git archive` piped straight into `tar -x`.
//!
//! Nothing is checked out; the repository's work tree and index are never
//! touched. The archive stream flows through an OS pipe between the two
//! children and is never buffered in this process.

use crate::config::ToolPaths;
use crate::error::ExtractError;
use crate::extractor::Materializer;
use crate::git::Commit;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::{self, JoinHandle};

/// Bytes of stderr kept per process; anything beyond is drained and dropped.
const STDERR_CAPTURE_LIMIT: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct SnapshotArchiver {
    repo_root: PathBuf,
    git: PathBuf,
    tar: PathBuf,
    exclude_binaries: bool,
}

impl SnapshotArchiver {
    pub fn new<P: Into<PathBuf>>(repo_root: P, tools: &ToolPaths) -> Self {
        Self {
            repo_root: repo_root.into(),
            git: tools.git.clone(),
            tar: tools.tar.clone(),
            exclude_binaries: false,
        }
    }

    pub fn with_exclude_binaries(mut self, exclude: bool) -> Self {
        self.exclude_binaries = exclude;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn git_program(&self) -> &Path {
        &self.git
    }

    /// Materialize the tree of `hash` under `destination`.
    pub fn extract(&self, hash: &str, destination: &Path) -> Result<(), ExtractError> {
        fs::create_dir_all(destination).map_err(|source| ExtractError::CreateDestination {
            path: destination.to_path_buf(),
            source,
        })?;

        let mut archive_args: Vec<OsString> = vec![hash.into()];

        if self.exclude_binaries {
            if let Some(text_files) = self.text_files(hash) {
                if text_files.is_empty() {
                    tracing::debug!(hash, "every file is binary, leaving snapshot empty");
                    return Ok(());
                }
                archive_args.push("--".into());
                archive_args.extend(text_files.into_iter().map(OsString::from));
            }
        }

        self.archive_to_tar(&archive_args, destination)
    }

    /// Text files of the commit, or `None` when the plain full archive should be used.
    fn text_files(&self, hash: &str) -> Option<Vec<String>> {
        let all_files = match self.list_files(hash) {
            Ok(files) => files,
            Err(e) => {
                tracing::debug!(hash, error = %e, "file listing failed, archiving everything");
                return None;
            }
        };

        let binary_files = match self.list_binary_files(hash) {
            Ok(files) => files,
            Err(e) => {
                tracing::debug!(hash, error = %e, "binary detection failed, archiving everything");
                return None;
            }
        };

        if binary_files.is_empty() {
            return None;
        }

        Some(
            all_files
                .into_iter()
                .filter(|file| !binary_files.contains(file))
                .collect(),
        )
    }

    fn list_files(&self, hash: &str) -> io::Result<Vec<String>> {
        let output = self.git_output(&["ls-tree", "-r", "--name-only", "-z", hash])?;
        Ok(split_nul(&output).map(str::to_string).collect())
    }

    /// Files reported with `-\t-\t` by numstat: git could not count lines, so they are binary.
    fn list_binary_files(&self, hash: &str) -> io::Result<HashSet<String>> {
        let output = self.git_output(&[
            "diff-tree",
            "--numstat",
            "--no-commit-id",
            "-r",
            "--root",
            "-z",
            hash,
        ])?;
        Ok(parse_binary_numstat(&output))
    }

    fn git_output(&self, args: &[&str]) -> io::Result<String> {
        let output = Command::new(&self.git)
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn archive_to_tar(&self, archive_args: &[OsString], destination: &Path) -> Result<(), ExtractError> {
        // File names after `--` are literal paths, never globs or `:` magic.
        let mut archiver = Command::new(&self.git)
            .arg("--literal-pathspecs")
            .arg("archive")
            .arg("--format=tar")
            .args(archive_args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExtractError::SpawnArchiver { source })?;

        let archiver_stderr = StderrCapture::start(archiver.stderr.take());

        let Some(archive_stream) = archiver.stdout.take() else {
            terminate(&mut archiver);
            archiver_stderr.finish();
            return Err(ExtractError::Pipe);
        };

        // The Command temporary owns the read end of the pipe and is dropped at the
        // end of this statement, so only tar keeps it open.
        let unpacker = Command::new(&self.tar)
            .arg("-xf")
            .arg("-")
            .arg("-C")
            .arg(destination)
            .stdin(Stdio::from(archive_stream))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut unpacker = match unpacker {
            Ok(child) => child,
            Err(source) => {
                terminate(&mut archiver);
                archiver_stderr.finish();
                return Err(ExtractError::SpawnUnpacker { source });
            }
        };

        let unpacker_stderr = StderrCapture::start(unpacker.stderr.take());

        let archive_status = archiver.wait();
        let unpack_status = unpacker.wait();
        let archive_errors = archiver_stderr.finish();
        let unpack_errors = unpacker_stderr.finish();

        let archive_status = archive_status.map_err(|source| ExtractError::Wait {
            process: "git archive",
            source,
        })?;
        if !archive_status.success() {
            return Err(ExtractError::ArchiverFailed {
                status: archive_status,
                stderr: archive_errors,
            });
        }

        let unpack_status = unpack_status.map_err(|source| ExtractError::Wait {
            process: "tar",
            source,
        })?;
        if !unpack_status.success() {
            return Err(ExtractError::UnpackerFailed {
                status: unpack_status,
                stderr: unpack_errors,
            });
        }

        Ok(())
    }
}

impl Materializer for SnapshotArchiver {
    fn materialize(&self, commit: &Commit, destination: &Path) -> Result<(), ExtractError> {
        self.extract(&commit.hash, destination)
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Reads a child's stderr on a helper thread so a chatty process can never
/// block on a full pipe while we wait for it.
struct StderrCapture(Option<JoinHandle<Vec<u8>>>);

impl StderrCapture {
    fn start(stream: Option<ChildStderr>) -> Self {
        Self(stream.map(|mut stream| {
            thread::spawn(move || {
                let mut captured = Vec::new();
                let _ = (&mut stream)
                    .take(STDERR_CAPTURE_LIMIT)
                    .read_to_end(&mut captured);
                let _ = io::copy(&mut stream, &mut io::sink());
                captured
            })
        }))
    }

    fn finish(self) -> String {
        self.0
            .and_then(|handle| handle.join().ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .unwrap_or_default()
    }
}

fn split_nul(output: &str) -> impl Iterator<Item = &str> {
    output.split('\0').filter(|entry| !entry.is_empty())
}

fn parse_binary_numstat(output: &str) -> HashSet<String> {
    split_nul(output)
        .filter_map(|record| record.strip_prefix("-\t-\t"))
        .map(str::to_string)
        .collect()
}
