//! Fixtures for unit tests.

use crate::config::{ToolPaths, ToolsConfig};

#[path = "../tests/common/repo.rs"]
mod repo;

pub use repo::TestRepo;

pub fn tools() -> ToolPaths {
    ToolsConfig::default().resolve().expect("git and tar on PATH")
}
