pub mod archive;
pub mod commits;
pub mod metadata;
pub mod repository;
pub mod snapshot;

pub use archive::SnapshotArchiver;
pub use commits::{Commit, ListOptions};
pub use metadata::{CommitStats, SignatureStatus};
pub use repository::GitRepository;
pub use snapshot::AnnotatedSnapshot;
