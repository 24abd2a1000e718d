pub mod naming;
pub mod outcome;
pub mod output_manager;
pub mod pool;

pub use naming::{BranchDirectories, FolderFormat};
pub use outcome::{ExtractionOutcome, ExtractionRun};
pub use output_manager::{OutputManager, RunReport};
pub use pool::{Extractor, ExtractorConfig, Materializer};
