//! Subdirectory orchestration of the incidence pipeline

pub mod artifacts;
pub mod lock;
pub mod orchestrator;
pub mod state;

pub use artifacts::{flatten_relative, Manifest, OutputLayout};
pub use lock::{LockInfo, SubdirLock};
pub use orchestrator::SubdirectoryIncidencePipeline;
pub use state::{PipelineReport, SubdirOutcome, SubdirReport, SubdirStage};
