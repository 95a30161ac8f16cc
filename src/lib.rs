//! Document-topic incidences and Formal Concept Analysis
//!
//! Per-document topic assignments from a trained topic model are turned into
//! a document x topic matrix, row-normalized and thresholded to a target
//! density into a binary formal context, exported as FIMI for external
//! itemset miners, and mined itemsets are closed back into concepts. The
//! [`pipeline`] module runs all of it per corpus subdirectory.

pub mod config;
pub mod corpus;
pub mod error;
pub mod fca;
pub mod incidence;
pub mod metrics;
pub mod pipeline;
pub mod telemetry;
pub mod threshold;

pub use crate::config::Config;
pub use corpus::{DocId, DocumentStore, DocumentTopics, FileSystemStore, TopicModel};
pub use error::{Result, TopicFcaError};
pub use fca::{Concept, ContextCodec, FormalContext, LabelMapping};
pub use incidence::{IncidenceBuilder, IncidenceMatrix};
pub use pipeline::{PipelineReport, SubdirOutcome, SubdirectoryIncidencePipeline};
pub use threshold::{ThresholdSearch, ThresholdSelector};
