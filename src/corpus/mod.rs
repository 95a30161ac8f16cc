//! Corpus collaborators
//!
//! Interfaces to the document store and the trained topic model, plus a
//! file-system document store. Text extraction failures are recovered per
//! document; store and model errors propagate to the caller.

pub mod models;
pub mod store;
pub mod topic_model;

pub use models::{CorpusDocument, DocId, DocumentTopics, ExtractedText, TopicAssignment};
pub use store::{collect_corpus, hash_file, walk_tree, DocumentStore, Extractor, FileSystemStore};
pub use topic_model::TopicModel;
