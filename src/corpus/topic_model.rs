//! Topic model collaborator

use super::models::{DocId, DocumentTopics};
use crate::error::Result;

/// A trained topic model.
///
/// Training is out of scope; implementations wrap an existing model and
/// answer per-document topic queries.
pub trait TopicModel: Send + Sync {
    /// Number of topics known to the model
    fn num_topics(&self) -> usize;

    /// Model vocabulary, in the model's order
    fn vocabulary(&self) -> &[String];

    /// Up to `num_topics` (topic id, score, words) assignments per document.
    ///
    /// The returned arrays are indexed by position in `doc_ids`.
    fn get_documents_topics(&self, doc_ids: &[DocId], num_topics: usize) -> Result<DocumentTopics>;
}
