//! Data models for documents and their topic assignments

use crate::error::{Result, TopicFcaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Document identifier in the topic model's id space
pub type DocId = usize;

/// Result of extracting text from one file.
///
/// A failed extraction keeps the error message as its text so that a batch
/// can continue with the remaining documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub success: bool,
}

impl ExtractedText {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            success: false,
        }
    }
}

/// A document of one subdirectory after text extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub id: DocId,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub success: bool,
    pub text: String,
}

/// One (topic, score, words) entry of a document
#[derive(Debug, Clone, PartialEq)]
pub struct TopicAssignment<'a> {
    pub topic_id: usize,
    pub score: f64,
    pub words: &'a [String],
}

/// Output of `get_documents_topics`: four arrays indexed by the position of
/// each document in the queried id list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentTopics {
    pub topic_nums: Vec<Vec<usize>>,
    pub topic_scores: Vec<Vec<f64>>,
    pub topic_words: Vec<Vec<Vec<String>>>,
    pub word_scores: Vec<Vec<Vec<f64>>>,
}

impl DocumentTopics {
    /// Number of documents covered
    pub fn len(&self) -> usize {
        self.topic_nums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topic_nums.is_empty()
    }

    /// Check the shape of topic model output before it is used.
    ///
    /// Every array must cover `n_docs` documents, each document may carry at
    /// most `num_topics` assignments, scores and word lists must align with
    /// topic ids, and every topic id must be below `num_topics_total`.
    pub fn validate(&self, n_docs: usize, num_topics: usize, num_topics_total: usize) -> Result<()> {
        for (name, len) in [
            ("topic_nums", self.topic_nums.len()),
            ("topic_scores", self.topic_scores.len()),
            ("topic_words", self.topic_words.len()),
        ] {
            if len != n_docs {
                return Err(TopicFcaError::TopicModel(format!(
                    "{} covers {} documents, expected {}",
                    name, len, n_docs
                )));
            }
        }

        for (pos, nums) in self.topic_nums.iter().enumerate() {
            if nums.len() > num_topics {
                return Err(TopicFcaError::TopicModel(format!(
                    "document at position {} has {} topics, requested at most {}",
                    pos,
                    nums.len(),
                    num_topics
                )));
            }
            if self.topic_scores[pos].len() != nums.len() || self.topic_words[pos].len() != nums.len() {
                return Err(TopicFcaError::TopicModel(format!(
                    "document at position {} has misaligned scores or word lists",
                    pos
                )));
            }
            if let Some(&bad) = nums.iter().find(|&&t| t >= num_topics_total) {
                return Err(TopicFcaError::TopicModel(format!(
                    "topic id {} out of range for a model with {} topics",
                    bad, num_topics_total
                )));
            }
        }

        Ok(())
    }

    /// Assignments of the document at `pos`, in model order. A topic listed
    /// twice keeps its first entry.
    pub fn assignments(&self, pos: usize) -> impl Iterator<Item = TopicAssignment<'_>> + '_ {
        let mut seen = BTreeSet::new();
        self.topic_nums[pos]
            .iter()
            .zip(&self.topic_scores[pos])
            .zip(&self.topic_words[pos])
            .filter(move |((topic_id, _), _)| seen.insert(**topic_id))
            .map(|((&topic_id, &score), words)| TopicAssignment {
                topic_id,
                score,
                words: words.as_slice(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    fn sample() -> DocumentTopics {
        DocumentTopics {
            topic_nums: vec![vec![2, 0], vec![1]],
            topic_scores: vec![vec![0.7, 0.3], vec![0.9]],
            topic_words: vec![
                vec![words(&["gun", "rifle"]), words(&["solar"])],
                vec![words(&["knife"])],
            ],
            word_scores: vec![vec![vec![0.5, 0.4], vec![0.3]], vec![vec![0.8]]],
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate(2, 10, 3).is_ok());
    }

    #[test]
    fn test_validate_wrong_doc_count() {
        let result = sample().validate(3, 10, 3);
        assert!(matches!(result, Err(TopicFcaError::TopicModel(_))));
    }

    #[test]
    fn test_validate_topic_out_of_range() {
        let result = sample().validate(2, 10, 2);
        assert!(matches!(result, Err(TopicFcaError::TopicModel(_))));
    }

    #[test]
    fn test_validate_too_many_topics() {
        let result = sample().validate(2, 1, 3);
        assert!(matches!(result, Err(TopicFcaError::TopicModel(_))));
    }

    #[test]
    fn test_assignments() {
        let topics = sample();
        let first: Vec<_> = topics.assignments(0).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].topic_id, 2);
        assert_eq!(first[0].words, &words(&["gun", "rifle"])[..]);
        assert_eq!(first[1].topic_id, 0);
        assert_eq!(topics.assignments(1).count(), 1);
    }

    #[test]
    fn test_repeated_topic_keeps_first_entry() {
        let topics = DocumentTopics {
            topic_nums: vec![vec![1, 0, 1]],
            topic_scores: vec![vec![0.6, 0.3, 0.1]],
            topic_words: vec![vec![words(&["a"]), words(&["b"]), words(&["c"])]],
            word_scores: vec![vec![vec![1.0], vec![1.0], vec![1.0]]],
        };
        let ids: Vec<(usize, f64)> = topics.assignments(0).map(|a| (a.topic_id, a.score)).collect();
        assert_eq!(ids, vec![(1, 0.6), (0, 0.3)]);
    }

    #[test]
    fn test_extracted_text_constructors() {
        assert!(ExtractedText::ok("hello").success);
        let failed = ExtractedText::failed("Error extracting text: encrypted");
        assert!(!failed.success);
        assert!(failed.text.contains("encrypted"));
    }
}
