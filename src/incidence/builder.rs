//! Document-topic and term-topic incidence construction

use super::matrix::{index_labels, IncidenceMatrix};
use crate::corpus::{DocId, DocumentTopics, TopicModel};
use crate::error::{Result, TopicFcaError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Topic id -> sorted union of the words associated with that topic.
/// Only topics with at least one word are present.
pub type TopicWords = BTreeMap<usize, Vec<String>>;

/// Builds incidence matrices from topic model queries
pub struct IncidenceBuilder<'a, M: TopicModel + ?Sized> {
    model: &'a M,
    topics_per_doc: usize,
}

impl<'a, M: TopicModel + ?Sized> IncidenceBuilder<'a, M> {
    pub fn new(model: &'a M, topics_per_doc: usize) -> Self {
        Self {
            model,
            topics_per_doc,
        }
    }

    /// Query the model for the given documents and check the answer's shape
    pub fn query(&self, doc_ids: &[DocId]) -> Result<DocumentTopics> {
        if doc_ids.is_empty() {
            return Ok(DocumentTopics::default());
        }
        let topics = self.model.get_documents_topics(doc_ids, self.topics_per_doc)?;
        topics.validate(doc_ids.len(), self.topics_per_doc, self.model.num_topics())?;
        debug!("Obtained topics for {} documents", doc_ids.len());
        Ok(topics)
    }

    /// Query and build the real-valued document-topic matrix
    pub fn document_topic_incidence(&self, doc_ids: &[DocId]) -> Result<IncidenceMatrix<f64>> {
        let topics = self.query(doc_ids)?;
        build_document_topic_incidence(doc_ids, &topics, self.model.num_topics())
    }

    /// Query and build the binary term-topic matrix with its topic words
    pub fn term_topic_incidence(&self, doc_ids: &[DocId]) -> Result<(IncidenceMatrix<bool>, TopicWords)> {
        let topics = self.query(doc_ids)?;
        build_term_topic_incidence(&topics, self.model.vocabulary(), self.model.num_topics())
    }
}

/// Real-valued matrix: rows are `doc_ids` in input order, columns are all
/// topic ids `0..num_topics_total`. A cell holds the document's score for the
/// topic, or 0 when the topic was not among its assignments.
pub fn build_document_topic_incidence(
    doc_ids: &[DocId],
    topics: &DocumentTopics,
    num_topics_total: usize,
) -> Result<IncidenceMatrix<f64>> {
    if topics.len() != doc_ids.len() {
        return Err(TopicFcaError::DimensionMismatch {
            expected: doc_ids.len(),
            actual: topics.len(),
        });
    }

    let mut matrix = IncidenceMatrix::filled(
        doc_ids.iter().map(|id| id.to_string()),
        index_labels(num_topics_total),
        0.0,
    )?;

    for pos in 0..doc_ids.len() {
        for assignment in topics.assignments(pos) {
            if assignment.topic_id >= num_topics_total {
                return Err(TopicFcaError::TopicModel(format!(
                    "topic id {} out of range for a model with {} topics",
                    assignment.topic_id, num_topics_total
                )));
            }
            matrix.set(pos, assignment.topic_id, assignment.score);
        }
    }

    info!(
        "Built document-topic incidence: {} documents x {} topics",
        matrix.nrows(),
        matrix.ncols()
    );
    Ok(matrix)
}

/// Union, per topic, of the words the topic carried in each document where it
/// was assigned. Only the word list at the topic's own position counts.
pub fn topic_words(topics: &DocumentTopics, num_topics_total: usize) -> TopicWords {
    let mut sets: BTreeMap<usize, BTreeSet<&str>> = BTreeMap::new();
    for pos in 0..topics.len() {
        for assignment in topics.assignments(pos).filter(|a| a.topic_id < num_topics_total) {
            sets.entry(assignment.topic_id)
                .or_default()
                .extend(assignment.words.iter().map(String::as_str));
        }
    }

    sets.into_iter()
        .filter(|(_, words)| !words.is_empty())
        .map(|(topic_id, words)| (topic_id, words.into_iter().map(str::to_string).collect()))
        .collect()
}

/// Binary matrix: rows are the vocabulary terms in model order, columns are
/// topic ids; a cell is `true` iff the term is in the topic's word union.
pub fn build_term_topic_incidence(
    topics: &DocumentTopics,
    vocabulary: &[String],
    num_topics_total: usize,
) -> Result<(IncidenceMatrix<bool>, TopicWords)> {
    let words = topic_words(topics, num_topics_total);

    let mut matrix = IncidenceMatrix::filled(
        vocabulary.iter().cloned(),
        index_labels(num_topics_total),
        false,
    )?;

    for (&topic_id, terms) in &words {
        for term in terms {
            if let Some(row) = matrix.row_index(term) {
                matrix.set(row, topic_id, true);
            }
        }
    }

    info!(
        "Built term-topic incidence: {} terms x {} topics, {} topics with words",
        matrix.nrows(),
        matrix.ncols(),
        words.len()
    );
    Ok((matrix, words))
}

/// Persist topic words as indented JSON `{ "<topic_id>": [terms...] }`
pub fn write_topic_words(words: &TopicWords, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, words)?;
    debug!("Saved words of {} topics to {}", words.len(), path.display());
    Ok(())
}

/// Load topic words written by [`write_topic_words`]
pub fn read_topic_words(path: &Path) -> Result<TopicWords> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    struct FixedModel {
        vocabulary: Vec<String>,
        topics: DocumentTopics,
    }

    impl TopicModel for FixedModel {
        fn num_topics(&self) -> usize {
            3
        }

        fn vocabulary(&self) -> &[String] {
            &self.vocabulary
        }

        fn get_documents_topics(&self, doc_ids: &[DocId], _num_topics: usize) -> Result<DocumentTopics> {
            let mut out = DocumentTopics::default();
            for &id in doc_ids {
                out.topic_nums.push(self.topics.topic_nums[id].clone());
                out.topic_scores.push(self.topics.topic_scores[id].clone());
                out.topic_words.push(self.topics.topic_words[id].clone());
                out.word_scores.push(self.topics.word_scores[id].clone());
            }
            Ok(out)
        }
    }

    fn model() -> FixedModel {
        FixedModel {
            vocabulary: words(&["battery", "gun", "knife", "rifle", "solar"]),
            topics: DocumentTopics {
                topic_nums: vec![vec![2, 0], vec![0], vec![1, 2]],
                topic_scores: vec![vec![0.6, 0.3], vec![0.9], vec![0.5, 0.4]],
                topic_words: vec![
                    vec![words(&["solar", "battery"]), words(&["gun"])],
                    vec![words(&["rifle"])],
                    vec![words(&["knife"]), words(&["solar"])],
                ],
                word_scores: vec![
                    vec![vec![0.5, 0.4], vec![0.3]],
                    vec![vec![0.8]],
                    vec![vec![0.7], vec![0.6]],
                ],
            },
        }
    }

    #[test]
    fn test_document_topic_incidence() {
        let model = model();
        let builder = IncidenceBuilder::new(&model, 10);

        let m = builder.document_topic_incidence(&[2, 0]).unwrap();
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 3);
        assert_eq!(m.row_labels().get_index(0).unwrap(), "2");
        assert_eq!(m.row(0), &[0.0, 0.5, 0.4]);
        assert_eq!(m.row(1), &[0.3, 0.0, 0.6]);
    }

    #[test]
    fn test_empty_doc_ids() {
        let model = model();
        let builder = IncidenceBuilder::new(&model, 10);

        let m = builder.document_topic_incidence(&[]).unwrap();
        assert_eq!(m.nrows(), 0);
        assert_eq!(m.ncols(), 3);

        let (t, words) = builder.term_topic_incidence(&[]).unwrap();
        assert_eq!(t.nrows(), 5);
        assert_eq!(t.count_true(), 0);
        assert!(words.is_empty());
    }

    #[test]
    fn test_topic_words_use_matching_slice() {
        let model = model();
        let words_by_topic = topic_words(&model.topics, 3);

        assert_eq!(words_by_topic[&0], words(&["gun", "rifle"]));
        assert_eq!(words_by_topic[&1], words(&["knife"]));
        assert_eq!(words_by_topic[&2], words(&["battery", "solar"]));
    }

    #[test]
    fn test_term_topic_incidence() {
        let model = model();
        let builder = IncidenceBuilder::new(&model, 10);

        let (m, _) = builder.term_topic_incidence(&[0, 1, 2]).unwrap();
        assert_eq!(m.get_by_label("solar", "2"), Some(true));
        assert_eq!(m.get_by_label("solar", "0"), Some(false));
        assert_eq!(m.get_by_label("gun", "0"), Some(true));
        assert_eq!(m.get_by_label("knife", "1"), Some(true));
        assert_eq!(m.count_true(), 5);
    }

    #[test]
    fn test_topics_absent_from_subset_have_no_words() {
        let model = model();
        let builder = IncidenceBuilder::new(&model, 10);

        let (_, words_by_topic) = builder.term_topic_incidence(&[1]).unwrap();
        assert_eq!(words_by_topic.len(), 1);
        assert!(words_by_topic.contains_key(&0));
    }

    #[test]
    fn test_duplicate_topic_uses_first_score() {
        let topics = DocumentTopics {
            topic_nums: vec![vec![1, 1]],
            topic_scores: vec![vec![0.7, 0.2]],
            topic_words: vec![vec![words(&["a"]), words(&["b"])]],
            word_scores: vec![vec![vec![1.0], vec![1.0]]],
        };
        let m = build_document_topic_incidence(&[4], &topics, 2).unwrap();
        assert_eq!(m.row(0), &[0.0, 0.7]);
    }

    #[test]
    fn test_out_of_range_topic_rejected() {
        let topics = DocumentTopics {
            topic_nums: vec![vec![5]],
            topic_scores: vec![vec![0.7]],
            topic_words: vec![vec![words(&["a"])]],
            word_scores: vec![vec![vec![1.0]]],
        };
        let result = build_document_topic_incidence(&[0], &topics, 2);
        assert!(matches!(result, Err(TopicFcaError::TopicModel(_))));
    }

    #[test]
    fn test_mismatched_topics_rejected() {
        let result = build_document_topic_incidence(&[0, 1], &DocumentTopics::default(), 3);
        assert!(matches!(result, Err(TopicFcaError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_topic_words_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topic_words.json");
        let words_by_topic = topic_words(&model().topics, 3);

        write_topic_words(&words_by_topic, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"0\": ["));

        assert_eq!(read_topic_words(&path).unwrap(), words_by_topic);
    }
}
