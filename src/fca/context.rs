//! Formal context: objects, attributes and the relation between them

use crate::error::{Result, TopicFcaError};
use crate::incidence::{read_csv, IncidenceMatrix};
use indexmap::IndexSet;
use std::collections::BTreeSet;
use std::path::Path;

/// Attribute or object positions within a context
pub type PositionSet = BTreeSet<usize>;

/// Owned formal context.
///
/// Objects and attributes keep their insertion order; the relation is stored
/// as one sorted set of attribute positions per object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalContext {
    objects: IndexSet<String>,
    attributes: IndexSet<String>,
    intents: Vec<PositionSet>,
}

impl FormalContext {
    /// Build a context from object and attribute universes and related pairs.
    ///
    /// Pairs naming an object or attribute outside the universes are rejected.
    pub fn new<O, A, P, S1, S2>(objects: O, attributes: A, pairs: P) -> Result<Self>
    where
        O: IntoIterator<Item = String>,
        A: IntoIterator<Item = String>,
        P: IntoIterator<Item = (S1, S2)>,
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        let objects = unique(objects)?;
        let attributes = unique(attributes)?;
        let mut intents = vec![PositionSet::new(); objects.len()];

        for (object, attribute) in pairs {
            let (object, attribute) = (object.as_ref(), attribute.as_ref());
            let g = objects
                .get_index_of(object)
                .ok_or_else(|| TopicFcaError::UnknownObject(object.to_string()))?;
            let m = attributes
                .get_index_of(attribute)
                .ok_or_else(|| TopicFcaError::UnknownAttribute(attribute.to_string()))?;
            intents[g].insert(m);
        }

        Ok(Self {
            objects,
            attributes,
            intents,
        })
    }

    /// Read a binary incidence CSV and prefix its labels
    pub fn from_csv(path: &Path, row_prefix: &str, col_prefix: &str) -> Result<Self> {
        let matrix: IncidenceMatrix<bool> = read_csv(path)?;
        matrix_to_context(&matrix, row_prefix, col_prefix)
    }

    pub fn objects(&self) -> &IndexSet<String> {
        &self.objects
    }

    pub fn attributes(&self) -> &IndexSet<String> {
        &self.attributes
    }

    pub fn n_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn n_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Attribute positions of the object at position `object`
    pub fn object_intent(&self, object: usize) -> &PositionSet {
        &self.intents[object]
    }

    pub fn has(&self, object: &str, attribute: &str) -> bool {
        match (
            self.objects.get_index_of(object),
            self.attributes.get_index_of(attribute),
        ) {
            (Some(g), Some(m)) => self.intents[g].contains(&m),
            _ => false,
        }
    }

    /// Number of related pairs
    pub fn relation_size(&self) -> usize {
        self.intents.iter().map(|i| i.len()).sum()
    }

    /// Related (object, attribute) label pairs
    pub fn relation(&self) -> BTreeSet<(String, String)> {
        let mut pairs = BTreeSet::new();
        for (g, intent) in self.intents.iter().enumerate() {
            for &m in intent {
                if let (Some(object), Some(attribute)) =
                    (self.objects.get_index(g), self.attributes.get_index(m))
                {
                    pairs.insert((object.clone(), attribute.clone()));
                }
            }
        }
        pairs
    }

    /// Positions of the given attribute labels
    pub fn attribute_set<S: AsRef<str>>(&self, labels: &[S]) -> Result<PositionSet> {
        labels
            .iter()
            .map(|l| {
                let l = l.as_ref();
                self.attributes
                    .get_index_of(l)
                    .ok_or_else(|| TopicFcaError::UnknownAttribute(l.to_string()))
            })
            .collect()
    }

    /// Positions of the given object labels
    pub fn object_set<S: AsRef<str>>(&self, labels: &[S]) -> Result<PositionSet> {
        labels
            .iter()
            .map(|l| {
                let l = l.as_ref();
                self.objects
                    .get_index_of(l)
                    .ok_or_else(|| TopicFcaError::UnknownObject(l.to_string()))
            })
            .collect()
    }

    /// Labels of the attributes at the given positions
    pub fn attribute_labels(&self, set: &PositionSet) -> Vec<String> {
        set.iter()
            .filter_map(|&m| self.attributes.get_index(m).cloned())
            .collect()
    }

    /// Labels of the objects at the given positions
    pub fn object_labels(&self, set: &PositionSet) -> Vec<String> {
        set.iter()
            .filter_map(|&g| self.objects.get_index(g).cloned())
            .collect()
    }
}

/// Binary matrix to context: objects are `row_prefix + row label`,
/// attributes `col_prefix + column label`.
pub fn matrix_to_context(matrix: &IncidenceMatrix<bool>, row_prefix: &str, col_prefix: &str) -> Result<FormalContext> {
    let objects = unique(matrix.row_labels().iter().map(|l| format!("{row_prefix}{l}")))?;
    let attributes = unique(matrix.col_labels().iter().map(|l| format!("{col_prefix}{l}")))?;

    let intents = (0..matrix.nrows())
        .map(|r| {
            matrix
                .row(r)
                .iter()
                .enumerate()
                .filter(|(_, &v)| v)
                .map(|(c, _)| c)
                .collect()
        })
        .collect();

    Ok(FormalContext {
        objects,
        attributes,
        intents,
    })
}

/// Context back to a binary matrix, stripping the prefixes from labels that
/// carry them.
pub fn context_to_matrix(context: &FormalContext, row_prefix: &str, col_prefix: &str) -> Result<IncidenceMatrix<bool>> {
    let strip = |label: &String, prefix: &str| label.strip_prefix(prefix).unwrap_or(label).to_string();

    let mut matrix = IncidenceMatrix::filled(
        context.objects.iter().map(|l| strip(l, row_prefix)),
        context.attributes.iter().map(|l| strip(l, col_prefix)),
        false,
    )?;
    for (g, intent) in context.intents.iter().enumerate() {
        for &m in intent {
            matrix.set(g, m, true);
        }
    }
    Ok(matrix)
}

fn unique<I: IntoIterator<Item = String>>(labels: I) -> Result<IndexSet<String>> {
    let mut set = IndexSet::new();
    for label in labels {
        if let Some(dup) = set.replace(label) {
            return Err(TopicFcaError::DuplicateLabel(dup));
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|l| l.to_string()).collect()
    }

    fn sample_matrix() -> IncidenceMatrix<bool> {
        IncidenceMatrix::from_rows(
            labels(&["0", "1", "2"]),
            labels(&["0", "1"]),
            vec![vec![true, false], vec![false, false], vec![true, true]],
        )
        .unwrap()
    }

    #[test]
    fn test_new_from_pairs() {
        let ctx = FormalContext::new(
            labels(&["doc_0", "doc_1"]),
            labels(&["topic_0"]),
            vec![("doc_0", "topic_0")],
        )
        .unwrap();

        assert_eq!(ctx.n_objects(), 2);
        assert!(ctx.has("doc_0", "topic_0"));
        assert!(!ctx.has("doc_1", "topic_0"));
        assert!(!ctx.has("doc_9", "topic_0"));
        assert_eq!(ctx.relation_size(), 1);
    }

    #[test]
    fn test_new_rejects_unknown_labels() {
        let result = FormalContext::new(labels(&["doc_0"]), labels(&["topic_0"]), vec![("doc_0", "topic_7")]);
        assert!(matches!(result, Err(TopicFcaError::UnknownAttribute(a)) if a == "topic_7"));

        let result = FormalContext::new(labels(&["doc_0"]), labels(&["topic_0"]), vec![("doc_5", "topic_0")]);
        assert!(matches!(result, Err(TopicFcaError::UnknownObject(_))));
    }

    #[test]
    fn test_matrix_to_context_prefixes() {
        let ctx = matrix_to_context(&sample_matrix(), "doc_", "topic_").unwrap();

        assert_eq!(ctx.objects().get_index(2).unwrap(), "doc_2");
        assert_eq!(ctx.attributes().get_index(1).unwrap(), "topic_1");
        assert!(ctx.has("doc_2", "topic_1"));
        assert!(ctx.object_intent(1).is_empty());
        assert_eq!(ctx.relation_size(), 3);
    }

    #[test]
    fn test_context_roundtrip() {
        let m = sample_matrix();
        let ctx = matrix_to_context(&m, "term_", "topic_").unwrap();
        let back = context_to_matrix(&ctx, "term_", "topic_").unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_label_lookups() {
        let ctx = matrix_to_context(&sample_matrix(), "doc_", "topic_").unwrap();

        let set = ctx.attribute_set(&["topic_1", "topic_0"]).unwrap();
        assert_eq!(set, [0, 1].into_iter().collect());
        assert_eq!(ctx.attribute_labels(&set), labels(&["topic_0", "topic_1"]));
        assert!(ctx.attribute_set(&["topic_4"]).is_err());

        let objects = ctx.object_set(&["doc_2"]).unwrap();
        assert_eq!(ctx.object_labels(&objects), labels(&["doc_2"]));
    }

    #[test]
    fn test_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thres.csv");
        std::fs::write(&path, ",0,1\n4,1,0\n9,0,1\n").unwrap();

        let ctx = FormalContext::from_csv(&path, "doc_", "topic_").unwrap();
        assert!(ctx.has("doc_4", "topic_0"));
        assert!(ctx.has("doc_9", "topic_1"));
        assert_eq!(ctx.relation_size(), 2);
    }

    #[test]
    fn test_from_csv_reads_written_path_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translated.csv");
        let m = IncidenceMatrix::from_rows(
            labels(&["Law; Firearms/a.txt", "Law; Firearms/b.txt"]),
            labels(&["0"]),
            vec![vec![true], vec![false]],
        )
        .unwrap();
        crate::incidence::write_csv(&m, &path).unwrap();

        let ctx = FormalContext::from_csv(&path, "", "topic_").unwrap();
        assert!(ctx.has("Law; Firearms/a.txt", "topic_0"));
        assert_eq!(ctx.relation_size(), 1);
    }

    #[test]
    fn test_from_csv_rejects_scores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        std::fs::write(&path, ",0,1\n4,0.3,0.7\n").unwrap();

        let result = FormalContext::from_csv(&path, "doc_", "topic_");
        assert!(matches!(result, Err(TopicFcaError::NonBinaryEntry { .. })));
    }
}
