//! Concept reconstruction from candidate intents
//!
//! The two derivation operators of a formal context, with the usual
//! convention for empty sets: the empty intent is shared by every object and
//! the empty extent shares every attribute.

use super::context::{FormalContext, PositionSet};
use super::fimi::LabelMapping;
use crate::error::{Result, TopicFcaError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Extent/intent pair, both as positions in the context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    pub extent: PositionSet,
    pub intent: PositionSet,
}

/// Concept with object and attribute labels, the exported form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledConcept {
    pub extent: Vec<String>,
    pub intent: Vec<String>,
}

impl Concept {
    pub fn labeled(&self, context: &FormalContext) -> LabeledConcept {
        LabeledConcept {
            extent: context.object_labels(&self.extent),
            intent: context.attribute_labels(&self.intent),
        }
    }

    /// The intent is the closure of the extent and vice versa
    pub fn is_closed(&self, context: &FormalContext) -> bool {
        context.intent_closure_of(&self.extent) == self.intent && context.extent_of(&self.intent) == self.extent
    }
}

impl FormalContext {
    /// Objects having every attribute of `intent`; all objects when empty
    pub fn extent_of(&self, intent: &PositionSet) -> PositionSet {
        (0..self.n_objects())
            .filter(|&g| intent.is_subset(self.object_intent(g)))
            .collect()
    }

    /// Attributes shared by every object of `extent`; all attributes when empty
    pub fn intent_closure_of(&self, extent: &PositionSet) -> PositionSet {
        let mut shared: PositionSet = (0..self.n_attributes()).collect();
        for &g in extent {
            shared.retain(|m| self.object_intent(g).contains(m));
            if shared.is_empty() {
                break;
            }
        }
        shared
    }

    /// Close a candidate intent into a concept. The resulting intent may be
    /// larger than the candidate when the candidate was not closed.
    pub fn reconstruct_concept(&self, candidate: &PositionSet) -> Concept {
        let extent = self.extent_of(candidate);
        let intent = self.intent_closure_of(&extent);
        Concept { extent, intent }
    }

    /// One concept per candidate, in input order, duplicates kept
    pub fn concept_lattice(&self, candidates: &[PositionSet]) -> Vec<Concept> {
        candidates.iter().map(|c| self.reconstruct_concept(c)).collect()
    }
}

/// Concepts for itemsets mined from an integer FIMI export.
///
/// Integers are decoded through `mapping` to attribute labels; an integer
/// without a label or a label outside the context is an error.
pub fn concepts_from_mined_intents(
    context: &FormalContext,
    intents: &[Vec<usize>],
    mapping: &LabelMapping,
) -> Result<Vec<Concept>> {
    let candidates = intents
        .iter()
        .map(|items| {
            items
                .iter()
                .map(|&n| {
                    let label = mapping.decode(n)?;
                    context
                        .attributes()
                        .get_index_of(label)
                        .ok_or_else(|| TopicFcaError::UnknownAttribute(label.to_string()))
                })
                .collect::<Result<PositionSet>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let concepts = context.concept_lattice(&candidates);
    debug!("Reconstructed {} concepts from mined itemsets", concepts.len());
    Ok(concepts)
}

/// Export concepts with their labels as indented JSON
pub fn write_concepts_json(path: &Path, context: &FormalContext, concepts: &[Concept]) -> Result<()> {
    let labeled: Vec<LabeledConcept> = concepts.iter().map(|c| c.labeled(context)).collect();
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &labeled)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fca::fimi::relabel_to_integers;

    fn labels(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|l| l.to_string()).collect()
    }

    fn set(ps: &[usize]) -> PositionSet {
        ps.iter().copied().collect()
    }

    fn scenario_context() -> FormalContext {
        FormalContext::new(
            labels(&["doc_0", "doc_1"]),
            labels(&["topic_0"]),
            vec![("doc_0", "topic_0")],
        )
        .unwrap()
    }

    fn wider_context() -> FormalContext {
        FormalContext::new(
            labels(&["doc_0", "doc_1", "doc_2"]),
            labels(&["topic_0", "topic_1", "topic_2"]),
            vec![
                ("doc_0", "topic_0"),
                ("doc_0", "topic_1"),
                ("doc_1", "topic_0"),
                ("doc_1", "topic_1"),
                ("doc_1", "topic_2"),
                ("doc_2", "topic_2"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_closed_candidate_unchanged() {
        let ctx = scenario_context();
        let topic_0 = ctx.attribute_set(&["topic_0"]).unwrap();
        let doc_0 = ctx.object_set(&["doc_0"]).unwrap();

        assert_eq!(ctx.extent_of(&topic_0), doc_0);
        assert_eq!(ctx.intent_closure_of(&doc_0), topic_0);

        let concept = ctx.reconstruct_concept(&topic_0);
        assert_eq!(concept.extent, doc_0);
        assert_eq!(concept.intent, topic_0);
        assert!(concept.is_closed(&ctx));
    }

    #[test]
    fn test_empty_set_conventions() {
        let ctx = wider_context();
        assert_eq!(ctx.extent_of(&PositionSet::new()), set(&[0, 1, 2]));
        assert_eq!(ctx.intent_closure_of(&PositionSet::new()), set(&[0, 1, 2]));
    }

    #[test]
    fn test_unclosed_candidate_grows() {
        let ctx = wider_context();
        // topic_0 alone is always accompanied by topic_1
        let concept = ctx.reconstruct_concept(&set(&[0]));
        assert_eq!(concept.extent, set(&[0, 1]));
        assert_eq!(concept.intent, set(&[0, 1]));
    }

    #[test]
    fn test_unsatisfiable_intent() {
        let ctx = wider_context();
        let concept = ctx.reconstruct_concept(&set(&[0, 2]));
        assert_eq!(concept.extent, set(&[1]));
        assert_eq!(concept.intent, set(&[0, 1, 2]));
    }

    #[test]
    fn test_lattice_keeps_order_and_duplicates() {
        let ctx = wider_context();
        let concepts = ctx.concept_lattice(&[set(&[0]), set(&[2]), set(&[1])]);

        assert_eq!(concepts.len(), 3);
        assert_eq!(concepts[1].extent, set(&[1, 2]));
        assert_eq!(concepts[0], concepts[2]);
    }

    #[test]
    fn test_labeled() {
        let ctx = wider_context();
        let labeled = ctx.reconstruct_concept(&set(&[2])).labeled(&ctx);
        assert_eq!(labeled.extent, labels(&["doc_1", "doc_2"]));
        assert_eq!(labeled.intent, labels(&["topic_2"]));
    }

    #[test]
    fn test_concepts_from_mined_intents() {
        let ctx = wider_context();
        let (_, mapping) = relabel_to_integers(&["topic_2 topic_0", "topic_1"]);

        let concepts = concepts_from_mined_intents(&ctx, &[vec![2], vec![], vec![0]], &mapping).unwrap();
        assert_eq!(concepts[0].intent, set(&[0, 1]));
        assert_eq!(concepts[1].extent, set(&[0, 1, 2]));
        assert_eq!(concepts[2].extent, set(&[1, 2]));

        let result = concepts_from_mined_intents(&ctx, &[vec![9]], &mapping);
        assert!(matches!(result, Err(TopicFcaError::UnknownLabel(9))));
    }

    #[test]
    fn test_mined_label_outside_context() {
        let ctx = scenario_context();
        let (_, mapping) = relabel_to_integers(&["topic_8"]);
        let result = concepts_from_mined_intents(&ctx, &[vec![0]], &mapping);
        assert!(matches!(result, Err(TopicFcaError::UnknownAttribute(a)) if a == "topic_8"));
    }

    #[test]
    fn test_write_concepts_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concepts.json");
        let ctx = scenario_context();
        let concepts = ctx.concept_lattice(&[set(&[0])]);

        write_concepts_json(&path, &ctx, &concepts).unwrap();
        let back: Vec<LabeledConcept> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back[0].extent, labels(&["doc_0"]));
        assert_eq!(back[0].intent, labels(&["topic_0"]));
    }
}
