//! Formal Concept Analysis over binary incidences
//!
//! Formal contexts built from thresholded matrices, FIMI export for external
//! itemset miners with integer relabeling, and reconstruction of concepts
//! from mined candidate intents.

pub mod codec;
pub mod concept;
pub mod context;
pub mod fimi;

pub use codec::{ContextCodec, FimiExport};
pub use concept::{concepts_from_mined_intents, write_concepts_json, Concept, LabeledConcept};
pub use context::{context_to_matrix, matrix_to_context, FormalContext, PositionSet};
pub use fimi::{
    context_to_fimi, intents_from_fimi, mapping_path, read_fimi_lines, relabel_to_integers, write_fimi,
    LabelMapping,
};
