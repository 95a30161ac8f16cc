//! Conversions between incidence matrices, formal contexts and FIMI files
//! under the configured namespace prefixes

use super::concept::{concepts_from_mined_intents, Concept};
use super::context::{context_to_matrix, matrix_to_context, FormalContext};
use super::fimi::{
    context_to_fimi, intents_from_fimi, mapping_path, read_fimi_lines, relabel_to_integers, write_fimi,
    LabelMapping,
};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::incidence::IncidenceMatrix;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files written by one FIMI export
#[derive(Debug, Clone)]
pub struct FimiExport {
    /// `<stem>.fimi`, attribute labels
    pub fimi_path: PathBuf,
    /// `<stem>_as_integers.fimi`, input for the mining tool
    pub integer_path: PathBuf,
    /// `<stem>_as_integers_mapping.json`
    pub mapping_path: PathBuf,
    pub mapping: LabelMapping,
    pub lines: usize,
}

#[derive(Debug, Clone)]
pub struct ContextCodec {
    doc_prefix: String,
    term_prefix: String,
    topic_prefix: String,
    overwrite: bool,
}

impl ContextCodec {
    pub fn from_config(config: &CodecConfig) -> Self {
        Self {
            doc_prefix: config.doc_prefix.clone(),
            term_prefix: config.term_prefix.clone(),
            topic_prefix: config.topic_prefix.clone(),
            overwrite: config.overwrite_fimi,
        }
    }

    /// Documents x topics context
    pub fn document_context(&self, matrix: &IncidenceMatrix<bool>) -> Result<FormalContext> {
        matrix_to_context(matrix, &self.doc_prefix, &self.topic_prefix)
    }

    /// Terms x topics context
    pub fn term_context(&self, matrix: &IncidenceMatrix<bool>) -> Result<FormalContext> {
        matrix_to_context(matrix, &self.term_prefix, &self.topic_prefix)
    }

    pub fn document_matrix(&self, context: &FormalContext) -> Result<IncidenceMatrix<bool>> {
        context_to_matrix(context, &self.doc_prefix, &self.topic_prefix)
    }

    pub fn term_matrix(&self, context: &FormalContext) -> Result<IncidenceMatrix<bool>> {
        context_to_matrix(context, &self.term_prefix, &self.topic_prefix)
    }

    /// Write the label FIMI file, its integer relabeling and the mapping
    /// into `dir`, in context object order.
    pub fn export_fimi(&self, context: &FormalContext, dir: &Path, stem: &str) -> Result<FimiExport> {
        let lines = context_to_fimi::<String>(context, None)?;
        let fimi_path = dir.join(format!("{stem}.fimi"));
        write_fimi(&fimi_path, &lines, self.overwrite)?;

        let (integer_lines, mapping) = relabel_to_integers(&lines);
        let integer_path = dir.join(format!("{stem}_as_integers.fimi"));
        write_fimi(&integer_path, &integer_lines, self.overwrite)?;

        let mapping_path = mapping_path(&integer_path);
        mapping.write(&mapping_path)?;

        info!(
            "Exported {} objects with {} distinct attributes to {}",
            lines.len(),
            mapping.len(),
            integer_path.display()
        );

        Ok(FimiExport {
            fimi_path,
            integer_path,
            mapping_path,
            mapping,
            lines: lines.len(),
        })
    }

    /// Read itemsets mined from an integer export and close them into
    /// concepts of `context`
    pub fn import_concepts(&self, context: &FormalContext, mined_path: &Path, mapping_path: &Path) -> Result<Vec<Concept>> {
        let intents = intents_from_fimi(&read_fimi_lines(mined_path)?)?;
        let mapping = LabelMapping::read(mapping_path)?;
        concepts_from_mined_intents(context, &intents, &mapping)
    }
}

impl Default for ContextCodec {
    fn default() -> Self {
        Self::from_config(&CodecConfig::default())
    }
}
