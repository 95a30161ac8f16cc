//! Per-subdirectory incidence pipeline
//!
//! Every subdirectory of the corpus goes through text extraction, a topic
//! model query, incidence building, thresholding, FIMI translation and the
//! term-topic incidence. Artifacts are written to a `.partial` working
//! directory that is renamed into place once the manifest is written, so an
//! existing output directory always holds a complete run.

use crate::config::{Config, TraversalOrder};
use crate::corpus::{walk_tree, CorpusDocument, DocId, DocumentStore, TopicModel};
use crate::error::TopicFcaError;
use crate::fca::ContextCodec;
use crate::incidence::{build_document_topic_incidence, build_term_topic_incidence, write_csv, write_topic_words, IncidenceBuilder};
use crate::metrics::METRICS;
use crate::pipeline::artifacts::{self, relative_label, Manifest, OutputLayout};
use crate::pipeline::lock::SubdirLock;
use crate::pipeline::state::{PipelineReport, SubdirOutcome, SubdirReport, SubdirStage};
use crate::telemetry::date_stamp;
use crate::threshold::ThresholdSelector;
use crate::time_stage;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Post-order comparison: a directory sorts after everything below it,
/// siblings stay in name order
fn children_first(a: &Path, b: &Path) -> Ordering {
    let mut left = a.components();
    let mut right = b.components();
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) if x == y => continue,
            (Some(x), Some(y)) => return x.cmp(&y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Runs the incidence pipeline over the subdirectories of a corpus
pub struct SubdirectoryIncidencePipeline<S: ?Sized, M: ?Sized> {
    store: Arc<S>,
    model: Arc<M>,
    config: Arc<Config>,
    run_id: String,
}

impl<S: ?Sized, M: ?Sized> Clone for SubdirectoryIncidencePipeline<S, M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            model: Arc::clone(&self.model),
            config: Arc::clone(&self.config),
            run_id: self.run_id.clone(),
        }
    }
}

impl<S, M> SubdirectoryIncidencePipeline<S, M>
where
    S: DocumentStore + ?Sized + 'static,
    M: TopicModel + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, model: Arc<M>, config: Config) -> Self {
        Self {
            store,
            model,
            config: Arc::new(config),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directories below `root` in traversal order. Excluded names prune
    /// their whole subtree, as does `save_root` when it lies inside `root`;
    /// `root` itself is not included.
    pub fn discover_subdirectories(&self, root: &Path, save_root: &Path) -> Result<Vec<PathBuf>> {
        let pipeline = &self.config.pipeline;
        let bottom_up = pipeline.traversal == TraversalOrder::BottomUp;

        let output_relative = match (root.canonicalize(), save_root.canonicalize()) {
            (Ok(root), Ok(save_root)) => save_root.strip_prefix(&root).ok().map(Path::to_path_buf),
            _ => None,
        };
        if output_relative.as_ref().is_some_and(|rel| rel.as_os_str().is_empty()) {
            bail!("Output directory {} must not be the corpus root", save_root.display());
        }

        let mut subdirs: Vec<PathBuf> = walk_tree(root)
            .with_context(|| format!("Failed to walk {}", root.display()))?
            .into_iter()
            .filter(|path| path.is_dir())
            .filter(|path| {
                let relative = path.strip_prefix(root).unwrap_or(path);
                let in_output = output_relative.as_ref().is_some_and(|out| relative.starts_with(out));
                !in_output
                    && !relative.components().any(|c| {
                        let name = c.as_os_str().to_string_lossy();
                        pipeline.excluded_subdirs.iter().any(|x| *x == name)
                    })
            })
            .collect();

        if bottom_up {
            subdirs.sort_by(|a, b| children_first(a, b));
        }

        debug!(
            "Discovered {} subdirectories below {} ({:?})",
            subdirs.len(),
            root.display(),
            pipeline.traversal
        );
        Ok(subdirs)
    }

    /// Process every subdirectory of `root`, writing outputs below
    /// `save_root`. The token is checked before each subdirectory starts
    /// and between stages.
    pub async fn run(&self, root: &Path, save_root: &Path, cancel: CancellationToken) -> Result<PipelineReport> {
        let subdirs = self.discover_subdirectories(root, save_root)?;
        let stamp = self.config.pipeline.date_stamped_output.then(date_stamp);

        info!(
            "Run {}: {} subdirectories below {}, up to {} in parallel",
            self.run_id,
            subdirs.len(),
            root.display(),
            self.config.pipeline.max_parallel_subdirs
        );

        let layouts: Vec<OutputLayout> = subdirs
            .iter()
            .map(|s| OutputLayout::new(save_root, stamp.as_deref(), root, s))
            .collect();
        let mut outcomes: Vec<Option<SubdirOutcome>> = vec![None; subdirs.len()];

        let semaphore = Arc::new(Semaphore::new(self.config.pipeline.max_parallel_subdirs.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, subdir) in subdirs.iter().enumerate() {
            let permit = tokio::select! {
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit.filter(|_| !cancel.is_cancelled()) else {
                outcomes[idx] = Some(SubdirOutcome::Cancelled);
                continue;
            };

            let pipeline = self.clone();
            let root = root.to_path_buf();
            let subdir = subdir.clone();
            let layout = layouts[idx].clone();
            let cancel = cancel.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = match pipeline.process_subdirectory(&root, &subdir, &layout, &cancel) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Subdirectory {} failed: {:#}", subdir.display(), e);
                        SubdirOutcome::Failed(format!("{:#}", e))
                    }
                };
                (idx, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => error!("Subdirectory task aborted: {}", e),
            }
        }

        let mut report = PipelineReport {
            run_id: self.run_id.clone(),
            subdirs: Vec::with_capacity(subdirs.len()),
        };
        for ((subdir, layout), outcome) in subdirs.into_iter().zip(layouts).zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| SubdirOutcome::Failed("task aborted".to_string()));
            METRICS.record_subdir(outcome.label());
            report.subdirs.push(SubdirReport {
                subdir,
                output: layout.output,
                outcome,
            });
        }

        info!(
            "Run {} finished: {} completed, {} skipped, {} failed, {} cancelled",
            self.run_id,
            report.completed(),
            report.skipped(),
            report.failed(),
            report.cancelled()
        );
        Ok(report)
    }

    /// Process one subdirectory synchronously.
    ///
    /// Skips when the output already exists or another run holds the lock.
    pub fn process_subdirectory(
        &self,
        root: &Path,
        subdir: &Path,
        layout: &OutputLayout,
        cancel: &CancellationToken,
    ) -> Result<SubdirOutcome> {
        if layout.is_complete() {
            info!("Skipping {}: {} exists", subdir.display(), layout.output.display());
            return Ok(SubdirOutcome::Skipped("output exists".to_string()));
        }

        let Some(_lock) = SubdirLock::acquire(&layout.lock, &self.run_id, self.config.pipeline.stale_lock_after())
            .with_context(|| format!("Failed to lock {}", layout.lock.display()))?
        else {
            info!("Skipping {}: locked by another run", subdir.display());
            return Ok(SubdirOutcome::Skipped("locked by another run".to_string()));
        };

        // another run may have finished while we waited for the lock
        if layout.is_complete() {
            return Ok(SubdirOutcome::Skipped("output exists".to_string()));
        }

        if layout.partial.exists() {
            warn!("Removing stale working directory {}", layout.partial.display());
            std::fs::remove_dir_all(&layout.partial)
                .with_context(|| format!("Failed to remove {}", layout.partial.display()))?;
        }
        std::fs::create_dir_all(&layout.partial)
            .with_context(|| format!("Failed to create {}", layout.partial.display()))?;

        match self.run_stages(root, subdir, &layout.partial, cancel) {
            Ok(manifest) => {
                std::fs::rename(&layout.partial, &layout.output).with_context(|| {
                    format!(
                        "Failed to publish {} as {}",
                        layout.partial.display(),
                        layout.output.display()
                    )
                })?;
                info!(
                    "Finished {} with {} documents at threshold {:.4}",
                    subdir.display(),
                    manifest.documents,
                    manifest.threshold
                );
                Ok(SubdirOutcome::Completed)
            }
            Err(e) if matches!(e.downcast_ref::<TopicFcaError>(), Some(TopicFcaError::Cancelled)) => {
                info!("Cancelled {}, partial results kept in {}", subdir.display(), layout.partial.display());
                Ok(SubdirOutcome::Cancelled)
            }
            Err(e) => Err(e.context(format!("Subdirectory {}", subdir.display()))),
        }
    }

    fn run_stages(&self, root: &Path, subdir: &Path, work: &Path, cancel: &CancellationToken) -> Result<Manifest> {
        let started_at = Utc::now();
        let config = &self.config;
        let mut stage = SubdirStage::Pending;
        let mut stages = vec![stage];

        let mut advance = |stage: &mut SubdirStage| -> Result<()> {
            if cancel.is_cancelled() {
                return Err(TopicFcaError::Cancelled.into());
            }
            *stage = stage.next();
            stages.push(*stage);
            debug!("{}: entering {}", subdir.display(), stage);
            Ok(())
        };

        advance(&mut stage)?;
        let (documents, skipped_documents) = time_stage!(stage.as_str(), self.extract_documents(subdir))
            .with_context(|| format!("Stage {}", stage))?;
        write_json(&work.join(artifacts::DOCUMENTS), &documents)?;
        let doc_ids: Vec<DocId> = documents.iter().map(|d| d.id).collect();
        let failed_extractions = documents.iter().filter(|d| !d.success).count();

        advance(&mut stage)?;
        let builder = IncidenceBuilder::new(self.model.as_ref(), config.incidence.topics_per_doc);
        let topics = time_stage!(stage.as_str(), builder.query(&doc_ids)).with_context(|| format!("Stage {}", stage))?;
        write_json(&work.join(artifacts::DOC_TOPICS), &topics)?;

        advance(&mut stage)?;
        let num_topics = self.model.num_topics();
        let incidence = time_stage!(stage.as_str(), build_document_topic_incidence(&doc_ids, &topics, num_topics))
            .with_context(|| format!("Stage {}", stage))?;
        write_csv(&incidence, &work.join(artifacts::DOC_TOPIC_INCIDENCE))?;

        advance(&mut stage)?;
        let selector = ThresholdSelector::from_config(&config.threshold);
        let (search, normalized, binary) = time_stage!(stage.as_str(), selector.apply(&incidence));
        write_csv(&normalized, &work.join(artifacts::ROW_NORM_INCIDENCE))?;
        search.curve.write_json(&work.join(artifacts::DENSITY_CURVE))?;
        write_csv(&binary, &work.join(artifacts::THRES_INCIDENCE))?;

        advance(&mut stage)?;
        let codec = ContextCodec::from_config(&config.codec);
        let translate = || -> crate::error::Result<_> {
            let translated = binary.with_row_labels(documents.iter().map(|d| relative_label(root, &d.path)))?;
            write_csv(&translated, &work.join(artifacts::TRANSLATED_INCIDENCE))?;
            let context = codec.document_context(&binary)?;
            codec.export_fimi(&context, work, artifacts::DOC_TOPIC_FIMI_STEM)
        };
        time_stage!(stage.as_str(), translate()).with_context(|| format!("Stage {}", stage))?;

        advance(&mut stage)?;
        let vocabulary_size = self.model.vocabulary().len();
        let build_term_topic = || -> crate::error::Result<_> {
            let (term_topic, words) = build_term_topic_incidence(&topics, self.model.vocabulary(), num_topics)?;
            write_csv(&term_topic, &work.join(artifacts::TERM_TOPIC_INCIDENCE))?;
            if config.incidence.persist_topic_words {
                write_topic_words(&words, &work.join(artifacts::TOPIC_WORDS))?;
            }
            let context = codec.term_context(&term_topic)?;
            codec.export_fimi(&context, work, artifacts::TERM_TOPIC_FIMI_STEM)?;
            Ok(term_topic)
        };
        let term_topic = time_stage!(stage.as_str(), build_term_topic()).with_context(|| format!("Stage {}", stage))?;

        advance(&mut stage)?;
        let manifest = Manifest {
            run_id: self.run_id.clone(),
            subdir: subdir.to_path_buf(),
            stages,
            documents: documents.len(),
            failed_extractions,
            skipped_documents,
            num_topics,
            vocabulary_size,
            threshold: search.threshold,
            target_density: search.target_density,
            achieved_density: search.density,
            threshold_fell_back: search.fell_back,
            doc_topic_pairs: binary.count_true(),
            term_topic_pairs: term_topic.count_true(),
            started_at,
            finished_at: Utc::now(),
        };
        write_json(&work.join(artifacts::MANIFEST), &manifest)?;
        Ok(manifest)
    }

    /// Documents of `subdir` known to the store, with their text. Returns the
    /// documents and the number of files skipped for lacking an id.
    fn extract_documents(&self, subdir: &Path) -> crate::error::Result<(Vec<CorpusDocument>, usize)> {
        let pipeline = &self.config.pipeline;
        let mut documents = Vec::new();
        let mut skipped = 0;

        for path in self.store.scan(subdir)? {
            let path = path?;
            if !pipeline.recursive_documents && path.parent() != Some(subdir) {
                continue;
            }

            let Some(id) = self.store.document_id(&path) else {
                warn!("No document id for {}, skipping", path.display());
                skipped += 1;
                continue;
            };

            let extracted = self.store.extract_text(&path, pipeline.find_caption);
            METRICS.record_extraction(extracted.success);
            if !extracted.success {
                warn!("Text extraction failed for {}: {}", path.display(), extracted.text);
            }

            documents.push(CorpusDocument {
                id,
                sha256: self.store.content_hash(&path),
                path,
                success: extracted.success,
                text: extracted.text,
            });
        }

        info!("Extracted {} documents from {}", documents.len(), subdir.display());
        Ok((documents, skipped))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_first() {
        let mut paths: Vec<PathBuf> = ["r/a", "r/a/x", "r/a/x/deep", "r/b", "r/a/y"].iter().map(PathBuf::from).collect();
        paths.sort_by(|a, b| children_first(a, b));
        let expected: Vec<PathBuf> = ["r/a/x/deep", "r/a/x", "r/a/y", "r/a", "r/b"].iter().map(PathBuf::from).collect();
        assert_eq!(paths, expected);
    }
}
