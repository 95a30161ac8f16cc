//! Configuration for the incidence pipeline
//!
//! Values come from (lowest to highest precedence): built-in defaults, an
//! optional TOML file, `.env`, and `TOPIC_FCA_*` environment variables using
//! `__` between section and key, e.g. `TOPIC_FCA_THRESHOLD__OPT_DENSITY=0.2`.

use crate::error::{Result, TopicFcaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub incidence: IncidenceConfig,

    #[serde(default)]
    pub threshold: ThresholdConfig,

    #[serde(default)]
    pub codec: CodecConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TOPIC_FCA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.incidence.topics_per_doc == 0 {
            return Err(TopicFcaError::Config(
                "incidence.topics_per_doc must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold.opt_density) {
            return Err(TopicFcaError::Config(format!(
                "threshold.opt_density must lie in [0, 1], got {}",
                self.threshold.opt_density
            )));
        }
        if self.threshold.grid_points < 2 {
            return Err(TopicFcaError::Config(format!(
                "threshold.grid_points must be at least 2, got {}",
                self.threshold.grid_points
            )));
        }
        if self.pipeline.max_parallel_subdirs == 0 {
            return Err(TopicFcaError::Config(
                "pipeline.max_parallel_subdirs must be at least 1".to_string(),
            ));
        }
        for (name, prefix) in [
            ("doc_prefix", &self.codec.doc_prefix),
            ("term_prefix", &self.codec.term_prefix),
            ("topic_prefix", &self.codec.topic_prefix),
        ] {
            if prefix.is_empty() {
                return Err(TopicFcaError::Config(format!("codec.{} must not be empty", name)));
            }
        }
        Ok(())
    }
}

/// Incidence building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidenceConfig {
    /// Topics requested per document from the topic model
    #[serde(default = "default_topics_per_doc")]
    pub topics_per_doc: usize,

    /// Persist the topic -> words union next to the term-topic incidence
    #[serde(default = "default_persist_topic_words")]
    pub persist_topic_words: bool,
}

fn default_topics_per_doc() -> usize {
    10
}

fn default_persist_topic_words() -> bool {
    true
}

impl Default for IncidenceConfig {
    fn default() -> Self {
        Self {
            topics_per_doc: default_topics_per_doc(),
            persist_topic_words: default_persist_topic_words(),
        }
    }
}

/// Density-driven threshold search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Target fraction of matrix entries above the threshold
    #[serde(default = "default_opt_density")]
    pub opt_density: f64,

    /// Number of evenly spaced thresholds sampled in [0, 1]
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,
}

fn default_opt_density() -> f64 {
    0.1
}

fn default_grid_points() -> usize {
    100
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            opt_density: default_opt_density(),
            grid_points: default_grid_points(),
        }
    }
}

/// Formal context and FIMI codec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default = "default_doc_prefix")]
    pub doc_prefix: String,

    #[serde(default = "default_term_prefix")]
    pub term_prefix: String,

    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Replace existing FIMI files instead of failing
    #[serde(default)]
    pub overwrite_fimi: bool,
}

fn default_doc_prefix() -> String {
    "doc_".to_string()
}

fn default_term_prefix() -> String {
    "term_".to_string()
}

fn default_topic_prefix() -> String {
    "topic_".to_string()
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            doc_prefix: default_doc_prefix(),
            term_prefix: default_term_prefix(),
            topic_prefix: default_topic_prefix(),
            overwrite_fimi: false,
        }
    }
}

/// Order in which subdirectories are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalOrder {
    /// Parents before their children
    TopDown,
    /// Children before their parents
    BottomUp,
}

impl Default for TraversalOrder {
    fn default() -> Self {
        Self::TopDown
    }
}

/// Per-subdirectory orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub traversal: TraversalOrder,

    /// Subdirectories processed concurrently
    #[serde(default = "default_max_parallel")]
    pub max_parallel_subdirs: usize,

    /// Directory names never processed
    #[serde(default)]
    pub excluded_subdirs: Vec<String>,

    /// Glob patterns (matched against file names) of documents to ingest
    #[serde(default = "default_file_patterns")]
    pub file_patterns: Vec<String>,

    /// Caption pages without extractable text
    #[serde(default = "default_find_caption")]
    pub find_caption: bool,

    /// Include files of nested directories in a subdirectory's documents
    #[serde(default)]
    pub recursive_documents: bool,

    /// Place outputs below a `mm_dd_yy` directory
    #[serde(default = "default_date_stamped")]
    pub date_stamped_output: bool,

    /// Age after which a lock left by a crashed run is reclaimed
    #[serde(default = "default_stale_lock_secs")]
    pub stale_lock_secs: u64,
}

fn default_max_parallel() -> usize {
    1
}

fn default_file_patterns() -> Vec<String> {
    ["*.pdf", "*.txt", "*.png", "*.jpg", "*.jpeg"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_find_caption() -> bool {
    true
}

fn default_date_stamped() -> bool {
    true
}

fn default_stale_lock_secs() -> u64 {
    3600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            traversal: TraversalOrder::default(),
            max_parallel_subdirs: default_max_parallel(),
            excluded_subdirs: vec![],
            file_patterns: default_file_patterns(),
            find_caption: default_find_caption(),
            recursive_documents: false,
            date_stamped_output: default_date_stamped(),
            stale_lock_secs: default_stale_lock_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }
}

/// Logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Directory for the date-stamped log file; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "run_topic_fca_".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_dir: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.incidence.topics_per_doc, 10);
        assert_eq!(config.threshold.opt_density, 0.1);
        assert_eq!(config.threshold.grid_points, 100);
        assert_eq!(config.codec.topic_prefix, "topic_");
        assert_eq!(config.pipeline.traversal, TraversalOrder::TopDown);
        assert!(!config.codec.overwrite_fimi);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = Config::from_toml_str(
            r#"
            [threshold]
            opt_density = 0.25

            [pipeline]
            traversal = "bottom_up"
            max_parallel_subdirs = 4
            excluded_subdirs = ["Robotics"]
            "#,
        )
        .unwrap();

        assert_eq!(config.threshold.opt_density, 0.25);
        assert_eq!(config.threshold.grid_points, 100);
        assert_eq!(config.pipeline.traversal, TraversalOrder::BottomUp);
        assert_eq!(config.pipeline.max_parallel_subdirs, 4);
        assert_eq!(config.pipeline.excluded_subdirs, vec!["Robotics".to_string()]);
        assert_eq!(config.incidence.topics_per_doc, 10);
    }

    #[test]
    fn test_invalid_density_rejected() {
        let result = Config::from_toml_str(
            r#"
            [threshold]
            opt_density = 1.5
            "#,
        );
        assert!(matches!(result, Err(TopicFcaError::Config(_))));
    }

    #[test]
    fn test_invalid_grid_rejected() {
        let mut config = Config::default();
        config.threshold.grid_points = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.codec.term_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stale_lock_duration() {
        let config = PipelineConfig::default();
        assert_eq!(config.stale_lock_after(), Duration::from_secs(3600));
    }
}
