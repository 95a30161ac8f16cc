//! Per-subdirectory stages and run outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stage reached by one subdirectory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubdirStage {
    Pending,
    TextExtracted,
    TopicQueried,
    IncidenceBuilt,
    Thresholded,
    Translated,
    TermTopicBuilt,
    Done,
}

impl Default for SubdirStage {
    fn default() -> Self {
        Self::Pending
    }
}

impl SubdirStage {
    /// Stage following this one; `Done` is terminal
    pub fn next(self) -> Self {
        match self {
            Self::Pending => Self::TextExtracted,
            Self::TextExtracted => Self::TopicQueried,
            Self::TopicQueried => Self::IncidenceBuilt,
            Self::IncidenceBuilt => Self::Thresholded,
            Self::Thresholded => Self::Translated,
            Self::Translated => Self::TermTopicBuilt,
            Self::TermTopicBuilt | Self::Done => Self::Done,
        }
    }

    pub fn is_done(self) -> bool {
        self == Self::Done
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::TextExtracted => "text_extracted",
            Self::TopicQueried => "topic_queried",
            Self::IncidenceBuilt => "incidence_built",
            Self::Thresholded => "thresholded",
            Self::Translated => "translated",
            Self::TermTopicBuilt => "term_topic_built",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for SubdirStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a subdirectory ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum SubdirOutcome {
    Completed,
    /// Output already present or another run holds the lock
    Skipped(String),
    Failed(String),
    Cancelled,
}

impl SubdirOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdirReport {
    pub subdir: PathBuf,
    pub output: PathBuf,
    pub outcome: SubdirOutcome,
}

/// Result of one pipeline run, one entry per subdirectory in traversal order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub subdirs: Vec<SubdirReport>,
}

impl PipelineReport {
    pub fn count(&self, label: &str) -> usize {
        self.subdirs.iter().filter(|s| s.outcome.label() == label).count()
    }

    pub fn completed(&self) -> usize {
        self.count("completed")
    }

    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    pub fn cancelled(&self) -> usize {
        self.count("cancelled")
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.cancelled() == 0
    }

    pub fn get(&self, subdir: &std::path::Path) -> Option<&SubdirReport> {
        self.subdirs.iter().find(|s| s.subdir == subdir)
    }
}
