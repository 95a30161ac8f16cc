//! Artifact names and output locations of a subdirectory run

use crate::pipeline::state::SubdirStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const DOCUMENTS: &str = "documents.json";
pub const DOC_TOPICS: &str = "doc_topics.json";
pub const DOC_TOPIC_INCIDENCE: &str = "doc_topic_incidence.csv";
pub const ROW_NORM_INCIDENCE: &str = "row_norm_doc_topic_incidence.csv";
pub const DENSITY_CURVE: &str = "density_curve.json";
pub const THRES_INCIDENCE: &str = "thres_row_norm_doc_topic_incidence.csv";
pub const TRANSLATED_INCIDENCE: &str = "translated_thres_row_norm_doc_topic_incidence.csv";
pub const DOC_TOPIC_FIMI_STEM: &str = "doc_topic";
pub const TERM_TOPIC_INCIDENCE: &str = "term_topic_incidence.csv";
pub const TOPIC_WORDS: &str = "topic_words.json";
pub const TERM_TOPIC_FIMI_STEM: &str = "term_topic";
pub const MANIFEST: &str = "manifest.json";

const PARTIAL_SUFFIX: &str = ".partial";
const LOCK_SUFFIX: &str = ".lock";
const FLATTEN_SEPARATOR: &str = "__";

/// Where one subdirectory writes its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Final directory; its existence means the subdirectory is done
    pub output: PathBuf,
    /// Working directory renamed to `output` on completion
    pub partial: PathBuf,
    pub lock: PathBuf,
}

impl OutputLayout {
    /// Layout for `subdir` below `corpus_root`. Relative path components are
    /// joined with `__` so nested subdirectories get sibling outputs.
    pub fn new(save_root: &Path, date_stamp: Option<&str>, corpus_root: &Path, subdir: &Path) -> Self {
        let base = match date_stamp {
            Some(stamp) => save_root.join(stamp),
            None => save_root.to_path_buf(),
        };
        let name = flatten_relative(corpus_root, subdir);
        Self {
            output: base.join(&name),
            partial: base.join(format!("{name}{PARTIAL_SUFFIX}")),
            lock: base.join(format!("{name}{LOCK_SUFFIX}")),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.output.is_dir()
    }
}

/// `a/b/c` relative to the corpus root becomes `a__b__c`.
///
/// Components are escaped so that distinct subdirectories never share an
/// output name: `%` becomes `%25`, and an underscore that is doubled or sits
/// at either end of a name becomes `%5F`. A lone inner underscore is kept,
/// so `Law_Firearms` stays readable while `a__b` flattens to `a%5F%5Fb`.
pub fn flatten_relative(corpus_root: &Path, subdir: &Path) -> String {
    let relative = subdir.strip_prefix(corpus_root).unwrap_or(subdir);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(escape_component(&part.to_string_lossy())),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        "root".to_string()
    } else {
        parts.join(FLATTEN_SEPARATOR)
    }
}

fn escape_component(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut escaped = String::with_capacity(name.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '%' => escaped.push_str("%25"),
            '_' => {
                let lone = i > 0 && i + 1 < chars.len() && chars[i - 1] != '_' && chars[i + 1] != '_';
                if lone {
                    escaped.push('_');
                } else {
                    escaped.push_str("%5F");
                }
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Path of a document relative to the corpus root, with `/` separators
pub fn relative_label(corpus_root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(corpus_root) else {
        return path.to_string_lossy().into_owned();
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Summary written last, before the working directory is published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub subdir: PathBuf,
    pub stages: Vec<SubdirStage>,
    pub documents: usize,
    pub failed_extractions: usize,
    pub skipped_documents: usize,
    pub num_topics: usize,
    pub vocabulary_size: usize,
    pub threshold: f64,
    pub target_density: f64,
    pub achieved_density: f64,
    pub threshold_fell_back: bool,
    pub doc_topic_pairs: usize,
    pub term_topic_pairs: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Manifest {
    pub fn read(dir: &Path) -> crate::error::Result<Self> {
        let file = std::fs::File::open(dir.join(MANIFEST))?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested() {
        let root = Path::new("/corpus");
        assert_eq!(flatten_relative(root, Path::new("/corpus/Energy")), "Energy");
        assert_eq!(flatten_relative(root, Path::new("/corpus/Energy/Solar")), "Energy__Solar");
        assert_eq!(flatten_relative(root, root), "root");
    }

    #[test]
    fn test_flatten_keeps_names_distinct() {
        let root = Path::new("/corpus");
        let nested = flatten_relative(root, Path::new("/corpus/a/b"));
        let sibling = flatten_relative(root, Path::new("/corpus/a__b"));
        assert_eq!(nested, "a__b");
        assert_eq!(sibling, "a%5F%5Fb");

        assert_eq!(flatten_relative(root, Path::new("/corpus/Law_Firearms")), "Law_Firearms");
        assert_ne!(
            flatten_relative(root, Path::new("/corpus/a_/b")),
            flatten_relative(root, Path::new("/corpus/a/_b"))
        );
        assert_eq!(flatten_relative(root, Path::new("/corpus/100%5F")), "100%255F");
    }

    #[test]
    fn test_layout_with_date() {
        let layout = OutputLayout::new(
            Path::new("/out"),
            Some("10_19_26"),
            Path::new("/corpus"),
            Path::new("/corpus/Energy/Solar"),
        );
        assert_eq!(layout.output, PathBuf::from("/out/10_19_26/Energy__Solar"));
        assert_eq!(layout.partial, PathBuf::from("/out/10_19_26/Energy__Solar.partial"));
        assert_eq!(layout.lock, PathBuf::from("/out/10_19_26/Energy__Solar.lock"));
    }

    #[test]
    fn test_layout_without_date() {
        let layout = OutputLayout::new(Path::new("/out"), None, Path::new("/corpus"), Path::new("/corpus/Weapons"));
        assert_eq!(layout.output, PathBuf::from("/out/Weapons"));
        assert!(!layout.is_complete());
    }

    #[test]
    fn test_relative_label() {
        let root = Path::new("/corpus");
        assert_eq!(relative_label(root, Path::new("/corpus/Energy/a.txt")), "Energy/a.txt");
        assert_eq!(relative_label(root, Path::new("/elsewhere/b.txt")), "/elsewhere/b.txt");
    }
}
