//! FIMI sparse-context files
//!
//! One line per object, the object's attributes separated by single spaces,
//! no header. Mining tools only accept integer items, so string lines are
//! relabeled to integers with a persisted label mapping.

use super::context::FormalContext;
use crate::error::{Result, TopicFcaError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tokens a mining tool may emit for an empty itemset
const EMPTY_TOKENS: &[&str] = &["", "None", "nil"];

/// One line per object of `order` (the context's object order when `None`)
/// listing the object's attribute labels in attribute order.
pub fn context_to_fimi<S: AsRef<str>>(context: &FormalContext, order: Option<&[S]>) -> Result<Vec<String>> {
    let positions: Vec<usize> = match order {
        Some(order) => order
            .iter()
            .map(|o| {
                let o = o.as_ref();
                context
                    .objects()
                    .get_index_of(o)
                    .ok_or_else(|| TopicFcaError::UnknownObject(o.to_string()))
            })
            .collect::<Result<_>>()?,
        None => (0..context.n_objects()).collect(),
    };

    Ok(positions
        .into_iter()
        .map(|g| context.attribute_labels(context.object_intent(g)).join(" "))
        .collect())
}

/// Write FIMI lines, each followed by a newline.
///
/// An existing file is an error unless `overwrite` is set.
pub fn write_fimi<S: AsRef<str>>(path: &Path, lines: &[S], overwrite: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let file = options.open(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => TopicFcaError::FimiExists(path.to_path_buf()),
        _ => TopicFcaError::Io(e),
    })?;

    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line.as_ref())?;
    }
    writer.flush()?;
    debug!("Wrote {} FIMI lines to {}", lines.len(), path.display());
    Ok(())
}

/// Read the lines of a FIMI file
pub fn read_fimi_lines(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    Ok(reader.lines().collect::<std::io::Result<_>>()?)
}

/// Label to integer assignment, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMapping {
    labels: IndexMap<String, usize>,
}

impl LabelMapping {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Integer of a label, assigning the next one on first sight
    fn assign(&mut self, label: &str) -> usize {
        if let Some(&n) = self.labels.get(label) {
            return n;
        }
        let n = self.labels.len();
        self.labels.insert(label.to_string(), n);
        n
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Label behind an integer
    pub fn decode(&self, n: usize) -> Result<&str> {
        match self.labels.get_index(n) {
            Some((label, &v)) if v == n => Ok(label.as_str()),
            _ => self
                .labels
                .iter()
                .find(|(_, &v)| v == n)
                .map(|(label, _)| label.as_str())
                .ok_or(TopicFcaError::UnknownLabel(n)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.labels.iter().map(|(l, &n)| (l.as_str(), n))
    }

    /// Persist as indented JSON `{ "<label>": <int>, ... }`
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Companion mapping file of an integer FIMI file: `<stem>_mapping.json`
pub fn mapping_path(fimi_path: &Path) -> PathBuf {
    let stem = fimi_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    fimi_path.with_file_name(format!("{stem}_mapping.json"))
}

/// Replace every label with an integer; distinct labels get consecutive
/// integers in the order they are first met scanning lines left to right.
pub fn relabel_to_integers<S: AsRef<str>>(lines: &[S]) -> (Vec<String>, LabelMapping) {
    let mut mapping = LabelMapping::default();
    let relabeled = lines
        .iter()
        .map(|line| {
            line.as_ref()
                .split_whitespace()
                .map(|label| mapping.assign(label).to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    (relabeled, mapping)
}

/// Parse integer itemsets, one per line.
///
/// Blank lines and lines holding only an empty-itemset token parse to an
/// empty itemset; any other non-integer token is an error.
pub fn intents_from_fimi<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Vec<usize>>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let tokens: Vec<&str> = line.as_ref().split_whitespace().collect();
            if tokens.is_empty() || (tokens.len() == 1 && EMPTY_TOKENS.contains(&tokens[0])) {
                return Ok(Vec::new());
            }
            tokens
                .into_iter()
                .map(|t| {
                    t.parse::<usize>().map_err(|_| TopicFcaError::MalformedFimi {
                        line: i + 1,
                        reason: format!("non-integer item {:?}", t),
                    })
                })
                .collect()
        })
        .collect()
}
