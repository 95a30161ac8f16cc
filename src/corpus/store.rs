//! Document store collaborator and a file-system backed implementation

use super::models::{DocId, ExtractedText};
use crate::error::{Result, TopicFcaError};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of documents and their text.
pub trait DocumentStore: Send + Sync {
    /// Recursively enumerate the document files below `base`
    fn scan(&self, base: &Path) -> Result<Box<dyn Iterator<Item = Result<PathBuf>> + '_>>;

    fn extract_text(&self, path: &Path, find_caption: bool) -> ExtractedText;

    /// Id of the document in the topic model's id space
    fn document_id(&self, path: &Path) -> Option<DocId>;

    /// Hex SHA-256 of the document content, if known
    fn content_hash(&self, _path: &Path) -> Option<String> {
        None
    }

    /// Bulk retrieval of all document texts in id order.
    ///
    /// Remote stores page through a server-side cursor that may expire; an
    /// error item ends the iteration and a full re-iteration is the only
    /// recovery.
    fn scroll_texts(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>>;
}

/// Materialize every text of the store, propagating the first error
pub fn collect_corpus<S: DocumentStore + ?Sized>(store: &S) -> Result<Vec<String>> {
    let texts = store.scroll_texts()?.collect::<Result<Vec<_>>>()?;
    info!("Loaded {} texts from document store", texts.len());
    Ok(texts)
}

/// Text extractor for one file extension
pub type Extractor = Arc<dyn Fn(&Path, bool) -> ExtractedText + Send + Sync>;

#[derive(Debug, Clone)]
struct IndexedFile {
    sha256: String,
}

/// Document store over a directory tree.
///
/// Files whose name matches one of the glob patterns are indexed in path
/// order; a document's id is its position in that order. Plain-text files are
/// read directly; other formats need an extractor registered with
/// [`FileSystemStore::with_extractor`] and otherwise report a failed
/// extraction.
pub struct FileSystemStore {
    root: PathBuf,
    patterns: Vec<glob::Pattern>,
    documents: IndexMap<PathBuf, IndexedFile>,
    extractors: HashMap<String, Extractor>,
}

impl FileSystemStore {
    /// Index every matching file below `root`
    pub fn open(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let root = root.into();
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| TopicFcaError::Config(format!("invalid file pattern {:?}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut store = Self {
            root,
            patterns,
            documents: IndexMap::new(),
            extractors: HashMap::new(),
        };

        let files = store.matching_files(&store.root)?;
        for path in files {
            let sha256 = hash_file(&path)?;
            store.documents.insert(path, IndexedFile { sha256 });
        }

        info!(
            "Indexed {} documents below {}",
            store.documents.len(),
            store.root.display()
        );

        Ok(store)
    }

    /// Register an extractor for files with the given extension
    pub fn with_extractor(mut self, extension: &str, extractor: Extractor) -> Self {
        self.extractors.insert(extension.to_lowercase(), extractor);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| {
                let name = name.to_string_lossy();
                self.patterns.iter().any(|p| p.matches(&name))
            })
            .unwrap_or(false)
    }

    fn matching_files(&self, base: &Path) -> Result<Vec<PathBuf>> {
        Ok(walk_tree(base)?
            .into_iter()
            .filter(|p| p.is_file() && self.matches(p))
            .collect())
    }
}

impl DocumentStore for FileSystemStore {
    fn scan(&self, base: &Path) -> Result<Box<dyn Iterator<Item = Result<PathBuf>> + '_>> {
        let files = self.matching_files(base)?;
        Ok(Box::new(files.into_iter().map(Ok)))
    }

    fn extract_text(&self, path: &Path, find_caption: bool) -> ExtractedText {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if let Some(extractor) = self.extractors.get(&extension) {
            return extractor(path, find_caption);
        }

        match extension.as_str() {
            "txt" | "md" => match std::fs::read(path) {
                Ok(bytes) => ExtractedText::ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    ExtractedText::failed(format!("Error extracting text from {}: {}", path.display(), e))
                }
            },
            other => {
                debug!("No extractor for {}", path.display());
                ExtractedText::failed(format!(
                    "No text extractor registered for '{}' files (captioning requested: {})",
                    other, find_caption
                ))
            }
        }
    }

    fn document_id(&self, path: &Path) -> Option<DocId> {
        self.documents.get_index_of(path)
    }

    fn content_hash(&self, path: &Path) -> Option<String> {
        self.documents.get(path).map(|f| f.sha256.clone())
    }

    fn scroll_texts(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        let iter = self
            .documents
            .keys()
            .map(move |path| Ok(self.extract_text(path, false).text));
        Ok(Box::new(iter))
    }
}

/// Every path below `base` (files and directories, `base` excluded), sorted
/// so that parents precede their children and siblings are in name order
pub fn walk_tree(base: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&base.to_string_lossy()).trim_end_matches('/')
    );
    let mut paths = Vec::new();
    let entries = glob::glob(&pattern)
        .map_err(|e| TopicFcaError::DocumentStore(format!("Failed to scan {}: {}", base.display(), e)))?;
    for entry in entries {
        let path = entry.map_err(|e| TopicFcaError::DocumentStore(format!("Failed to scan {}: {}", base.display(), e)))?;
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}

/// Hex SHA-256 of a file's content
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
