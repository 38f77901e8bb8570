//! Directory-backed document provider

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ignore::WalkBuilder;

use crate::config::MarkerConfig;
use crate::text::{BufferId, Snapshot, TextBuffer};

use super::document::{DocumentId, DocumentProvider, ProjectDocuments, SourceDocument};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to walk project: {0}")]
    Walk(#[from] ignore::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

struct OpenBuffer {
    document: DocumentId,
    buffer: Arc<TextBuffer>,
}

/// Provider treating one directory tree as the project
///
/// Source files are read from disk on every scan; open buffers replace
/// their on-disk text with the current snapshot.
pub struct DirectoryProvider {
    root: PathBuf,
    extensions: Vec<String>,
    respect_gitignore: bool,
    open: Mutex<HashMap<BufferId, OpenBuffer>>,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>, config: &MarkerConfig) -> Self {
        Self {
            root: root.into(),
            extensions: config
                .file_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            respect_gitignore: config.respect_gitignore,
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Track an editor buffer showing `relative_path` under the root
    pub fn open_buffer(&self, buffer: Arc<TextBuffer>, relative_path: &str) {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        open.insert(
            buffer.id(),
            OpenBuffer {
                document: DocumentId::new(relative_path),
                buffer,
            },
        );
    }

    pub fn close_buffer(&self, buffer: BufferId) -> bool {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        open.remove(&buffer).is_some()
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Read every source file under the root
    ///
    /// Only a missing or unreadable root is an error. Entries that cannot be
    /// walked or read are skipped, and files that are not valid UTF-8 are
    /// decoded lossily.
    pub fn collect_documents(&self) -> Result<Vec<SourceDocument>, ProviderError> {
        fs::read_dir(&self.root).map_err(|source| ProviderError::Io {
            path: self.root.clone(),
            source,
        })?;

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            // Honour .gitignore even outside a git checkout
            .require_git(false)
            .build();

        let mut documents = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %ProviderError::from(e), "skipping project entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|ft| ft.is_file()) || !self.is_source_file(path) {
                continue;
            }

            let Some(text) = read_source(path) else {
                continue;
            };
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            documents.push(SourceDocument::new(
                DocumentId::new(relative.to_string_lossy()),
                0,
                text,
            ));
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }
}

fn read_source(path: &Path) -> Option<String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(source) => {
            let error = ProviderError::Io {
                path: path.to_path_buf(),
                source,
            };
            tracing::debug!(error = %error, "skipping unreadable source file");
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::debug!(path = %path.display(), "source file is not UTF-8, decoding lossily");
            Some(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

impl DocumentProvider for DirectoryProvider {
    fn project_for(&self, snapshot: &Snapshot) -> Option<ProjectDocuments> {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let active = open.get(&snapshot.buffer_id())?.document.clone();

        let mut documents = match self.collect_documents() {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "failed to collect project documents");
                return None;
            }
        };

        for (id, entry) in open.iter() {
            let document = if *id == snapshot.buffer_id() {
                SourceDocument::from_snapshot(entry.document.clone(), snapshot)
            } else {
                SourceDocument::from_snapshot(entry.document.clone(), &entry.buffer.current_snapshot())
            };
            match documents.iter_mut().find(|d| d.id == document.id) {
                Some(existing) => *existing = document,
                // Unsaved new files still belong to the project
                None => documents.push(document),
            }
        }

        let project = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string();

        Some(ProjectDocuments {
            project,
            active,
            documents,
        })
    }
}
