use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::text::{BufferId, Snapshot, TextBuffer};

use super::document::{DocumentId, DocumentProvider, ProjectDocuments, SourceDocument};

struct OpenBuffer {
    project: String,
    document: DocumentId,
    buffer: Arc<TextBuffer>,
}

/// Provider backed by documents the host pushes in
///
/// Closed documents are stored as plain text; open buffers are read
/// through their current snapshot so unsaved edits are always scanned.
pub struct InMemoryProvider {
    projects: Mutex<HashMap<String, Vec<SourceDocument>>>,
    open: Mutex<HashMap<BufferId, OpenBuffer>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            projects: Mutex::new(HashMap::new()),
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Add or replace a closed document
    pub fn add_document(&self, project: &str, document: SourceDocument) {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let docs = projects.entry(project.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
    }

    pub fn remove_document(&self, project: &str, id: &DocumentId) -> bool {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(docs) = projects.get_mut(project) else {
            return false;
        };
        let before = docs.len();
        docs.retain(|d| &d.id != id);
        docs.len() != before
    }

    /// Track an editor buffer as a document of `project`
    pub fn open_buffer(&self, buffer: Arc<TextBuffer>, project: &str, document: impl Into<DocumentId>) {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        open.insert(
            buffer.id(),
            OpenBuffer {
                project: project.to_string(),
                document: document.into(),
                buffer,
            },
        );
    }

    pub fn close_buffer(&self, buffer: BufferId) -> bool {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        open.remove(&buffer).is_some()
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProvider for InMemoryProvider {
    fn project_for(&self, snapshot: &Snapshot) -> Option<ProjectDocuments> {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let active = open.get(&snapshot.buffer_id())?;

        let mut documents: Vec<SourceDocument> = {
            let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
            projects.get(&active.project).cloned().unwrap_or_default()
        };

        for (id, entry) in open.iter().filter(|(_, e)| e.project == active.project) {
            let document = if *id == snapshot.buffer_id() {
                SourceDocument::from_snapshot(entry.document.clone(), snapshot)
            } else {
                SourceDocument::from_snapshot(entry.document.clone(), &entry.buffer.current_snapshot())
            };
            match documents.iter_mut().find(|d| d.id == document.id) {
                Some(existing) => *existing = document,
                None => documents.push(document),
            }
        }

        Some(ProjectDocuments {
            project: active.project.clone(),
            active: active.document.clone(),
            documents,
        })
    }
}
