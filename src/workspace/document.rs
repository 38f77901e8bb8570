use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::text::Snapshot;

/// Project-relative identity of a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(path: impl Into<String>) -> Self {
        // Normalize separators so ids match across platforms
        Self(path.into().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// A document's text at one version, as handed over by the host
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: DocumentId,
    pub version: u64,
    pub text: Arc<str>,
}

impl SourceDocument {
    pub fn new(id: impl Into<DocumentId>, version: u64, text: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            version,
            text: text.into(),
        }
    }

    /// The document as seen through an open editor snapshot
    pub fn from_snapshot(id: DocumentId, snapshot: &Snapshot) -> Self {
        Self {
            id,
            version: snapshot.version(),
            text: snapshot.shared_text(),
        }
    }
}

/// The owning project of a snapshot: its name, the active document and
/// every document in the project (the active one included)
#[derive(Debug, Clone)]
pub struct ProjectDocuments {
    pub project: String,
    pub active: DocumentId,
    pub documents: Vec<SourceDocument>,
}

/// Supplies the project a snapshot belongs to
///
/// Returning `None` means the snapshot is not tracked by any project; the
/// scan then classifies nothing.
pub trait DocumentProvider: Send + Sync {
    fn project_for(&self, snapshot: &Snapshot) -> Option<ProjectDocuments>;
}
