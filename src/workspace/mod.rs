//! Project snapshot loading
//!
//! Resolves the document behind a snapshot, then parses every document of
//! its project. Documents that do not parse are skipped so one bad file
//! never blanks out the whole project.

mod document;
mod fs_provider;
mod memory;

use std::sync::Arc;

pub use document::{DocumentId, DocumentProvider, ProjectDocuments, SourceDocument};
pub use fs_provider::{DirectoryProvider, ProviderError};
pub use memory::InMemoryProvider;

use crate::text::Snapshot;
use crate::tree_sitter::{CSharpParser, SyntaxTree};

/// Parsed trees of one project, with the active document singled out
#[derive(Debug)]
pub struct ProjectSnapshot {
    project: String,
    active: Arc<SyntaxTree>,
    trees: Vec<Arc<SyntaxTree>>,
    skipped: Vec<DocumentId>,
}

impl ProjectSnapshot {
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Tree of the document under the triggering view
    pub fn active(&self) -> &Arc<SyntaxTree> {
        &self.active
    }

    /// Every parsed tree of the project, the active one included
    pub fn trees(&self) -> &[Arc<SyntaxTree>] {
        &self.trees
    }

    /// Documents left out because they did not parse
    pub fn skipped(&self) -> &[DocumentId] {
        &self.skipped
    }
}

/// Load and parse the project owning `snapshot`.
///
/// Returns `None` when the snapshot has no owning document or the active
/// document itself cannot be parsed.
pub fn load_project_snapshot(
    provider: &dyn DocumentProvider,
    parser: &mut CSharpParser,
    snapshot: &Snapshot,
) -> Option<ProjectSnapshot> {
    let Some(project) = provider.project_for(snapshot) else {
        tracing::debug!(buffer = %snapshot.buffer_id(), "snapshot has no owning document");
        return None;
    };

    let mut trees = Vec::with_capacity(project.documents.len());
    let mut skipped = Vec::new();
    let mut active = None;

    for document in &project.documents {
        match parser.parse_document(document) {
            Ok(tree) => {
                let tree = Arc::new(tree);
                if document.id == project.active {
                    active = Some(Arc::clone(&tree));
                }
                trees.push(tree);
            }
            Err(e) => {
                tracing::debug!(document = %document.id, error = %e, "skipping document");
                skipped.push(document.id.clone());
            }
        }
    }

    let Some(active) = active else {
        tracing::debug!(document = %project.active, "active document did not parse");
        return None;
    };

    Some(ProjectSnapshot {
        project: project.project,
        active,
        trees,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextBuffer;

    fn provider_with(buffer: &Arc<TextBuffer>, siblings: &[(&str, &str)]) -> InMemoryProvider {
        let provider = InMemoryProvider::new();
        for (id, text) in siblings {
            provider.add_document("Vault", SourceDocument::new(*id, 0, *text));
        }
        provider.open_buffer(Arc::clone(buffer), "Vault", "Program.cs");
        provider
    }

    #[test]
    fn test_untracked_snapshot_loads_nothing() {
        let provider = InMemoryProvider::new();
        let buffer = TextBuffer::new("class A { }");
        let mut parser = CSharpParser::new().unwrap();

        let loaded = load_project_snapshot(&provider, &mut parser, &buffer.current_snapshot());
        assert!(loaded.is_none());
    }

    #[test]
    fn test_empty_sibling_is_skipped() {
        let buffer = Arc::new(TextBuffer::new("class Program { }"));
        let provider = provider_with(
            &buffer,
            &[("Empty.cs", ""), ("Token.cs", "class Token { }")],
        );
        let mut parser = CSharpParser::new().unwrap();

        let loaded =
            load_project_snapshot(&provider, &mut parser, &buffer.current_snapshot()).unwrap();

        assert_eq!(loaded.project(), "Vault");
        assert_eq!(loaded.trees().len(), 2);
        assert_eq!(loaded.skipped(), &[DocumentId::new("Empty.cs")]);
        assert_eq!(loaded.active().document().as_str(), "Program.cs");
    }

    #[test]
    fn test_empty_active_document_loads_nothing() {
        let buffer = Arc::new(TextBuffer::new(""));
        let provider = provider_with(&buffer, &[("Token.cs", "class Token { }")]);
        let mut parser = CSharpParser::new().unwrap();

        assert!(load_project_snapshot(&provider, &mut parser, &buffer.current_snapshot()).is_none());
    }
}
