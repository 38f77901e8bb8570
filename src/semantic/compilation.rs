//! Per-scan compiled context
//!
//! Built from scratch on every scan out of the project's syntax trees and
//! the resolved reference set. Nothing here outlives the scan.

use std::sync::Arc;

use crate::tree_sitter::{extract_type_declarations, SyntaxTree, COMPILATION_UNIT};
use crate::workspace::{DocumentId, ProjectSnapshot};

use super::model::SemanticModel;
use super::references::{ReferenceError, ReferenceResolver, ReferenceSpec};
use super::types::{TypeGraph, TypeOrigin};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to resolve reference: {0}")]
    Reference(#[from] ReferenceError),

    #[error("root of {document} is `{kind}`, expected `{COMPILATION_UNIT}`")]
    InvalidRoot { document: DocumentId, kind: String },
}

/// Type graph of one project plus the trees it was built from
#[derive(Debug)]
pub struct CompiledContext {
    project: String,
    graph: TypeGraph,
    active: Arc<SyntaxTree>,
    trees: Vec<Arc<SyntaxTree>>,
}

impl CompiledContext {
    /// Build the context. Every reference must resolve; source declarations
    /// are inserted before reference ones so they shadow them.
    pub fn build(
        project: &ProjectSnapshot,
        references: &[ReferenceSpec],
        resolver: &dyn ReferenceResolver,
    ) -> Result<Self, ContextError> {
        let active = Arc::clone(project.active());
        if !active.is_compilation_unit() {
            return Err(ContextError::InvalidRoot {
                document: active.document().clone(),
                kind: active.root().kind().to_string(),
            });
        }

        let libraries = references
            .iter()
            .map(|spec| resolver.resolve(spec))
            .collect::<Result<Vec<_>, _>>()?;

        let mut graph = TypeGraph::new();
        for tree in project.trees() {
            for decl in extract_type_declarations(tree) {
                graph.insert(decl, TypeOrigin::Source(tree.document().clone()));
            }
        }
        for library in libraries {
            for decl in library.types {
                graph.insert(decl, TypeOrigin::Reference(library.name.clone()));
            }
        }

        tracing::debug!(
            project = %project.project(),
            trees = project.trees().len(),
            types = graph.len(),
            "built compiled context"
        );

        Ok(Self {
            project: project.project().to_string(),
            graph,
            active,
            trees: project.trees().to_vec(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    pub fn active(&self) -> &Arc<SyntaxTree> {
        &self.active
    }

    pub fn trees(&self) -> &[Arc<SyntaxTree>] {
        &self.trees
    }

    /// Semantic model of the active document
    pub fn active_model(&self) -> SemanticModel<'_> {
        SemanticModel::new(&self.graph, &self.active)
    }

    /// Semantic model of any tree in this context
    pub fn semantic_model<'a>(&'a self, tree: &'a SyntaxTree) -> SemanticModel<'a> {
        SemanticModel::new(&self.graph, tree)
    }
}
