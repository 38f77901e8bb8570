//! Semantic layer: references, type graph, compiled context and model

mod compilation;
mod model;
mod references;
mod types;

pub use compilation::{CompiledContext, ContextError};
pub use model::{ResolvedInfo, SemanticModel, SymbolRef};
pub use references::{
    core_library, FileReferenceResolver, ReferenceError, ReferenceLibrary, ReferenceResolver,
    ReferenceSpec, CORE_LIBRARY,
};
pub use types::{TypeGraph, TypeId, TypeOrigin};
