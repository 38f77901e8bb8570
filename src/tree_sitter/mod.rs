//! Tree-sitter integration
//!
//! Parses C# documents with the native tree-sitter grammar and extracts the
//! type declarations (names, base lists, members) the semantic layer builds
//! its type graph from.

mod declarations;
mod parser;
pub(crate) mod syntax;

pub use declarations::{extract_type_declarations, MemberDecl, MemberKind, TypeDecl, TypeKind};
pub use parser::{CSharpParser, ParseError, SyntaxTree, COMPILATION_UNIT};
