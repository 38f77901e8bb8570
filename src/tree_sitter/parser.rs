//! C# parser management

use std::fmt;
use std::sync::Arc;

use tree_sitter::{Node, Parser, Tree};

use crate::workspace::{DocumentId, SourceDocument};

/// Kind of the root node of a well-formed C# file
pub const COMPILATION_UNIT: &str = "compilation_unit";

/// Error type for tree-sitter operations
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to initialize C# grammar: {0}")]
    LanguageInitFailed(String),

    #[error("document {0} is empty")]
    Empty(DocumentId),

    #[error("failed to parse {0}")]
    ParseFailed(DocumentId),
}

/// Immutable parse of one document at one version
pub struct SyntaxTree {
    document: DocumentId,
    version: u64,
    source: Arc<str>,
    tree: Tree,
}

impl SyntaxTree {
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Length of the parsed text in bytes
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn is_compilation_unit(&self) -> bool {
        self.root().kind() == COMPILATION_UNIT
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("document", &self.document)
            .field("version", &self.version)
            .field("len", &self.len())
            .finish()
    }
}

/// Tree-sitter parser for C# sources
///
/// Cheap to create; every scan owns one so scans never contend on it.
pub struct CSharpParser {
    parser: Parser,
}

impl CSharpParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .map_err(|e| ParseError::LanguageInitFailed(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Abort parses that take longer than `micros`; zero disables the limit
    pub fn with_timeout_micros(mut self, micros: u64) -> Self {
        self.parser.set_timeout_micros(micros);
        self
    }

    /// Parse a document. Empty documents and aborted parses are errors.
    pub fn parse_document(&mut self, document: &SourceDocument) -> Result<SyntaxTree, ParseError> {
        if document.text.is_empty() {
            return Err(ParseError::Empty(document.id.clone()));
        }

        let tree = self
            .parser
            .parse(document.text.as_bytes(), None)
            .ok_or_else(|| ParseError::ParseFailed(document.id.clone()))?;

        Ok(SyntaxTree {
            document: document.id.clone(),
            version: document.version,
            source: Arc::clone(&document.text),
            tree,
        })
    }
}
