//! Sensitive node classification
//!
//! Member accesses are classified by their static type. Identifiers are
//! classified by their static type when they have one, otherwise by the
//! named type they refer to (`Token` in `Token.Create()`).

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::semantic::{SemanticModel, SymbolRef, TypeId};
use crate::text::Span;
use crate::tree_sitter::syntax;

/// Syntactic shape of a classified node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    MemberAccess,
    Identifier,
}

/// Which resolution path flagged a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The expression's static type implements the marker
    ValueType,
    /// The name refers to a type that implements the marker
    NamedType,
}

/// A node eligible for classification
#[derive(Debug, Clone, Copy)]
pub enum CandidateNode<'a> {
    MemberAccess {
        node: Node<'a>,
        target_expr: Node<'a>,
        member_name: &'a str,
    },
    Identifier {
        node: Node<'a>,
        name: &'a str,
        is_type_placeholder: bool,
    },
}

impl<'a> CandidateNode<'a> {
    pub fn node(&self) -> Node<'a> {
        match self {
            CandidateNode::MemberAccess { node, .. } | CandidateNode::Identifier { node, .. } => {
                *node
            }
        }
    }

    pub fn span(&self) -> Span {
        let node = self.node();
        Span::from_bounds(node.start_byte(), node.end_byte())
    }
}

/// A node whose type implements the marker capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedNode {
    pub span: Span,
    pub kind: NodeKind,
    pub text: String,
    pub resolution: Resolution,
    /// Name of the type that implements the marker
    pub type_name: String,
}

/// Every candidate under `root`: member accesses first, then identifier
/// references, each in depth-first order
pub fn candidates<'a>(root: Node<'a>, source: &'a str) -> Vec<CandidateNode<'a>> {
    let mut member_accesses = Vec::new();
    let mut identifiers = Vec::new();

    walk(root, |node| match node.kind() {
        "member_access_expression" => {
            let Some(target_expr) = node.child_by_field_name("expression") else {
                return;
            };
            let member_name = node
                .child_by_field_name("name")
                .map(|name| syntax::text(name, source))
                .unwrap_or_default();
            member_accesses.push(CandidateNode::MemberAccess {
                node,
                target_expr,
                member_name,
            });
        }
        "identifier" | "implicit_type" if node.is_named() => {
            if syntax::is_declaration_name(node) {
                return;
            }
            identifiers.push(CandidateNode::Identifier {
                node,
                name: syntax::text(node, source),
                is_type_placeholder: syntax::is_type_placeholder(node, source),
            });
        }
        _ => {}
    });

    member_accesses.extend(identifiers);
    member_accesses
}

/// Classify every candidate under `root` against `marker`.
///
/// The same text range may be reported twice, once as a member access and
/// once as its trailing name.
pub fn classify<'a>(model: &SemanticModel<'a>, root: Node<'a>, marker: &str) -> Vec<ClassifiedNode> {
    let source = model.tree().source();
    let graph = model.graph();
    let implements = |ty: TypeId| graph.implements(ty, marker);

    let mut classified = Vec::new();
    for candidate in candidates(root, source) {
        let found = match candidate {
            CandidateNode::MemberAccess { node, .. } => model
                .type_of(node)
                .filter(|&ty| implements(ty))
                .map(|ty| (ty, NodeKind::MemberAccess, Resolution::ValueType)),
            CandidateNode::Identifier {
                is_type_placeholder: true,
                ..
            } => None,
            CandidateNode::Identifier { node, .. } => match model.type_of(node) {
                Some(ty) => implements(ty).then_some((ty, NodeKind::Identifier, Resolution::ValueType)),
                None => match model.symbol_of(node) {
                    Some(SymbolRef::NamedType(ty)) if implements(ty) => {
                        Some((ty, NodeKind::Identifier, Resolution::NamedType))
                    }
                    _ => None,
                },
            },
        };

        if let Some((ty, kind, resolution)) = found {
            let node = candidate.node();
            classified.push(ClassifiedNode {
                span: candidate.span(),
                kind,
                text: syntax::text(node, source).to_string(),
                resolution,
                type_name: graph.name(ty).unwrap_or_default().to_string(),
            });
        }
    }

    tracing::trace!(count = classified.len(), "classified sensitive nodes");
    classified
}

/// Pre-order walk over every node under `root`
fn walk<'a>(root: Node<'a>, mut visit: impl FnMut(Node<'a>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}
