//! Type declaration extraction from parsed C# trees
//!
//! Collects every class, struct, interface, record and enum together with
//! its base list and its typed members. The same shapes are used for the
//! reference manifests, so source and library types meet in one graph.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use super::parser::SyntaxTree;
use super::syntax::{self, named_children, text, type_name_of};

/// Kinds of type declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Record,
    Enum,
}

impl TypeKind {
    fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "class_declaration" => Some(TypeKind::Class),
            "struct_declaration" | "record_struct_declaration" => Some(TypeKind::Struct),
            "interface_declaration" => Some(TypeKind::Interface),
            "record_declaration" => Some(TypeKind::Record),
            "enum_declaration" => Some(TypeKind::Enum),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Record => "record",
            TypeKind::Enum => "enum",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TypeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class" => Ok(TypeKind::Class),
            "struct" => Ok(TypeKind::Struct),
            "interface" => Ok(TypeKind::Interface),
            "record" => Ok(TypeKind::Record),
            "enum" => Ok(TypeKind::Enum),
            _ => Err(format!("Unknown type kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Field,
    Property,
    Method,
}

/// A typed member of a declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDecl {
    pub name: String,
    pub kind: MemberKind,
    /// Field or property type, or method return type; `None` for `void`
    /// and for types the extractor cannot name
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub is_static: bool,
}

impl MemberDecl {
    pub fn new(name: impl Into<String>, kind: MemberKind, type_name: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: type_name.map(str::to_string),
            is_static: false,
        }
    }
}

/// A declared type with the simple names of its bases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Base class and implemented interfaces, in declaration order
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            namespace: None,
            bases: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn with_bases<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bases.extend(bases.into_iter().map(Into::into));
        self
    }

    pub fn with_member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }

    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Extract all type declarations from a tree, nested types included
pub fn extract_type_declarations(tree: &SyntaxTree) -> Vec<TypeDecl> {
    let mut decls = Vec::new();
    collect(tree.root(), tree.source(), &mut decls);
    decls
}

fn collect(node: Node<'_>, source: &str, decls: &mut Vec<TypeDecl>) {
    if let Some(decl) = declaration_from_node(node, source) {
        decls.push(decl);
    }
    for child in named_children(node) {
        collect(child, source, decls);
    }
}

fn declaration_from_node(node: Node<'_>, source: &str) -> Option<TypeDecl> {
    let kind = TypeKind::from_node_kind(node.kind())?;
    let name = text(node.child_by_field_name("name")?, source).to_string();

    let mut decl = TypeDecl::new(name, kind);
    decl.namespace = namespace_of(node, source);

    // An enum's base list names its storage type, not a supertype
    if kind != TypeKind::Enum {
        if let Some(base_list) = syntax::child_of_kind(node, "base_list") {
            decl.bases = named_children(base_list)
                .filter_map(|base| type_name_of(base, source))
                .collect();
        }
        if let Some(parameters) = syntax::child_of_kind(node, "parameter_list") {
            // Positional record parameters become properties
            decl.members.extend(parameter_members(parameters, source));
        }
        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(body) {
                decl.members.extend(members_from_node(member, source));
            }
        }
    }

    Some(decl)
}

fn parameter_members(parameters: Node<'_>, source: &str) -> Vec<MemberDecl> {
    named_children(parameters)
        .filter(|p| p.kind() == "parameter")
        .filter_map(|p| {
            let name = text(p.child_by_field_name("name")?, source);
            let type_name = p
                .child_by_field_name("type")
                .and_then(|t| type_name_of(t, source));
            Some(MemberDecl::new(name, MemberKind::Property, type_name.as_deref()))
        })
        .collect()
}

fn members_from_node(node: Node<'_>, source: &str) -> Vec<MemberDecl> {
    let is_static = syntax::has_modifier(node, source, "static");
    let mut members = match node.kind() {
        "field_declaration" => {
            let Some(declaration) = syntax::child_of_kind(node, "variable_declaration") else {
                return Vec::new();
            };
            let type_name = declaration
                .child_by_field_name("type")
                .and_then(|t| type_name_of(t, source));
            named_children(declaration)
                .filter(|d| d.kind() == "variable_declarator")
                .filter_map(syntax::declarator_name)
                .map(|name| {
                    MemberDecl::new(text(name, source), MemberKind::Field, type_name.as_deref())
                })
                .collect()
        }
        "property_declaration" => {
            let Some(name) = node.child_by_field_name("name") else {
                return Vec::new();
            };
            let type_name = node
                .child_by_field_name("type")
                .and_then(|t| type_name_of(t, source));
            vec![MemberDecl::new(
                text(name, source),
                MemberKind::Property,
                type_name.as_deref(),
            )]
        }
        "method_declaration" => {
            let Some(name) = node.child_by_field_name("name") else {
                return Vec::new();
            };
            let returns = node
                .child_by_field_name("returns")
                .or_else(|| node.child_by_field_name("type"))
                .and_then(|t| type_name_of(t, source));
            vec![MemberDecl::new(
                text(name, source),
                MemberKind::Method,
                returns.as_deref(),
            )]
        }
        _ => Vec::new(),
    };
    for member in &mut members {
        member.is_static = is_static;
    }
    members
}

fn namespace_of(node: Node<'_>, source: &str) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if matches!(
            ancestor.kind(),
            "namespace_declaration" | "file_scoped_namespace_declaration"
        ) {
            if let Some(name) = ancestor.child_by_field_name("name") {
                parts.push(text(name, source).to_string());
            }
        }
        current = ancestor.parent();
    }
    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join("."))
}
