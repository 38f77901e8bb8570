//! Semantic model over one syntax tree
//!
//! Answers two questions about a node: what static type does the expression
//! have, and what symbol does the name refer to. Names bind to the closest
//! local, parameter or member in scope; only when nothing binds does a name
//! resolve to a declared type.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use crate::tree_sitter::syntax::{self, child_of_kind, named_children, type_name_of};
use crate::tree_sitter::{MemberDecl, MemberKind, SyntaxTree};

use super::types::{TypeGraph, TypeId};

/// Deepest nesting of `type_of`/`symbol_of` calls before a node is left
/// unresolved
const MAX_NESTING: usize = 128;

/// What a name refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRef {
    NamedType(TypeId),
    Member {
        owner: TypeId,
        name: String,
        kind: MemberKind,
    },
    /// Local variable or local function, keyed by where its name is declared
    Local { name: String, offset: usize },
    Parameter { name: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInfo {
    Type(TypeId),
    Symbol(SymbolRef),
    Unresolved,
}

/// Declaration a name is bound to
#[derive(Clone, Copy)]
enum Binding<'a> {
    Local {
        name: Node<'a>,
        type_node: Option<Node<'a>>,
        initializer: Option<Node<'a>>,
    },
    LocalFunction {
        name: Node<'a>,
        returns: Option<Node<'a>>,
    },
    Parameter {
        name: Node<'a>,
        type_node: Option<Node<'a>>,
    },
    Member {
        owner: TypeId,
        member: &'a MemberDecl,
    },
}

pub struct SemanticModel<'a> {
    graph: &'a TypeGraph,
    tree: &'a SyntaxTree,
    source: &'a str,
    types: RefCell<HashMap<usize, Option<TypeId>>>,
    in_progress: RefCell<HashSet<usize>>,
    depth: Cell<usize>,
    nesting_reported: Cell<bool>,
}

impl<'a> SemanticModel<'a> {
    pub fn new(graph: &'a TypeGraph, tree: &'a SyntaxTree) -> Self {
        Self {
            graph,
            tree,
            source: tree.source(),
            types: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
            depth: Cell::new(0),
            nesting_reported: Cell::new(false),
        }
    }

    pub fn graph(&self) -> &'a TypeGraph {
        self.graph
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }

    pub fn root(&self) -> Node<'a> {
        self.tree.root()
    }

    pub fn text(&self, node: Node<'a>) -> &'a str {
        syntax::text(node, self.source)
    }

    /// Static type of an expression node
    pub fn type_of(&self, node: Node<'a>) -> Option<TypeId> {
        let key = node.id();
        if let Some(cached) = self.types.borrow().get(&key) {
            return *cached;
        }
        if self.in_progress.borrow().contains(&key) {
            // Self-referential initializer such as `var x = x.Next;`
            return None;
        }
        if !self.enter() {
            return None;
        }

        self.in_progress.borrow_mut().insert(key);
        self.type_receivers(node);
        let resolved = self.compute_type(node);
        self.in_progress.borrow_mut().remove(&key);
        self.types.borrow_mut().insert(key, resolved);

        self.leave();
        resolved
    }

    /// Symbol a name or member access refers to
    pub fn symbol_of(&self, node: Node<'a>) -> Option<SymbolRef> {
        if !self.enter() {
            return None;
        }
        let symbol = self.compute_symbol(node);
        self.leave();
        symbol
    }

    pub fn resolve(&self, node: Node<'a>) -> ResolvedInfo {
        if let Some(ty) = self.type_of(node) {
            return ResolvedInfo::Type(ty);
        }
        match self.symbol_of(node) {
            Some(symbol) => ResolvedInfo::Symbol(symbol),
            None => ResolvedInfo::Unresolved,
        }
    }

    fn enter(&self) -> bool {
        let depth = self.depth.get();
        if depth >= MAX_NESTING {
            if !self.nesting_reported.replace(true) {
                tracing::debug!(limit = MAX_NESTING, "expression nesting too deep, leaving it unresolved");
            }
            return false;
        }
        self.depth.set(depth + 1);
        true
    }

    fn leave(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }

    /// Type the receivers of a chain such as `a.B().C.D` innermost first, so
    /// each link finds its receiver already typed
    fn type_receivers(&self, node: Node<'a>) {
        let mut chain = Vec::new();
        let mut current = receiver_of(node);
        while let Some(receiver) = current {
            let key = receiver.id();
            if self.types.borrow().contains_key(&key) || self.in_progress.borrow().contains(&key) {
                break;
            }
            chain.push(receiver);
            current = receiver_of(receiver);
        }
        for receiver in chain.into_iter().rev() {
            self.type_of(receiver);
        }
    }

    fn compute_symbol(&self, node: Node<'a>) -> Option<SymbolRef> {
        match node.kind() {
            "identifier" | "generic_name" => {
                if let Some(outer) = self.outer_name_expression(node) {
                    return self.symbol_of(outer);
                }
                if let Some(binding) = self.bind_name(node) {
                    return Some(self.symbol_for(binding));
                }
                let name = self.name_text(node)?;
                self.graph.lookup(name).map(SymbolRef::NamedType)
            }
            "predefined_type" | "qualified_name" | "alias_qualified_name" | "nullable_type" => {
                self.type_named(node).map(SymbolRef::NamedType)
            }
            "member_access_expression" => self.symbol_of_member_access(node),
            _ => None,
        }
    }

    fn compute_type(&self, node: Node<'a>) -> Option<TypeId> {
        match node.kind() {
            "identifier" | "generic_name" => self.type_of_name(node),
            "this_expression" | "this" => self.enclosing_type(node),
            "base_expression" | "base" => self
                .enclosing_type(node)
                .and_then(|ty| self.graph.base_class(ty)),
            "member_access_expression" => self.type_of_member_access(node),
            "invocation_expression" => node
                .child_by_field_name("function")
                .and_then(|callee| self.type_of(callee)),
            "object_creation_expression" | "cast_expression" => node
                .child_by_field_name("type")
                .and_then(|ty| self.type_named(ty)),
            "as_expression" => node
                .child_by_field_name("right")
                .or_else(|| node.child_by_field_name("type"))
                .or_else(|| last_named_child(node))
                .and_then(|ty| self.type_named(ty)),
            "parenthesized_expression" => node.named_child(0).and_then(|inner| self.type_of(inner)),
            "conditional_expression" => node
                .child_by_field_name("consequence")
                .and_then(|branch| self.type_of(branch))
                .or_else(|| {
                    node.child_by_field_name("alternative")
                        .and_then(|branch| self.type_of(branch))
                }),
            "assignment_expression" => node
                .child_by_field_name("left")
                .and_then(|left| self.type_of(left)),
            "string_literal"
            | "verbatim_string_literal"
            | "raw_string_literal"
            | "interpolated_string_expression" => self.graph.lookup("String"),
            "character_literal" => self.graph.lookup("Char"),
            "boolean_literal" => self.graph.lookup("Boolean"),
            "integer_literal" => self.graph.lookup(integer_literal_type(self.text(node))),
            "real_literal" => self.graph.lookup(real_literal_type(self.text(node))),
            _ => None,
        }
    }

    fn type_of_name(&self, node: Node<'a>) -> Option<TypeId> {
        if let Some(outer) = self.outer_name_expression(node) {
            return self.type_of(outer);
        }
        let binding = self.bind_name(node)?;
        self.type_of_binding(binding, is_invoked(node))
    }

    fn type_of_member_access(&self, node: Node<'a>) -> Option<TypeId> {
        let target = node.child_by_field_name("expression")?;
        let name = self.name_text(node.child_by_field_name("name")?)?;
        let owner = self
            .type_of(target)
            .or_else(|| self.named_type_of(target))?;
        let (_, member) = self.graph.find_member(owner, name)?;
        self.type_of_member(member, is_invoked(node))
    }

    fn symbol_of_member_access(&self, node: Node<'a>) -> Option<SymbolRef> {
        let target = node.child_by_field_name("expression")?;
        let name = self.name_text(node.child_by_field_name("name")?)?;

        let graph = self.graph;
        let member_symbol = |owner: TypeId| {
            graph
                .find_member(owner, name)
                .map(|(owner, member)| SymbolRef::Member {
                    owner,
                    name: member.name.clone(),
                    kind: member.kind,
                })
        };

        if let Some(owner) = self.type_of(target) {
            return member_symbol(owner);
        }
        match self.symbol_of(target) {
            // Static member, or a nested type reached through its container
            Some(SymbolRef::NamedType(owner)) => {
                member_symbol(owner).or_else(|| graph.lookup(name).map(SymbolRef::NamedType))
            }
            Some(_) => None,
            // Namespace-qualified type name
            None => graph.lookup(name).map(SymbolRef::NamedType),
        }
    }

    fn type_of_binding(&self, binding: Binding<'a>, invoked: bool) -> Option<TypeId> {
        match binding {
            Binding::Local {
                type_node,
                initializer,
                ..
            } => match type_node.filter(|ty| !syntax::is_type_placeholder(*ty, self.source)) {
                Some(ty) => self.type_named(ty),
                None => initializer.and_then(|init| self.type_of(init)),
            },
            Binding::Parameter { type_node, .. } => type_node.and_then(|ty| self.type_named(ty)),
            Binding::LocalFunction { returns, .. } => {
                if invoked {
                    returns.and_then(|ty| self.type_named(ty))
                } else {
                    None
                }
            }
            Binding::Member { member, .. } => self.type_of_member(member, invoked),
        }
    }

    /// Methods only have a type when called; a bare method group has none
    fn type_of_member(&self, member: &MemberDecl, invoked: bool) -> Option<TypeId> {
        if member.kind == MemberKind::Method && !invoked {
            return None;
        }
        member
            .type_name
            .as_deref()
            .and_then(|name| self.graph.lookup(name))
    }

    fn symbol_for(&self, binding: Binding<'a>) -> SymbolRef {
        match binding {
            Binding::Local { name, .. } | Binding::LocalFunction { name, .. } => SymbolRef::Local {
                name: self.text(name).to_string(),
                offset: name.start_byte(),
            },
            Binding::Parameter { name, .. } => SymbolRef::Parameter {
                name: self.text(name).to_string(),
                offset: name.start_byte(),
            },
            Binding::Member { owner, member } => SymbolRef::Member {
                owner,
                name: member.name.clone(),
                kind: member.kind,
            },
        }
    }

    fn named_type_of(&self, node: Node<'a>) -> Option<TypeId> {
        match self.symbol_of(node) {
            Some(SymbolRef::NamedType(id)) => Some(id),
            _ => None,
        }
    }

    /// Resolve a type syntax node to a known type
    fn type_named(&self, node: Node<'a>) -> Option<TypeId> {
        let name = type_name_of(node, self.source)?;
        self.graph.lookup(&name)
    }

    fn enclosing_type(&self, node: Node<'a>) -> Option<TypeId> {
        let decl = syntax::enclosing_type_declaration(node)?;
        self.graph.lookup(self.text(decl.child_by_field_name("name")?))
    }

    fn name_text(&self, node: Node<'a>) -> Option<&'a str> {
        match node.kind() {
            "identifier" => Some(self.text(node)),
            "generic_name" => node
                .child_by_field_name("name")
                .or_else(|| child_of_kind(node, "identifier"))
                .map(|id| self.text(id)),
            _ => None,
        }
    }

    /// The larger expression a simple name stands for, if any: the generic
    /// name wrapping it, or the member access it names
    fn outer_name_expression(&self, node: Node<'a>) -> Option<Node<'a>> {
        let parent = node.parent()?;
        match parent.kind() {
            "generic_name" if node.kind() == "identifier" => Some(parent),
            "member_access_expression" if syntax::is_field_of_parent(node, "name") => Some(parent),
            _ => None,
        }
    }

    fn bind_name(&self, node: Node<'a>) -> Option<Binding<'a>> {
        let name = self.name_text(node)?;
        let position = node.start_byte();
        let mut current = node.parent();
        while let Some(scope) = current {
            if let Some(binding) = self.bind_in_scope(scope, name, position) {
                return Some(binding);
            }
            current = scope.parent();
        }
        None
    }

    fn bind_in_scope(&self, scope: Node<'a>, name: &str, position: usize) -> Option<Binding<'a>> {
        match scope.kind() {
            "block" | "switch_section" | "compilation_unit" => {
                self.bind_in_statements(scope, name, position)
            }
            "for_statement" | "using_statement" | "fixed_statement" => {
                child_of_kind(scope, "variable_declaration")
                    .and_then(|decl| self.bind_in_declaration(decl, name))
            }
            "foreach_statement" => {
                let left = scope.child_by_field_name("left")?;
                (left.kind() == "identifier" && self.text(left) == name).then(|| Binding::Local {
                    name: left,
                    type_node: scope.child_by_field_name("type"),
                    initializer: None,
                })
            }
            "catch_clause" => {
                let decl = child_of_kind(scope, "catch_declaration")?;
                let id = decl.child_by_field_name("name")?;
                (self.text(id) == name).then(|| Binding::Local {
                    name: id,
                    type_node: decl.child_by_field_name("type"),
                    initializer: None,
                })
            }
            "method_declaration"
            | "constructor_declaration"
            | "local_function_statement"
            | "operator_declaration"
            | "conversion_operator_declaration"
            | "indexer_declaration"
            | "anonymous_method_expression"
            | "lambda_expression" => self.bind_parameter(scope, name),
            _ if syntax::is_type_declaration(scope) => self
                .bind_parameter(scope, name)
                .or_else(|| self.bind_member(scope, name)),
            _ => None,
        }
    }

    /// Locals declared before `position` in a statement list, then local
    /// functions anywhere in it
    fn bind_in_statements(&self, container: Node<'a>, name: &str, position: usize) -> Option<Binding<'a>> {
        let mut local = None;
        let mut function = None;

        for child in named_children(container) {
            let statement = if child.kind() == "global_statement" {
                match child.named_child(0) {
                    Some(inner) => inner,
                    None => continue,
                }
            } else {
                child
            };

            match statement.kind() {
                "local_declaration_statement" if statement.start_byte() < position => {
                    if let Some(binding) = child_of_kind(statement, "variable_declaration")
                        .and_then(|decl| self.bind_in_declaration(decl, name))
                    {
                        local = Some(binding);
                    }
                }
                "local_function_statement" if function.is_none() => {
                    if let Some(id) = statement
                        .child_by_field_name("name")
                        .filter(|id| self.text(*id) == name)
                    {
                        function = Some(Binding::LocalFunction {
                            name: id,
                            returns: statement
                                .child_by_field_name("type")
                                .or_else(|| statement.child_by_field_name("returns")),
                        });
                    }
                }
                _ => {}
            }
        }

        local.or(function)
    }

    fn bind_in_declaration(&self, declaration: Node<'a>, name: &str) -> Option<Binding<'a>> {
        let type_node = declaration.child_by_field_name("type");
        named_children(declaration)
            .filter(|child| child.kind() == "variable_declarator")
            .find_map(|declarator| {
                let id = syntax::declarator_name(declarator)?;
                (self.text(id) == name).then(|| Binding::Local {
                    name: id,
                    type_node,
                    initializer: syntax::declarator_initializer(declarator),
                })
            })
    }

    fn bind_parameter(&self, scope: Node<'a>, name: &str) -> Option<Binding<'a>> {
        let parameters = scope
            .child_by_field_name("parameters")
            .or_else(|| child_of_kind(scope, "parameter_list"))
            .or_else(|| child_of_kind(scope, "bracketed_parameter_list"))?;

        // `x => ...`
        if parameters.kind() == "identifier" {
            return (self.text(parameters) == name).then_some(Binding::Parameter {
                name: parameters,
                type_node: None,
            });
        }

        named_children(parameters)
            .filter(|p| p.kind() == "parameter")
            .find_map(|p| {
                let id = p.child_by_field_name("name")?;
                (self.text(id) == name).then(|| Binding::Parameter {
                    name: id,
                    type_node: p.child_by_field_name("type"),
                })
            })
    }

    fn bind_member(&self, type_decl: Node<'a>, name: &str) -> Option<Binding<'a>> {
        let graph = self.graph;
        let owner = graph.lookup(self.text(type_decl.child_by_field_name("name")?))?;
        let (owner, member) = graph.find_member(owner, name)?;
        Some(Binding::Member { owner, member })
    }
}

fn is_invoked(node: Node<'_>) -> bool {
    node.parent()
        .is_some_and(|parent| parent.kind() == "invocation_expression")
        && syntax::is_field_of_parent(node, "function")
}

fn receiver_of(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "member_access_expression" => node.child_by_field_name("expression"),
        "invocation_expression" => node.child_by_field_name("function"),
        _ => None,
    }
}

fn last_named_child(node: Node<'_>) -> Option<Node<'_>> {
    node.named_child(node.named_child_count().checked_sub(1)?)
}

fn integer_literal_type(literal: &str) -> &'static str {
    let lower = literal.to_ascii_lowercase();
    if lower.ends_with("ul") || lower.ends_with("lu") {
        "UInt64"
    } else if lower.ends_with('l') {
        "Int64"
    } else if lower.ends_with('u') {
        "UInt32"
    } else {
        "Int32"
    }
}

fn real_literal_type(literal: &str) -> &'static str {
    match literal.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('f') => "Single",
        Some('m') => "Decimal",
        _ => "Double",
    }
}
