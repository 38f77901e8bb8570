//! Small helpers over the C# grammar's node shapes

use tree_sitter::Node;

/// Node kinds that declare a named type
pub(crate) const TYPE_DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "interface_declaration",
    "record_declaration",
    "record_struct_declaration",
    "enum_declaration",
];

/// Parents whose `name` field is a reference rather than a declaration
const NAME_REFERENCE_PARENTS: &[&str] = &[
    "member_access_expression",
    "member_binding_expression",
    "generic_name",
    "qualified_name",
    "alias_qualified_name",
];

pub(crate) fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

pub(crate) fn is_type_declaration(node: Node<'_>) -> bool {
    TYPE_DECLARATION_KINDS.contains(&node.kind())
}

/// Iterate named children without juggling cursors at call sites
pub(crate) fn named_children<'t>(node: Node<'t>) -> impl Iterator<Item = Node<'t>> {
    (0..node.named_child_count()).filter_map(move |i| node.named_child(i))
}

pub(crate) fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    named_children(node).find(|child| child.kind() == kind)
}

/// Whether `node` sits in `field` of its parent
pub(crate) fn is_field_of_parent(node: Node<'_>, field: &str) -> bool {
    node.parent()
        .and_then(|parent| parent.child_by_field_name(field))
        .is_some_and(|child| child.id() == node.id())
}

/// The identifier naming a variable declarator
pub(crate) fn declarator_name(declarator: Node<'_>) -> Option<Node<'_>> {
    declarator
        .child_by_field_name("name")
        .or_else(|| child_of_kind(declarator, "identifier"))
}

/// The initializer expression of a variable declarator, if any
pub(crate) fn declarator_initializer(declarator: Node<'_>) -> Option<Node<'_>> {
    if let Some(clause) = child_of_kind(declarator, "equals_value_clause") {
        return clause.named_child(0);
    }
    let name = declarator_name(declarator)?;
    named_children(declarator)
        .filter(|child| {
            child.id() != name.id()
                && !matches!(child.kind(), "bracketed_argument_list" | "tuple_pattern")
        })
        .last()
}

/// True for an identifier that declares something instead of referring to it
pub(crate) fn is_declaration_name(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    if parent.kind() == "variable_declarator" {
        return declarator_name(parent).is_some_and(|name| name.id() == node.id());
    }
    if parent.kind() == "foreach_statement" && is_field_of_parent(node, "left") {
        return true;
    }
    is_field_of_parent(node, "name") && !NAME_REFERENCE_PARENTS.contains(&parent.kind())
}

/// `var` standing in for an inferred type
pub(crate) fn is_type_placeholder(node: Node<'_>, source: &str) -> bool {
    match node.kind() {
        "implicit_type" => true,
        "identifier" => text(node, source) == "var" && is_field_of_parent(node, "type"),
        _ => false,
    }
}

/// Map C# keyword types onto the core library names
pub(crate) fn predefined_type_name(keyword: &str) -> Option<&'static str> {
    let name = match keyword {
        "object" => "Object",
        "string" => "String",
        "bool" => "Boolean",
        "char" => "Char",
        "byte" => "Byte",
        "sbyte" => "SByte",
        "short" => "Int16",
        "ushort" => "UInt16",
        "int" => "Int32",
        "uint" => "UInt32",
        "long" => "Int64",
        "ulong" => "UInt64",
        "float" => "Single",
        "double" => "Double",
        "decimal" => "Decimal",
        _ => return None,
    };
    Some(name)
}

/// Simple name of a type syntax node (`Ns.Secret<T>` becomes `Secret`)
pub(crate) fn type_name_of(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => {
            let name = text(node, source);
            (name != "var").then(|| name.to_string())
        }
        "generic_name" => node
            .child_by_field_name("name")
            .or_else(|| child_of_kind(node, "identifier"))
            .map(|id| text(id, source).to_string()),
        "qualified_name" | "alias_qualified_name" => node
            .child_by_field_name("name")
            .or_else(|| named_children(node).last())
            .and_then(|name| type_name_of(name, source)),
        "nullable_type" => node
            .child_by_field_name("type")
            .or_else(|| node.named_child(0))
            .and_then(|inner| type_name_of(inner, source)),
        "predefined_type" => predefined_type_name(text(node, source)).map(str::to_string),
        "primary_constructor_base_type" => node
            .child_by_field_name("type")
            .or_else(|| node.named_child(0))
            .and_then(|inner| type_name_of(inner, source)),
        _ => None,
    }
}

/// Whether a declaration carries `modifier`
pub(crate) fn has_modifier(node: Node<'_>, source: &str, modifier: &str) -> bool {
    named_children(node).any(|child| child.kind() == "modifier" && text(child, source) == modifier)
}

/// Closest ancestor that declares a type
pub(crate) fn enclosing_type_declaration(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if is_type_declaration(candidate) {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}
