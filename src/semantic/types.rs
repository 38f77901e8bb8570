//! Type graph over source and reference declarations

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::tree_sitter::{MemberDecl, TypeDecl, TypeKind};
use crate::workspace::DocumentId;

/// Root of every class hierarchy; members it declares are visible on all types
const OBJECT_TYPE: &str = "Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a type declaration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeOrigin {
    Source(DocumentId),
    Reference(String),
}

impl TypeOrigin {
    pub fn is_source(&self) -> bool {
        matches!(self, TypeOrigin::Source(_))
    }
}

#[derive(Debug)]
struct TypeEntry {
    decl: TypeDecl,
    origin: TypeOrigin,
}

/// Named types keyed by simple name, with lazily computed interface closures
///
/// Source declarations shadow reference declarations of the same name;
/// otherwise the first declaration inserted wins. Base names that do not
/// resolve to a known type are ignored.
#[derive(Debug, Default)]
pub struct TypeGraph {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeId>,
    closures: RefCell<HashMap<TypeId, Rc<BTreeSet<TypeId>>>>,
    resolving: RefCell<HashSet<TypeId>>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. Returns the id it is reachable under, or `None`
    /// when an earlier declaration keeps the name.
    pub fn insert(&mut self, decl: TypeDecl, origin: TypeOrigin) -> Option<TypeId> {
        if let Some(&id) = self.by_name.get(&decl.name) {
            let existing = &mut self.entries[id.0];
            if existing.origin.is_source() || !origin.is_source() {
                tracing::trace!(name = %decl.name, "type already declared, keeping first");
                return None;
            }
            *existing = TypeEntry { decl, origin };
            self.closures.borrow_mut().clear();
            return Some(id);
        }

        let id = TypeId(self.entries.len());
        self.by_name.insert(decl.name.clone(), id);
        self.entries.push(TypeEntry { decl, origin });
        self.closures.borrow_mut().clear();
        Some(id)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDecl> {
        self.entries.get(id.0).map(|e| &e.decl)
    }

    pub fn origin(&self, id: TypeId) -> Option<&TypeOrigin> {
        self.entries.get(id.0).map(|e| &e.origin)
    }

    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.get(id).map(|d| d.name.as_str())
    }

    pub fn kind(&self, id: TypeId) -> Option<TypeKind> {
        self.get(id).map(|d| d.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct bases that resolve to known types
    pub fn bases(&self, id: TypeId) -> Vec<TypeId> {
        self.get(id)
            .map(|decl| decl.bases.iter().filter_map(|b| self.lookup(b)).collect())
            .unwrap_or_default()
    }

    /// First base that is not an interface
    pub fn base_class(&self, id: TypeId) -> Option<TypeId> {
        self.bases(id)
            .into_iter()
            .find(|&base| self.kind(base) != Some(TypeKind::Interface))
    }

    /// Find a member on `id`, its bases, or `Object`
    pub fn find_member(&self, id: TypeId, name: &str) -> Option<(TypeId, &MemberDecl)> {
        let mut visited = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(member) = self.get(current).and_then(|d| d.member(name)) {
                return Some((current, member));
            }
            // Reverse so the first listed base is searched first
            stack.extend(self.bases(current).into_iter().rev());
        }

        let object = self.lookup(OBJECT_TYPE)?;
        if visited.contains(&object) {
            return None;
        }
        let member = self.get(object)?.member(name)?;
        Some((object, member))
    }

    /// Every interface `id` implements, directly or through its bases.
    /// Never contains `id` itself.
    pub fn all_interfaces(&self, id: TypeId) -> Rc<BTreeSet<TypeId>> {
        if let Some(closure) = self.closures.borrow().get(&id) {
            return Rc::clone(closure);
        }
        if !self.resolving.borrow_mut().insert(id) {
            // Cyclic base list
            return Rc::new(BTreeSet::new());
        }

        let mut closure = BTreeSet::new();
        for base in self.bases(id) {
            if self.kind(base) == Some(TypeKind::Interface) {
                closure.insert(base);
            }
            closure.extend(self.all_interfaces(base).iter().copied());
        }
        closure.remove(&id);

        self.resolving.borrow_mut().remove(&id);
        let closure = Rc::new(closure);
        self.closures.borrow_mut().insert(id, Rc::clone(&closure));
        closure
    }

    /// Whether `id` implements an interface named exactly `interface`
    pub fn implements(&self, id: TypeId, interface: &str) -> bool {
        self.all_interfaces(id)
            .iter()
            .any(|&i| self.name(i) == Some(interface))
    }
}
