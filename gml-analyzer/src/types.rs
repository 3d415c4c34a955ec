//! Structural type model.
//!
//! Types are shared handles: cloning a [`Type`] clones the reference, not the
//! shape, so a `Struct` is the durable identity of an object shape and may
//! (directly or through members) contain itself. Every walk over member or
//! item types carries a visited set keyed by type identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::signifier::Signifier;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Unknown,
    Undefined,
    Bool,
    Real,
    String,
    Pointer,
    Array,
    Function,
    Struct,
    Enum,
    Union,
    /// Opaque engine kinds referenced by name, e.g. `Asset.GMObject`.
    External(String),
}

impl TypeKind {
    pub fn name(&self) -> &str {
        match self {
            TypeKind::Unknown => "Unknown",
            TypeKind::Undefined => "Undefined",
            TypeKind::Bool => "Bool",
            TypeKind::Real => "Real",
            TypeKind::String => "String",
            TypeKind::Pointer => "Pointer",
            TypeKind::Array => "Array",
            TypeKind::Function => "Function",
            TypeKind::Struct => "Struct",
            TypeKind::Enum => "Enum",
            TypeKind::Union => "Union",
            TypeKind::External(name) => name,
        }
    }

    /// Kinds whose values are compared by reference rather than by name.
    fn has_identity(&self) -> bool {
        matches!(
            self,
            TypeKind::Function | TypeKind::Struct | TypeKind::Enum | TypeKind::Union
        )
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Default)]
struct Members {
    order: Vec<Signifier>,
    index: FxHashMap<String, usize>,
}

impl Members {
    fn get(&self, name: &str) -> Option<Signifier> {
        self.index.get(name).map(|&slot| self.order[slot].clone())
    }

    fn insert(&mut self, signifier: Signifier) {
        let name = signifier.name();
        match self.index.get(&name) {
            Some(&slot) => self.order[slot] = signifier,
            None => {
                self.index.insert(name, self.order.len());
                self.order.push(signifier);
            }
        }
    }

    fn remove(&mut self, name: &str) -> Option<Signifier> {
        let slot = self.index.remove(name)?;
        let removed = self.order.remove(slot);
        for position in self.index.values_mut() {
            if *position > slot {
                *position -= 1;
            }
        }
        Some(removed)
    }
}

#[derive(Clone, Default)]
struct TypeDetails {
    name: Option<String>,
    members: Members,
    parent: Option<Type>,
    items: TypeStore,
    branches: Vec<Type>,
    params: Vec<Option<Signifier>>,
    returns: TypeStore,
    constructs: Option<Type>,
    context: Option<Type>,
}

struct TypeData {
    kind: TypeKind,
    details: RefCell<TypeDetails>,
}

#[derive(Clone)]
pub struct Type(Rc<TypeData>);

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Type(Rc::new(TypeData {
            kind,
            details: RefCell::new(TypeDetails::default()),
        }))
    }

    pub fn named<S: Into<String>>(kind: TypeKind, name: S) -> Self {
        let ty = Type::new(kind);
        ty.set_name(name);
        ty
    }

    pub fn external<S: Into<String>>(kind: S) -> Self {
        Type::new(TypeKind::External(kind.into()))
    }

    fn union(branches: Vec<Type>) -> Self {
        let ty = Type::new(TypeKind::Union);
        ty.0.details.borrow_mut().branches = branches;
        ty
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn is_kind(&self, kind: &TypeKind) -> bool {
        &self.0.kind == kind
    }

    pub fn ptr_eq(&self, other: &Type) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn name(&self) -> Option<String> {
        self.0.details.borrow().name.clone()
    }

    pub fn set_name<S: Into<String>>(&self, name: S) {
        self.0.details.borrow_mut().name = Some(name.into());
    }

    /// `Unknown` carries no information and never counts as a concrete branch.
    pub fn is_concrete(&self) -> bool {
        !self.is_kind(&TypeKind::Unknown)
    }

    /// The flattened branches of a union, or the type itself.
    pub fn branches(&self) -> Vec<Type> {
        if self.is_kind(&TypeKind::Union) {
            self.0.details.borrow().branches.clone()
        } else {
            vec![self.clone()]
        }
    }

    /// First branch of the given kind, looking through unions.
    pub fn branch_of_kind(&self, kind: &TypeKind) -> Option<Type> {
        self.branches().into_iter().find(|branch| branch.is_kind(kind))
    }

    // Struct and enum members.

    pub fn members(&self) -> Vec<Signifier> {
        self.0.details.borrow().members.order.clone()
    }

    pub fn own_member(&self, name: &str) -> Option<Signifier> {
        self.0.details.borrow().members.get(name)
    }

    /// Looks the member up on this type and then along its parent chain.
    pub fn get_member(&self, name: &str) -> Option<Signifier> {
        self.ancestors()
            .into_iter()
            .find_map(|ancestor| ancestor.own_member(name))
    }

    /// Creates the member, or refines the existing member's type with `ty`.
    pub fn add_member(&self, name: &str, ty: &Type) -> Signifier {
        if let Some(existing) = self.own_member(name) {
            existing.refine_type(ty);
            return existing;
        }
        let signifier = Signifier::new(name);
        signifier.set_type(std::slice::from_ref(ty));
        self.0.details.borrow_mut().members.insert(signifier.clone());
        signifier
    }

    /// The member named `name`, created untyped if missing. Unlike
    /// [`Type::add_member`] it leaves an existing member's type alone.
    pub fn ensure_member(&self, name: &str) -> Signifier {
        if let Some(existing) = self.own_member(name) {
            return existing;
        }
        let signifier = Signifier::new(name);
        self.0.details.borrow_mut().members.insert(signifier.clone());
        signifier
    }

    /// Binds an existing signifier as a member, replacing any same-named one.
    pub fn add_member_signifier(&self, signifier: &Signifier) {
        self.0
            .details
            .borrow_mut()
            .members
            .insert(signifier.clone());
    }

    pub fn remove_member(&self, name: &str) -> Option<Signifier> {
        self.0.details.borrow_mut().members.remove(name)
    }

    pub fn parent(&self) -> Option<Type> {
        self.0.details.borrow().parent.clone()
    }

    pub fn set_parent(&self, parent: Option<Type>) {
        self.0.details.borrow_mut().parent = parent;
    }

    /// This type followed by its parent chain, stopping at the first repeat.
    pub fn ancestors(&self) -> Vec<Type> {
        let mut seen = FxHashSet::default();
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(ty) = current {
            if !seen.insert(ty.id()) {
                break;
            }
            current = ty.parent();
            chain.push(ty);
        }
        chain
    }

    // Arrays.

    pub fn items(&self) -> TypeStore {
        self.0.details.borrow().items.clone()
    }

    pub fn add_item_type(&self, ty: &Type) {
        // Comparing against an array that holds this array borrows it again.
        let mut items = self.items();
        items.add(ty);
        self.0.details.borrow_mut().items = items;
    }

    // Functions.

    pub fn parameters(&self) -> Vec<Signifier> {
        self.0
            .details
            .borrow()
            .params
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn parameter(&self, index: usize) -> Option<Signifier> {
        self.0.details.borrow().params.get(index).cloned().flatten()
    }

    /// Creates or updates the parameter at `index`. Parameters may be added
    /// out of order; a different name at an occupied index replaces it.
    pub fn add_parameter(
        &self,
        index: usize,
        name: &str,
        types: Option<&[Type]>,
        optional: bool,
    ) -> Signifier {
        let parameter = match self.parameter(index) {
            Some(existing) if existing.name() == name => existing,
            _ => {
                let created = Signifier::new(name);
                let mut details = self.0.details.borrow_mut();
                if details.params.len() <= index {
                    details.params.resize(index + 1, None);
                }
                details.params[index] = Some(created.clone());
                created
            }
        };
        if let Some(types) = types {
            parameter.set_type(types);
        }
        parameter.update_flags(|flags| {
            flags.parameter = true;
            flags.optional = optional;
        });
        parameter
    }

    /// Drops parameters at or beyond `count`.
    pub fn truncate_parameters(&self, count: usize) {
        self.0.details.borrow_mut().params.truncate(count);
    }

    pub fn returns(&self) -> TypeStore {
        self.0.details.borrow().returns.clone()
    }

    pub fn set_return_type(&self, types: &[Type]) {
        let returns = TypeStore::from_types(types);
        self.0.details.borrow_mut().returns = returns;
    }

    pub fn constructs(&self) -> Option<Type> {
        self.0.details.borrow().constructs.clone()
    }

    pub fn set_constructs(&self, constructs: Option<Type>) {
        self.0.details.borrow_mut().constructs = constructs;
    }

    pub fn context(&self) -> Option<Type> {
        self.0.details.borrow().context.clone()
    }

    pub fn set_context(&self, context: Option<Type>) {
        self.0.details.borrow_mut().context = context;
    }

    /// A `Function` with no signature, as written in docs (`{Function}`).
    pub fn is_bare_function(&self) -> bool {
        if !self.is_kind(&TypeKind::Function) {
            return false;
        }
        let details = self.0.details.borrow();
        details.params.is_empty() && details.returns.is_empty() && details.constructs.is_none()
    }

    pub(crate) fn save_state(&self) -> TypeState {
        TypeState(self.0.details.borrow().clone())
    }

    pub(crate) fn restore_state(&self, state: TypeState) {
        *self.0.details.borrow_mut() = state.0;
    }

    // Algebra.

    /// Union of two types. Identical types (by reference, or by kind and name
    /// for value kinds) collapse; structs never merge their members.
    pub fn merge(a: &Type, b: &Type) -> Type {
        if a.same_branch(b) {
            return a.clone();
        }
        let mut store = TypeStore::new();
        store.add(a);
        store.add(b);
        store.to_type()
    }

    /// True when every concrete branch of `self` is present in `other`.
    pub fn narrows(&self, other: &Type) -> bool {
        let mut visited = FxHashSet::default();
        self.narrows_in(other, &mut visited)
    }

    /// Same set of branches, ignoring order.
    pub fn equivalent(a: &Type, b: &Type) -> bool {
        let left = a.branches();
        let right = b.branches();
        left.iter()
            .all(|branch| right.iter().any(|other| branch.same_branch(other)))
            && right
                .iter()
                .all(|branch| left.iter().any(|other| branch.same_branch(other)))
    }

    pub(crate) fn same_branch(&self, other: &Type) -> bool {
        let mut visited = FxHashSet::default();
        self.same_branch_in(other, &mut visited)
    }

    fn same_branch_in(&self, other: &Type, visited: &mut FxHashSet<(usize, usize)>) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.kind() != other.kind() || self.kind().has_identity() {
            return false;
        }
        if self.name() != other.name() {
            return false;
        }
        if !self.is_kind(&TypeKind::Array) || !visited.insert((self.id(), other.id())) {
            return true;
        }
        let left = self.items();
        let right = other.items();
        left.len() == right.len()
            && left.types().iter().all(|item| {
                right
                    .types()
                    .iter()
                    .any(|candidate| item.same_branch_in(candidate, visited))
            })
    }

    fn narrows_in(&self, other: &Type, visited: &mut FxHashSet<(usize, usize)>) -> bool {
        let targets = other.branches();
        self.branches()
            .iter()
            .filter(|branch| branch.is_concrete())
            .all(|branch| {
                targets
                    .iter()
                    .any(|target| branch.branch_narrows(target, visited))
            })
    }

    fn branch_narrows(&self, target: &Type, visited: &mut FxHashSet<(usize, usize)>) -> bool {
        if self.same_branch(target) {
            return true;
        }
        if !visited.insert((self.id(), target.id())) {
            return true;
        }
        match (self.kind(), target.kind()) {
            (TypeKind::Struct, TypeKind::Struct) => self
                .ancestors()
                .iter()
                .any(|ancestor| ancestor.ptr_eq(target)),
            (TypeKind::Function, TypeKind::Function) => target.is_bare_function(),
            (TypeKind::Array, TypeKind::Array) => {
                let expected = target.items();
                expected.is_empty()
                    || self
                        .items()
                        .to_type()
                        .narrows_in(&expected.to_type(), visited)
            }
            (TypeKind::External(left), TypeKind::External(right)) => {
                left == right && target.name().is_none()
            }
            _ => false,
        }
    }

    // Rendering.

    pub fn describe(&self) -> String {
        let mut visited = FxHashSet::default();
        self.describe_in(&mut visited)
    }

    fn describe_in(&self, visited: &mut FxHashSet<usize>) -> String {
        match self.kind() {
            TypeKind::Struct | TypeKind::Enum => self
                .name()
                .unwrap_or_else(|| self.kind().name().to_string()),
            TypeKind::External(kind) => match self.name() {
                Some(name) => format!("{kind}<{name}>"),
                None => kind.clone(),
            },
            TypeKind::Union => self
                .branches()
                .iter()
                .map(|branch| branch.describe_in(visited))
                .collect::<Vec<_>>()
                .join("|"),
            TypeKind::Array => {
                let items = self.items();
                if items.is_empty() || !visited.insert(self.id()) {
                    return "Array".to_string();
                }
                let rendered = items
                    .types()
                    .iter()
                    .map(|item| item.describe_in(visited))
                    .collect::<Vec<_>>()
                    .join("|");
                visited.remove(&self.id());
                format!("Array<{rendered}>")
            }
            TypeKind::Function => {
                if let Some(constructs) = self.constructs() {
                    if let Some(name) = constructs.name() {
                        let short = name.strip_prefix("Struct.").unwrap_or(&name);
                        return format!("Constructor.{short}");
                    }
                }
                if self.is_bare_function() || !visited.insert(self.id()) {
                    return "Function".to_string();
                }
                let params = self
                    .parameters()
                    .iter()
                    .map(|param| {
                        let marker = if param.flags().optional { "?" } else { "" };
                        format!("{}{marker}: {}", param.name(), param.ty().describe_in(visited))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let returns = self.returns().to_type().describe_in(visited);
                visited.remove(&self.id());
                format!("Function({params}) -> {returns}")
            }
            _ => self
                .name()
                .unwrap_or_else(|| self.kind().name().to_string()),
        }
    }
}

/// Members, links, items and signature of a type at one point in time.
pub(crate) struct TypeState(TypeDetails);

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.describe())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Ordered, deduplicated candidate types of one binding. An `Unknown` entry
/// only survives while nothing concrete has been added.
#[derive(Clone, Default)]
pub struct TypeStore {
    types: Vec<Type>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    pub fn from_types(types: &[Type]) -> Self {
        let mut store = Self::new();
        store.set(types);
        store
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn add(&mut self, ty: &Type) {
        for branch in ty.branches() {
            self.add_branch(branch);
        }
    }

    fn add_branch(&mut self, branch: Type) {
        if !branch.is_concrete() {
            if self.types.is_empty() {
                self.types.push(branch);
            }
            return;
        }
        if self.types.iter().any(|existing| existing.same_branch(&branch)) {
            return;
        }
        self.types.retain(Type::is_concrete);
        self.types.push(branch);
    }

    pub fn merge(&mut self, other: &TypeStore) {
        for ty in other.types() {
            self.add(ty);
        }
    }

    pub fn set(&mut self, types: &[Type]) {
        self.types.clear();
        for ty in types {
            self.add(ty);
        }
    }

    pub fn narrows(&self, other: &TypeStore) -> bool {
        self.to_type().narrows(&other.to_type())
    }

    pub fn type_by_kind(&self, kind: &TypeKind) -> Option<Type> {
        self.types.iter().find(|ty| ty.is_kind(kind)).cloned()
    }

    /// The store as a single type: `Unknown` when empty, a union when it has
    /// several entries.
    pub fn to_type(&self) -> Type {
        match self.types.as_slice() {
            [] => Type::new(TypeKind::Unknown),
            [single] => single.clone(),
            many => Type::union(many.to_vec()),
        }
    }
}

impl fmt::Debug for TypeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.types.iter().map(Type::describe))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real() -> Type {
        Type::new(TypeKind::Real)
    }

    fn string() -> Type {
        Type::new(TypeKind::String)
    }

    #[test]
    fn merge_flattens_unions() {
        let left = Type::merge(&real(), &string());
        let right = Type::merge(&Type::new(TypeKind::Bool), &real());
        let merged = Type::merge(&left, &right);

        assert!(merged.is_kind(&TypeKind::Union));
        let kinds: Vec<_> = merged
            .branches()
            .iter()
            .map(|branch| branch.kind().clone())
            .collect();
        assert_eq!(kinds, vec![TypeKind::Real, TypeKind::String, TypeKind::Bool]);
        assert!(merged
            .branches()
            .iter()
            .all(|branch| !branch.is_kind(&TypeKind::Union)));
    }

    #[test]
    fn merge_keeps_distinct_structs_apart() {
        let first = Type::new(TypeKind::Struct);
        first.add_member("a", &real());
        let second = Type::new(TypeKind::Struct);
        second.add_member("b", &string());

        let merged = Type::merge(&first, &second);
        assert_eq!(merged.branches().len(), 2);
        assert!(first.own_member("b").is_none());
        assert!(second.own_member("a").is_none());

        let same = Type::merge(&first, &first);
        assert!(same.ptr_eq(&first));
    }

    #[test]
    fn unknown_is_absorbed_by_concrete_types() {
        let merged = Type::merge(&Type::new(TypeKind::Unknown), &real());
        assert!(merged.is_kind(&TypeKind::Real));
        assert!(Type::new(TypeKind::Unknown).narrows(&string()));
    }

    #[test]
    fn struct_narrows_its_ancestors() {
        let base = Type::named(TypeKind::Struct, "Struct");
        let parent = Type::named(TypeKind::Struct, "Struct.Shape");
        parent.set_parent(Some(base.clone()));
        let child = Type::named(TypeKind::Struct, "Struct.Circle");
        child.set_parent(Some(parent.clone()));

        assert!(child.narrows(&parent));
        assert!(child.narrows(&base));
        assert!(!parent.narrows(&child));
    }

    #[test]
    fn functions_narrow_bare_function() {
        let function = Type::new(TypeKind::Function);
        function.add_parameter(0, "value", Some(&[real()]), false);
        function.set_return_type(&[string()]);

        assert!(function.narrows(&Type::new(TypeKind::Function)));
        assert!(!Type::new(TypeKind::Function).narrows(&function));
    }

    #[test]
    fn add_parameter_out_of_order_and_overwrite() {
        let function = Type::new(TypeKind::Function);
        function.add_parameter(2, "c", None, true);
        function.add_parameter(0, "a", Some(&[real()]), false);
        assert_eq!(function.parameters().len(), 2);
        assert!(function.parameter(1).is_none());

        let replaced = function.add_parameter(0, "z", None, false);
        assert_eq!(function.parameter(0).map(|p| p.name()), Some("z".to_string()));
        assert!(replaced.ptr_eq(&function.parameter(0).expect("parameter")));

        let reused = function.add_parameter(2, "c", Some(&[string()]), false);
        assert!(reused.ty().is_kind(&TypeKind::String));
        assert!(!reused.flags().optional);
    }

    #[test]
    fn describe_terminates_on_cyclic_structs() {
        let node = Type::named(TypeKind::Struct, "Struct.Node");
        node.add_member("next", &node);
        let list = Type::new(TypeKind::Array);
        list.add_item_type(&node);
        list.add_item_type(&list);

        let next = node.get_member("next").map(|member| member.ty().describe());
        assert_eq!(next, Some("Struct.Node".to_string()));
        assert_eq!(list.describe(), "Array<Struct.Node|Array>");
    }

    #[test]
    fn member_removal_keeps_order() {
        let shape = Type::new(TypeKind::Struct);
        shape.add_member("a", &real());
        shape.add_member("b", &real());
        shape.add_member("c", &real());
        shape.remove_member("b");

        let names: Vec<_> = shape.members().iter().map(Signifier::name).collect();
        assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
        assert!(shape.own_member("c").is_some());
    }
}
