use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::source::{Generation, Location, SourceId};
use crate::types::{Type, TypeKind, TypeStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignifierFlags {
    pub local: bool,
    pub parameter: bool,
    pub is_static: bool,
    pub instance: bool,
    pub optional: bool,
    pub deprecated: bool,
    pub global: bool,
    pub is_macro: bool,
    /// Provided by the engine rather than by project code; never purged.
    pub native: bool,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub location: Location,
    /// Type observed at the site: the assigned type for writes, the binding's
    /// type at the time for reads.
    pub ty: Type,
    pub generation: Generation,
    pub write: bool,
}

#[derive(Debug, Clone, Copy)]
struct Definition {
    location: Location,
    generation: Generation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Defined {
    First,
    /// A newer pass over the defining file took the definition over.
    Superseded,
    Kept,
}

struct SignifierData {
    name: String,
    store: TypeStore,
    def: Option<Definition>,
    /// The definition a newer pass replaced, restored if that pass is
    /// rolled back.
    replaced: Option<Definition>,
    refs: Vec<Reference>,
    flags: SignifierFlags,
    description: Option<String>,
}

/// A named binding: a local, parameter, struct member or global. Shared by
/// reference, so every scope that can see a binding sees the same one.
#[derive(Clone)]
pub struct Signifier(Rc<RefCell<SignifierData>>);

impl Signifier {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Signifier(Rc::new(RefCell::new(SignifierData {
            name: name.into(),
            store: TypeStore::new(),
            def: None,
            replaced: None,
            refs: Vec::new(),
            flags: SignifierFlags::default(),
            description: None,
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn ptr_eq(&self, other: &Signifier) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn types(&self) -> TypeStore {
        self.0.borrow().store.clone()
    }

    pub fn ty(&self) -> Type {
        self.0.borrow().store.to_type()
    }

    /// Replaces the binding's types.
    pub fn set_type(&self, types: &[Type]) {
        let store = TypeStore::from_types(types);
        self.0.borrow_mut().store = store;
    }

    /// Widens the binding's types with `ty`.
    pub fn refine_type(&self, ty: &Type) {
        let mut store = self.types();
        store.add(ty);
        self.0.borrow_mut().store = store;
    }

    pub fn get_type_by_kind(&self, kind: &TypeKind) -> Option<Type> {
        self.0.borrow().store.type_by_kind(kind)
    }

    pub fn def(&self) -> Option<Location> {
        self.0.borrow().def.map(|definition| definition.location)
    }

    pub fn def_generation(&self) -> Option<Generation> {
        self.0.borrow().def.map(|definition| definition.generation)
    }

    /// Records the definition site. The first definition wins, except that a
    /// newer pass over the defining file replaces its own older definition.
    /// Returns whether this call set it.
    pub fn defined_at(&self, location: Location, generation: Generation) -> bool {
        self.define(location, generation) != Defined::Kept
    }

    fn define(&self, location: Location, generation: Generation) -> Defined {
        let mut data = self.0.borrow_mut();
        let existing = data.def;
        let outcome = match existing {
            None => Defined::First,
            Some(existing)
                if existing.location.source == location.source
                    && existing.generation < generation =>
            {
                data.replaced = Some(existing);
                Defined::Superseded
            }
            Some(_) => return Defined::Kept,
        };
        data.def = Some(Definition {
            location,
            generation,
        });
        outcome
    }

    /// Records a read.
    pub fn add_ref(&self, location: Location, generation: Generation) -> Reference {
        let reference = Reference {
            location,
            ty: self.ty(),
            generation,
            write: false,
        };
        self.0.borrow_mut().refs.push(reference.clone());
        reference
    }

    /// Records a write of `ty`. When the write takes the definition over from
    /// an older pass over the same file, the binding's types are rebuilt from
    /// `ty` and what other files wrote; any other write widens them.
    pub fn assign(&self, location: Location, generation: Generation, ty: &Type) -> Reference {
        match self.define(location, generation) {
            Defined::Superseded => {
                let mut store = TypeStore::from_types(std::slice::from_ref(ty));
                for reference in self.0.borrow().refs.iter() {
                    if reference.write && reference.location.source != location.source {
                        store.add(&reference.ty);
                    }
                }
                self.0.borrow_mut().store = store;
            }
            Defined::First | Defined::Kept => self.refine_type(ty),
        }
        let reference = Reference {
            location,
            ty: ty.clone(),
            generation,
            write: true,
        };
        self.0.borrow_mut().refs.push(reference.clone());
        reference
    }

    /// The type written by the write that made the current definition.
    pub fn defining_type(&self) -> Option<Type> {
        let data = self.0.borrow();
        let definition = data.def?;
        data.refs
            .iter()
            .find(|reference| {
                reference.write
                    && reference.location == definition.location
                    && reference.generation == definition.generation
            })
            .map(|reference| reference.ty.clone())
    }

    pub fn refs(&self) -> Vec<Reference> {
        self.0.borrow().refs.clone()
    }

    pub fn flags(&self) -> SignifierFlags {
        self.0.borrow().flags
    }

    pub fn update_flags(&self, update: impl FnOnce(&mut SignifierFlags)) {
        update(&mut self.0.borrow_mut().flags);
    }

    pub fn description(&self) -> Option<String> {
        self.0.borrow().description.clone()
    }

    pub fn describe<S: Into<String>>(&self, description: S) {
        self.0.borrow_mut().description = Some(description.into());
    }

    /// Drops references and the definition contributed by `source` in
    /// generations rejected by `stale`. Returns whether anything was removed.
    pub fn purge_source(&self, source: SourceId, stale: impl Fn(Generation) -> bool) -> bool {
        let mut data = self.0.borrow_mut();
        let before = data.refs.len();
        data.refs.retain(|reference| {
            reference.location.source != source || !stale(reference.generation)
        });
        let mut removed = data.refs.len() != before;
        let is_stale = |definition: &Definition| {
            definition.location.source == source && stale(definition.generation)
        };
        if data.replaced.as_ref().is_some_and(&is_stale) {
            data.replaced = None;
        }
        if data.def.as_ref().is_some_and(&is_stale) {
            let restored = data.replaced.take();
            data.def = restored;
            removed = true;
        }
        removed
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn save_state(&self) -> SignifierState {
        let data = self.0.borrow();
        SignifierState {
            store: data.store.clone(),
            flags: data.flags,
            description: data.description.clone(),
        }
    }

    pub(crate) fn restore_state(&self, state: SignifierState) {
        let mut data = self.0.borrow_mut();
        data.store = state.store;
        data.flags = state.flags;
        data.description = state.description;
    }

    /// No definition, no references and not engine-provided.
    pub fn is_orphaned(&self) -> bool {
        let data = self.0.borrow();
        data.def.is_none() && data.refs.is_empty() && !data.flags.native
    }

    /// Hover-style rendering, e.g. `hp: Real`.
    pub fn summary(&self) -> String {
        let ty = self.ty();
        let data = self.0.borrow();
        let marker = if data.flags.optional { "?" } else { "" };
        format!("{}{marker}: {}", data.name, ty.describe())
    }
}

/// Types, flags and description of a signifier at one point in time.
/// References and definitions are rolled back by generation instead.
pub(crate) struct SignifierState {
    store: TypeStore,
    flags: SignifierFlags,
    description: Option<String>,
}

impl fmt::Debug for Signifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Signifier")
            .field("name", &data.name)
            .field("types", &data.store)
            .field("flags", &data.flags)
            .field("refs", &data.refs.len())
            .finish()
    }
}
