use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::cst::{File, Position, SourceSpan};
use crate::diagnostics::Diagnostics;
use crate::error::AnalysisError;
use crate::jsdoc::{TypeExpr, TypeRef};
use crate::processor::SymbolProcessor;
use crate::scope::{self, ScopeRange};
use crate::signifier::{Signifier, SignifierState};
use crate::source::{Generation, SourceId};
use crate::types::{Type, TypeKind, TypeState, TypeStore};
use crate::visitor::SymbolVisitor;

pub const BASE_STRUCT: &str = "Struct";
pub const INSTANCE_STRUCT: &str = "Struct.Instance";
pub const OBJECT_ASSET: &str = "Asset.GMObject";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Report inferred types that contradict their documented type.
    pub strict_doc_types: bool,
    /// Report `self` used where it can only mean the global scope.
    pub report_global_self: bool,
    /// Report names that nothing declares while `self` is global.
    pub report_undeclared_globals: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            strict_doc_types: false,
            report_global_self: true,
            report_undeclared_globals: true,
        }
    }
}

/// A project resource (object, sprite, script, ...) visible as a global name.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub ty: Type,
    /// Shape of the instances of an object asset.
    pub instance: Option<Type>,
}

/// The analysis results of one generation of one file.
#[derive(Debug)]
pub struct FileSymbols {
    pub source: SourceId,
    pub generation: Generation,
    pub(crate) local: Type,
    pub(crate) scopes: Vec<ScopeRange>,
    pub(crate) references: Vec<(SourceSpan, Signifier)>,
    pub(crate) diagnostics: Diagnostics,
}

impl FileSymbols {
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The file's top-level local scope.
    pub fn local_scope(&self) -> &Type {
        &self.local
    }

    pub fn scopes(&self) -> &[ScopeRange] {
        &self.scopes
    }

    pub fn scope_at(&self, line: usize, column: usize) -> Option<&ScopeRange> {
        scope::scope_at(&self.scopes, Position::new(0, line, column))
    }

    /// The signifier referenced at a position; the innermost span wins.
    pub fn signifier_at(&self, line: usize, column: usize) -> Option<&Signifier> {
        self.references
            .iter()
            .filter(|(span, _)| span.contains(line, column))
            .min_by_key(|(span, _)| span.width())
            .map(|(_, signifier)| signifier)
    }

    pub fn references(&self) -> impl Iterator<Item = (&SourceSpan, &Signifier)> {
        self.references.iter().map(|(span, signifier)| (span, signifier))
    }
}

#[derive(Debug, Default)]
pub struct ReindexSummary {
    pub analyzed: usize,
    pub failed: Vec<(SourceId, AnalysisError)>,
    pub cancelled: bool,
}

/// One analysis session: the global scope, the type registry and the latest
/// good symbols of every file. All files share the same globals.
pub struct Project {
    options: AnalysisOptions,
    global: Type,
    types: FxHashMap<String, Type>,
    assets: FxHashMap<String, Asset>,
    files: FxHashMap<SourceId, FileSymbols>,
    next_generation: u64,
}

impl Project {
    pub fn new(options: AnalysisOptions) -> Self {
        let base = Type::named(TypeKind::Struct, BASE_STRUCT);
        let instance = Type::named(TypeKind::Struct, INSTANCE_STRUCT);
        instance.set_parent(Some(base.clone()));
        let global = Type::named(TypeKind::Struct, "global");

        let mut types = FxHashMap::default();
        types.insert(BASE_STRUCT.to_string(), base);
        types.insert(INSTANCE_STRUCT.to_string(), instance);

        Self {
            options,
            global,
            types,
            assets: FxHashMap::default(),
            files: FxHashMap::default(),
            next_generation: 1,
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn global(&self) -> &Type {
        &self.global
    }

    pub fn get_global(&self, name: &str) -> Option<Signifier> {
        self.global.own_member(name)
    }

    /// Declares or refines a global binding.
    pub fn declare_global(&mut self, name: &str, ty: &Type) -> Signifier {
        let signifier = self.global.add_member(name, ty);
        signifier.update_flags(|flags| flags.global = true);
        signifier
    }

    pub fn create_type(&self, kind: TypeKind) -> Type {
        Type::new(kind)
    }

    /// A fresh anonymous struct deriving from the base `Struct`.
    pub fn create_struct(&self) -> Type {
        let ty = Type::new(TypeKind::Struct);
        ty.set_parent(self.types.get(BASE_STRUCT).cloned());
        ty
    }

    pub fn base_struct(&self) -> Type {
        self.types
            .get(BASE_STRUCT)
            .cloned()
            .unwrap_or_else(|| Type::named(TypeKind::Struct, BASE_STRUCT))
    }

    pub fn instance_struct(&self) -> Type {
        self.types
            .get(INSTANCE_STRUCT)
            .cloned()
            .unwrap_or_else(|| Type::named(TypeKind::Struct, INSTANCE_STRUCT))
    }

    pub fn get_type(&self, name: &str) -> Option<Type> {
        self.types.get(name).cloned()
    }

    pub fn register_type<S: Into<String>>(&mut self, name: S, ty: Type) -> Type {
        self.types.entry(name.into()).or_insert(ty).clone()
    }

    /// The registered struct with this qualified name (`Struct.Player`),
    /// created if nothing has named it yet.
    pub fn named_struct(&mut self, name: &str) -> Type {
        if let Some(existing) = self.types.get(name) {
            return existing.clone();
        }
        let ty = self.create_struct();
        ty.set_name(name);
        trace!(name, "registered struct");
        self.register_type(name, ty)
    }

    /// Registers an object asset; its instances derive from the shared
    /// instance struct.
    pub fn register_object(&mut self, name: &str) -> Type {
        let instance = Type::named(TypeKind::Struct, format!("Id.Instance.{name}"));
        instance.set_parent(Some(self.instance_struct()));
        self.insert_asset(name, OBJECT_ASSET, Some(instance.clone()));
        instance
    }

    /// Registers any other kind of asset (`Asset.GMSprite`, `Asset.GMScript`,
    /// ...).
    pub fn register_asset(&mut self, name: &str, kind: &str) -> Type {
        self.insert_asset(name, kind, None)
    }

    fn insert_asset(&mut self, name: &str, kind: &str, instance: Option<Type>) -> Type {
        let ty = Type::named(TypeKind::External(kind.to_string()), name);
        let signifier = self.declare_global(name, &ty);
        signifier.update_flags(|flags| flags.native = true);
        self.assets.insert(
            name.to_string(),
            Asset {
                name: name.to_string(),
                ty: ty.clone(),
                instance,
            },
        );
        ty
    }

    pub fn get_asset(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn file(&self, source: SourceId) -> Option<&FileSymbols> {
        self.files.get(&source)
    }

    /// Types every file can reach: globals, registered types and assets.
    fn roots(&self) -> Vec<Type> {
        let mut roots = vec![self.global.clone()];
        roots.extend(self.types.values().cloned());
        for asset in self.assets.values() {
            roots.push(asset.ty.clone());
            roots.extend(asset.instance.clone());
        }
        roots
    }

    fn next_generation(&mut self) -> Generation {
        let generation = Generation(self.next_generation);
        self.next_generation += 1;
        generation
    }

    /// Resolves a documented type expression. Names the registry cannot
    /// resolve become `Unknown` and are returned for reporting.
    pub fn resolve_type_expr(&mut self, expr: &TypeExpr) -> (Type, Vec<String>) {
        let mut unresolved = Vec::new();
        let mut store = TypeStore::new();
        for branch in &expr.branches {
            match self.resolve_type_ref(branch, &mut unresolved) {
                Some(ty) => store.add(&ty),
                None => {
                    unresolved.push(branch.name.clone());
                    store.add(&Type::new(TypeKind::Unknown));
                }
            }
        }
        (store.to_type(), unresolved)
    }

    fn resolve_type_ref(
        &mut self,
        reference: &TypeRef,
        unresolved: &mut Vec<String>,
    ) -> Option<Type> {
        let name = reference.name.as_str();
        if let Some(kind) = primitive_kind(name) {
            return Some(Type::new(kind));
        }
        match name.to_ascii_lowercase().as_str() {
            "function" | "method" => return Some(Type::new(TypeKind::Function)),
            "array" => {
                let array = Type::new(TypeKind::Array);
                if let Some(items) = &reference.items {
                    for item in &items.branches {
                        match self.resolve_type_ref(item, unresolved) {
                            Some(ty) => array.add_item_type(&ty),
                            None => unresolved.push(item.name.clone()),
                        }
                    }
                }
                return Some(array);
            }
            "struct" => return Some(self.base_struct()),
            _ => {}
        }
        if let Some(ty) = self.types.get(name) {
            return Some(ty.clone());
        }
        if name.starts_with("Struct.") {
            return Some(self.named_struct(name));
        }
        if name.starts_with("Asset.") || name.starts_with("Id.") {
            return Some(Type::external(name));
        }
        if let Some(asset) = self.assets.get(name) {
            return Some(asset.instance.clone().unwrap_or_else(|| asset.ty.clone()));
        }
        // A constructor or struct bound to a global name.
        let global = self.get_global(name)?;
        global
            .get_type_by_kind(&TypeKind::Function)
            .and_then(|function| function.constructs())
            .or_else(|| global.get_type_by_kind(&TypeKind::Struct))
    }

    /// Analyzes one file and swaps its symbols in. On failure the previous
    /// generation stays current: the shared types and signifiers the failed
    /// pass touched are put back as they were, and its references dropped.
    #[tracing::instrument(level = "debug", skip(self, file), fields(source = source.0))]
    pub fn analyze(
        &mut self,
        source: SourceId,
        file: &File,
    ) -> Result<&FileSymbols, AnalysisError> {
        let generation = self.next_generation();
        let checkpoint = Checkpoint::capture(reachable_types(self.roots()));
        let registry = self.types.clone();
        let result = {
            let processor = SymbolProcessor::new(self, source, generation, file.span.start());
            SymbolVisitor::new(processor).visit_file(file)
        };
        match result {
            Ok(symbols) => {
                self.purge(source, |stamp| stamp < generation);
                debug!(
                    generation = generation.0,
                    diagnostics = symbols.diagnostics.len(),
                    references = symbols.references.len(),
                    "analyzed file"
                );
                let symbols = match self.files.entry(source) {
                    Entry::Occupied(mut entry) => {
                        entry.insert(symbols);
                        entry.into_mut()
                    }
                    Entry::Vacant(entry) => entry.insert(symbols),
                };
                Ok(symbols)
            }
            Err(err) => {
                error!(
                    generation = generation.0,
                    error = %err,
                    "analysis aborted, keeping previous symbols"
                );
                checkpoint.restore();
                self.types = registry;
                self.purge(source, |stamp| stamp == generation);
                Err(err)
            }
        }
    }

    /// Analyzes many files in order, checking `cancel` between files.
    pub fn reindex<'f, I>(&mut self, files: I, cancel: &AtomicBool) -> ReindexSummary
    where
        I: IntoIterator<Item = (SourceId, &'f File)>,
    {
        let mut summary = ReindexSummary::default();
        for (source, file) in files {
            if cancel.load(Ordering::Relaxed) {
                warn!(analyzed = summary.analyzed, "reindex cancelled");
                summary.cancelled = true;
                break;
            }
            match self.analyze(source, file) {
                Ok(_) => summary.analyzed += 1,
                Err(err) => summary.failed.push((source, err)),
            }
        }
        summary
    }

    /// Drops references and definitions `source` contributed in the selected
    /// generations from every shared signifier, then removes members nothing
    /// defines or references anymore.
    fn purge(&mut self, source: SourceId, stale: impl Fn(Generation) -> bool) {
        let mut purged = 0usize;
        let mut removed = 0usize;
        for ty in reachable_types(self.roots()) {
            for member in ty.members() {
                if member.purge_source(source, &stale) {
                    purged += 1;
                }
                if member.is_orphaned() {
                    ty.remove_member(&member.name());
                    removed += 1;
                }
            }
            for parameter in ty.parameters() {
                if parameter.purge_source(source, &stale) {
                    purged += 1;
                }
            }
        }
        trace!(source = source.0, purged, removed, "purged shared symbols");
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(AnalysisOptions::default())
    }
}

/// The shared graph as it was before a pass. References and definitions
/// are not captured; they carry their generation and are purged by it.
struct Checkpoint {
    types: Vec<(Type, TypeState)>,
    signifiers: Vec<(Signifier, SignifierState)>,
}

impl Checkpoint {
    fn capture(types: Vec<Type>) -> Self {
        let mut seen = FxHashSet::default();
        let mut signifiers = Vec::new();
        for ty in &types {
            for signifier in ty.members().into_iter().chain(ty.parameters()) {
                if seen.insert(signifier.id()) {
                    let state = signifier.save_state();
                    signifiers.push((signifier, state));
                }
            }
        }
        let types = types
            .into_iter()
            .map(|ty| {
                let state = ty.save_state();
                (ty, state)
            })
            .collect();
        Self { types, signifiers }
    }

    fn restore(self) {
        trace!(
            types = self.types.len(),
            signifiers = self.signifiers.len(),
            "restoring checkpoint"
        );
        for (ty, state) in self.types {
            ty.restore_state(state);
        }
        for (signifier, state) in self.signifiers {
            signifier.restore_state(state);
        }
    }
}

/// Every type reachable from `roots` through members, parameters, returns,
/// items, branches and struct links.
fn reachable_types(roots: Vec<Type>) -> Vec<Type> {
    let mut seen = FxHashSet::default();
    let mut pending = roots;
    let mut found = Vec::new();
    while let Some(ty) = pending.pop() {
        if !seen.insert(ty.id()) {
            continue;
        }
        for signifier in ty.members().iter().chain(ty.parameters().iter()) {
            pending.extend(signifier.types().types().iter().cloned());
        }
        pending.extend(ty.returns().types().iter().cloned());
        pending.extend(ty.items().types().iter().cloned());
        if ty.is_kind(&TypeKind::Union) {
            pending.extend(ty.branches());
        }
        pending.extend(ty.parent());
        pending.extend(ty.constructs());
        pending.extend(ty.context());
        found.push(ty);
    }
    found
}

fn primitive_kind(name: &str) -> Option<TypeKind> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "real" | "number" | "int" | "integer" | "float" | "double" => TypeKind::Real,
        "string" => TypeKind::String,
        "bool" | "boolean" => TypeKind::Bool,
        "undefined" | "void" => TypeKind::Undefined,
        "pointer" | "ptr" => TypeKind::Pointer,
        "any" | "mixed" | "unknown" => TypeKind::Unknown,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsdoc::parse_type_expr;

    #[test]
    fn resolves_documented_names() {
        let mut project = Project::default();
        let expr = parse_type_expr("String|Function|Asset.GMScript").expect("parses");
        let (ty, unresolved) = project.resolve_type_expr(&expr);
        assert!(unresolved.is_empty());
        let kinds: Vec<_> = ty.branches().iter().map(|b| b.kind().clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TypeKind::String,
                TypeKind::Function,
                TypeKind::External("Asset.GMScript".to_string())
            ]
        );

        let widget = parse_type_expr("Widget").expect("parses");
        let (_, unresolved) = project.resolve_type_expr(&widget);
        assert_eq!(unresolved, vec!["Widget".to_string()]);
    }

    #[test]
    fn struct_names_register_once() {
        let mut project = Project::default();
        let expr = parse_type_expr("Struct.Player").expect("parses");
        let (first, _) = project.resolve_type_expr(&expr);
        let (second, _) = project.resolve_type_expr(&expr);
        assert!(first.ptr_eq(&second));
        assert!(first.narrows(&project.base_struct()));
    }

    #[test]
    fn objects_expose_instance_shapes() {
        let mut project = Project::default();
        let instance = project.register_object("obj_player");
        let asset = project.get_asset("obj_player").expect("asset");
        assert!(asset.ty.is_kind(&TypeKind::External(OBJECT_ASSET.to_string())));
        assert!(instance.narrows(&project.instance_struct()));
        assert!(project.get_global("obj_player").is_some());
    }
}
