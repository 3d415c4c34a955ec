use tracing::trace;

use crate::cst::{Position, SourceSpan};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::AnalysisError;
use crate::jsdoc::{Jsdoc, JsdocKind, TypeExpr};
use crate::project::{AnalysisOptions, FileSymbols, Project};
use crate::scope::{ScopeStack, ScopeTuple};
use crate::signifier::Signifier;
use crate::source::{Generation, Location, SourceId};
use crate::types::{Type, TypeKind};

/// A documented parameter with its type already resolved.
#[derive(Debug, Clone)]
pub struct DocumentedParam {
    pub name: String,
    pub ty: Option<Type>,
    pub optional: bool,
    pub description: Option<String>,
}

/// A parsed doc comment waiting for the binding it documents, with every
/// type expression resolved against the project.
#[derive(Debug, Clone)]
pub struct DocumentedType {
    pub jsdoc: Jsdoc,
    /// The documented type of the next binding: the `@type`, a function type
    /// built from params and returns, or `Unknown` for plain descriptions.
    pub ty: Type,
    pub params: Vec<DocumentedParam>,
    pub returns: Option<Type>,
    /// The `@self` context, when it names a struct.
    pub context: Option<Type>,
}

impl DocumentedType {
    pub fn kind(&self) -> JsdocKind {
        self.jsdoc.kind
    }
}

/// Per-file analysis state: the scope stacks, the pending doc comment and
/// everything that ends up in the file's [`FileSymbols`].
pub struct SymbolProcessor<'p> {
    project: &'p mut Project,
    source: SourceId,
    generation: Generation,
    scopes: ScopeStack,
    root_local: Type,
    diagnostics: Diagnostics,
    unused_jsdoc: Option<DocumentedType>,
    references: Vec<(SourceSpan, Signifier)>,
}

impl<'p> SymbolProcessor<'p> {
    pub fn new(
        project: &'p mut Project,
        source: SourceId,
        generation: Generation,
        start: Position,
    ) -> Self {
        let root_local = Type::new(TypeKind::Struct);
        let scopes = ScopeStack::new(project.global().clone(), root_local.clone(), start);
        Self {
            project,
            source,
            generation,
            scopes,
            root_local,
            diagnostics: Diagnostics::new(),
            unused_jsdoc: None,
            references: Vec::new(),
        }
    }

    pub fn project(&mut self) -> &mut Project {
        &mut *self.project
    }

    pub fn options(&self) -> &AnalysisOptions {
        self.project.options()
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn location(&self, span: SourceSpan) -> Location {
        Location::new(self.source, span)
    }

    pub fn full_scope(&self) -> ScopeTuple {
        self.scopes.full_scope()
    }

    pub fn current_local(&self) -> Type {
        self.scopes.local().clone()
    }

    pub fn current_self(&self) -> Type {
        self.scopes.self_scope().clone()
    }

    pub fn other_self(&self) -> Type {
        self.scopes.other_scope().clone()
    }

    pub fn global(&self) -> Type {
        self.scopes.global().clone()
    }

    pub fn self_is_global(&self) -> bool {
        self.scopes.full_scope().self_is_global()
    }

    /// Enters a function body with a fresh local scope.
    pub fn push_scope(&mut self, at: Position, self_scope: Type) -> Type {
        let local = Type::new(TypeKind::Struct);
        self.scopes.push_scope(at, local.clone(), self_scope);
        trace!(depth = self.scopes.depth(), "pushed scope");
        local
    }

    pub fn pop_scope(&mut self, at: Position) -> Result<(), AnalysisError> {
        self.scopes.pop_scope(at)
    }

    pub fn push_self_scope(&mut self, at: Position, self_scope: Type) {
        self.scopes.push_self_scope(at, self_scope);
    }

    pub fn pop_self_scope(&mut self, at: Position) -> Result<(), AnalysisError> {
        self.scopes.pop_self_scope(at)
    }

    pub fn create_struct(&self) -> Type {
        self.project.create_struct()
    }

    /// Instance shape of a registered object asset.
    pub fn object_instance(&self, name: &str) -> Option<Type> {
        self.project
            .get_asset(name)
            .and_then(|asset| asset.instance.clone())
    }

    pub fn add_diagnostic<S: Into<String>>(
        &mut self,
        kind: DiagnosticKind,
        message: S,
        span: SourceSpan,
    ) {
        self.diagnostics.push(kind, message, span);
    }

    /// Local scope, then `self` (unless it is the global struct), then
    /// globals.
    pub fn find_by_name(&self, name: &str) -> Option<Signifier> {
        let scope = self.scopes.full_scope();
        scope
            .local
            .own_member(name)
            .or_else(|| {
                if scope.self_is_global() {
                    None
                } else {
                    scope.self_scope.get_member(name)
                }
            })
            .or_else(|| self.project.get_global(name))
    }

    /// Records a read stamped with this pass's generation.
    pub fn add_ref(&mut self, signifier: &Signifier, span: SourceSpan) {
        signifier.add_ref(self.location(span), self.generation);
        self.references.push((span, signifier.clone()));
    }

    /// Records a write of `ty`; the first write of a pass defines the binding.
    pub fn assign(&mut self, signifier: &Signifier, span: SourceSpan, ty: &Type) {
        signifier.assign(self.location(span), self.generation, ty);
        self.references.push((span, signifier.clone()));
    }

    pub fn define(&self, signifier: &Signifier, span: SourceSpan) -> bool {
        signifier.defined_at(self.location(span), self.generation)
    }

    /// Resolves a documented type, reporting names the registry does not know.
    pub fn resolve_type_expr(&mut self, expr: &TypeExpr, span: SourceSpan) -> Type {
        let (ty, unresolved) = self.project.resolve_type_expr(expr);
        for name in unresolved {
            self.diagnostics.push(
                DiagnosticKind::UnresolvedType,
                format!("Unknown type `{name}`."),
                span,
            );
        }
        ty
    }

    fn resolve_documented(&mut self, expr: &TypeExpr, jsdoc: &Jsdoc) -> Type {
        let span = jsdoc
            .type_spans
            .iter()
            .find(|(candidate, _)| candidate == expr)
            .map(|(_, span)| *span)
            .unwrap_or(jsdoc.span);
        self.resolve_type_expr(expr, span)
    }

    /// Resolves a doc comment and holds it for the next binding. An earlier
    /// comment that nothing consumed is dropped.
    pub fn prepare_jsdoc(&mut self, jsdoc: Jsdoc) {
        let params: Vec<DocumentedParam> = jsdoc
            .params
            .iter()
            .map(|param| DocumentedParam {
                name: param.name.clone(),
                ty: param.ty.as_ref().map(|expr| self.resolve_documented(expr, &jsdoc)),
                optional: param.optional,
                description: param.description.clone(),
            })
            .collect();
        let returns = jsdoc
            .returns
            .as_ref()
            .map(|expr| self.resolve_documented(expr, &jsdoc));
        let context = jsdoc
            .self_type
            .as_ref()
            .map(|expr| self.resolve_documented(expr, &jsdoc))
            .and_then(|ty| ty.branch_of_kind(&TypeKind::Struct));

        let ty = match jsdoc.kind {
            JsdocKind::Type => match &jsdoc.type_expr {
                Some(expr) => self.resolve_documented(expr, &jsdoc),
                None => Type::new(TypeKind::Unknown),
            },
            JsdocKind::Function => {
                let function = Type::new(TypeKind::Function);
                for (index, param) in params.iter().enumerate() {
                    let types = param.ty.as_ref().map(std::slice::from_ref);
                    function.add_parameter(index, &param.name, types, param.optional);
                }
                if let Some(returns) = &returns {
                    function.set_return_type(std::slice::from_ref(returns));
                }
                function.set_context(context.clone());
                function
            }
            JsdocKind::SelfContext | JsdocKind::Description => Type::new(TypeKind::Unknown),
        };

        self.discard_jsdoc();
        self.unused_jsdoc = Some(DocumentedType {
            jsdoc,
            ty,
            params,
            returns,
            context,
        });
    }

    /// Takes the pending doc comment; each comment is consumed at most once.
    pub fn consume_jsdoc(&mut self) -> Option<DocumentedType> {
        self.unused_jsdoc.take()
    }

    /// Drops a pending doc comment that nothing consumed.
    pub fn discard_jsdoc(&mut self) {
        if self.unused_jsdoc.take().is_some() {
            trace!("discarding unconsumed doc comment");
        }
    }

    /// Puts back a comment taken with [`SymbolProcessor::consume_jsdoc`]
    /// while a nested construct had its own.
    pub fn restore_jsdoc(&mut self, docs: Option<DocumentedType>) {
        self.discard_jsdoc();
        self.unused_jsdoc = docs;
    }

    /// Closes the last scope range at the end of the file.
    pub fn finish(self, end: Position) -> FileSymbols {
        FileSymbols {
            source: self.source,
            generation: self.generation,
            local: self.root_local,
            scopes: self.scopes.finish(end),
            references: self.references,
            diagnostics: self.diagnostics,
        }
    }
}
