//! One walk over a file's syntax tree that declares, references and types
//! every signifier it meets.

mod accessor;
mod function;

use tracing::trace;

use crate::cst::{
    ArrayLiteral, AssignmentOperator, EnumStatement, Expression, ExpressionKind, File,
    GlobalVarDeclarations, Identifier, Literal, LocalVarDeclarations, LoopStatement,
    MacroStatement, ReturnStatement, SourceSpan, Statement, StaticVarDeclaration, StructLiteral,
    SwitchStatement, UnaryOperator, WithStatement,
};
use crate::diagnostics::DiagnosticKind;
use crate::error::{required, AnalysisError};
use crate::jsdoc::{parse_jsdoc, JsdocKind};
use crate::processor::SymbolProcessor;
use crate::project::{FileSymbols, OBJECT_ASSET};
use crate::signifier::Signifier;
use crate::types::{Type, TypeKind};

/// Why the walk is inside a node, innermost last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    FunctionStatement,
    FunctionBody,
    FunctionParam,
    FunctionArg,
    FunctionReturn,
    WithCondition,
    WithBody,
    Assignment,
    StructValue,
    ArrayMember,
    Template,
}

#[derive(Debug, Clone, Default)]
pub struct VisitorContext {
    kinds: Vec<ContextKind>,
}

impl ContextKind {
    /// Whether a function expression met directly here is the binding the
    /// pending doc comment describes. Arguments, parameters, array members
    /// and the like leave the comment to the enclosing declaration.
    fn takes_docs(self) -> bool {
        match self {
            ContextKind::FunctionStatement | ContextKind::Assignment | ContextKind::StructValue => {
                true
            }
            ContextKind::FunctionBody
            | ContextKind::FunctionParam
            | ContextKind::FunctionArg
            | ContextKind::FunctionReturn
            | ContextKind::WithCondition
            | ContextKind::WithBody
            | ContextKind::ArrayMember
            | ContextKind::Template => false,
        }
    }
}

impl VisitorContext {
    pub fn with_kind(&self, kind: ContextKind) -> Self {
        let mut kinds = self.kinds.clone();
        kinds.push(kind);
        Self { kinds }
    }

    pub fn current(&self) -> Option<ContextKind> {
        self.kinds.last().copied()
    }

    pub fn takes_docs(&self) -> bool {
        self.current().is_some_and(ContextKind::takes_docs)
    }
}

/// A type after its doc comment (if any) has been applied, plus the doc
/// details that belong on the receiving signifier.
pub(crate) struct Documented {
    ty: Type,
    description: Option<String>,
    deprecated: bool,
}

impl Documented {
    fn plain(ty: Type) -> Self {
        Self {
            ty,
            description: None,
            deprecated: false,
        }
    }

    fn apply(&self, signifier: &Signifier) {
        if let Some(description) = &self.description {
            signifier.describe(description.clone());
        }
        if self.deprecated {
            signifier.update_flags(|flags| flags.deprecated = true);
        }
    }
}

pub struct SymbolVisitor<'p> {
    processor: SymbolProcessor<'p>,
    /// Return types collected per enclosing function.
    returns: Vec<Vec<Type>>,
    /// Signifier the next function expression is assigned to.
    function_signifier: Option<Signifier>,
    /// Signifier the next struct literal is assigned to.
    struct_signifier: Option<Signifier>,
}

impl<'p> SymbolVisitor<'p> {
    pub fn new(processor: SymbolProcessor<'p>) -> Self {
        Self {
            processor,
            returns: Vec::new(),
            function_signifier: None,
            struct_signifier: None,
        }
    }

    pub fn visit_file(mut self, file: &File) -> Result<FileSymbols, AnalysisError> {
        self.declare_globals(&file.statements);
        self.visit_statements(&file.statements, &VisitorContext::default())?;
        Ok(self.processor.finish(file.span.end()))
    }

    /// Declares top-level functions, `globalvar`s, enums and macros before the
    /// walk so that uses ahead of the declaration resolve.
    fn declare_globals(&mut self, statements: &[Statement]) {
        for statement in statements {
            match statement {
                Statement::Function(function) => {
                    let Some(name) = &function.name else { continue };
                    let project = self.processor.project();
                    let has_function = project
                        .get_global(&name.name)
                        .and_then(|global| global.get_type_by_kind(&TypeKind::Function))
                        .is_some();
                    if !has_function {
                        project.declare_global(&name.name, &Type::new(TypeKind::Function));
                    }
                }
                Statement::GlobalVarDeclarations(node) => {
                    for name in &node.names {
                        self.processor
                            .project()
                            .declare_global(&name.name, &Type::new(TypeKind::Unknown));
                    }
                }
                Statement::Enum(node) => {
                    let ty = self.enum_type(&node.name.name);
                    self.processor.project().declare_global(&node.name.name, &ty);
                }
                Statement::Macro(node) => {
                    self.processor
                        .project()
                        .declare_global(&node.name.name, &Type::new(TypeKind::Unknown))
                        .update_flags(|flags| flags.is_macro = true);
                }
                _ => {}
            }
        }
    }

    fn visit_statements(
        &mut self,
        statements: &[Statement],
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        for statement in statements {
            self.visit_statement(statement, context)?;
        }
        Ok(())
    }

    fn visit_statement(
        &mut self,
        statement: &Statement,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        if !is_documentable(statement) {
            self.processor.discard_jsdoc();
        }
        match statement {
            Statement::Jsdoc(comment) => {
                self.processor.prepare_jsdoc(parse_jsdoc(comment));
                Ok(())
            }
            Statement::LocalVarDeclarations(node) => {
                self.visit_local_var_declarations(node, context)
            }
            Statement::StaticVarDeclaration(node) => {
                self.visit_static_var_declaration(node, context)
            }
            Statement::GlobalVarDeclarations(node) => {
                self.visit_globalvar_declarations(node);
                Ok(())
            }
            Statement::VariableAssignment(node) => self.assign_variable(
                &node.name,
                node.operator,
                node.value.as_ref(),
                node.span,
                context,
            ),
            Statement::MemberAssignment(node) => self.visit_member_assignment(node, context),
            Statement::Function(node) => self
                .visit_function(node, &context.with_kind(ContextKind::FunctionStatement))
                .map(|_| ()),
            Statement::Enum(node) => self.visit_enum(node, context),
            Statement::Macro(node) => self.visit_macro(node, context),
            Statement::With(node) => self.visit_with(node, context),
            Statement::If(node) => {
                self.expression(&node.condition, context)?;
                self.visit_statement(&node.consequent, context)?;
                if let Some(alternative) = &node.alternative {
                    self.visit_statement(alternative, context)?;
                }
                Ok(())
            }
            Statement::Loop(node) => self.visit_loop(node, context),
            Statement::Switch(node) => self.visit_switch(node, context),
            Statement::Return(node) => self.visit_return(node, context),
            Statement::Block(node) => self.visit_statements(&node.statements, context),
            Statement::Expression(node) => {
                self.expression(&node.expression, context).map(|_| ())
            }
            Statement::Control(_) => Ok(()),
        }
    }

    /// Applies the pending doc comment to an inferred type. Documented types
    /// win when the inferred type narrows them; otherwise both are kept.
    pub(crate) fn updated_type_with_docs(&mut self, ty: Type) -> Documented {
        let Some(docs) = self.processor.consume_jsdoc() else {
            return Documented::plain(ty);
        };
        let ty = match docs.kind() {
            JsdocKind::SelfContext => return Documented::plain(ty),
            JsdocKind::Description => ty,
            JsdocKind::Type | JsdocKind::Function => {
                if ty.narrows(&docs.ty) {
                    docs.ty.clone()
                } else {
                    if self.processor.options().strict_doc_types {
                        self.processor.add_diagnostic(
                            DiagnosticKind::DocTypeMismatch,
                            format!(
                                "Inferred type `{}` does not match documented type `{}`.",
                                ty.describe(),
                                docs.ty.describe()
                            ),
                            docs.jsdoc.span,
                        );
                    }
                    Type::merge(&ty, &docs.ty)
                }
            }
        };
        Documented {
            ty,
            description: docs.jsdoc.description.clone(),
            deprecated: docs.jsdoc.deprecated,
        }
    }

    fn visit_local_var_declarations(
        &mut self,
        node: &LocalVarDeclarations,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let local = self.processor.current_local();
        for declaration in &node.declarations {
            let name = &declaration.name;
            let inferred = match &declaration.value {
                Some(value) => {
                    if value.is_function() {
                        self.function_signifier =
                            Some(local.add_member(&name.name, &Type::new(TypeKind::Unknown)));
                    }
                    self.expression(value, &context.with_kind(ContextKind::Assignment))?
                }
                None => Type::new(TypeKind::Unknown),
            };
            let documented = self.updated_type_with_docs(inferred);
            let member = local.ensure_member(&name.name);
            self.processor.assign(&member, name.span, &documented.ty);
            member.update_flags(|flags| flags.local = true);
            documented.apply(&member);
        }
        Ok(())
    }

    /// `static` members belong to the current self and are unambiguous
    /// definitions.
    fn visit_static_var_declaration(
        &mut self,
        node: &StaticVarDeclaration,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let value = required(node.value.as_ref(), "static declaration", "value", node.span)?;
        let owner = self.processor.current_self();
        let member = owner.ensure_member(&node.name.name);
        if value.is_function() {
            self.function_signifier = Some(member.clone());
        }
        if value.is_struct() {
            self.struct_signifier = Some(member.clone());
        }
        let inferred = self.expression(value, &context.with_kind(ContextKind::Assignment))?;
        let documented = self.updated_type_with_docs(inferred);
        self.processor.assign(&member, node.name.span, &documented.ty);
        member.update_flags(|flags| {
            flags.is_static = true;
            flags.instance = true;
        });
        documented.apply(&member);
        Ok(())
    }

    fn visit_globalvar_declarations(&mut self, node: &GlobalVarDeclarations) {
        for name in &node.names {
            let documented = self.updated_type_with_docs(Type::new(TypeKind::Unknown));
            let global = self
                .processor
                .project()
                .declare_global(&name.name, &Type::new(TypeKind::Unknown));
            self.processor.assign(&global, name.span, &documented.ty);
            documented.apply(&global);
        }
    }

    /// Assignment to a bare name. Unknown names become instance members of a
    /// non-global self; with a global self they are reported instead.
    pub(crate) fn assign_variable(
        &mut self,
        name: &Identifier,
        operator: AssignmentOperator,
        value: Option<&Expression>,
        span: SourceSpan,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let value = required(value, "assignment", "value", span)?;
        let assignment = context.with_kind(ContextKind::Assignment);
        if name.pseudo().is_some() {
            self.expression(value, &assignment)?;
            return Ok(());
        }

        let scope = self.processor.full_scope();
        let existing = self.processor.find_by_name(&name.name);
        if value.is_function() {
            self.function_signifier = existing.clone().or_else(|| {
                (!scope.self_is_global()).then(|| scope.self_scope.ensure_member(&name.name))
            });
        }
        if value.is_struct() {
            self.struct_signifier = existing.clone();
        }
        let assigned = self.expression(value, &assignment)?;
        let assigned = compound_result(operator, assigned, existing.as_ref());
        let documented = self.updated_type_with_docs(assigned);

        match existing {
            Some(signifier) => {
                self.processor.assign(&signifier, name.span, &documented.ty);
                documented.apply(&signifier);
            }
            None if !scope.self_is_global() => {
                let member = scope.self_scope.ensure_member(&name.name);
                self.processor.assign(&member, name.span, &documented.ty);
                member.update_flags(|flags| flags.instance = true);
                documented.apply(&member);
            }
            None => self.report_undeclared(name),
        }
        Ok(())
    }

    pub(crate) fn report_undeclared(&mut self, name: &Identifier) {
        if self.processor.self_is_global() && self.processor.options().report_undeclared_globals {
            self.processor.add_diagnostic(
                DiagnosticKind::UndeclaredGlobalReference,
                format!("`{}` is not declared anywhere.", name.name),
                name.span,
            );
        }
    }

    fn enum_type(&mut self, name: &str) -> Type {
        let project = self.processor.project();
        if let Some(existing) = project
            .get_global(name)
            .and_then(|global| global.get_type_by_kind(&TypeKind::Enum))
        {
            return existing;
        }
        let qualified = format!("Enum.{name}");
        match project.get_type(&qualified) {
            Some(existing) => existing,
            None => {
                let ty = Type::named(TypeKind::Enum, qualified.clone());
                project.register_type(qualified, ty)
            }
        }
    }

    fn visit_enum(
        &mut self,
        node: &EnumStatement,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let documented = self.updated_type_with_docs(Type::new(TypeKind::Unknown));
        let ty = self.enum_type(&node.name.name);
        let global = self.processor.project().declare_global(&node.name.name, &ty);
        self.processor.define(&global, node.name.span);
        documented.apply(&global);
        self.processor.add_ref(&global, node.name.span);

        for member in &node.members {
            if let Some(value) = &member.value {
                self.expression(value, &context.with_kind(ContextKind::Assignment))?;
            }
            let entry = ty.add_member(&member.name.name, &Type::new(TypeKind::Real));
            self.processor.define(&entry, member.name.span);
            self.processor.add_ref(&entry, member.name.span);
        }
        Ok(())
    }

    fn visit_macro(
        &mut self,
        node: &MacroStatement,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let inferred = match &node.value {
            Some(value) => self.expression(value, &context.with_kind(ContextKind::Assignment))?,
            None => Type::new(TypeKind::Unknown),
        };
        let documented = self.updated_type_with_docs(inferred);
        let global = self
            .processor
            .project()
            .declare_global(&node.name.name, &Type::new(TypeKind::Unknown));
        global.update_flags(|flags| flags.is_macro = true);
        self.processor.assign(&global, node.name.span, &documented.ty);
        documented.apply(&global);
        Ok(())
    }

    /// `with` rebinds `self` to the guard's struct, the instance shape of an
    /// object asset, or a documented `@self`, for the body only.
    fn visit_with(
        &mut self,
        node: &WithStatement,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let expression = required(
            node.expression.as_ref(),
            "with statement",
            "expression",
            node.span,
        )?;
        let body = required(node.body.as_deref(), "with statement", "body", node.span)?;

        let guard = self.expression(expression, &context.with_kind(ContextKind::WithCondition))?;
        let documented_self = self
            .processor
            .consume_jsdoc()
            .filter(|docs| docs.kind() == JsdocKind::SelfContext)
            .and_then(|docs| docs.context);
        let self_scope = match documented_self {
            Some(documented) => documented,
            None => self
                .struct_branches(&guard)
                .into_iter()
                .next()
                .unwrap_or_else(|| self.processor.create_struct()),
        };

        let body_span = body.span();
        self.processor.push_self_scope(body_span.start(), self_scope);
        self.visit_statement(body, &context.with_kind(ContextKind::WithBody))?;
        self.processor.pop_self_scope(body_span.end())
    }

    /// Struct shapes a value can have, including the instance shapes of
    /// object assets.
    pub(crate) fn struct_branches(&self, ty: &Type) -> Vec<Type> {
        ty.branches()
            .into_iter()
            .filter_map(|branch| match branch.kind() {
                TypeKind::Struct | TypeKind::Enum => Some(branch),
                TypeKind::External(kind) if kind == OBJECT_ASSET => branch
                    .name()
                    .and_then(|name| self.processor.object_instance(&name)),
                _ => None,
            })
            .collect()
    }

    fn visit_loop(
        &mut self,
        node: &LoopStatement,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        if let Some(initializer) = &node.initializer {
            self.visit_statement(initializer, context)?;
        }
        if let Some(condition) = &node.condition {
            self.expression(condition, context)?;
        }
        if let Some(step) = &node.step {
            self.visit_statement(step, context)?;
        }
        self.visit_statement(&node.body, context)
    }

    fn visit_switch(
        &mut self,
        node: &SwitchStatement,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        self.expression(&node.discriminant, context)?;
        for case in &node.cases {
            if let Some(test) = &case.test {
                self.expression(test, context)?;
            }
            self.visit_statements(&case.statements, context)?;
        }
        Ok(())
    }

    fn visit_return(
        &mut self,
        node: &ReturnStatement,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let ty = match &node.value {
            Some(value) => self.expression(value, &context.with_kind(ContextKind::FunctionReturn))?,
            None => Type::new(TypeKind::Undefined),
        };
        match self.returns.last_mut() {
            Some(returns) => returns.push(ty),
            None => trace!("return outside of a function"),
        }
        Ok(())
    }

    pub(crate) fn expression(
        &mut self,
        expression: &Expression,
        context: &VisitorContext,
    ) -> Result<Type, AnalysisError> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(Type::new(literal_kind(literal))),
            ExpressionKind::Template(template) => {
                let inner = context.with_kind(ContextKind::Template);
                for part in &template.expressions {
                    self.expression(part, &inner)?;
                }
                Ok(Type::new(TypeKind::String))
            }
            ExpressionKind::Array(literal) => self.visit_array_literal(literal, context),
            ExpressionKind::Struct(literal) => self.visit_struct_literal(literal, context),
            ExpressionKind::Function(function) => self.visit_function(function, context),
            ExpressionKind::Accessor(accessor) => {
                self.visit_identifier_accessor(accessor, context)
            }
            ExpressionKind::New(node) => self.visit_new(node, context),
            ExpressionKind::Parenthesized(inner) => self.expression(inner, context),
            ExpressionKind::Unary(unary) => {
                let operand = self.expression(&unary.operand, context)?;
                Ok(match unary.operator {
                    UnaryOperator::Not => Type::new(TypeKind::Bool),
                    _ => operand,
                })
            }
            ExpressionKind::Binary(binary) => {
                let left = self.expression(&binary.left, context)?;
                let right = self.expression(&binary.right, context)?;
                Ok(if binary.operator.is_comparison() {
                    Type::new(TypeKind::Bool)
                } else if binary.operator.is_short_circuit() {
                    Type::merge(&left, &right)
                } else {
                    left
                })
            }
            ExpressionKind::Ternary(ternary) => {
                self.expression(&ternary.condition, context)?;
                let consequent = self.expression(&ternary.consequent, context)?;
                let alternative = self.expression(&ternary.alternative, context)?;
                Ok(Type::merge(&consequent, &alternative))
            }
            ExpressionKind::Assignment(assignment) => {
                self.expression(&assignment.target, context)?;
                self.expression(&assignment.value, context)?;
                Ok(Type::new(TypeKind::Undefined))
            }
        }
    }

    /// Item types are deduplicated by kind and name.
    fn visit_array_literal(
        &mut self,
        literal: &ArrayLiteral,
        context: &VisitorContext,
    ) -> Result<Type, AnalysisError> {
        let array = Type::new(TypeKind::Array);
        let member_context = context.with_kind(ContextKind::ArrayMember);
        let mut seen: Vec<Type> = Vec::new();
        for element in &literal.elements {
            let ty = self.expression(element, &member_context)?;
            if !seen
                .iter()
                .any(|existing| existing.kind() == ty.kind() && existing.name() == ty.name())
            {
                array.add_item_type(&ty);
                seen.push(ty);
            }
        }
        Ok(array)
    }

    /// A struct literal is a fresh struct that is also `self` for its values.
    /// Entries only see their own doc comments; the comment in front of the
    /// declaration is held back for the declaration itself.
    fn visit_struct_literal(
        &mut self,
        literal: &StructLiteral,
        context: &VisitorContext,
    ) -> Result<Type, AnalysisError> {
        let shape = self
            .struct_signifier
            .take()
            .and_then(|target| self.previous_literal(&target))
            .unwrap_or_else(|| self.processor.create_struct());
        let value_context = context.with_kind(ContextKind::StructValue);
        let outer_docs = self.processor.consume_jsdoc();
        self.processor
            .push_self_scope(literal.start_brace.start(), shape.clone());

        for entry in &literal.entries {
            let name = entry.key.name();
            let key_span = entry.key.span();
            match &entry.jsdoc {
                Some(jsdoc) => self.processor.prepare_jsdoc(parse_jsdoc(jsdoc)),
                None => self.processor.discard_jsdoc(),
            }
            let inferred = match &entry.value {
                Some(value) => {
                    if value.is_function() {
                        self.function_signifier = Some(shape.ensure_member(name));
                    }
                    self.expression(value, &value_context)?
                }
                // Shorthand `{ name }` copies the variable of the same name.
                None => match self.shorthand_source(name) {
                    Some(source) => {
                        self.processor.add_ref(&source, key_span);
                        source.ty()
                    }
                    None => Type::new(TypeKind::Unknown),
                },
            };
            let documented = self.updated_type_with_docs(inferred);
            let member = shape.ensure_member(name);
            self.processor.assign(&member, key_span, &documented.ty);
            member.update_flags(|flags| flags.instance = true);
            documented.apply(&member);
        }

        self.processor.restore_jsdoc(outer_docs);
        self.processor.pop_self_scope(literal.end_brace.end())?;
        Ok(shape)
    }

    /// Shorthand entries read the name where the literal is written, never
    /// the literal's own member.
    fn shorthand_source(&self, name: &str) -> Option<Signifier> {
        let scope = self.processor.full_scope();
        let outer = self.processor.other_self();
        scope
            .local
            .own_member(name)
            .or_else(|| {
                if outer.ptr_eq(&scope.global) {
                    None
                } else {
                    outer.get_member(name)
                }
            })
            .or_else(|| scope.global.own_member(name))
    }

    /// The anonymous struct an older pass over this file assigned to
    /// `target`. Reusing it keeps the literal's identity, and the references
    /// other files hold to its members, across edits.
    fn previous_literal(&self, target: &Signifier) -> Option<Type> {
        let definition = target.def()?;
        let stale = definition.source == self.processor.source()
            && target.def_generation()? < self.processor.generation();
        if !stale {
            return None;
        }
        target
            .defining_type()?
            .branch_of_kind(&TypeKind::Struct)
            .filter(|shape| shape.name().is_none())
    }
}

/// Statements a pending doc comment can describe. Anything else drops it.
fn is_documentable(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::Jsdoc(_)
            | Statement::LocalVarDeclarations(_)
            | Statement::StaticVarDeclaration(_)
            | Statement::GlobalVarDeclarations(_)
            | Statement::VariableAssignment(_)
            | Statement::MemberAssignment(_)
            | Statement::Function(_)
            | Statement::Enum(_)
            | Statement::Macro(_)
            | Statement::With(_)
    )
}

fn literal_kind(literal: &Literal) -> TypeKind {
    match literal {
        Literal::Bool(_) => TypeKind::Bool,
        Literal::Real(_) | Literal::NaN | Literal::Infinity => TypeKind::Real,
        Literal::Pointer => TypeKind::Pointer,
        Literal::Undefined => TypeKind::Undefined,
        Literal::String(_) | Literal::MultilineString(_) => TypeKind::String,
    }
}

/// Compound assignments (`+=`, `|=`, ...) keep the target's type.
fn compound_result(
    operator: AssignmentOperator,
    assigned: Type,
    target: Option<&Signifier>,
) -> Type {
    match (operator, target) {
        (AssignmentOperator::Assign | AssignmentOperator::NullishAssign, _) | (_, None) => {
            assigned
        }
        (_, Some(target)) => target.ty(),
    }
}
