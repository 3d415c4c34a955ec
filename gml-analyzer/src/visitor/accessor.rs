use crate::cst::{
    Accessor, Identifier, IdentifierAccessor, MemberAssignment, NewExpression, PseudoIdentifier,
};
use crate::diagnostics::DiagnosticKind;
use crate::error::{required, AnalysisError};
use crate::signifier::Signifier;
use crate::types::{Type, TypeKind};

use super::{compound_result, ContextKind, SymbolVisitor, VisitorContext};

impl<'p> SymbolVisitor<'p> {
    /// Type of a bare identifier in read position. `self`, `global` and
    /// `other` resolve to scopes; anything else is looked up and referenced.
    fn identifier_type(&mut self, identifier: &Identifier) -> Type {
        match identifier.pseudo() {
            Some(PseudoIdentifier::SelfRef) => {
                if self.processor.self_is_global() && self.processor.options().report_global_self {
                    self.processor.add_diagnostic(
                        DiagnosticKind::GlobalSelf,
                        "`self` refers to the global scope here, which is probably unintentional.",
                        identifier.span,
                    );
                }
                self.processor.current_self()
            }
            Some(PseudoIdentifier::Global) => self.processor.global(),
            Some(PseudoIdentifier::Other) => self.processor.other_self(),
            None => match self.processor.find_by_name(&identifier.name) {
                Some(signifier) => {
                    self.processor.add_ref(&signifier, identifier.span);
                    signifier.ty()
                }
                None => {
                    self.report_undeclared(identifier);
                    Type::new(TypeKind::Unknown)
                }
            },
        }
    }

    pub(super) fn visit_identifier_accessor(
        &mut self,
        node: &IdentifierAccessor,
        context: &VisitorContext,
    ) -> Result<Type, AnalysisError> {
        let base = self.identifier_type(&node.identifier);
        self.apply_accessors(base, &node.accessors, context)
    }

    fn apply_accessors(
        &mut self,
        mut current: Type,
        accessors: &[Accessor],
        context: &VisitorContext,
    ) -> Result<Type, AnalysisError> {
        for accessor in accessors {
            current = match accessor {
                Accessor::Dot { name } => match self.member_of(&current, &name.name) {
                    Some(member) => {
                        self.processor.add_ref(&member, name.span);
                        member.ty()
                    }
                    None => Type::new(TypeKind::Unknown),
                },
                Accessor::Index { indices, .. } => {
                    for index in indices {
                        self.expression(index, context)?;
                    }
                    current
                        .branch_of_kind(&TypeKind::Array)
                        .map(|array| array.items().to_type())
                        .unwrap_or_else(|| Type::new(TypeKind::Unknown))
                }
                Accessor::Call { arguments, .. } => {
                    let argument_context = context.with_kind(ContextKind::FunctionArg);
                    for argument in arguments {
                        self.expression(argument, &argument_context)?;
                    }
                    current
                        .branch_of_kind(&TypeKind::Function)
                        .map(|function| function.returns().to_type())
                        .unwrap_or_else(|| Type::new(TypeKind::Unknown))
                }
            };
        }
        Ok(current)
    }

    /// First member named `name` on any struct shape of `ty`.
    fn member_of(&self, ty: &Type, name: &str) -> Option<Signifier> {
        self.struct_branches(ty)
            .iter()
            .find_map(|branch| branch.get_member(name))
    }

    /// `new Name(...)` yields the struct `Name` constructs. Constructors not
    /// analyzed yet get their named struct now so both sides share it.
    pub(super) fn visit_new(
        &mut self,
        node: &NewExpression,
        context: &VisitorContext,
    ) -> Result<Type, AnalysisError> {
        let callee = self.processor.find_by_name(&node.callee.name);
        if let Some(callee) = &callee {
            self.processor.add_ref(callee, node.callee.span);
        }
        let argument_context = context.with_kind(ContextKind::FunctionArg);
        for argument in &node.arguments {
            self.expression(argument, &argument_context)?;
        }

        let Some(callee) = callee else {
            self.report_undeclared(&node.callee);
            return Ok(self.processor.create_struct());
        };
        let Some(function) = callee.get_type_by_kind(&TypeKind::Function) else {
            return Ok(self.processor.create_struct());
        };
        Ok(match function.constructs() {
            Some(constructs) => constructs,
            None => {
                let constructs = self
                    .processor
                    .project()
                    .named_struct(&format!("Struct.{}", node.callee.name));
                function.set_constructs(Some(constructs.clone()));
                constructs
            }
        })
    }

    /// Assignment through accessors: `a.b = ...`, `a[i] = ...`. Only the last
    /// accessor is the target; everything before it is read.
    pub(super) fn visit_member_assignment(
        &mut self,
        node: &MemberAssignment,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let target = &node.target;
        let Some((last, leading)) = target.accessors.split_last() else {
            return self.assign_variable(
                &target.identifier,
                node.operator,
                node.value.as_ref(),
                node.span,
                context,
            );
        };
        let value = required(node.value.as_ref(), "assignment", "value", node.span)?;
        let assignment = context.with_kind(ContextKind::Assignment);

        let base = self.identifier_type(&target.identifier);
        let container = self.apply_accessors(base, leading, context)?;

        match last {
            Accessor::Dot { name } => {
                let Some(owner) = self.struct_branches(&container).into_iter().next() else {
                    self.expression(value, &assignment)?;
                    return Ok(());
                };
                let existing = owner.get_member(&name.name);
                if value.is_function() {
                    self.function_signifier = Some(
                        existing
                            .clone()
                            .unwrap_or_else(|| owner.ensure_member(&name.name)),
                    );
                }
                if value.is_struct() {
                    self.struct_signifier = existing.clone();
                }
                let assigned = self.expression(value, &assignment)?;
                let assigned = compound_result(node.operator, assigned, existing.as_ref());
                let documented = self.updated_type_with_docs(assigned);

                match existing {
                    Some(member) => {
                        self.processor.assign(&member, name.span, &documented.ty);
                        documented.apply(&member);
                    }
                    None => {
                        let is_global = owner.ptr_eq(&self.processor.global());
                        let member = owner.ensure_member(&name.name);
                        self.processor.assign(&member, name.span, &documented.ty);
                        member.update_flags(|flags| {
                            if is_global {
                                flags.global = true;
                            } else {
                                flags.instance = true;
                            }
                        });
                        documented.apply(&member);
                    }
                }
            }
            Accessor::Index { indices, .. } => {
                for index in indices {
                    self.expression(index, context)?;
                }
                let assigned = self.expression(value, &assignment)?;
                if let Some(array) = container.branch_of_kind(&TypeKind::Array) {
                    array.add_item_type(&assigned);
                }
            }
            Accessor::Call { arguments, .. } => {
                let argument_context = context.with_kind(ContextKind::FunctionArg);
                for argument in arguments {
                    self.expression(argument, &argument_context)?;
                }
                self.expression(value, &assignment)?;
            }
        }
        Ok(())
    }
}
