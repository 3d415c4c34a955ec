use crate::cst::{ConstructorParent, FunctionExpression, Identifier};
use crate::diagnostics::DiagnosticKind;
use crate::error::{required, AnalysisError};
use crate::jsdoc::JsdocKind;
use crate::processor::DocumentedParam;
use crate::signifier::Signifier;
use crate::types::{Type, TypeKind};

use super::{ContextKind, SymbolVisitor, VisitorContext};

impl<'p> SymbolVisitor<'p> {
    /// Builds or updates the function type of a function statement or
    /// expression. A function that already has a signifier (declared, or
    /// assigned to a name) keeps its `Function` type across passes so that
    /// its identity survives edits.
    pub(super) fn visit_function(
        &mut self,
        node: &FunctionExpression,
        context: &VisitorContext,
    ) -> Result<Type, AnalysisError> {
        let parameters = required(
            node.parameters.as_ref(),
            "function",
            "parameter list",
            node.span,
        )?;
        let body = required(node.body.as_ref(), "function", "body", node.span)?;
        let assigned_to = self.function_signifier.take();
        let is_statement = context.current() == Some(ContextKind::FunctionStatement);
        let is_constructor = node.constructor.is_some();

        let signifier = match (assigned_to, &node.name) {
            (Some(signifier), _) => Some(signifier),
            (None, Some(name)) if is_statement => Some(self.declare_function_statement(name)),
            _ => None,
        };

        // A callback passed as an argument leaves the comment to the
        // declaration around the call.
        let (docs, outer_docs) = if context.takes_docs() {
            (self.processor.consume_jsdoc(), None)
        } else {
            (None, self.processor.consume_jsdoc())
        };
        if let Some(signifier) = &signifier {
            let description = docs.as_ref().and_then(|docs| docs.jsdoc.description.clone());
            if let Some(description) = description {
                signifier.describe(description);
            }
        }
        // Only function and `@self` docs describe a function.
        let docs = docs.filter(|docs| {
            matches!(docs.kind(), JsdocKind::Function | JsdocKind::SelfContext)
        });

        let function_type = signifier
            .as_ref()
            .and_then(|signifier| signifier.get_type_by_kind(&TypeKind::Function))
            .unwrap_or_else(|| Type::new(TypeKind::Function));
        if let Some(signifier) = &signifier {
            signifier.set_type(std::slice::from_ref(&function_type));
            if docs.as_ref().is_some_and(|docs| docs.jsdoc.deprecated) {
                signifier.update_flags(|flags| flags.deprecated = true);
            }
        }

        let constructs = if is_constructor {
            Some(self.constructed_struct(&function_type, node.name.as_ref()))
        } else {
            None
        };
        function_type.set_constructs(constructs.clone());

        let self_scope = match &constructs {
            Some(constructs) => constructs.clone(),
            None => docs
                .as_ref()
                .and_then(|docs| docs.context.clone())
                .unwrap_or_else(|| self.processor.current_self()),
        };
        function_type.set_context(Some(self_scope.clone()));

        let local = self
            .processor
            .push_scope(parameters.start_paren.start(), self_scope);

        let documented_params: &[DocumentedParam] = docs
            .as_ref()
            .map(|docs| docs.params.as_slice())
            .unwrap_or_default();
        let param_context = context.with_kind(ContextKind::FunctionParam);
        for (index, parameter) in parameters.parameters.iter().enumerate() {
            let name = &parameter.name;
            let documented = match documented_params.get(index) {
                Some(documented) if documented.name == name.name => Some(documented),
                Some(documented) => {
                    self.processor.add_diagnostic(
                        DiagnosticKind::JsdocMismatch,
                        format!(
                            "Parameter name mismatch: documented as `{}` but declared as `{}`.",
                            documented.name, name.name
                        ),
                        name.span,
                    );
                    None
                }
                None => None,
            };

            let param = function_type.add_parameter(index, &name.name, None, false);
            self.processor.define(&param, name.span);
            let optional = documented.is_some_and(|documented| documented.optional)
                || parameter.default_value.is_some();
            param.update_flags(|flags| {
                flags.local = true;
                flags.parameter = true;
                flags.optional = optional;
            });
            self.processor.add_ref(&param, name.span);

            let inferred = match &parameter.default_value {
                Some(value) => Some(self.expression(value, &param_context)?),
                None => None,
            };
            let ty = documented
                .and_then(|documented| documented.ty.clone())
                .or(inferred)
                .unwrap_or_else(|| Type::new(TypeKind::Unknown));
            param.set_type(std::slice::from_ref(&ty));
            let description = documented.and_then(|documented| documented.description.clone());
            if let Some(description) = description {
                param.describe(description);
            }
            local.add_member_signifier(&param);
        }

        // Documented-only parameters (e.g. `...`) extend the signature but are
        // not local variables.
        let declared = parameters.parameters.len();
        for (index, documented) in documented_params.iter().enumerate().skip(declared) {
            let types = documented.ty.as_ref().map(std::slice::from_ref);
            let param =
                function_type.add_parameter(index, &documented.name, types, documented.optional);
            if let Some(description) = &documented.description {
                param.describe(description.clone());
            }
        }
        function_type.truncate_parameters(declared.max(documented_params.len()));

        if let Some(parent) = node.constructor.as_ref().and_then(|suffix| suffix.parent.as_ref()) {
            self.link_parent_constructor(parent, constructs.as_ref(), context)?;
        }

        self.returns.push(Vec::new());
        self.visit_statements(&body.statements, &context.with_kind(ContextKind::FunctionBody))?;
        let collected = self.returns.pop().unwrap_or_default();
        self.processor.restore_jsdoc(outer_docs);

        match docs.as_ref().and_then(|docs| docs.returns.clone()) {
            Some(documented) => {
                if self.processor.options().strict_doc_types && !collected.is_empty() {
                    let inferred = collected
                        .iter()
                        .skip(1)
                        .fold(collected[0].clone(), |merged, ty| Type::merge(&merged, ty));
                    if !inferred.narrows(&documented) {
                        let span = node.name.as_ref().map_or(node.span, |name| name.span);
                        self.processor.add_diagnostic(
                            DiagnosticKind::DocTypeMismatch,
                            format!(
                                "Returns `{}` but is documented to return `{}`.",
                                inferred.describe(),
                                documented.describe()
                            ),
                            span,
                        );
                    }
                }
                function_type.set_return_type(std::slice::from_ref(&documented));
            }
            None if collected.is_empty() => {
                function_type.set_return_type(&[Type::new(TypeKind::Undefined)])
            }
            None => function_type.set_return_type(&collected),
        }

        self.processor.pop_scope(body.span.end())?;
        Ok(function_type)
    }

    /// A named function statement binds into the current self, which is the
    /// global struct at the top level of a script.
    fn declare_function_statement(&mut self, name: &Identifier) -> Signifier {
        let owner = self.processor.current_self();
        let signifier = match owner.own_member(&name.name) {
            Some(existing) => existing,
            None => {
                let created = Signifier::new(name.name.clone());
                owner.add_member_signifier(&created);
                created
            }
        };
        let is_global = owner.ptr_eq(&self.processor.global());
        signifier.update_flags(|flags| {
            if is_global {
                flags.global = true;
            } else {
                flags.instance = true;
            }
        });
        self.processor.define(&signifier, name.span);
        self.processor.add_ref(&signifier, name.span);
        signifier
    }

    /// Named constructors construct the registered `Struct.<Name>`, so docs
    /// that mention the struct before the constructor share its identity.
    fn constructed_struct(&mut self, function_type: &Type, name: Option<&Identifier>) -> Type {
        if let Some(existing) = function_type.constructs() {
            return existing;
        }
        match name {
            Some(name) => self
                .processor
                .project()
                .named_struct(&format!("Struct.{}", name.name)),
            None => self.processor.create_struct(),
        }
    }

    /// `function Child() : Parent() constructor` derives the child's struct
    /// from the parent's. A parent not analyzed yet gets its struct now.
    fn link_parent_constructor(
        &mut self,
        parent: &ConstructorParent,
        constructs: Option<&Type>,
        context: &VisitorContext,
    ) -> Result<(), AnalysisError> {
        let argument_context = context.with_kind(ContextKind::FunctionArg);
        for argument in &parent.arguments {
            self.expression(argument, &argument_context)?;
        }
        let Some(signifier) = self.processor.find_by_name(&parent.name.name) else {
            self.report_undeclared(&parent.name);
            return Ok(());
        };
        self.processor.add_ref(&signifier, parent.name.span);
        let Some(parent_function) = signifier.get_type_by_kind(&TypeKind::Function) else {
            return Ok(());
        };
        let parent_struct = match parent_function.constructs() {
            Some(existing) => existing,
            None => {
                let created = self
                    .processor
                    .project()
                    .named_struct(&format!("Struct.{}", parent.name.name));
                parent_function.set_constructs(Some(created.clone()));
                created
            }
        };
        if let Some(child) = constructs {
            let cyclic = parent_struct
                .ancestors()
                .iter()
                .any(|ancestor| ancestor.ptr_eq(child));
            if !cyclic {
                child.set_parent(Some(parent_struct));
            }
        }
        Ok(())
    }
}
