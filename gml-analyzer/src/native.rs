//! Built-in declarations: the engine's functions, variables, constants and
//! struct shapes, loaded from a JSON document before any file is analyzed.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::jsdoc::{parse_type_expr, TypeExpr};
use crate::project::Project;
use crate::types::{Type, TypeKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeSpec {
    pub functions: Vec<NativeFunction>,
    pub variables: Vec<NativeVariable>,
    pub constants: Vec<NativeConstant>,
    pub structs: Vec<NativeStruct>,
    /// Variables every object instance has (`x`, `depth`, ...).
    pub instance: Vec<NativeVariable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeFunction {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<NativeParameter>,
    pub returns: Option<String>,
    pub deprecated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub optional: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
}

/// A named constant. Constants sharing a `class` share one type, so that
/// `Constant.SequenceTrackType` can be documented and narrowed on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeConstant {
    pub name: String,
    pub class: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeStruct {
    /// Qualified name, e.g. `Struct.Track`.
    pub name: String,
    pub members: Vec<NativeVariable>,
}

impl Project {
    /// Seeds the global scope and the type registry. Struct names are
    /// registered before anything is resolved so members may refer to any
    /// struct in the document, including their own.
    pub fn load_native_spec(&mut self, spec: &NativeSpec) {
        for native in &spec.structs {
            self.named_struct(&native.name);
        }

        let mut unresolved = Vec::new();

        for constant in &spec.constants {
            let ty = match &constant.class {
                Some(class) => {
                    let qualified = format!("Constant.{class}");
                    match self.get_type(&qualified) {
                        Some(existing) => existing,
                        None => {
                            let ty = Type::named(TypeKind::Real, qualified.clone());
                            self.register_type(qualified, ty)
                        }
                    }
                }
                None => self.native_type(constant.ty.as_deref(), &mut unresolved),
            };
            let signifier = self.declare_global(&constant.name, &ty);
            signifier.update_flags(|flags| flags.native = true);
            if let Some(description) = &constant.description {
                signifier.describe(description.clone());
            }
        }

        for native in &spec.structs {
            let shape = self.named_struct(&native.name);
            for member in &native.members {
                let ty = self.native_type(member.ty.as_deref(), &mut unresolved);
                let signifier = shape.add_member(&member.name, &ty);
                signifier.update_flags(|flags| {
                    flags.native = true;
                    flags.instance = true;
                    flags.deprecated = member.deprecated;
                });
                if let Some(description) = &member.description {
                    signifier.describe(description.clone());
                }
            }
        }

        for function in &spec.functions {
            let ty = self.native_function(function, &mut unresolved);
            let signifier = self.declare_global(&function.name, &ty);
            signifier.update_flags(|flags| {
                flags.native = true;
                flags.deprecated = function.deprecated;
            });
            if let Some(description) = &function.description {
                signifier.describe(description.clone());
            }
        }

        for variable in &spec.variables {
            let ty = self.native_type(variable.ty.as_deref(), &mut unresolved);
            let signifier = self.declare_global(&variable.name, &ty);
            signifier.update_flags(|flags| {
                flags.native = true;
                flags.deprecated = variable.deprecated;
            });
            if let Some(description) = &variable.description {
                signifier.describe(description.clone());
            }
        }

        let instance = self.instance_struct();
        for variable in &spec.instance {
            let ty = self.native_type(variable.ty.as_deref(), &mut unresolved);
            let signifier = instance.add_member(&variable.name, &ty);
            signifier.update_flags(|flags| {
                flags.native = true;
                flags.instance = true;
                flags.deprecated = variable.deprecated;
            });
            if let Some(description) = &variable.description {
                signifier.describe(description.clone());
            }
        }

        unresolved.sort();
        unresolved.dedup();
        for name in &unresolved {
            warn!(name = name.as_str(), "native spec refers to an unknown type");
        }
        debug!(
            functions = spec.functions.len(),
            variables = spec.variables.len(),
            constants = spec.constants.len(),
            structs = spec.structs.len(),
            instance = spec.instance.len(),
            "loaded native declarations"
        );
    }

    pub fn load_native_spec_json(&mut self, json: &str) -> Result<(), AnalysisError> {
        let spec: NativeSpec = serde_json::from_str(json)?;
        self.load_native_spec(&spec);
        Ok(())
    }

    pub fn load_native_spec_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read native spec {}", path.display()))?;
        self.load_native_spec_json(&json)
            .with_context(|| format!("failed to load native spec {}", path.display()))?;
        Ok(())
    }

    fn native_function(
        &mut self,
        function: &NativeFunction,
        unresolved: &mut Vec<String>,
    ) -> Type {
        let qualified = format!("Function.{}", function.name);
        let ty = match self.get_type(&qualified) {
            Some(existing) => existing,
            None => {
                let ty = Type::named(TypeKind::Function, qualified.clone());
                self.register_type(qualified, ty)
            }
        };
        for (index, parameter) in function.parameters.iter().enumerate() {
            let param_type = self.native_type(parameter.ty.as_deref(), unresolved);
            let param = ty.add_parameter(
                index,
                &parameter.name,
                Some(std::slice::from_ref(&param_type)),
                parameter.optional,
            );
            param.update_flags(|flags| flags.native = true);
            if let Some(description) = &parameter.description {
                param.describe(description.clone());
            }
        }
        ty.truncate_parameters(function.parameters.len());
        let returns = match &function.returns {
            Some(returns) => self.native_type(Some(returns), unresolved),
            None => Type::new(TypeKind::Undefined),
        };
        ty.set_return_type(std::slice::from_ref(&returns));
        ty
    }

    /// Resolves a type string from the native spec; missing or unparsable
    /// types are `Unknown`.
    fn native_type(&mut self, text: Option<&str>, unresolved: &mut Vec<String>) -> Type {
        let Some(text) = text else {
            return Type::new(TypeKind::Unknown);
        };
        let expr: TypeExpr = match parse_type_expr(text) {
            Some(expr) => expr,
            None => {
                unresolved.push(text.to_string());
                return Type::new(TypeKind::Unknown);
            }
        };
        let (ty, missing) = self.resolve_type_expr(&expr);
        unresolved.extend(missing);
        ty
    }
}
