//! Static symbol resolution and type inference for GML projects.
//!
//! A [`Project`] owns the global scope and the type registry. Each file's
//! concrete syntax tree is walked once per analysis pass; the result is a
//! persistent graph of [`Signifier`]s and [`Type`]s plus per-file
//! [`FileSymbols`] (scope ranges, references and diagnostics).

pub mod cst;
mod diagnostics;
mod error;
mod jsdoc;
mod native;
mod processor;
mod project;
mod scope;
mod signifier;
mod source;
mod types;
mod visitor;

pub use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLevel, Diagnostics};
pub use crate::error::AnalysisError;
pub use crate::jsdoc::{
    parse_jsdoc, parse_type_expr, Jsdoc, JsdocKind, JsdocParam, TypeExpr, TypeRef,
};
pub use crate::native::{
    NativeConstant, NativeFunction, NativeParameter, NativeSpec, NativeStruct, NativeVariable,
};
pub use crate::project::{
    AnalysisOptions, Asset, FileSymbols, Project, ReindexSummary, BASE_STRUCT, INSTANCE_STRUCT,
    OBJECT_ASSET,
};
pub use crate::scope::{ScopeRange, ScopeTuple};
pub use crate::signifier::{Reference, Signifier, SignifierFlags};
pub use crate::source::{Generation, Location, SourceId};
pub use crate::types::{Type, TypeKind, TypeStore};
