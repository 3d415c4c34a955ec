use thiserror::Error;

use crate::cst::SourceSpan;

/// Faults that abort the analysis of a single file. Recoverable findings are
/// reported through [`crate::Diagnostics`] instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(
        "malformed syntax tree: {node} at line {}, column {} is missing its {child}",
        span.line,
        span.column
    )]
    MissingChild {
        node: &'static str,
        child: &'static str,
        span: SourceSpan,
    },

    #[error("internal analyzer error: {message}")]
    Invariant {
        message: String,
        span: Option<SourceSpan>,
    },

    #[error("invalid native spec: {0}")]
    NativeSpec(#[from] serde_json::Error),
}

impl AnalysisError {
    pub fn invariant<S: Into<String>>(message: S, span: Option<SourceSpan>) -> Self {
        AnalysisError::Invariant {
            message: message.into(),
            span,
        }
    }
}

/// Unwraps a grammar-guaranteed child or reports the tree as malformed.
pub(crate) fn required<'n, T>(
    child: Option<&'n T>,
    node: &'static str,
    child_name: &'static str,
    span: SourceSpan,
) -> Result<&'n T, AnalysisError> {
    child.ok_or(AnalysisError::MissingChild {
        node,
        child: child_name,
        span,
    })
}
