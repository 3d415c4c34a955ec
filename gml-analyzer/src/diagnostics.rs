use serde::Serialize;

use crate::cst::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// Assignment to or read of a name that nothing declares while `self` is
    /// the global scope.
    UndeclaredGlobalReference,
    /// `self` used where it can only mean the global scope.
    GlobalSelf,
    /// A documented parameter whose name disagrees with the code.
    JsdocMismatch,
    /// A documented type name the registry cannot resolve.
    UnresolvedType,
    /// An inferred type that contradicts its documented type (opt-in).
    DocTypeMismatch,
}

impl DiagnosticKind {
    pub fn default_level(self) -> DiagnosticLevel {
        match self {
            DiagnosticKind::UndeclaredGlobalReference => DiagnosticLevel::Error,
            DiagnosticKind::GlobalSelf
            | DiagnosticKind::JsdocMismatch
            | DiagnosticKind::UnresolvedType
            | DiagnosticKind::DocTypeMismatch => DiagnosticLevel::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(rename = "severity")]
    pub level: DiagnosticLevel,
    pub span: SourceSpan,
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push<S: Into<String>>(&mut self, kind: DiagnosticKind, message: S, span: SourceSpan) {
        self.entries.push(Diagnostic {
            kind,
            message: message.into(),
            level: kind.default_level(),
            span,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(move |diagnostic| diagnostic.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::Position;

    #[test]
    fn levels_follow_the_kind() {
        let mut diagnostics = Diagnostics::new();
        let span = SourceSpan::single_point(Position::new(4, 1, 4));
        diagnostics.push(DiagnosticKind::GlobalSelf, "self is global", span);
        assert!(!diagnostics.has_errors());

        diagnostics.push(
            DiagnosticKind::UndeclaredGlobalReference,
            "`score` is not declared anywhere.",
            span,
        );
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.of_kind(DiagnosticKind::GlobalSelf).count(), 1);
    }

    #[test]
    fn serializes_for_editors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(
            DiagnosticKind::JsdocMismatch,
            "mismatch",
            SourceSpan::single_point(Position::new(0, 2, 0)),
        );
        let json = serde_json::to_value(&diagnostics.entries()[0]).expect("serializes");
        assert_eq!(json["kind"], "JSDOC_MISMATCH");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["span"]["line"], 2);
    }
}
