//! Documentation comments (`///` runs and `/** */` blocks).
//!
//! Parsing is purely syntactic: type names stay strings here and are resolved
//! against the project's type registry by the symbol processor.
//!
//! ```text
//! /// Runs a script with arguments
//! /// @param {String|Function|Asset.GMScript} scr The script to run
//! /// @param {Any} ... Arguments passed through
//! /// @returns {Any}
//! ```

use serde::Serialize;

use crate::cst::{JsdocComment, JsdocStyle, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JsdocKind {
    /// Parameters, a return type or an explicit `@function` tag.
    Function,
    /// Only a `@self` context.
    SelfContext,
    /// Free text, possibly with `@deprecated`.
    Description,
    /// A `@type` annotation for the next binding.
    Type,
}

/// A parsed type expression: a union of named references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeExpr {
    pub branches: Vec<TypeRef>,
}

/// A single named type, with item types for containers (`Array<Real>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRef {
    pub name: String,
    pub items: Option<TypeExpr>,
}

impl TypeRef {
    fn simple<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            items: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsdocParam {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub optional: bool,
    pub description: Option<String>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize)]
pub struct Jsdoc {
    pub kind: JsdocKind,
    pub description: Option<String>,
    pub params: Vec<JsdocParam>,
    pub returns: Option<TypeExpr>,
    #[serde(rename = "type")]
    pub type_expr: Option<TypeExpr>,
    pub self_type: Option<TypeExpr>,
    pub deprecated: bool,
    pub function_name: Option<String>,
    pub span: SourceSpan,
    /// Span of the line each type expression came from, for diagnostics.
    #[serde(skip)]
    pub type_spans: Vec<(TypeExpr, SourceSpan)>,
}

impl Jsdoc {
    fn empty(span: SourceSpan) -> Self {
        Self {
            kind: JsdocKind::Description,
            description: None,
            params: Vec::new(),
            returns: None,
            type_expr: None,
            self_type: None,
            deprecated: false,
            function_name: None,
            span,
            type_spans: Vec::new(),
        }
    }

    fn push_description(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match &mut self.description {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(text);
            }
            None => self.description = Some(text.to_string()),
        }
    }

    fn classify(&self) -> JsdocKind {
        if !self.params.is_empty() || self.returns.is_some() || self.function_name.is_some() {
            JsdocKind::Function
        } else if self.type_expr.is_some() {
            JsdocKind::Type
        } else if self.self_type.is_some() {
            JsdocKind::SelfContext
        } else {
            JsdocKind::Description
        }
    }

    fn typed(&mut self, text: &str, span: SourceSpan) -> Option<TypeExpr> {
        let expr = parse_type_expr(text)?;
        self.type_spans.push((expr.clone(), span));
        Some(expr)
    }

    fn apply_tag(&mut self, body: &str, span: SourceSpan) {
        let (tag, rest) = split_word(body);
        match tag.to_ascii_lowercase().as_str() {
            "param" | "parameter" | "arg" | "argument" => self.apply_param(rest, span),
            "returns" | "return" => {
                let (ty, _) = leading_type(rest, false);
                self.returns = match ty {
                    Some(text) => self.typed(text, span),
                    None => Some(TypeExpr::unknown()),
                };
            }
            "self" | "context" => {
                // Object names are lowercase by convention, so any word goes.
                let (ty, _) = leading_type(rest, false);
                let word = split_word(rest).0;
                if let Some(text) = ty.or((!word.is_empty()).then_some(word)) {
                    self.self_type = self.typed(text, span);
                }
            }
            "type" => {
                let (ty, _) = leading_type(rest, false);
                if let Some(text) = ty {
                    self.type_expr = self.typed(text, span);
                }
            }
            "deprecated" => self.deprecated = true,
            "desc" | "description" => self.push_description(rest.trim()),
            "function" | "func" => {
                let (name, _) = split_word(rest);
                self.function_name = Some(name.to_string()).filter(|name| !name.is_empty());
            }
            _ => {}
        }
    }

    fn apply_param(&mut self, rest: &str, span: SourceSpan) {
        let (ty_text, rest) = leading_type(rest, true);
        let rest = rest.trim_start();
        let (raw_name, description) = if let Some(inner) = rest.strip_prefix('[') {
            match inner.find(']') {
                Some(close) => (&rest[..close + 2], &inner[close + 1..]),
                None => split_word(rest),
            }
        } else {
            split_word(rest)
        };
        if raw_name.is_empty() {
            return;
        }
        let (name, optional) = match raw_name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
            Some(inner) => (inner.split('=').next().unwrap_or(inner).trim(), true),
            None => (raw_name, false),
        };
        let description = description
            .trim()
            .trim_start_matches('-')
            .trim();
        let ty = ty_text.and_then(|text| self.typed(text, span));
        self.params.push(JsdocParam {
            name: name.to_string(),
            ty,
            optional,
            description: Some(description.to_string()).filter(|d| !d.is_empty()),
            span,
        });
    }
}

impl TypeExpr {
    /// `{Any}`; used when a tag names no type.
    pub fn unknown() -> Self {
        Self {
            branches: vec![TypeRef::simple("Any")],
        }
    }
}

pub fn parse_jsdoc(comment: &JsdocComment) -> Jsdoc {
    let mut doc = Jsdoc::empty(comment.span);
    let mut seen_tag = false;
    for line in &comment.lines {
        for raw in line.text.split('\n') {
            let text = clean_line(raw, comment.style);
            if let Some(body) = text.strip_prefix('@') {
                seen_tag = true;
                doc.apply_tag(body, line.span);
            } else if !seen_tag {
                doc.push_description(text);
            }
        }
    }
    doc.kind = doc.classify();
    doc
}

fn clean_line(raw: &str, style: JsdocStyle) -> &str {
    let mut text = raw.trim();
    match style {
        JsdocStyle::Line => text = text.trim_start_matches('/'),
        JsdocStyle::Block => {
            if let Some(rest) = text.strip_prefix("/**") {
                text = rest;
            }
            if let Some(rest) = text.strip_suffix("*/") {
                text = rest;
            }
            text = text.trim_start().trim_start_matches('*');
        }
    }
    text.trim()
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], &text[end..]),
        None => (text, ""),
    }
}

/// Splits off a `{...}` type, or a bare word that reads as a type name
/// (capitalized or qualified), from the start of a tag body. With
/// `needs_tail` a bare word only counts when something follows it, since a
/// lone word after `@param` is the parameter name.
fn leading_type(text: &str, needs_tail: bool) -> (Option<&str>, &str) {
    let trimmed = text.trim_start();
    if let Some(inner) = trimmed.strip_prefix('{') {
        let mut depth = 1usize;
        for (index, ch) in inner.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return (Some(&inner[..index]), &inner[index + 1..]);
                    }
                }
                _ => {}
            }
        }
        return (Some(inner), "");
    }
    let (word, rest) = split_word(trimmed);
    let looks_like_type = word.starts_with(|c: char| c.is_ascii_uppercase())
        || (word.contains('.') && !word.starts_with('.'))
        || word.contains('<');
    if looks_like_type && (!needs_tail || !rest.trim().is_empty()) {
        (Some(word), rest)
    } else {
        (None, trimmed)
    }
}

/// Parses `A|B`, `A, B`, `Array<T>`, `Array[T]` and `T[]` forms.
pub fn parse_type_expr(text: &str) -> Option<TypeExpr> {
    let mut parser = TypeExprParser {
        chars: text.chars().collect(),
        index: 0,
    };
    let expr = parser.expr()?;
    parser.skip_whitespace();
    if parser.index < parser.chars.len() {
        return None;
    }
    Some(expr)
}

struct TypeExprParser {
    chars: Vec<char>,
    index: usize,
}

impl TypeExprParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.index += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Option<TypeExpr> {
        let mut branches = vec![self.branch()?];
        while self.eat('|') || self.eat(',') {
            branches.push(self.branch()?);
        }
        Some(TypeExpr { branches })
    }

    fn branch(&mut self) -> Option<TypeRef> {
        self.skip_whitespace();
        let start = self.index;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '$'))
        {
            self.index += 1;
        }
        if start == self.index {
            return None;
        }
        let name: String = self.chars[start..self.index].iter().collect();
        let mut ty = TypeRef::simple(name);
        if self.eat('<') {
            ty.items = Some(self.expr()?);
            if !self.eat('>') {
                return None;
            }
        } else if self.eat('[') {
            if self.eat(']') {
                ty = TypeRef {
                    name: "Array".to_string(),
                    items: Some(TypeExpr { branches: vec![ty] }),
                };
            } else {
                ty.items = Some(self.expr()?);
                if !self.eat(']') {
                    return None;
                }
            }
        }
        while self.eat('[') {
            if !self.eat(']') {
                return None;
            }
            ty = TypeRef {
                name: "Array".to_string(),
                items: Some(TypeExpr { branches: vec![ty] }),
            };
        }
        self.eat('?');
        Some(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::{CommentLine, Position};

    fn line_comment(lines: &[&str]) -> JsdocComment {
        let lines: Vec<CommentLine> = lines
            .iter()
            .enumerate()
            .map(|(index, text)| CommentLine {
                text: text.to_string(),
                span: SourceSpan::new(
                    Position::new(0, index + 1, 0),
                    Position::new(0, index + 1, text.len()),
                ),
            })
            .collect();
        let span = SourceSpan::union(&lines[0].span, &lines[lines.len() - 1].span);
        JsdocComment {
            style: JsdocStyle::Line,
            lines,
            span,
        }
    }

    fn names(expr: &TypeExpr) -> Vec<&str> {
        expr.branches.iter().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn parses_function_docs() {
        let doc = parse_jsdoc(&line_comment(&[
            "/// Runs a script",
            "/// @param {String|Function|Asset.GMScript} scr The script",
            "/// @param {Any} ... Arguments",
            "/// @param {Real} [count=1] - How many times",
            "/// @returns {Array<Real>}",
        ]));
        assert_eq!(doc.kind, JsdocKind::Function);
        assert_eq!(doc.description.as_deref(), Some("Runs a script"));
        assert_eq!(doc.params.len(), 3);

        let scr = &doc.params[0];
        assert_eq!(scr.name, "scr");
        assert_eq!(
            names(scr.ty.as_ref().expect("scr type")),
            vec!["String", "Function", "Asset.GMScript"]
        );
        assert_eq!(doc.params[1].name, "...");
        assert_eq!(doc.params[2].name, "count");
        assert!(doc.params[2].optional);
        assert_eq!(doc.params[2].description.as_deref(), Some("How many times"));

        let returns = doc.returns.expect("returns");
        assert_eq!(returns.branches[0].name, "Array");
        assert_eq!(
            names(returns.branches[0].items.as_ref().expect("items")),
            vec!["Real"]
        );
    }

    #[test]
    fn block_comments_and_kinds() {
        let comment = JsdocComment {
            style: JsdocStyle::Block,
            lines: vec![CommentLine {
                text: "/**\n * @self Struct.Player\n */".to_string(),
                span: SourceSpan::default(),
            }],
            span: SourceSpan::default(),
        };
        let doc = parse_jsdoc(&comment);
        assert_eq!(doc.kind, JsdocKind::SelfContext);
        assert_eq!(names(doc.self_type.as_ref().expect("self")), vec!["Struct.Player"]);

        let typed = parse_jsdoc(&line_comment(&["/// @type {Real, String}"]));
        assert_eq!(typed.kind, JsdocKind::Type);
        assert_eq!(names(typed.type_expr.as_ref().expect("type")), vec!["Real", "String"]);

        let deprecated = parse_jsdoc(&line_comment(&["/// Old helper", "/// @deprecated"]));
        assert_eq!(deprecated.kind, JsdocKind::Description);
        assert!(deprecated.deprecated);
    }

    #[test]
    fn type_expressions() {
        let nested = parse_type_expr("Array[Struct.Item] | Real[]").expect("parses");
        assert_eq!(names(&nested), vec!["Array", "Array"]);
        assert_eq!(
            names(nested.branches[1].items.as_ref().expect("items")),
            vec!["Real"]
        );
        assert!(parse_type_expr("").is_none());
        assert!(parse_type_expr("Array<Real").is_none());
    }

    #[test]
    fn params_without_braces() {
        let doc = parse_jsdoc(&line_comment(&[
            "/// @param Real speed - Units per step",
            "/// @param target The thing to chase",
        ]));
        assert_eq!(doc.params[0].name, "speed");
        assert_eq!(names(doc.params[0].ty.as_ref().expect("type")), vec!["Real"]);
        assert_eq!(doc.params[1].name, "target");
        assert!(doc.params[1].ty.is_none());
    }
}
