//! Concrete syntax tree handed to the analyzer by the GML parser.
//!
//! Every node carries the span it was parsed from. Children the grammar
//! guarantees but that a recovering parser may have dropped are `Option`s; the
//! visitor reports their absence as a structural fault instead of guessing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.line, self.column).cmp(&(other.line, other.column))
    }
}

/// Inclusive range of source text: `end_*` points at the last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub end_offset: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            offset: start.offset,
            line: start.line,
            column: start.column,
            end_offset: end.offset,
            end_line: end.line,
            end_column: end.column,
        }
    }

    pub fn single_point(position: Position) -> Self {
        Self::new(position, position)
    }

    pub fn start(&self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_offset, self.end_line, self.end_column)
    }

    pub fn contains(&self, line: usize, column: usize) -> bool {
        let position = Position::new(0, line, column);
        self.start() <= position && position <= self.end()
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.offset <= offset && offset <= self.end_offset
    }

    /// Number of characters covered, used to prefer the innermost match.
    pub fn width(&self) -> usize {
        self.end_offset.saturating_sub(self.offset)
    }

    pub fn union(a: &Self, b: &Self) -> Self {
        if a.line == 0 {
            return *b;
        }
        if b.line == 0 {
            return *a;
        }
        let start = a.start().min(b.start());
        let end = a.end().max(b.end());
        Self::new(start, end)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct File {
    pub statements: Vec<Statement>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "node", rename_all = "camelCase")]
pub enum Statement {
    Jsdoc(JsdocComment),
    LocalVarDeclarations(LocalVarDeclarations),
    StaticVarDeclaration(StaticVarDeclaration),
    GlobalVarDeclarations(GlobalVarDeclarations),
    VariableAssignment(VariableAssignment),
    MemberAssignment(MemberAssignment),
    Function(FunctionExpression),
    Enum(EnumStatement),
    Macro(MacroStatement),
    With(WithStatement),
    If(IfStatement),
    Loop(LoopStatement),
    Switch(SwitchStatement),
    Return(ReturnStatement),
    Block(BlockStatement),
    Expression(ExpressionStatement),
    Control(ControlStatement),
}

impl Statement {
    pub fn span(&self) -> SourceSpan {
        match self {
            Statement::Jsdoc(node) => node.span,
            Statement::LocalVarDeclarations(node) => node.span,
            Statement::StaticVarDeclaration(node) => node.span,
            Statement::GlobalVarDeclarations(node) => node.span,
            Statement::VariableAssignment(node) => node.span,
            Statement::MemberAssignment(node) => node.span,
            Statement::Function(node) => node.span,
            Statement::Enum(node) => node.span,
            Statement::Macro(node) => node.span,
            Statement::With(node) => node.span,
            Statement::If(node) => node.span,
            Statement::Loop(node) => node.span,
            Statement::Switch(node) => node.span,
            Statement::Return(node) => node.span,
            Statement::Block(node) => node.span,
            Statement::Expression(node) => node.span,
            Statement::Control(node) => node.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JsdocStyle {
    /// A run of `///` lines.
    Line,
    /// A `/** ... */` block.
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsdocComment {
    pub style: JsdocStyle,
    pub lines: Vec<CommentLine>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentLine {
    pub text: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub span: SourceSpan,
}

/// Keyword-like names that resolve to scopes rather than symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoIdentifier {
    SelfRef,
    Global,
    Other,
}

impl Identifier {
    pub fn new<S: Into<String>>(name: S, span: SourceSpan) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    pub fn pseudo(&self) -> Option<PseudoIdentifier> {
        match self.name.as_str() {
            "self" => Some(PseudoIdentifier::SelfRef),
            "global" => Some(PseudoIdentifier::Global),
            "other" => Some(PseudoIdentifier::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalVarDeclarations {
    pub declarations: Vec<VarDeclaration>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDeclaration {
    pub name: Identifier,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticVarDeclaration {
    pub name: Identifier,
    pub value: Option<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalVarDeclarations {
    pub names: Vec<Identifier>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignmentOperator {
    #[default]
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    NullishAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableAssignment {
    pub name: Identifier,
    #[serde(default)]
    pub operator: AssignmentOperator,
    pub value: Option<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberAssignment {
    pub target: IdentifierAccessor,
    #[serde(default)]
    pub operator: AssignmentOperator,
    pub value: Option<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionExpression {
    pub name: Option<Identifier>,
    pub parameters: Option<FunctionParameters>,
    pub constructor: Option<ConstructorSuffix>,
    pub body: Option<BlockStatement>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameters {
    pub parameters: Vec<FunctionParameter>,
    pub start_paren: SourceSpan,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: Identifier,
    pub default_value: Option<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorSuffix {
    pub parent: Option<ConstructorParent>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorParent {
    pub name: Identifier,
    pub arguments: Vec<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumStatement {
    pub name: Identifier,
    pub members: Vec<EnumMember>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: Identifier,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroStatement {
    pub name: Identifier,
    pub value: Option<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithStatement {
    pub expression: Option<Expression>,
    pub body: Option<Box<Statement>>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub consequent: Box<Statement>,
    pub alternative: Option<Box<Statement>>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopKind {
    While,
    Repeat,
    DoUntil,
    For,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopStatement {
    pub kind: LoopKind,
    pub initializer: Option<Box<Statement>>,
    pub condition: Option<Expression>,
    pub step: Option<Box<Statement>>,
    pub body: Box<Statement>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for the `default` case.
    pub test: Option<Expression>,
    pub statements: Vec<Statement>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub value: Option<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Break,
    Continue,
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlStatement {
    pub kind: ControlKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: SourceSpan,
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ExpressionKind::Function(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, ExpressionKind::Struct(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "node", rename_all = "camelCase")]
pub enum ExpressionKind {
    Literal(Literal),
    Template(TemplateLiteral),
    Array(ArrayLiteral),
    Struct(StructLiteral),
    Function(Box<FunctionExpression>),
    Accessor(IdentifierAccessor),
    New(NewExpression),
    Parenthesized(Box<Expression>),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Ternary(TernaryExpression),
    /// An assignment in expression position, which well-formed code never
    /// produces but recovering parsers do.
    Assignment(AssignmentExpression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Literal {
    Bool(bool),
    Real(String),
    NaN,
    Infinity,
    Pointer,
    Undefined,
    String(String),
    MultilineString(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateLiteral {
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayLiteral {
    pub elements: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructLiteral {
    pub entries: Vec<StructEntry>,
    pub start_brace: SourceSpan,
    pub end_brace: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StructKey {
    Identifier { name: String, span: SourceSpan },
    String { value: String, span: SourceSpan },
}

impl StructKey {
    pub fn name(&self) -> &str {
        match self {
            StructKey::Identifier { name, .. } => name,
            StructKey::String { value, .. } => value,
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            StructKey::Identifier { span, .. } | StructKey::String { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructEntry {
    pub key: StructKey,
    pub jsdoc: Option<JsdocComment>,
    /// `None` for shorthand entries (`{ name }`).
    pub value: Option<Expression>,
}

/// An identifier followed by any number of `.member`, `[index]` and
/// `(arguments)` suffixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierAccessor {
    pub identifier: Identifier,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Accessor {
    Dot { name: Identifier },
    Index { indices: Vec<Expression>, span: SourceSpan },
    Call { arguments: Vec<Expression>, span: SourceSpan },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpression {
    pub callee: Identifier,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
    BitNot,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDivide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
    NullishCoalesce,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Less
                | BinaryOperator::LessEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEqual
                | BinaryOperator::Xor
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(
            self,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::NullishCoalesce
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TernaryExpression {
    pub condition: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternative: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentExpression {
    pub target: Box<Expression>,
    pub value: Box<Expression>,
}
