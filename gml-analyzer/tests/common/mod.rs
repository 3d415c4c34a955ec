//! Small builders for syntax trees. Every node sits on an explicit line; the
//! byte offset is derived from the line and column so spans stay ordered.
#![allow(dead_code)]

use gml_analyzer::cst::{
    Accessor, ArrayLiteral, AssignmentOperator, BinaryExpression, BinaryOperator, BlockStatement,
    CommentLine, ConstructorParent, ConstructorSuffix, Expression, ExpressionKind,
    ExpressionStatement, File, FunctionExpression, FunctionParameter, FunctionParameters,
    GlobalVarDeclarations, Identifier, IdentifierAccessor, JsdocComment, JsdocStyle, Literal,
    LocalVarDeclarations, MemberAssignment, NewExpression, Position, ReturnStatement, SourceSpan,
    Statement, StructEntry, StructKey, StructLiteral, TernaryExpression, VarDeclaration,
    VariableAssignment, WithStatement,
};

pub fn pos(line: usize, column: usize) -> Position {
    Position::new(line * 1000 + column, line, column)
}

pub fn span(line: usize, start: usize, end: usize) -> SourceSpan {
    SourceSpan::new(pos(line, start), pos(line, end))
}

pub fn lines(first: usize, last: usize) -> SourceSpan {
    SourceSpan::new(pos(first, 0), pos(last, 80))
}

pub fn ident(name: &str, line: usize, column: usize) -> Identifier {
    let end = column + name.len().saturating_sub(1);
    Identifier::new(name, span(line, column, end))
}

pub fn real(line: usize, column: usize) -> Expression {
    Expression::new(
        ExpressionKind::Literal(Literal::Real("1".to_string())),
        span(line, column, column),
    )
}

pub fn string(line: usize, column: usize) -> Expression {
    Expression::new(
        ExpressionKind::Literal(Literal::String("a".to_string())),
        span(line, column, column + 2),
    )
}

pub fn boolean(line: usize, column: usize) -> Expression {
    Expression::new(
        ExpressionKind::Literal(Literal::Bool(true)),
        span(line, column, column + 3),
    )
}

fn accessor_expression(
    identifier: Identifier,
    accessors: Vec<Accessor>,
    line: usize,
) -> Expression {
    let start = identifier.span.column;
    let span = span(line, start, start + 20);
    Expression::new(
        ExpressionKind::Accessor(IdentifierAccessor {
            identifier,
            accessors,
            span,
        }),
        span,
    )
}

/// `name`
pub fn read(name: &str, line: usize, column: usize) -> Expression {
    accessor_expression(ident(name, line, column), Vec::new(), line)
}

/// `base.member`
pub fn dot(base: &str, member: &str, line: usize, column: usize) -> Expression {
    let member_column = column + base.len() + 1;
    accessor_expression(
        ident(base, line, column),
        vec![Accessor::Dot {
            name: ident(member, line, member_column),
        }],
        line,
    )
}

/// `name(arguments)`
pub fn call(name: &str, arguments: Vec<Expression>, line: usize, column: usize) -> Expression {
    let open = column + name.len();
    accessor_expression(
        ident(name, line, column),
        vec![Accessor::Call {
            arguments,
            span: span(line, open, open + 10),
        }],
        line,
    )
}

/// `name[index]`
pub fn index(name: &str, index: Expression, line: usize, column: usize) -> Expression {
    let open = column + name.len();
    accessor_expression(
        ident(name, line, column),
        vec![Accessor::Index {
            indices: vec![index],
            span: span(line, open, open + 3),
        }],
        line,
    )
}

/// `new name(arguments)`
pub fn new_struct(
    name: &str,
    arguments: Vec<Expression>,
    line: usize,
    column: usize,
) -> Expression {
    Expression::new(
        ExpressionKind::New(NewExpression {
            callee: ident(name, line, column + 4),
            arguments,
        }),
        span(line, column, column + 20),
    )
}

pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let span = SourceSpan::union(&left.span, &right.span);
    Expression::new(
        ExpressionKind::Binary(BinaryExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }),
        span,
    )
}

pub fn ternary(
    condition: Expression,
    consequent: Expression,
    alternative: Expression,
) -> Expression {
    let span = SourceSpan::union(&condition.span, &alternative.span);
    Expression::new(
        ExpressionKind::Ternary(TernaryExpression {
            condition: Box::new(condition),
            consequent: Box::new(consequent),
            alternative: Box::new(alternative),
        }),
        span,
    )
}

/// `[elements]` on one line.
pub fn array(elements: Vec<Expression>, line: usize, column: usize) -> Expression {
    Expression::new(
        ExpressionKind::Array(ArrayLiteral { elements }),
        span(line, column, column + 30),
    )
}

/// `{ key: value, ... }` on one line; entries start ten columns apart.
pub fn struct_literal(entries: Vec<(&str, Expression)>, line: usize, column: usize) -> Expression {
    let entries = entries
        .into_iter()
        .enumerate()
        .map(|(position, (key, value))| {
            let key_column = column + 2 + position * 10;
            StructEntry {
                key: StructKey::Identifier {
                    name: key.to_string(),
                    span: span(line, key_column, key_column + key.len() - 1),
                },
                jsdoc: None,
                value: Some(value),
            }
        })
        .collect();
    Expression::new(
        ExpressionKind::Struct(StructLiteral {
            entries,
            start_brace: span(line, column, column),
            end_brace: span(line, column + 60, column + 60),
        }),
        span(line, column, column + 60),
    )
}

/// A function spanning `first..=last`. The header sits on `first`:
/// parameters start at column 20 and are ten columns apart; the body opens at
/// column 60 and closes at column 0 of `last`.
pub fn function(
    name: Option<&str>,
    params: &[&str],
    body: Vec<Statement>,
    first: usize,
    last: usize,
) -> FunctionExpression {
    let parameters = params
        .iter()
        .enumerate()
        .map(|(position, param)| {
            let name = ident(param, first, 21 + position * 10);
            FunctionParameter {
                span: name.span,
                name,
                default_value: None,
            }
        })
        .collect();
    FunctionExpression {
        name: name.map(|name| ident(name, first, 9)),
        parameters: Some(FunctionParameters {
            parameters,
            start_paren: span(first, 20, 20),
            span: span(first, 20, 58),
        }),
        constructor: None,
        body: Some(BlockStatement {
            statements: body,
            span: SourceSpan::new(pos(first, 60), pos(last, 0)),
        }),
        span: SourceSpan::new(pos(first, 0), pos(last, 0)),
    }
}

/// Marks a function as a constructor, optionally deriving from `parent`.
pub fn constructor(mut function: FunctionExpression, parent: Option<&str>) -> FunctionExpression {
    let line = function.span.line;
    function.constructor = Some(ConstructorSuffix {
        parent: parent.map(|parent| ConstructorParent {
            name: ident(parent, line, 61),
            arguments: Vec::new(),
            span: span(line, 59, 70),
        }),
        span: span(line, 59, 79),
    });
    function
}

pub fn function_statement(function: FunctionExpression) -> Statement {
    Statement::Function(function)
}

pub fn function_expression(function: FunctionExpression) -> Expression {
    let span = function.span;
    Expression::new(ExpressionKind::Function(Box::new(function)), span)
}

/// `var name = value;`
pub fn local_var(name: &str, value: Option<Expression>, line: usize) -> Statement {
    Statement::LocalVarDeclarations(LocalVarDeclarations {
        declarations: vec![VarDeclaration {
            name: ident(name, line, 4),
            value,
        }],
        span: span(line, 0, 40),
    })
}

/// `globalvar name;`
pub fn globalvar(name: &str, line: usize) -> Statement {
    Statement::GlobalVarDeclarations(GlobalVarDeclarations {
        names: vec![ident(name, line, 10)],
        span: span(line, 0, 30),
    })
}

/// `name = value;`
pub fn assign(name: &str, value: Expression, line: usize) -> Statement {
    assign_with(name, AssignmentOperator::Assign, value, line)
}

pub fn assign_with(
    name: &str,
    operator: AssignmentOperator,
    value: Expression,
    line: usize,
) -> Statement {
    Statement::VariableAssignment(VariableAssignment {
        name: ident(name, line, 0),
        operator,
        value: Some(value),
        span: span(line, 0, 40),
    })
}

/// `base.member = value;`
pub fn member_assign(base: &str, member: &str, value: Expression, line: usize) -> Statement {
    let member_column = base.len() + 1;
    Statement::MemberAssignment(MemberAssignment {
        target: IdentifierAccessor {
            identifier: ident(base, line, 0),
            accessors: vec![Accessor::Dot {
                name: ident(member, line, member_column),
            }],
            span: span(line, 0, member_column + member.len() - 1),
        },
        operator: AssignmentOperator::Assign,
        value: Some(value),
        span: span(line, 0, 40),
    })
}

/// `name[0] = value;`
pub fn index_assign(name: &str, value: Expression, line: usize) -> Statement {
    let open = name.len();
    Statement::MemberAssignment(MemberAssignment {
        target: IdentifierAccessor {
            identifier: ident(name, line, 0),
            accessors: vec![Accessor::Index {
                indices: vec![real(line, open + 1)],
                span: span(line, open, open + 2),
            }],
            span: span(line, 0, open + 2),
        },
        operator: AssignmentOperator::Assign,
        value: Some(value),
        span: span(line, 0, 40),
    })
}

pub fn ret(value: Option<Expression>, line: usize) -> Statement {
    Statement::Return(ReturnStatement {
        value,
        span: span(line, 4, 30),
    })
}

pub fn expression(expression: Expression) -> Statement {
    let span = expression.span;
    Statement::Expression(ExpressionStatement { expression, span })
}

/// `with (guard) { body }` spanning `first..=last`.
pub fn with(guard: Expression, body: Vec<Statement>, first: usize, last: usize) -> Statement {
    Statement::With(WithStatement {
        expression: Some(guard),
        body: Some(Box::new(Statement::Block(BlockStatement {
            statements: body,
            span: SourceSpan::new(pos(first, 20), pos(last, 0)),
        }))),
        span: SourceSpan::new(pos(first, 0), pos(last, 0)),
    })
}

/// A run of `///` lines starting at `first`.
pub fn docs(text: &[&str], first: usize) -> Statement {
    let lines: Vec<CommentLine> = text
        .iter()
        .enumerate()
        .map(|(offset, text)| CommentLine {
            text: text.to_string(),
            span: span(first + offset, 0, text.len()),
        })
        .collect();
    let last = first + text.len().saturating_sub(1);
    Statement::Jsdoc(JsdocComment {
        style: JsdocStyle::Line,
        lines,
        span: SourceSpan::new(pos(first, 0), pos(last, 80)),
    })
}

pub fn file(statements: Vec<Statement>, last: usize) -> File {
    File {
        statements,
        span: SourceSpan::new(pos(1, 0), pos(last, 0)),
    }
}
