mod common;

use anyhow::Context;
use gml_analyzer::cst::{AssignmentOperator, BinaryOperator};
use gml_analyzer::{DiagnosticKind, Project, SourceId, TypeKind};

use common::*;

#[test]
fn constructor_members_live_on_the_constructed_struct() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(
        vec![function_statement(constructor(
            function(Some("Point"), &[], vec![member_assign("self", "x", real(2, 13), 2)], 1, 3),
            None,
        ))],
        4,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    assert!(
        symbols.diagnostics().is_empty(),
        "expected no diagnostics, found {:?}",
        symbols.diagnostics().entries()
    );

    let point = project.get_type("Struct.Point").context("Struct.Point registered")?;
    let x = point.own_member("x").context("x declared on Point")?;
    assert!(x.ty().is_kind(&TypeKind::Real), "expected Real, found {:?}", x.ty());
    assert!(x.flags().instance);

    let global = project.get_global("Point").context("Point is global")?;
    assert_eq!(global.ty().describe(), "Constructor.Point");
    Ok(())
}

#[test]
fn adding_a_member_twice_keeps_its_identity() {
    let project = Project::default();
    let shape = project.create_struct();
    let first = shape.add_member("hp", &project.create_type(TypeKind::Real));
    let second = shape.add_member("hp", &project.create_type(TypeKind::String));
    assert!(first.ptr_eq(&second));
    assert_eq!(first.ty().describe(), "Real|String");
    assert_eq!(shape.members().len(), 1);
}

#[test]
fn ternary_merges_both_branches() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(
        vec![local_var("v", Some(ternary(boolean(1, 8), real(1, 15), string(1, 19))), 1)],
        2,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    let v = symbols.local_scope().own_member("v").context("v declared")?;
    let kinds: Vec<TypeKind> = v
        .ty()
        .branches()
        .iter()
        .map(|branch| branch.kind().clone())
        .collect();
    assert_eq!(kinds, vec![TypeKind::Real, TypeKind::String]);
    assert!(v.flags().local);
    Ok(())
}

#[test]
fn undeclared_assignment_at_global_self_is_reported_once() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(vec![assign("score", real(1, 8), 1)], 2);
    let symbols = project.analyze(SourceId(1), &source)?;

    let reported: Vec<_> = symbols
        .diagnostics()
        .of_kind(DiagnosticKind::UndeclaredGlobalReference)
        .collect();
    assert_eq!(reported.len(), 1, "expected one diagnostic, found {:?}", reported);
    assert_eq!(symbols.diagnostics().len(), 1);
    assert!(symbols.local_scope().own_member("score").is_none());
    assert!(project.get_global("score").is_none());
    Ok(())
}

#[test]
fn self_at_the_top_level_is_flagged() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(vec![member_assign("self", "lives", real(1, 13), 1)], 2);
    let symbols = project.analyze(SourceId(1), &source)?;
    assert_eq!(symbols.diagnostics().of_kind(DiagnosticKind::GlobalSelf).count(), 1);
    Ok(())
}

#[test]
fn new_returns_the_constructed_struct_and_follows_parents() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(
        vec![
            function_statement(constructor(
                function(
                    Some("Base"),
                    &[],
                    vec![member_assign("self", "hp", real(2, 14), 2)],
                    1,
                    3,
                ),
                None,
            )),
            function_statement(constructor(
                function(
                    Some("Child"),
                    &[],
                    vec![member_assign("self", "speed", real(5, 17), 5)],
                    4,
                    6,
                ),
                Some("Base"),
            )),
            local_var("c", Some(new_struct("Child", Vec::new(), 7, 8)), 7),
            expression(dot("c", "hp", 8, 0)),
        ],
        9,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    assert!(
        symbols.diagnostics().is_empty(),
        "expected no diagnostics, found {:?}",
        symbols.diagnostics().entries()
    );

    let base = project.get_type("Struct.Base").context("Struct.Base")?;
    let child = project.get_type("Struct.Child").context("Struct.Child")?;
    let symbols = project.file(SourceId(1)).context("file symbols")?;
    let c = symbols.local_scope().own_member("c").context("c declared")?;
    assert!(c.ty().ptr_eq(&child));
    assert!(child.narrows(&base));
    assert!(!base.narrows(&child));

    let hp = base.own_member("hp").context("hp on Base")?;
    assert!(
        hp.refs().iter().any(|reference| reference.location.span.line == 8),
        "expected a reference to hp on line 8, found {:?}",
        hp.refs()
    );
    let at_use = symbols.signifier_at(8, 2).context("hp under the cursor")?;
    assert!(at_use.ptr_eq(&hp));
    Ok(())
}

#[test]
fn parameters_are_locals_of_the_function_scope() -> anyhow::Result<()> {
    let mut project = Project::default();
    let body = vec![ret(
        Some(binary(BinaryOperator::Greater, read("amount", 2, 11), real(2, 20))),
        2,
    )];
    let check = function(Some("check"), &["amount"], body, 1, 3);
    let source = file(vec![function_statement(check)], 4);
    let symbols = project.analyze(SourceId(1), &source)?;

    let range = symbols.scope_at(2, 11).context("scope inside the body")?;
    let amount = range.scope.local.own_member("amount").context("amount is local")?;
    assert!(amount.flags().parameter);
    assert_eq!(amount.refs().len(), 2);

    let check = project.get_global("check").context("check is global")?;
    let function = check.get_type_by_kind(&TypeKind::Function).context("check is a function")?;
    assert!(function.returns().to_type().is_kind(&TypeKind::Bool));
    assert!(function.parameter(0).context("first parameter")?.ptr_eq(&amount));
    Ok(())
}

#[test]
fn functions_without_returns_return_undefined() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(vec![function_statement(function(Some("noop"), &[], Vec::new(), 1, 2))], 3);
    project.analyze(SourceId(1), &source)?;
    let noop = project.get_global("noop").context("noop")?;
    assert_eq!(noop.ty().describe(), "Function() -> Undefined");
    Ok(())
}

#[test]
fn globalvars_resolve_before_their_declaration() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(
        vec![assign("counter", real(1, 10), 1), globalvar("counter", 2)],
        3,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    assert!(symbols.diagnostics().is_empty());
    let counter = project.get_global("counter").context("counter")?;
    assert!(counter.flags().global);
    assert!(counter.ty().is_kind(&TypeKind::Real));
    Ok(())
}

#[test]
fn compound_assignment_keeps_the_target_type() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(
        vec![
            local_var("total", Some(real(1, 12)), 1),
            assign_with("total", AssignmentOperator::AddAssign, string(2, 9), 2),
        ],
        3,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    let total = symbols.local_scope().own_member("total").context("total")?;
    assert_eq!(total.ty().describe(), "Real");
    Ok(())
}

#[test]
fn with_rebinds_self_to_the_guard() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(
        vec![
            local_var("box", Some(struct_literal(vec![("size", real(1, 20))], 1, 10)), 1),
            with(read("box", 2, 6), vec![assign("size", string(3, 11), 3)], 2, 4),
        ],
        5,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    assert!(
        symbols.diagnostics().is_empty(),
        "expected no diagnostics, found {:?}",
        symbols.diagnostics().entries()
    );
    let shape = symbols.local_scope().own_member("box").context("box")?.ty();
    let size = shape.own_member("size").context("size")?;
    assert_eq!(size.ty().describe(), "Real|String");
    Ok(())
}

#[test]
fn arrays_collect_their_item_types() -> anyhow::Result<()> {
    let mut project = Project::default();
    let source = file(
        vec![
            local_var("items", Some(array(vec![real(1, 13), real(1, 16)], 1, 12)), 1),
            index_assign("items", string(2, 12), 2),
            local_var("first", Some(index("items", real(3, 18), 3, 12)), 3),
        ],
        4,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    let items = symbols.local_scope().own_member("items").context("items")?;
    assert_eq!(items.ty().describe(), "Array<Real|String>");
    let first = symbols.local_scope().own_member("first").context("first")?;
    assert_eq!(first.ty().describe(), "Real|String");
    Ok(())
}

#[test]
fn function_assigned_to_a_variable_keeps_its_signature() -> anyhow::Result<()> {
    let mut project = Project::default();
    let callback = function(None, &["value"], vec![ret(Some(read("value", 2, 11)), 2)], 1, 3);
    let source = file(
        vec![
            local_var("callback", Some(function_expression(callback)), 1),
            local_var("result", Some(call("callback", vec![real(4, 22)], 4, 13)), 4),
        ],
        5,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    let callback = symbols.local_scope().own_member("callback").context("callback")?;
    let function = callback.get_type_by_kind(&TypeKind::Function).context("function type")?;
    assert_eq!(function.parameters().len(), 1);
    assert!(callback.refs().iter().any(|reference| reference.location.span.line == 4));
    Ok(())
}

#[test]
fn with_on_an_object_writes_to_its_instances() -> anyhow::Result<()> {
    let mut project = Project::default();
    let instance = project.register_object("obj_player");
    let source = file(
        vec![with(read("obj_player", 1, 6), vec![assign("hp", real(2, 9), 2)], 1, 3)],
        4,
    );
    let symbols = project.analyze(SourceId(1), &source)?;
    assert!(
        symbols.diagnostics().is_empty(),
        "expected no diagnostics, found {:?}",
        symbols.diagnostics().entries()
    );
    let hp = instance.own_member("hp").context("hp on the instance")?;
    assert!(hp.flags().instance);
    assert_eq!(instance.describe(), "Id.Instance.obj_player");
    Ok(())
}
