use indoc::indoc;

use crate::{ConstValue, Descend, Graph, Node, OpId, OpNames, Type};

struct Names(&'static [&'static str]);

impl OpNames for Names {
    fn op_name(&self, op: OpId) -> &str {
        self.0[op.as_u32() as usize]
    }
}

const NAMES: Names = Names(&["project", "name", "map"]);
const PROJECT: OpId = OpId::from_raw(0);

#[test]
fn add_returns_sequential_handles() {
    let mut g = Graph::new();
    let a = g.string("a");
    let b = g.string("b");

    assert_eq!(a.as_u32(), 0);
    assert_eq!(b.as_u32(), 1);
    assert_eq!(g.len(), 2);
}

#[test]
fn structurally_equal_nodes_keep_distinct_identity() {
    let mut g = Graph::new();
    let a = g.string("same");
    let b = g.string("same");

    assert_ne!(a, b);
    assert_eq!(g.get(a), g.get(b));
}

#[test]
fn walk_visits_shared_nodes_once_in_dependency_order() {
    let mut g = Graph::new();
    let name = g.string("acme");
    let project = g.output(Type::object("project"), PROJECT, [("name", name)]);
    let left = g.output(Type::String, OpId::from_raw(1), [("project", project)]);
    let right = g.output(Type::String, OpId::from_raw(1), [("project", project)]);

    let order = g.walk(&[left, right], Descend::Inputs);

    assert_eq!(order, vec![name, project, left, right]);
}

#[test]
fn walk_descends_into_function_bodies_on_request() {
    let mut g = Graph::new();
    let row = g.var(Type::object("run"), "row");
    let body = g.output(Type::String, OpId::from_raw(1), [("run", row)]);
    let func = g.function(Type::function([("row", Type::object("run"))], Type::String), body);

    assert_eq!(g.walk(&[func], Descend::Inputs), vec![func]);
    assert_eq!(g.walk(&[func], Descend::Functions), vec![row, body, func]);
}

#[test]
fn any_reachable_finds_nodes_inside_functions() {
    let mut g = Graph::new();
    let name = g.string("acme");
    let project = g.output(Type::object("project"), PROJECT, [("name", name)]);
    let func = g.function(Type::function::<&str>([], Type::object("project")), project);

    let is_project = |_, node: &Node| node.op() == Some(PROJECT);
    assert!(!g.any_reachable(&[func], Descend::Inputs, is_project));
    assert!(g.any_reachable(&[func], Descend::Functions, is_project));
}

#[test]
fn const_value_accessors() {
    let mut g = Graph::new();
    let s = g.string("acme");
    let ty = g.constant(Type::TypeType, ConstValue::Type(Type::Int));

    assert_eq!(g.get(s).const_value().and_then(ConstValue::as_str), Some("acme"));
    assert_eq!(g.get(ty).const_value().and_then(ConstValue::as_type), Some(&Type::Int));
    assert_eq!(g.get(s).function_body(), None);
}

#[test]
fn dump_lists_reachable_nodes() {
    let mut g = Graph::new();
    let list = g.var(Type::list(Type::object("project")), "projects");
    let row = g.var(Type::object("project"), "row");
    let body = g.output(Type::String, OpId::from_raw(1), [("project", row)]);
    let func = g.function(
        Type::function([("row", Type::object("project"))], Type::String),
        body,
    );
    let map = g.output(
        Type::list(Type::String),
        OpId::from_raw(2),
        [("arr", list), ("mapFn", func)],
    );

    insta::assert_snapshot!(g.dump(&[map], &NAMES), @r"
    %0 = $projects : List<project>
    %1 = $row : project
    %2 = name(project: %1) : String
    %3 = fn %2 : (row: project) => String
    %4 = map(arr: %0, mapFn: %3) : List<String>
    ");
}

#[test]
fn dump_matches_expected_layout() {
    let mut g = Graph::new();
    let name = g.string("acme");
    let project = g.output(Type::object("project"), PROJECT, [("name", name)]);

    let expected = indoc! {r#"
        %0 = "acme" : String
        %1 = project(name: %0) : project
    "#};
    assert_eq!(g.dump(&[project], &NAMES), expected);
}
