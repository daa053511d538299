use indoc::indoc;

use crate::{Error, normalize};

#[test]
fn merges_fragments_of_one_operation() {
    let source = indoc! {r#"
        query StitchedQuery {
          q_1: project(name: "acme") { runs { id } }
          q_1: project(name: "acme") { runs { name } summaryMetrics(keys: ["loss"]) }
          q_2: viewer { username }
          q_1: project(name: "acme") { summaryMetrics(keys: ["acc"]) }
        }
    "#};

    insta::assert_snapshot!(normalize(source).unwrap(), @r#"query StitchedQuery { q_1: project(name: "acme") { runs { id name } summaryMetrics(keys: ["loss", "acc"]) } q_2: viewer { username } }"#);
}

#[test]
fn normalize_is_idempotent() {
    let source = r#"query Q { a { b c } a { c(x: 1) d } summaryMetrics(keys: ["x"]) summaryMetrics }"#;

    let once = normalize(source).unwrap();
    let twice = normalize(&once).unwrap();

    assert_eq!(once, twice);
    insta::assert_snapshot!(once, @"query Q { a { b c c(x: 1) d } summaryMetrics }");
}

#[test]
fn rejects_multiple_operations() {
    assert_eq!(
        normalize("query A { a } query B { b }"),
        Err(Error::OperationCount(2))
    );
}

#[test]
fn rejects_empty_document() {
    assert_eq!(normalize("  # nothing\n"), Err(Error::OperationCount(0)));
}

#[test]
fn rejects_fragment_spreads() {
    assert_eq!(
        normalize("query { project { ...P } }"),
        Err(Error::UnsupportedSelection("fragment spread"))
    );
}
