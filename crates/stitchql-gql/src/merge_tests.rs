use crate::{Error, merge_selections, parse_selections, print_selections};

fn merged(source: &str) -> String {
    let selections = parse_selections(source).unwrap();
    print_selections(&merge_selections(selections).unwrap())
}

fn merge_error(source: &str) -> Error {
    merge_selections(parse_selections(source).unwrap()).unwrap_err()
}

#[test]
fn identical_fields_merge_sub_selections() {
    insta::assert_snapshot!(
        merged("project { id name } project { name entity }"),
        @"project { id name entity }"
    );
}

#[test]
fn argument_order_is_irrelevant() {
    insta::assert_snapshot!(
        merged(r#"runs(first: 1, order: "asc") { id } runs(order: "asc", first: 1) { name }"#),
        @r#"runs(first: 1, order: "asc") { id name }"#
    );
}

#[test]
fn differing_argument_values_stay_separate() {
    insta::assert_snapshot!(
        merged(r#"project(name: "a") { id } project(name: "b") { id }"#),
        @r#"project(name: "a") { id } project(name: "b") { id }"#
    );
}

#[test]
fn differing_aliases_stay_separate() {
    insta::assert_snapshot!(
        merged("a: project { id } b: project { id } project { id }"),
        @"a: project { id } b: project { id } project { id }"
    );
}

#[test]
fn differing_directives_stay_separate() {
    insta::assert_snapshot!(
        merged("id @include(if: $x) id"),
        @"id @include(if: $x) id"
    );
}

#[test]
fn merge_recurses_into_merged_children() {
    insta::assert_snapshot!(
        merged("project { runs { id } } project { runs { name } runs { id } }"),
        @"project { runs { id name } }"
    );
}

#[test]
fn scalar_duplicates_collapse() {
    insta::assert_snapshot!(merged("id id name id"), @"id name");
}

#[test]
fn custom_fields_union_their_keys() {
    insta::assert_snapshot!(
        merged(r#"summaryMetrics(keys: ["a", "b"]) summaryMetrics(keys: ["b", "c"])"#),
        @r#"summaryMetrics(keys: ["a", "b", "c"])"#
    );
}

#[test]
fn custom_select_all_wins() {
    insta::assert_snapshot!(
        merged(r#"config(keys: ["lr"]) config config(keys: ["seed"])"#),
        @"config"
    );
    insta::assert_snapshot!(
        merged(r#"sampledHistory(specs: []) sampledHistory(specs: ["{\"keys\": [\"loss\"]}"])"#),
        @"sampledHistory"
    );
}

#[test]
fn custom_field_keys_are_deduplicated() {
    insta::assert_snapshot!(
        merged(r#"summaryMetrics(keys: ["a", "a"])"#),
        @r#"summaryMetrics(keys: ["a"])"#
    );
}

#[test]
fn custom_fields_with_different_aliases_stay_separate() {
    insta::assert_snapshot!(
        merged(r#"m1: summaryMetrics(keys: ["a"]) m2: summaryMetrics(keys: ["b"])"#),
        @r#"m1: summaryMetrics(keys: ["a"]) m2: summaryMetrics(keys: ["b"])"#
    );
}

#[test]
fn custom_field_with_wrong_argument_name() {
    let err = merge_error(r#"config(names: ["a"])"#);

    insta::assert_snapshot!(err, @"malformed arguments on `config`: expected argument `keys`, found `names`");
}

#[test]
fn custom_field_with_too_many_arguments() {
    let err = merge_error(r#"summaryMetrics(keys: ["a"], limit: 3)"#);

    assert!(matches!(err, Error::MalformedCustomMerge { ref field, .. } if field == "summaryMetrics"));
}

#[test]
fn custom_field_with_non_list_argument() {
    let err = merge_error(r#"sampledHistory(specs: "loss")"#);

    insta::assert_snapshot!(err, @"malformed arguments on `sampledHistory`: argument `specs` must be a list");
}

#[test]
fn fragments_cannot_be_merged() {
    assert_eq!(
        merge_error("...RunFields"),
        Error::UnsupportedSelection("fragment spread")
    );
    assert_eq!(
        merge_error("project { ... on Project { id } }"),
        Error::UnsupportedSelection("inline fragment")
    );
}
