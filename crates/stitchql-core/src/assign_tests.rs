use crate::{Type, TypeMap, assign};

fn project_with(keys: &[&str]) -> Type {
    Type::has_keys("project", keys.iter().map(|k| (*k, Type::String)))
}

#[test]
fn has_keys_is_assignable_to_keyless_base() {
    assert!(assign(&Type::object("project"), &project_with(&["a", "b"])));
}

#[test]
fn has_keys_is_assignable_to_key_subset() {
    assert!(assign(&project_with(&["a"]), &project_with(&["a", "b"])));
}

#[test]
fn has_keys_is_not_assignable_to_key_superset() {
    assert!(!assign(&project_with(&["a", "b"]), &project_with(&["a"])));
}

#[test]
fn keyless_base_is_not_assignable_to_has_keys() {
    assert!(!assign(&project_with(&[]), &Type::object("project")));
}

#[test]
fn has_keys_requires_same_class() {
    let run = Type::has_keys("run", [("a", Type::String)]);
    assert!(!assign(&Type::object("project"), &run));
    assert!(!assign(&project_with(&["a"]), &run));
}

#[test]
fn has_keys_field_types_are_covariant() {
    let target = Type::has_keys("project", [("n", Type::union([Type::Int, Type::NoneType]))]);
    let candidate = Type::has_keys("project", [("n", Type::Int)]);

    assert!(assign(&target, &candidate));
    assert!(!assign(&candidate, &target));
}

#[test]
fn tags_are_invisible_to_untagged_targets() {
    let mut tags = TypeMap::new();
    tags.insert("project".to_string(), Type::object("project"));
    let tagged = Type::tagged(tags, Type::Int);

    assert!(assign(&Type::Int, &tagged));
    assert!(!assign(&tagged, &Type::Int));
    assert!(assign(&tagged, &tagged));
}

#[test]
fn union_candidate_must_fit_entirely() {
    let target = Type::union([Type::Int, Type::String]);

    assert!(assign(&target, &Type::Int));
    assert!(assign(&target, &Type::union([Type::String, Type::Int])));
    assert!(!assign(&target, &Type::union([Type::Int, Type::Boolean])));
    assert!(!assign(&Type::Int, &target));
}

#[test]
fn const_is_assignable_to_inner_type() {
    let c = Type::constant(Type::String, "x");

    assert!(assign(&Type::String, &c));
    assert!(assign(&c, &c));
    assert!(!assign(&c, &Type::constant(Type::String, "y")));
    assert!(!assign(&c, &Type::String));
}

#[test]
fn typed_dict_width_subtyping() {
    let narrow = Type::typed_dict([("a", Type::Int)]);
    let wide = Type::typed_dict([("a", Type::Int), ("b", Type::String)]);

    assert!(assign(&narrow, &wide));
    assert!(!assign(&wide, &narrow));
}

#[test]
fn list_elements_are_covariant() {
    let target = Type::list(Type::object("run"));
    let candidate = Type::list(Type::has_keys("run", [("name", Type::String)]));

    assert!(assign(&target, &candidate));
    assert!(!assign(&candidate, &target));
}

#[test]
fn function_params_are_contravariant() {
    let general = Type::function([("row", Type::object("run"))], Type::Int);
    let specific = Type::function(
        [("row", Type::has_keys("run", [("name", Type::String)]))],
        Type::Int,
    );

    assert!(assign(&specific, &general));
    assert!(!assign(&general, &specific));
}

#[test]
fn any_accepts_everything_but_nothing_fits_invalid_except_itself() {
    assert!(assign(&Type::Any, &Type::object("run")));
    assert!(!assign(&Type::Int, &Type::Invalid));
    assert!(assign(&Type::Invalid, &Type::Invalid));
    assert!(Type::Any.accepts(&Type::Invalid));
}
