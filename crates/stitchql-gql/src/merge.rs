//! Structural deduplication of sibling selections.
//!
//! Two sibling fields merge when they share name, alias, directives and
//! arguments (argument order is irrelevant). Their sub-selections are
//! concatenated and merged recursively.
//!
//! A few fields take a single list-valued argument naming the keys to fetch.
//! Those merge by argument union instead of argument equality; an absent, null
//! or empty list selects everything and wins over any subset.

use crate::ast::{Argument, Field, Selection, Value};
use crate::{Error, Result};

/// Fields merged by key union, with the name of their key-list argument.
pub const CUSTOM_MERGE_FIELDS: &[(&str, &str)] = &[
    ("summaryMetrics", "keys"),
    ("config", "keys"),
    ("sampledHistory", "specs"),
];

fn custom_merge_argument(field_name: &str) -> Option<&'static str> {
    CUSTOM_MERGE_FIELDS
        .iter()
        .find(|(name, _)| *name == field_name)
        .map(|(_, arg)| *arg)
}

/// Merge a sibling list, recursively.
pub fn merge_selections(selections: Vec<Selection>) -> Result<Vec<Selection>> {
    let mut merged: Vec<Field> = Vec::new();

    for selection in selections {
        let field = match selection {
            Selection::Field(field) => field,
            other => return Err(Error::UnsupportedSelection(other.kind_name())),
        };
        let field = normalize_custom_field(field)?;

        match merged.iter_mut().find(|m| mergeable(m, &field)) {
            Some(existing) => absorb(existing, field),
            None => merged.push(field),
        }
    }

    merged
        .into_iter()
        .map(|mut field| {
            let children = std::mem::take(&mut field.selection_set);
            field.selection_set = merge_selections(children)?;
            Ok(Selection::Field(field))
        })
        .collect()
}

fn mergeable(a: &Field, b: &Field) -> bool {
    if a.name != b.name || a.alias != b.alias || a.directives != b.directives {
        return false;
    }
    if custom_merge_argument(&a.name).is_some() {
        return true;
    }
    sorted_arguments(&a.arguments) == sorted_arguments(&b.arguments)
}

fn sorted_arguments(arguments: &[Argument]) -> Vec<&Argument> {
    let mut sorted: Vec<&Argument> = arguments.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

fn absorb(existing: &mut Field, incoming: Field) {
    if let Some(arg_name) = custom_merge_argument(&existing.name) {
        let keys = union_keys(requested_keys(existing), requested_keys(&incoming));
        existing.arguments = key_arguments(arg_name, keys);
    }
    existing.selection_set.extend(incoming.selection_set);
}

/// Validate a custom-merge field and rewrite its key list in canonical form.
///
/// Fields outside the custom table are returned untouched.
fn normalize_custom_field(mut field: Field) -> Result<Field> {
    let Some(arg_name) = custom_merge_argument(&field.name) else {
        return Ok(field);
    };

    let malformed = |reason: String| Error::MalformedCustomMerge {
        field: field.name.clone(),
        reason,
    };

    let keys = match field.arguments.as_slice() {
        [] => None,
        [arg] if arg.name != arg_name => {
            return Err(malformed(format!(
                "expected argument `{arg_name}`, found `{}`",
                arg.name
            )));
        }
        [arg] => match &arg.value {
            Value::Null => None,
            Value::List(items) if items.is_empty() => None,
            Value::List(items) => Some(dedup(items.clone())),
            _ => {
                return Err(malformed(format!(
                    "argument `{arg_name}` must be a list"
                )));
            }
        },
        args => {
            return Err(malformed(format!(
                "expected at most one argument, found {}",
                args.len()
            )));
        }
    };

    field.arguments = key_arguments(arg_name, keys);
    Ok(field)
}

/// Keys requested by an already normalized custom field. `None` selects all.
fn requested_keys(field: &Field) -> Option<Vec<Value>> {
    field
        .arguments
        .first()
        .and_then(|arg| arg.value.as_list())
        .map(<[Value]>::to_vec)
}

fn union_keys(a: Option<Vec<Value>>, b: Option<Vec<Value>>) -> Option<Vec<Value>> {
    let (mut a, b) = (a?, b?);
    a.extend(b);
    Some(dedup(a))
}

fn dedup(values: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn key_arguments(arg_name: &str, keys: Option<Vec<Value>>) -> Vec<Argument> {
    match keys {
        Some(keys) => vec![Argument {
            name: arg_name.to_string(),
            value: Value::List(keys),
        }],
        None => Vec::new(),
    }
}
