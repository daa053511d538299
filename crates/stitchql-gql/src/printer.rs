//! Compact single-line printer.
//!
//! Output re-parses to the same AST, so `print(parse(print(doc)))` is stable.

use std::fmt::Write as _;

use crate::ast::{
    Argument, Directive, Document, Field, Operation, Selection, TypeRef, Value,
};

/// Print a whole document, operations separated by a single space.
pub fn print(document: &Document) -> String {
    let mut out = String::new();
    for (i, operation) in document.operations.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        print_operation(&mut out, operation);
    }
    out
}

/// Print a bare selection list without surrounding braces.
pub fn print_selections(selections: &[Selection]) -> String {
    let mut out = String::new();
    for (i, selection) in selections.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        print_selection(&mut out, selection);
    }
    out
}

fn print_operation(out: &mut String, operation: &Operation) {
    out.push_str(operation.kind.keyword());
    if let Some(name) = &operation.name {
        out.push(' ');
        out.push_str(name);
    }
    if !operation.variables.is_empty() {
        out.push('(');
        for (i, var) in operation.variables.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "${}: ", var.name);
            print_type_ref(out, &var.ty);
            if let Some(default) = &var.default {
                out.push_str(" = ");
                print_value(out, default);
            }
        }
        out.push(')');
    }
    print_directives(out, &operation.directives);
    out.push(' ');
    print_selection_set(out, &operation.selection_set);
}

fn print_type_ref(out: &mut String, ty: &TypeRef) {
    match ty {
        TypeRef::Named(name) => out.push_str(name),
        TypeRef::List(inner) => {
            out.push('[');
            print_type_ref(out, inner);
            out.push(']');
        }
        TypeRef::NonNull(inner) => {
            print_type_ref(out, inner);
            out.push('!');
        }
    }
}

fn print_selection_set(out: &mut String, selections: &[Selection]) {
    if selections.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{ ");
    out.push_str(&print_selections(selections));
    out.push_str(" }");
}

fn print_selection(out: &mut String, selection: &Selection) {
    match selection {
        Selection::Field(field) => print_field(out, field),
        Selection::FragmentSpread { name, directives } => {
            let _ = write!(out, "...{name}");
            print_directives(out, directives);
        }
        Selection::InlineFragment {
            type_condition,
            directives,
            selection_set,
        } => {
            out.push_str("...");
            if let Some(ty) = type_condition {
                let _ = write!(out, " on {ty}");
            }
            print_directives(out, directives);
            out.push(' ');
            print_selection_set(out, selection_set);
        }
    }
}

fn print_field(out: &mut String, field: &Field) {
    if let Some(alias) = &field.alias {
        let _ = write!(out, "{alias}: ");
    }
    out.push_str(&field.name);
    print_arguments(out, &field.arguments);
    print_directives(out, &field.directives);
    if !field.selection_set.is_empty() {
        out.push(' ');
        print_selection_set(out, &field.selection_set);
    }
}

fn print_arguments(out: &mut String, arguments: &[Argument]) {
    if arguments.is_empty() {
        return;
    }
    out.push('(');
    for (i, arg) in arguments.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}: ", arg.name);
        print_value(out, &arg.value);
    }
    out.push(')');
}

fn print_directives(out: &mut String, directives: &[Directive]) {
    for directive in directives {
        let _ = write!(out, " @{}", directive.name);
        print_arguments(out, &directive.arguments);
    }
}

/// Print a single argument value.
pub fn print_value(out: &mut String, value: &Value) {
    match value {
        Value::Variable(name) => {
            let _ = write!(out, "${name}");
        }
        Value::Int(text) | Value::Float(text) | Value::Enum(text) => out.push_str(text),
        Value::String(s) => {
            let _ = write!(out, "{}", serde_json::Value::String(s.clone()));
        }
        Value::Boolean(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Null => out.push_str("null"),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_value(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            out.push('{');
            for (i, (name, item)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{name}: ");
                print_value(out, item);
            }
            out.push('}');
        }
    }
}
