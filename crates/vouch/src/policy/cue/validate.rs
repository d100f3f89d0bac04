// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

use super::{
    ast::{LabelKind, Presence},
    value::{fmt_label, Value},
};

/// Collect every error of a unified value as `path: message`.
///
/// With `concrete`, regular fields must also resolve to concrete values and
/// required fields must be present.
pub(crate) fn validate(value: &Value, concrete: bool) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    walk(&mut errors, &mut Vec::new(), value, concrete);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn at(path: &[String], msg: impl std::fmt::Display) -> String {
    if path.is_empty() {
        msg.to_string()
    } else {
        format!("{}: {msg}", path.join("."))
    }
}

fn walk(errors: &mut Vec<String>, path: &mut Vec<String>, value: &Value, concrete: bool) {
    match value {
        Value::Bottom(msg) => errors.push(at(path, msg)),
        Value::Struct(s) => {
            for (label, field) in s.all_fields() {
                path.push(fmt_label(label));
                match (field.kind, field.presence) {
                    (_, Presence::Optional) => {}
                    (LabelKind::Regular, Presence::Required) => {
                        if concrete {
                            errors.push(at(path, "field is required but not present"));
                        } else {
                            walk(errors, path, &field.value, false);
                        }
                    }
                    (LabelKind::Regular, Presence::Regular) => {
                        walk(errors, path, &field.value, concrete)
                    }
                    // definitions and hidden fields only need to be consistent
                    _ => walk(errors, path, &field.value, false),
                }
                path.pop();
            }
        }
        Value::List(list) => {
            for (i, elem) in list.elems.iter().enumerate() {
                path.push(i.to_string());
                walk(errors, path, elem, concrete);
                path.pop();
            }
        }
        Value::Disjunction(_) if concrete => match value.default_value() {
            Some(default) => walk(errors, path, default, concrete),
            None => errors.push(at(path, format!("incomplete value {value}"))),
        },
        Value::Constraint(_) | Value::Top if concrete => {
            errors.push(at(path, format!("incomplete value {value}")))
        }
        _ => {}
    }
}
