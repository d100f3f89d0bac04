// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Evaluation of a parsed CUE file into a value
//!
//! A file is evaluated together with the document it is unified with. Every
//! struct and list literal knows the document values at the positions it is
//! instantiated at, so references inside the policy see the document's
//! values, the way CUE re-evaluates references after unification.

use super::{
    ast::{Decl, Expr, LabelKind, Presence},
    value::{
        fmt_label, label_matches, unify, unify_structs, Bound, Constraint, Disjunct, KindSet,
        List, Struct, Value,
    },
    CompileError,
};
use std::collections::HashMap;

const MAX_REFERENCE_DEPTH: usize = 128;

/// The declarations of one struct literal and its enclosing scopes
struct Scope<'s, 'd> {
    decls: &'s [Decl],
    parent: Option<&'s Scope<'s, 'd>>,
    /// Document values the struct literal is instantiated at
    docs: Vec<&'d Value>,
    id: usize,
}

/// Evaluate the declarations of a file, instantiated at `document`
pub(crate) fn evaluate_file(
    decls: &[Decl],
    document: Option<&Value>,
) -> Result<Value, CompileError> {
    Evaluator::default().eval_struct(decls, None, positions(document))
}

/// Identity of a document value, stable for one evaluation
fn addr(value: &Value) -> usize {
    value as *const Value as usize
}

/// Document values that can be looked into, without duplicates
fn positions<'d>(values: impl IntoIterator<Item = &'d Value>) -> Vec<&'d Value> {
    let mut out: Vec<&'d Value> = Vec::new();
    for value in values {
        if matches!(value, Value::Struct(_) | Value::List(_))
            && !out.iter().any(|seen| std::ptr::eq(*seen, value))
        {
            out.push(value);
        }
    }
    out
}

fn field_docs<'d>(docs: &[&'d Value], label: &str, kind: LabelKind) -> Vec<&'d Value> {
    docs.iter()
        .filter_map(|&doc| match doc {
            Value::Struct(s) => s.field(label, kind).map(|f| &f.value),
            _ => None,
        })
        .collect()
}

fn elem_docs<'d>(docs: &[&'d Value], index: usize) -> Vec<&'d Value> {
    positions(docs.iter().filter_map(|&doc| match doc {
        Value::List(l) => l.elems.get(index),
        _ => None,
    }))
}

type ScopeKey = (Option<usize>, usize, Vec<usize>);
type ResolveKey = (usize, String, Vec<usize>);

#[derive(Default)]
struct Evaluator {
    depth: usize,
    scopes: HashMap<ScopeKey, usize>,
    /// Resolved references of this evaluation
    resolved: HashMap<ResolveKey, Value>,
}

impl Evaluator {
    fn scope<'s, 'd>(
        &mut self,
        decls: &'s [Decl],
        parent: Option<&'s Scope<'s, 'd>>,
        docs: Vec<&'d Value>,
    ) -> Scope<'s, 'd> {
        let key = (
            parent.map(|p| p.id),
            decls.as_ptr() as usize,
            docs.iter().map(|d| addr(d)).collect(),
        );
        let next = self.scopes.len();
        let id = *self.scopes.entry(key).or_insert(next);
        Scope {
            decls,
            parent,
            docs,
            id,
        }
    }

    fn eval_struct<'s, 'd>(
        &mut self,
        decls: &'s [Decl],
        parent: Option<&'s Scope<'s, 'd>>,
        docs: Vec<&'d Value>,
    ) -> Result<Value, CompileError> {
        let scope = self.scope(decls, parent, docs);
        let mut result = Struct::default();
        let mut instances = Vec::new();
        let mut embeds = Vec::new();

        for decl in decls {
            match decl {
                Decl::Field {
                    label,
                    kind,
                    presence,
                    value,
                } => {
                    let docs = positions(field_docs(&scope.docs, label, *kind));
                    let mut value = self.eval(value, &scope, &docs)?;
                    if *kind == LabelKind::Definition {
                        value = value.close_deep();
                    }
                    result.add_field(label, *kind, *presence, value);
                }
                Decl::Pattern { label, value } => {
                    let label = self.eval(label, &scope, &[])?;
                    // instantiated at each matching document field
                    for &doc in &scope.docs {
                        let Value::Struct(s) = doc else {
                            continue;
                        };
                        for (name, field) in &s.fields {
                            if label_matches(&label, name) {
                                let docs = positions([&field.value]);
                                instances.push((name, self.eval(value, &scope, &docs)?));
                            }
                        }
                    }
                    let value = self.eval(value, &scope, &[])?;
                    result.patterns.push((label, value));
                }
                Decl::Let { .. } => {}
                Decl::Embed(expr) => embeds.push(expr),
                Decl::Ellipsis => result.open = true,
            }
        }
        for (name, value) in instances {
            result.add_field(name, LabelKind::Regular, Presence::Optional, value);
        }
        result.apply_patterns();

        let mut result = Value::Struct(result);
        for expr in embeds {
            let embedded = self.eval(expr, &scope, &scope.docs)?;
            result = embed(result, embedded);
        }
        Ok(result)
    }

    fn eval<'d>(
        &mut self,
        expr: &Expr,
        scope: &Scope<'_, 'd>,
        docs: &[&'d Value],
    ) -> Result<Value, CompileError> {
        Ok(match expr {
            Expr::Top => Value::Top,
            Expr::Bottom => Value::Bottom("explicit error (_|_ literal) in source".into()),
            Expr::Null => Value::Null,
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Int(i) => Value::Int(*i),
            Expr::Float(f) => Value::Float(*f),
            Expr::String(s) => Value::String(s.clone()),
            Expr::Bytes(b) => Value::Bytes(b.clone()),
            Expr::Ident(name) => self.resolve(name, scope, docs)?,
            Expr::Select(base, label, kind) => {
                let base = self.eval(base, scope, &[])?;
                select(base, label, *kind)?
            }
            Expr::Call(name, args) => self.call(name, args, scope, docs)?,
            Expr::Struct(decls) => self.eval_struct(decls, Some(scope), docs.to_vec())?,
            Expr::List(elems, tail) => {
                let mut values = Vec::with_capacity(elems.len());
                for (i, elem) in elems.iter().enumerate() {
                    values.push(self.eval(elem, scope, &elem_docs(docs, i))?);
                }
                let tail = match tail {
                    Some(tail) => {
                        // the tail is instantiated at every further document element
                        let len = docs
                            .iter()
                            .filter_map(|&doc| match doc {
                                Value::List(l) => Some(l.elems.len()),
                                _ => None,
                            })
                            .max()
                            .unwrap_or(0);
                        for i in elems.len()..len {
                            values.push(self.eval(tail, scope, &elem_docs(docs, i))?);
                        }
                        Some(Box::new(self.eval(tail, scope, &[])?))
                    }
                    None => None,
                };
                Value::List(List {
                    elems: values,
                    tail,
                })
            }
            Expr::Bound(op, operand) => {
                let operand = self.eval(operand, scope, &[])?;
                let bound = Bound::new(*op, operand).map_err(CompileError::new)?;
                Value::Constraint(Constraint::bound(bound))
            }
            Expr::Neg(operand) => match self.eval(operand, scope, &[])? {
                Value::Int(i) => Value::Int(
                    i.checked_neg()
                        .ok_or_else(|| CompileError::new("integer overflow in negation"))?,
                ),
                Value::Float(f) => Value::Float(-f),
                other => {
                    return Err(CompileError::new(format!(
                        "invalid operand {other} for unary operator -"
                    )))
                }
            },
            // a default marker outside of a disjunction has no effect
            Expr::Default(inner) => self.eval(inner, scope, docs)?,
            Expr::And(parts) => {
                let mut value = Value::Top;
                for part in parts {
                    value = unify(&value, &self.eval(part, scope, docs)?);
                }
                value
            }
            Expr::Or(alts) => {
                let mut disjuncts = Vec::with_capacity(alts.len());
                for alt in alts {
                    let (expr, default) = match alt {
                        Expr::Default(inner) => (inner.as_ref(), true),
                        other => (other, false),
                    };
                    disjuncts.push(Disjunct {
                        value: self.eval(expr, scope, docs)?,
                        default,
                    });
                }
                Value::disjunction(disjuncts)
            }
        })
    }

    fn call<'d>(
        &mut self,
        name: &str,
        args: &[Expr],
        scope: &Scope<'_, 'd>,
        docs: &[&'d Value],
    ) -> Result<Value, CompileError> {
        match (name, args) {
            ("close", [arg]) => match self.eval(arg, scope, docs)? {
                Value::Struct(mut s) => {
                    s.closed = true;
                    Ok(Value::Struct(s))
                }
                other => Err(CompileError::new(format!(
                    "close: argument must be a struct, found {other}"
                ))),
            },
            ("close", _) => Err(CompileError::new("close: expected 1 argument")),
            _ => Err(CompileError::new(format!("unsupported builtin {name:?}"))),
        }
    }

    /// Resolve `name` as seen from `scope`, referenced at the document values `docs`
    fn resolve<'d>(
        &mut self,
        name: &str,
        scope: &Scope<'_, 'd>,
        docs: &[&'d Value],
    ) -> Result<Value, CompileError> {
        let key = (
            scope.id,
            name.to_string(),
            docs.iter().map(|d| addr(d)).collect::<Vec<_>>(),
        );
        if let Some(value) = self.resolved.get(&key) {
            return Ok(value.clone());
        }
        if self.depth >= MAX_REFERENCE_DEPTH {
            return Err(CompileError::new(format!(
                "structural cycle or reference chain too deep at {name:?}"
            )));
        }
        self.depth += 1;
        let result = self.resolve_in(name, scope, docs);
        self.depth -= 1;
        let value = result?;
        self.resolved.insert(key, value.clone());
        Ok(value)
    }

    fn resolve_in<'d>(
        &mut self,
        name: &str,
        scope: &Scope<'_, 'd>,
        docs: &[&'d Value],
    ) -> Result<Value, CompileError> {
        let kind = LabelKind::of_ident(name);
        let mut current = Some(scope);
        while let Some(s) = current {
            let mut found: Option<Value> = None;
            for decl in s.decls {
                match decl {
                    Decl::Let { name: n, value } if n == name => return self.eval(value, s, &[]),
                    Decl::Field {
                        label,
                        kind: field_kind,
                        value,
                        ..
                    } if label == name && *field_kind == kind => {
                        // the field's own document values, and the struct
                        // literals it holds instantiated where it is referenced
                        let own = field_docs(&s.docs, label, kind);
                        let at = positions(own.iter().copied().chain(docs.iter().copied()));
                        let mut value = self.eval(value, s, &at)?;
                        for doc in own {
                            value = unify(&value, doc);
                        }
                        found = Some(match found {
                            Some(previous) => unify(&previous, &value),
                            None => value,
                        });
                    }
                    _ => {}
                }
            }
            if let Some(value) = found {
                return Ok(if kind == LabelKind::Definition {
                    value.close_deep()
                } else {
                    value
                });
            }
            current = s.parent;
        }

        KindSet::from_name(name)
            .map(|kinds| Value::Constraint(Constraint::kind(kinds)))
            .ok_or_else(|| CompileError::new(format!("reference {name:?} not found")))
    }
}

fn select(base: Value, label: &str, kind: LabelKind) -> Result<Value, CompileError> {
    match base {
        Value::Struct(mut s) => match s.remove(label, kind) {
            Some(field) => Ok(field.value),
            None => Err(CompileError::new(format!(
                "undefined field: {}",
                fmt_label(label)
            ))),
        },
        Value::Bottom(msg) => Ok(Value::Bottom(msg)),
        other => Err(CompileError::new(format!(
            "invalid selector {} on {other}",
            fmt_label(label)
        ))),
    }
}

/// Embed a value into the struct it is declared in
fn embed(acc: Value, embedded: Value) -> Value {
    match (acc, embedded) {
        (Value::Struct(a), Value::Struct(b)) => unify_structs(&a, &b, false),
        (Value::Struct(a), other) if a.is_empty() => other,
        (acc, other) => unify(&acc, &other),
    }
}

#[cfg(test)]
mod tests {
    use super::{super::parser::parse_file, *};
    use crate::policy::cue::ast::Presence;

    fn eval(src: &str) -> Result<Value, CompileError> {
        evaluate_file(&parse_file(src)?, None)
    }

    /// Evaluate `src` instantiated at `document` and unify both
    fn eval_with(src: &str, document: &str) -> Result<Value, CompileError> {
        let document = Value::from_json(&serde_json::from_str(document).unwrap());
        let policy = evaluate_file(&parse_file(src)?, Some(&document))?;
        Ok(unify(&policy, &document))
    }

    fn field<'v>(value: &'v Value, label: &str) -> &'v Value {
        let Value::Struct(s) = value else {
            panic!("expected struct, got {value}");
        };
        &s.fields[label].value
    }

    #[test]
    fn test_references() {
        let value = eval("a: b\nb: 1\nc: {d: a, e: x}\nlet x = 2").unwrap();
        assert_eq!(field(&value, "a"), &Value::Int(1));
        assert_eq!(field(field(&value, "c"), "d"), &Value::Int(1));
        assert_eq!(field(field(&value, "c"), "e"), &Value::Int(2));
    }

    #[test]
    fn test_shadowed_kind() {
        let value = eval("int: 5\na: int").unwrap();
        assert_eq!(field(&value, "a"), &Value::Int(5));
    }

    #[test]
    fn test_duplicate_fields_unify() {
        let value = eval("a: int\na: >3\na: 4").unwrap();
        assert_eq!(field(&value, "a"), &Value::Int(4));

        let value = eval("a: 1\na: 2").unwrap();
        assert!(field(&value, "a").is_bottom());
    }

    #[test]
    fn test_definitions_are_closed() {
        let value = eval("#A: {a: int, b: {c: string}}\nx: #A & {a: 1, z: 2}").unwrap();
        let x = field(&value, "x");
        assert_eq!(field(x, "a"), &Value::Int(1));
        assert!(field(x, "z").is_bottom());

        let value = eval("#A: {a: int, ...}\nx: #A & {a: 1, z: 2}").unwrap();
        assert_eq!(field(field(&value, "x"), "z"), &Value::Int(2));

        let value = eval("x: close({a: int}) & {b: 1}").unwrap();
        assert!(field(field(&value, "x"), "b").is_bottom());
    }

    #[test]
    fn test_selectors() {
        let value = eval("#Cfg: {port: 8080}\np: #Cfg.port\nq: {r: 1}.r").unwrap();
        assert_eq!(field(&value, "p"), &Value::Int(8080));
        assert_eq!(field(&value, "q"), &Value::Int(1));
        assert!(eval("a: {b: 1}\nc: a.d").is_err());
    }

    #[test]
    fn test_patterns() {
        let value = eval("labels: {[string]: string, app: \"x\"}").unwrap();
        let Value::Struct(labels) = field(&value, "labels") else {
            panic!("expected struct");
        };
        assert_eq!(labels.patterns.len(), 1);
        assert_eq!(labels.fields["app"].value, Value::String("x".into()));
        assert!(eval("labels: {[string]: string, app: 1}")
            .map(|v| field(field(&v, "labels"), "app").is_bottom())
            .unwrap());
    }

    #[test]
    fn test_embedded_scalar() {
        assert_eq!(eval(">=1 & <=5").unwrap().to_string(), ">=1 & <=5");
        assert_eq!(eval("{int}").unwrap(), Value::Constraint(Constraint::kind(KindSet::INT)));
        let value = eval("#Base: {a: int}\n#Base\nb: 2").unwrap();
        let Value::Struct(s) = &value else {
            panic!("expected struct");
        };
        assert!(s.closed);
        assert_eq!(s.fields["b"].presence, Presence::Regular);
    }

    #[test]
    fn test_negation_and_defaults() {
        let value = eval("a: -5\nb: -1.5\nc: *\"x\" | \"y\"\nd: *1").unwrap();
        assert_eq!(field(&value, "a"), &Value::Int(-5));
        assert_eq!(field(&value, "b"), &Value::Float(-1.5));
        assert_eq!(field(&value, "c").to_string(), r#"*"x" | "y""#);
        assert_eq!(field(&value, "d"), &Value::Int(1));
        assert!(eval("a: -\"x\"").is_err());
    }

    #[test]
    fn test_references_see_document_values() {
        let value = eval_with("a: int\nb: a", r#"{"a": 5, "b": 6}"#).unwrap();
        assert_eq!(field(&value, "a"), &Value::Int(5));
        assert_eq!(
            field(&value, "b"),
            &Value::Bottom("conflicting values 5 and 6".into())
        );

        let value = eval_with("a: int\nb: a", r#"{"a": 5, "b": 5}"#).unwrap();
        assert_eq!(field(&value, "b"), &Value::Int(5));

        // bounds built from references use the document's value
        let value = eval_with("max: int\nv: <max", r#"{"max": 3, "v": 4}"#).unwrap();
        assert!(field(&value, "v").is_bottom());
        let value = eval_with("max: int\nv: <max", r#"{"max": 3, "v": 2}"#).unwrap();
        assert_eq!(field(&value, "v"), &Value::Int(2));
    }

    #[test]
    fn test_referenced_structs_rebind_at_use() {
        let policy = "#Pair: {x: int, y: x}\np: #Pair";
        let value = eval_with(policy, r#"{"p": {"x": 1, "y": 2}}"#).unwrap();
        assert!(field(field(&value, "p"), "y").is_bottom());
        let value = eval_with(policy, r#"{"p": {"x": 1, "y": 1}}"#).unwrap();
        assert_eq!(field(field(&value, "p"), "y"), &Value::Int(1));

        let value = eval_with("a: {x: int, y: x}\nb: a", r#"{"a": {}, "b": {"x": 5, "y": 6}}"#)
            .unwrap();
        assert!(field(field(&value, "b"), "y").is_bottom());
    }

    #[test]
    fn test_patterns_and_list_tails_rebind_per_element() {
        let policy = "m: {[string]: {x: int, y: x}}\nl: [...{x: int, y: x}]";
        let value = eval_with(
            policy,
            r#"{"m": {"a": {"x": 1, "y": 1}, "b": {"x": 2, "y": 3}},
                "l": [{"x": 1, "y": 1}, {"x": 2, "y": 3}]}"#,
        )
        .unwrap();
        let m = field(&value, "m");
        assert_eq!(field(field(m, "a"), "y"), &Value::Int(1));
        assert!(field(field(m, "b"), "y").is_bottom());
        let Value::List(l) = field(&value, "l") else {
            panic!("expected list");
        };
        assert_eq!(field(&l.elems[0], "y"), &Value::Int(1));
        assert!(field(&l.elems[1], "y").is_bottom());
    }

    #[test]
    fn test_reference_chain_is_evaluated_once_per_link() {
        let mut policy = String::from("a0: int\n");
        let mut document = String::from("{\"a0\": 1");
        for i in 1..=40 {
            policy.push_str(&format!("a{i}: a{} & a{}\n", i - 1, i - 1));
            document.push_str(&format!(", \"a{i}\": 1"));
        }
        document.push('}');

        let start = std::time::Instant::now();
        let value = eval(&policy).unwrap();
        assert_eq!(field(&value, "a40"), &Value::Constraint(Constraint::kind(KindSet::INT)));
        let value = eval_with(&policy, &document).unwrap();
        assert_eq!(field(&value, "a40"), &Value::Int(1));
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_hidden_fields_do_not_see_document_labels() {
        let value = eval_with(
            "_type: \"internal\"\nkind: _type",
            r#"{"_type": "https://in-toto.io/Statement/v1", "kind": "internal"}"#,
        )
        .unwrap();
        assert_eq!(field(&value, "kind"), &Value::String("internal".into()));
        assert_eq!(
            field(&value, "_type"),
            &Value::String("https://in-toto.io/Statement/v1".into())
        );
    }

    #[test]
    fn test_errors() {
        let err = eval("a: missing").unwrap_err();
        assert_eq!(err.to_string(), "reference \"missing\" not found");
        // reference cycles are not evaluated to top
        let err = eval("a: b\nb: a").unwrap_err().to_string();
        assert!(err.starts_with("structural cycle or reference chain too deep"), "{err}");
        assert!(eval("a: =~\"(\"").is_err());
        assert!(eval("a: <int").is_err());
        assert!(eval("a: len([1])").is_err());
        assert!(eval("a: close(1)").is_err());
    }
}
