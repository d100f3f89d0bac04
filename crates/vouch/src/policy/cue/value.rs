// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! CUE values and unification

use super::ast::{BoundOp, LabelKind, Presence};
use regex::Regex;
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

const MAX_DISJUNCTS: usize = 1024;

/// A set of value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KindSet(u8);

impl KindSet {
    pub const NONE: KindSet = KindSet(0);
    pub const NULL: KindSet = KindSet(1);
    pub const BOOL: KindSet = KindSet(1 << 1);
    pub const INT: KindSet = KindSet(1 << 2);
    pub const FLOAT: KindSet = KindSet(1 << 3);
    pub const STRING: KindSet = KindSet(1 << 4);
    pub const BYTES: KindSet = KindSet(1 << 5);
    pub const STRUCT: KindSet = KindSet(1 << 6);
    pub const LIST: KindSet = KindSet(1 << 7);
    pub const NUMBER: KindSet = KindSet(Self::INT.0 | Self::FLOAT.0);
    pub const ALL: KindSet = KindSet(u8::MAX);

    pub fn union(self, other: KindSet) -> KindSet {
        KindSet(self.0 | other.0)
    }

    pub fn intersect(self, other: KindSet) -> KindSet {
        KindSet(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The predeclared identifier naming a kind
    pub fn from_name(name: &str) -> Option<KindSet> {
        Some(match name {
            "bool" => Self::BOOL,
            "int" => Self::INT,
            "float" => Self::FLOAT,
            "number" => Self::NUMBER,
            "string" => Self::STRING,
            "bytes" => Self::BYTES,
            _ => return None,
        })
    }
}

impl Display for KindSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if *self == Self::ALL {
            return f.write_str("_");
        }
        if self.is_empty() {
            return f.write_str("_|_");
        }
        let mut rest = *self;
        let mut names = Vec::new();
        for (kind, name) in [
            (Self::NULL, "null"),
            (Self::BOOL, "bool"),
            (Self::NUMBER, "number"),
            (Self::INT, "int"),
            (Self::FLOAT, "float"),
            (Self::STRING, "string"),
            (Self::BYTES, "bytes"),
            (Self::STRUCT, "struct"),
            (Self::LIST, "list"),
        ] {
            if rest.intersect(kind) == kind {
                names.push(name);
                rest = KindSet(rest.0 & !kind.0);
            }
        }
        f.write_str(&names.join("|"))
    }
}

/// A unary comparison constraint like `>=1` or `=~"^v"`
#[derive(Debug, Clone)]
pub(crate) struct Bound {
    op: BoundOp,
    operand: Box<Value>,
    regex: Option<Regex>,
}

impl PartialEq for Bound {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.operand == other.operand
    }
}

impl Bound {
    pub fn new(op: BoundOp, operand: Value) -> Result<Self, String> {
        let valid = match op {
            BoundOp::Ne => operand.is_scalar(),
            BoundOp::Match | BoundOp::NotMatch => matches!(operand, Value::String(_)),
            BoundOp::Lt | BoundOp::Le | BoundOp::Gt | BoundOp::Ge => matches!(
                operand,
                Value::Int(_) | Value::Float(_) | Value::String(_) | Value::Bytes(_)
            ),
        };
        if !valid {
            return Err(format!(
                "invalid operand {operand} for unary operator {}",
                op.as_str()
            ));
        }
        let regex = match (&op, &operand) {
            (BoundOp::Match | BoundOp::NotMatch, Value::String(pattern)) => Some(
                Regex::new(pattern).map_err(|e| format!("invalid regular expression: {e}"))?,
            ),
            _ => None,
        };
        Ok(Self {
            op,
            operand: Box::new(operand),
            regex,
        })
    }

    /// Kinds of values the bound can hold for
    fn kinds(&self) -> KindSet {
        match self.op {
            BoundOp::Ne => KindSet::ALL,
            BoundOp::Match | BoundOp::NotMatch => KindSet::STRING,
            _ => match *self.operand {
                Value::Int(_) | Value::Float(_) => KindSet::NUMBER,
                Value::String(_) => KindSet::STRING,
                _ => KindSet::BYTES,
            },
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        let out_of_bound = || format!("invalid value {value} (out of bound {self})");
        let ok = match self.op {
            BoundOp::Ne => !scalar_equal(value, &self.operand),
            BoundOp::Match | BoundOp::NotMatch => {
                let (Value::String(s), Some(regex)) = (value, &self.regex) else {
                    return Err(mismatched(value, self));
                };
                regex.is_match(s) == (self.op == BoundOp::Match)
            }
            _ => {
                let Some(ordering) = compare(value, &self.operand) else {
                    return Err(mismatched(value, self));
                };
                match self.op {
                    BoundOp::Lt => ordering == Ordering::Less,
                    BoundOp::Le => ordering != Ordering::Greater,
                    BoundOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
        };
        if ok {
            Ok(())
        } else {
            Err(out_of_bound())
        }
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.operand)
    }
}

fn mismatched(value: &Value, bound: &Bound) -> String {
    format!(
        "invalid value {value} (mismatched types {} and {})",
        value.kind(),
        bound.kinds()
    )
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn scalar_equal(a: &Value, b: &Value) -> bool {
    match compare(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// A non-concrete scalar constraint: a kind restricted by bounds
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Constraint {
    kinds: KindSet,
    bounds: Vec<Bound>,
}

impl Constraint {
    pub fn kind(kinds: KindSet) -> Self {
        Self {
            kinds,
            bounds: Vec::new(),
        }
    }

    pub fn bound(bound: Bound) -> Self {
        Self {
            kinds: bound.kinds(),
            bounds: vec![bound],
        }
    }

    fn merge(&self, other: &Constraint) -> Value {
        let kinds = self.kinds.intersect(other.kinds);
        if kinds.is_empty() {
            return Value::Bottom(format!(
                "conflicting values {self} and {other} (mismatched types {} and {})",
                self.kinds, other.kinds
            ));
        }
        let mut bounds = self.bounds.clone();
        for bound in &other.bounds {
            if !bounds.contains(bound) {
                bounds.push(bound.clone());
            }
        }
        Value::Constraint(Constraint { kinds, bounds })
    }

    fn apply(&self, value: &Value) -> Value {
        if self.kinds.intersect(value.kind()).is_empty() {
            return Value::Bottom(format!(
                "conflicting values {self} and {value} (mismatched types {} and {})",
                self.kinds,
                value.kind()
            ));
        }
        for bound in &self.bounds {
            if let Err(msg) = bound.check(value) {
                return Value::Bottom(msg);
            }
        }
        value.clone()
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let implied = self
            .bounds
            .iter()
            .fold(KindSet::ALL, |acc, b| acc.intersect(b.kinds()));
        let mut parts = Vec::new();
        if self.bounds.is_empty() || self.kinds != implied {
            parts.push(self.kinds.to_string());
        }
        parts.extend(self.bounds.iter().map(ToString::to_string));
        f.write_str(&parts.join(" & "))
    }
}

/// A struct field
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Field {
    pub value: Value,
    pub kind: LabelKind,
    pub presence: Presence,
}

fn combine_presence(a: Presence, b: Presence) -> Presence {
    match (a, b) {
        (Presence::Regular, _) | (_, Presence::Regular) => Presence::Regular,
        (Presence::Required, _) | (_, Presence::Required) => Presence::Required,
        _ => Presence::Optional,
    }
}

/// A struct value
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Struct {
    /// Regular fields
    pub fields: BTreeMap<String, Field>,
    /// Definitions and hidden fields, apart from regular labels of the same spelling
    pub hidden: BTreeMap<String, Field>,
    pub patterns: Vec<(Value, Value)>,
    /// Only declared fields (or fields matching a pattern) are allowed
    pub closed: bool,
    /// Declared with `...`, never closed by a definition
    pub open: bool,
}

impl Struct {
    /// Add a field, unifying with an existing field of the same label
    pub fn add_field(&mut self, label: &str, kind: LabelKind, presence: Presence, value: Value) {
        let slot = match kind {
            LabelKind::Regular => &mut self.fields,
            LabelKind::Definition | LabelKind::Hidden => &mut self.hidden,
        };
        match slot.get_mut(label) {
            Some(field) => {
                field.value = unify(&field.value, &value);
                field.presence = combine_presence(field.presence, presence);
            }
            None => {
                slot.insert(
                    label.to_string(),
                    Field {
                        value,
                        kind,
                        presence,
                    },
                );
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.hidden.is_empty() && self.patterns.is_empty()
    }

    /// The field of `label` with the given kind
    pub fn field(&self, label: &str, kind: LabelKind) -> Option<&Field> {
        match kind {
            LabelKind::Regular => self.fields.get(label),
            LabelKind::Definition | LabelKind::Hidden => self.hidden.get(label),
        }
    }

    /// Remove the field of `label` with the given kind
    pub fn remove(&mut self, label: &str, kind: LabelKind) -> Option<Field> {
        match kind {
            LabelKind::Regular => self.fields.remove(label),
            LabelKind::Definition | LabelKind::Hidden => self.hidden.remove(label),
        }
    }

    /// Regular fields followed by definitions and hidden fields
    pub fn all_fields(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter().chain(self.hidden.iter())
    }

    fn matches_pattern(&self, label: &str) -> bool {
        self.patterns
            .iter()
            .any(|(pattern, _)| label_matches(pattern, label))
    }

    fn allows(&self, label: &str) -> bool {
        !self.closed || self.fields.contains_key(label) || self.matches_pattern(label)
    }

    /// Unify every regular field with the values of the patterns matching its label
    pub fn apply_patterns(&mut self) {
        if self.patterns.is_empty() {
            return;
        }
        for (label, field) in self.fields.iter_mut() {
            for (pattern, value) in &self.patterns {
                if label_matches(pattern, label) {
                    field.value = unify(&field.value, value);
                }
            }
        }
    }
}

pub(crate) fn label_matches(pattern: &Value, label: &str) -> bool {
    !unify(pattern, &Value::String(label.to_string())).is_bottom()
}

/// A list value, open if it has a tail
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct List {
    pub elems: Vec<Value>,
    pub tail: Option<Box<Value>>,
}

/// One alternative of a disjunction
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Disjunct {
    pub value: Value,
    pub default: bool,
}

/// A CUE value
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Top,
    Bottom(String),
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Constraint(Constraint),
    Struct(Struct),
    List(List),
    Disjunction(Vec<Disjunct>),
}

impl Value {
    pub fn is_bottom(&self) -> bool {
        matches!(self, Value::Bottom(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::String(_)
                | Value::Bytes(_)
        )
    }

    pub fn kind(&self) -> KindSet {
        match self {
            Value::Top => KindSet::ALL,
            Value::Bottom(_) => KindSet::NONE,
            Value::Null => KindSet::NULL,
            Value::Bool(_) => KindSet::BOOL,
            Value::Int(_) => KindSet::INT,
            Value::Float(_) => KindSet::FLOAT,
            Value::String(_) => KindSet::STRING,
            Value::Bytes(_) => KindSet::BYTES,
            Value::Constraint(c) => c.kinds,
            Value::Struct(_) => KindSet::STRUCT,
            Value::List(_) => KindSet::LIST,
            Value::Disjunction(alts) => alts
                .iter()
                .fold(KindSet::NONE, |acc, d| acc.union(d.value.kind())),
        }
    }

    /// Build a normalized disjunction: errors are dropped, duplicates merged,
    /// nested disjunctions flattened and a single alternative returned as is.
    pub fn disjunction(alts: Vec<Disjunct>) -> Value {
        fn push(out: &mut Vec<Disjunct>, d: Disjunct) {
            match out.iter_mut().find(|existing| existing.value == d.value) {
                Some(existing) => existing.default |= d.default,
                None => out.push(d),
            }
        }

        let mut out: Vec<Disjunct> = Vec::new();
        let mut first_error = None;

        for alt in alts {
            match alt.value {
                Value::Bottom(msg) => {
                    first_error.get_or_insert(msg);
                }
                Value::Disjunction(inner) => {
                    let has_default = inner.iter().any(|d| d.default);
                    for d in inner {
                        push(
                            &mut out,
                            Disjunct {
                                default: alt.default && (d.default || !has_default),
                                value: d.value,
                            },
                        );
                    }
                }
                value => push(
                    &mut out,
                    Disjunct {
                        value,
                        default: alt.default,
                    },
                ),
            }
            if out.len() > MAX_DISJUNCTS {
                return Value::Bottom("disjunction has too many alternatives".into());
            }
        }

        match out.len() {
            0 => Value::Bottom(format!(
                "empty disjunction: {}",
                first_error.unwrap_or_else(|| "no alternatives".into())
            )),
            1 => out.pop().map_or(Value::Top, |d| d.value),
            _ => {
                if out.iter().all(|d| d.default) {
                    out.iter_mut().for_each(|d| d.default = false);
                }
                Value::Disjunction(out)
            }
        }
    }

    /// The single default of a disjunction
    pub fn default_value(&self) -> Option<&Value> {
        let Value::Disjunction(alts) = self else {
            return None;
        };
        let mut defaults = alts.iter().filter(|d| d.default);
        match (defaults.next(), defaults.next()) {
            (Some(d), None) => Some(&d.value),
            _ => None,
        }
    }

    /// Close all structs reachable from this value, except ones declared with `...`
    pub fn close_deep(self) -> Value {
        match self {
            Value::Struct(mut s) => {
                s.closed = s.closed || !s.open;
                for field in s.fields.values_mut().chain(s.hidden.values_mut()) {
                    field.value = std::mem::replace(&mut field.value, Value::Top).close_deep();
                }
                s.patterns = s
                    .patterns
                    .into_iter()
                    .map(|(label, value)| (label, value.close_deep()))
                    .collect();
                Value::Struct(s)
            }
            Value::List(l) => Value::List(List {
                elems: l.elems.into_iter().map(Value::close_deep).collect(),
                tail: l.tail.map(|t| Box::new(t.close_deep())),
            }),
            Value::Disjunction(alts) => Value::Disjunction(
                alts.into_iter()
                    .map(|d| Disjunct {
                        value: d.value.close_deep(),
                        default: d.default,
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    /// Convert a JSON document into a value
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                match n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from)) {
                    Some(i) => Value::Int(i),
                    None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(List {
                elems: items.iter().map(Value::from_json).collect(),
                tail: None,
            }),
            serde_json::Value::Object(map) => {
                let mut s = Struct::default();
                for (label, value) in map {
                    s.add_field(
                        label,
                        LabelKind::Regular,
                        Presence::Regular,
                        Value::from_json(value),
                    );
                }
                Value::Struct(s)
            }
        }
    }
}

fn conflict(a: &Value, b: &Value) -> Value {
    let (ka, kb) = (a.kind(), b.kind());
    if ka == kb {
        Value::Bottom(format!("conflicting values {a} and {b}"))
    } else {
        Value::Bottom(format!(
            "conflicting values {a} and {b} (mismatched types {ka} and {kb})"
        ))
    }
}

/// Unify two values, the meet of `a` and `b`
pub(crate) fn unify(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Bottom(_), _) => a.clone(),
        (_, Value::Bottom(_)) => b.clone(),
        (Value::Top, _) => b.clone(),
        (_, Value::Top) => a.clone(),
        (Value::Disjunction(alts), other) | (other, Value::Disjunction(alts)) => {
            unify_disjunction(alts, other)
        }
        (Value::Constraint(x), Value::Constraint(y)) => x.merge(y),
        (Value::Constraint(c), value) | (value, Value::Constraint(c)) => c.apply(value),
        (Value::Struct(x), Value::Struct(y)) => unify_structs(x, y, true),
        (Value::List(x), Value::List(y)) => unify_lists(x, y),
        (x, y) if x.is_scalar() && y.is_scalar() && x == y => x.clone(),
        (x, y) => conflict(x, y),
    }
}

fn unify_disjunction(alts: &[Disjunct], other: &Value) -> Value {
    let others = match other {
        Value::Disjunction(others) => others.clone(),
        value => vec![Disjunct {
            value: value.clone(),
            default: true,
        }],
    };
    let alts_default = alts.iter().any(|d| d.default);
    let others_default = others.iter().any(|d| d.default);

    let mut out = Vec::with_capacity(alts.len() * others.len());
    for x in alts {
        for y in &others {
            out.push(Disjunct {
                value: unify(&x.value, &y.value),
                default: (x.default || !alts_default) && (y.default || !others_default),
            });
        }
    }
    Value::disjunction(out)
}

/// Merge two structs. With `check_closed`, fields of one side must be allowed
/// by a closed other side; embedding skips the check.
pub(crate) fn unify_structs(a: &Struct, b: &Struct, check_closed: bool) -> Value {
    let mut merged = Struct {
        fields: a.fields.clone(),
        hidden: a.hidden.clone(),
        patterns: a.patterns.clone(),
        closed: a.closed || b.closed,
        open: a.open && b.open,
    };
    for (label, field) in b.all_fields() {
        merged.add_field(label, field.kind, field.presence, field.value.clone());
    }
    for pattern in &b.patterns {
        if !merged.patterns.contains(pattern) {
            merged.patterns.push(pattern.clone());
        }
    }

    if check_closed {
        for (label, field) in merged.fields.iter_mut() {
            if !a.allows(label) || !b.allows(label) {
                field.value = Value::Bottom("field not allowed".into());
            }
        }
    }

    merged.apply_patterns();
    Value::Struct(merged)
}

fn unify_lists(a: &List, b: &List) -> Value {
    let len = a.elems.len().max(b.elems.len());
    let mut elems = Vec::with_capacity(len);
    for i in 0..len {
        let x = a.elems.get(i).or(a.tail.as_deref());
        let y = b.elems.get(i).or(b.tail.as_deref());
        match (x, y) {
            (Some(x), Some(y)) => elems.push(unify(x, y)),
            _ => {
                return Value::Bottom(format!(
                    "incompatible list lengths ({} and {})",
                    list_len(a),
                    list_len(b)
                ))
            }
        }
    }
    let tail = match (&a.tail, &b.tail) {
        (Some(x), Some(y)) => Some(Box::new(unify(x, y))),
        _ => None,
    };
    Value::List(List { elems, tail })
}

fn list_len(list: &List) -> String {
    match list.tail {
        Some(_) => format!(">={}", list.elems.len()),
        None => list.elems.len().to_string(),
    }
}

/// Format a label, quoting it unless it is a valid identifier
pub(crate) fn fmt_label(label: &str) -> String {
    let mut chars = label.chars();
    let ident = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '#' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if ident {
        label.to_string()
    } else {
        format!("{label:?}")
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Top => f.write_str("_"),
            Value::Bottom(_) => f.write_str("_|_"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "'{}'", b.escape_ascii()),
            Value::Constraint(c) => write!(f, "{c}"),
            Value::Struct(s) => {
                f.write_str("{")?;
                let mut first = true;
                for (label, field) in s.all_fields() {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    let marker = match field.presence {
                        Presence::Regular => "",
                        Presence::Optional => "?",
                        Presence::Required => "!",
                    };
                    write!(f, "{}{marker}: {}", fmt_label(label), field.value)?;
                }
                f.write_str("}")
            }
            Value::List(l) => {
                f.write_str("[")?;
                let mut parts: Vec<String> = l.elems.iter().map(ToString::to_string).collect();
                if let Some(tail) = &l.tail {
                    parts.push(match **tail {
                        Value::Top => "...".to_string(),
                        ref t => format!("...{t}"),
                    });
                }
                f.write_str(&parts.join(", "))?;
                f.write_str("]")
            }
            Value::Disjunction(alts) => {
                let parts: Vec<String> = alts
                    .iter()
                    .map(|d| {
                        if d.default {
                            format!("*{}", d.value)
                        } else {
                            d.value.to_string()
                        }
                    })
                    .collect();
                f.write_str(&parts.join(" | "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(k: KindSet) -> Value {
        Value::Constraint(Constraint::kind(k))
    }

    fn bound(op: BoundOp, operand: Value) -> Value {
        Value::Constraint(Constraint::bound(Bound::new(op, operand).unwrap()))
    }

    fn object(json: &str) -> Value {
        Value::from_json(&serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_kinds() {
        assert_eq!(unify(&kind(KindSet::INT), &Value::Int(5)), Value::Int(5));
        assert_eq!(
            unify(&kind(KindSet::NUMBER), &Value::Float(1.5)),
            Value::Float(1.5)
        );
        assert!(unify(&kind(KindSet::INT), &Value::Float(5.0)).is_bottom());
        assert_eq!(
            unify(&kind(KindSet::NUMBER), &kind(KindSet::INT)),
            kind(KindSet::INT)
        );
        let Value::Bottom(msg) = unify(&kind(KindSet::INT), &Value::String("five".into())) else {
            panic!("expected conflict");
        };
        assert_eq!(
            msg,
            r#"conflicting values int and "five" (mismatched types int and string)"#
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(unify(&Value::Int(1), &Value::Int(1)), Value::Int(1));
        assert!(unify(&Value::Int(1), &Value::Int(2)).is_bottom());
        assert!(unify(&Value::Int(1), &Value::Float(1.0)).is_bottom());
        assert_eq!(unify(&Value::Top, &Value::Null), Value::Null);
        assert!(unify(&Value::Bottom("x".into()), &Value::Top).is_bottom());
    }

    #[test]
    fn test_bounds() {
        let ge = bound(BoundOp::Ge, Value::Int(1));
        let lt = bound(BoundOp::Lt, Value::Float(10.5));
        let range = unify(&ge, &lt);
        assert_eq!(range.to_string(), ">=1 & <10.5");
        assert_eq!(unify(&range, &Value::Int(10)), Value::Int(10));
        assert_eq!(unify(&range, &Value::Float(1.0)), Value::Float(1.0));
        let Value::Bottom(msg) = unify(&range, &Value::Int(11)) else {
            panic!("expected bound error");
        };
        assert_eq!(msg, "invalid value 11 (out of bound <10.5)");
        assert!(unify(&range, &Value::String("1".into())).is_bottom());

        let re = bound(BoundOp::Match, Value::String("^v[0-9]+$".into()));
        assert_eq!(
            unify(&re, &Value::String("v12".into())),
            Value::String("v12".into())
        );
        assert!(unify(&re, &Value::String("x12".into())).is_bottom());

        let ne = bound(BoundOp::Ne, Value::Null);
        assert_eq!(unify(&ne, &Value::Int(0)), Value::Int(0));
        assert!(unify(&ne, &Value::Null).is_bottom());
        assert!(!unify(&ne, &object("{}")).is_bottom());

        assert!(Bound::new(BoundOp::Match, Value::String("(".into())).is_err());
        assert!(Bound::new(BoundOp::Lt, Value::Null).is_err());
    }

    #[test]
    fn test_disjunction_defaults() {
        let d = Value::disjunction(vec![
            Disjunct {
                value: Value::String("a".into()),
                default: true,
            },
            Disjunct {
                value: kind(KindSet::STRING),
                default: false,
            },
        ]);
        assert_eq!(d.to_string(), r#"*"a" | string"#);
        assert_eq!(d.default_value(), Some(&Value::String("a".into())));

        // a concrete value selects the matching alternatives
        assert_eq!(
            unify(&d, &Value::String("b".into())),
            Value::String("b".into())
        );
        assert_eq!(
            unify(&d, &Value::String("a".into())),
            Value::String("a".into())
        );
        let Value::Bottom(msg) = unify(&d, &Value::Int(1)) else {
            panic!("expected empty disjunction");
        };
        assert!(msg.starts_with("empty disjunction: conflicting values"), "{msg}");

        // unifying with a non-concrete value keeps the default
        let narrowed = unify(&d, &bound(BoundOp::Ne, Value::String("c".into())));
        assert_eq!(narrowed.default_value(), Some(&Value::String("a".into())));
    }

    #[test]
    fn test_structs() {
        let mut policy = Struct::default();
        policy.add_field("value", LabelKind::Regular, Presence::Regular, kind(KindSet::INT));
        policy.add_field("opt", LabelKind::Regular, Presence::Optional, kind(KindSet::STRING));
        let policy = Value::Struct(policy);

        let Value::Struct(ok) = unify(&policy, &object(r#"{"value": 5, "extra": true}"#)) else {
            panic!("expected struct");
        };
        assert_eq!(ok.fields["value"].value, Value::Int(5));
        assert_eq!(ok.fields["extra"].value, Value::Bool(true));
        assert_eq!(ok.fields["opt"].presence, Presence::Optional);

        let Value::Struct(bad) = unify(&policy, &object(r#"{"value": "five"}"#)) else {
            panic!("expected struct");
        };
        assert!(bad.fields["value"].value.is_bottom());
    }

    #[test]
    fn test_closed_structs() {
        let mut def = Struct::default();
        def.add_field("a", LabelKind::Regular, Presence::Regular, kind(KindSet::INT));
        def.add_field("b", LabelKind::Regular, Presence::Optional, kind(KindSet::INT));
        def.patterns.push((
            bound(BoundOp::Match, Value::String("^x-".into())),
            kind(KindSet::STRING),
        ));
        let def = Value::Struct(def).close_deep();

        let Value::Struct(ok) = unify(&def, &object(r#"{"a": 1, "b": 2, "x-y": "z"}"#)) else {
            panic!("expected struct");
        };
        assert!(ok.fields.values().all(|f| !f.value.is_bottom()));

        let Value::Struct(bad) = unify(&def, &object(r#"{"a": 1, "c": 2, "x-y": 3}"#)) else {
            panic!("expected struct");
        };
        assert_eq!(bad.fields["c"].value, Value::Bottom("field not allowed".into()));
        assert!(bad.fields["x-y"].value.is_bottom());
        assert!(!bad.fields["a"].value.is_bottom());
    }

    #[test]
    fn test_json_integers_beyond_i64() {
        assert_eq!(
            object("18446744073709551615"),
            Value::Int(18_446_744_073_709_551_615)
        );
        let Value::Struct(doc) = object(r#"{"n": 18446744073709551615}"#) else {
            panic!("expected struct");
        };
        assert_eq!(
            unify(&kind(KindSet::INT), &doc.fields["n"].value),
            Value::Int(18_446_744_073_709_551_615)
        );
        assert_eq!(object("-9223372036854775808"), Value::Int(i64::MIN.into()));
        assert_eq!(object("1e3"), Value::Float(1000.0));
    }

    #[test]
    fn test_hidden_fields_apart_from_regular_labels() {
        let mut policy = Struct::default();
        let internal = Value::String("x".into());
        policy.add_field("_type", LabelKind::Hidden, Presence::Regular, internal);
        let policy = Value::Struct(policy);

        let Value::Struct(s) =
            unify(&policy, &object(r#"{"_type": "https://in-toto.io/Statement/v1"}"#))
        else {
            panic!("expected struct");
        };
        assert_eq!(s.hidden["_type"].value, Value::String("x".into()));
        assert_eq!(
            s.field("_type", LabelKind::Regular).map(|f| &f.value),
            Some(&Value::String("https://in-toto.io/Statement/v1".into()))
        );
    }

    #[test]
    fn test_lists() {
        let open = Value::List(List {
            elems: vec![],
            tail: Some(Box::new(kind(KindSet::STRING))),
        });
        assert_eq!(open.to_string(), "[...string]");
        assert_eq!(unify(&open, &object(r#"["a", "b"]"#)), object(r#"["a", "b"]"#));

        let Value::List(mixed) = unify(&open, &object(r#"["a", 1]"#)) else {
            panic!("expected list");
        };
        assert!(mixed.elems[1].is_bottom());

        let Value::Bottom(msg) = unify(&object("[1]"), &object("[1, 2]")) else {
            panic!("expected length conflict");
        };
        assert_eq!(msg, "incompatible list lengths (1 and 2)");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Bytes(b"a\0".to_vec()).to_string(), r"'a\x00'");
        assert_eq!(kind(KindSet::NUMBER).to_string(), "number");
        assert_eq!(
            kind(KindSet::INT.union(KindSet::STRING)).to_string(),
            "int|string"
        );
        assert_eq!(object(r#"{"a-b": [1], "c": null}"#).to_string(), r#"{"a-b": [1], c: null}"#);
    }
}
