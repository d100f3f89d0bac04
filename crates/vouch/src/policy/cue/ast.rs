// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Syntax tree of the supported CUE subset

/// Unary comparison operators forming bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Match,
    NotMatch,
}

impl BoundOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundOp::Lt => "<",
            BoundOp::Le => "<=",
            BoundOp::Gt => ">",
            BoundOp::Ge => ">=",
            BoundOp::Ne => "!=",
            BoundOp::Match => "=~",
            BoundOp::NotMatch => "!~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Top,
    Bottom,
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Ident(String),
    Select(Box<Expr>, String, LabelKind),
    Call(String, Vec<Expr>),
    Struct(Vec<Decl>),
    List(Vec<Expr>, Option<Box<Expr>>),
    Bound(BoundOp, Box<Expr>),
    Neg(Box<Expr>),
    Default(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// How a field constrains the presence of its label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Presence {
    Regular,
    Optional,
    Required,
}

/// Visibility of a field label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelKind {
    Regular,
    Definition,
    Hidden,
}

impl LabelKind {
    /// Kind of an unquoted identifier label
    pub fn of_ident(name: &str) -> Self {
        if name.starts_with('#') || name.starts_with("_#") {
            LabelKind::Definition
        } else if name.starts_with('_') {
            LabelKind::Hidden
        } else {
            LabelKind::Regular
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decl {
    Field {
        label: String,
        kind: LabelKind,
        presence: Presence,
        value: Expr,
    },
    Pattern {
        label: Expr,
        value: Expr,
    },
    Let {
        name: String,
        value: Expr,
    },
    Embed(Expr),
    Ellipsis,
}
