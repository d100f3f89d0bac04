// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! CUE policy backend
//!
//! Evaluates the data subset of CUE: structs with regular, optional (`?`),
//! required (`!`), definition (`#`) and hidden (`_`) fields, pattern
//! constraints, embeddings, `let` clauses, lists with typed tails, kinds,
//! bounds, regular expression matches, disjunctions with defaults and
//! `close()`. Comprehensions, imports, arithmetic and string interpolation
//! are rejected as compile errors.
//!
//! References are resolved against the document the policy is unified with,
//! so `b: a` holds the document's `a`. Integers are exact in the `i128`
//! range. A reference cycle such as `a: b` with `b: a`, or a field referring
//! to itself, is a compile error rather than evaluating to top.

mod ast;
mod eval;
mod lexer;
mod parser;
mod validate;
mod value;

use super::{PolicyBackend, PolicyError, PolicyType};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Error compiling CUE source or a JSON document into a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CompileError(String);

impl CompileError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Options of the CUE backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueOptions {
    /// Require every regular field of the unified value to be concrete
    pub concrete: bool,
}

/// Unifies a JSON document with a CUE policy and validates the result
#[derive(Debug, Clone, Default)]
pub struct CueBackend {
    options: CueOptions,
}

impl CueBackend {
    /// Create a backend with `options`
    pub fn new(options: CueOptions) -> Self {
        Self { options }
    }
}

/// Evaluate the parsed policy instantiated at `document`
fn compile_policy(
    decls: &[ast::Decl],
    document: &value::Value,
) -> Result<value::Value, CompileError> {
    match eval::evaluate_file(decls, Some(document))? {
        value::Value::Bottom(msg) => Err(CompileError::new(msg)),
        value => Ok(value),
    }
}

fn compile_document(document: &[u8]) -> Result<value::Value, CompileError> {
    let json: serde_json::Value =
        serde_json::from_slice(document).map_err(|e| CompileError::new(e.to_string()))?;
    Ok(value::Value::from_json(&json))
}

impl PolicyBackend for CueBackend {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Cue
    }

    fn evaluate(&self, document: &[u8], policy: &str) -> Result<(), PolicyError> {
        trace!("Evaluating attestation: {}", String::from_utf8_lossy(document));
        trace!("Evaluating evaluator: {policy}");

        let policy_compile =
            |e: CompileError| PolicyError::policy_compile(PolicyType::Cue, e.to_string());
        let decls = parser::parse_file(policy).map_err(policy_compile)?;
        let attestation =
            compile_document(document).map_err(|e| PolicyError::document_compile(e.to_string()))?;
        let evaluator = compile_policy(&decls, &attestation).map_err(policy_compile)?;

        let result = value::unify(&evaluator, &attestation);
        trace!("Unified value: {result}");

        validate::validate(&result, self.options.concrete)
            .map_err(|errors| PolicyError::not_satisfied(errors.join("\n")))
    }
}
