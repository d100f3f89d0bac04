// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Evaluation of JSON documents (e.g. attestations) against policies
//!
//! A policy is source text in one of the supported [`PolicyType`] languages.
//! [`evaluate_policy_against_json`] selects the backend for the language,
//! runs it with a fresh evaluator and wraps any failure with the name of the
//! evaluated document and the policy type.

pub mod cue;
pub mod error;
pub mod rego;

pub use error::{ErrorKind, PolicyError, PolicyEvaluationError};

use self::{
    cue::{CueBackend, CueOptions},
    rego::{RegoBackend, RegoEntrypoint},
};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Supported policy languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    /// CUE constraints unified with the document
    Cue,
    /// Rego module evaluated with the document as input
    Rego,
}

impl PolicyType {
    /// All supported policy types
    pub const ALL: [PolicyType; 2] = [PolicyType::Cue, PolicyType::Rego];

    /// The tag of the policy type
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Cue => "cue",
            PolicyType::Rego => "rego",
        }
    }

    /// Guess the policy type from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(ext))
    }
}

impl Display for PolicyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = PolicyEvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cue" => Ok(PolicyType::Cue),
            "rego" => Ok(PolicyType::Rego),
            _ => Err(PolicyEvaluationError::UnsupportedPolicyType(s.into())),
        }
    }
}

/// A policy language evaluator
pub trait PolicyBackend {
    /// The language this backend evaluates
    fn policy_type(&self) -> PolicyType;

    /// Evaluate the JSON `document` against `policy` source text
    fn evaluate(&self, document: &[u8], policy: &str) -> Result<(), PolicyError>;
}

/// Per call settings for policy evaluation
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Abort before the backend runs if this instant has passed
    pub deadline: Option<Instant>,
    /// Abort before the backend runs if this token is cancelled
    pub cancellation: Option<CancellationToken>,
    /// Entry rule of rego modules
    pub rego: RegoEntrypoint,
    /// CUE validation options
    pub cue: CueOptions,
}

impl EvaluationContext {
    /// Set a deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            ..self
        }
    }

    /// Set the deadline
    pub fn with_deadline(self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    /// Set the cancellation token
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..self
        }
    }

    fn ensure_active(&self, name: &str, policy_type: PolicyType) -> Result<(), PolicyEvaluationError> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(PolicyEvaluationError::Cancelled {
                name: name.into(),
                policy_type,
            });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(PolicyEvaluationError::DeadlineExceeded {
                name: name.into(),
                policy_type,
            });
        }
        Ok(())
    }

    fn backend(&self, policy_type: PolicyType) -> Box<dyn PolicyBackend> {
        match policy_type {
            PolicyType::Cue => Box::new(CueBackend::new(self.cue.clone())),
            PolicyType::Rego => Box::new(RegoBackend::new(self.rego.clone())),
        }
    }
}

/// Evaluate JSON bytes against a policy given by a policy type tag.
///
/// * `name` - which attestation is evaluated, only used in messages
/// * `policy_type` - `cue` or `rego`
/// * `policy_body` - source text of the policy
/// * `json` - the document to evaluate
///
/// An unknown `policy_type` fails before the policy or the document are looked at.
pub fn evaluate_policy_against_json(
    ctx: &EvaluationContext,
    name: &str,
    policy_type: &str,
    policy_body: &str,
    json: &[u8],
) -> Result<(), PolicyEvaluationError> {
    debug!(
        name,
        policy_type,
        "Evaluating JSON: {} against policy: {}",
        String::from_utf8_lossy(json),
        policy_body
    );
    let policy_type = PolicyType::from_str(policy_type)?;
    evaluate_policy(ctx, name, policy_type, policy_body, json)
}

/// Evaluate JSON bytes against a policy of a known type
pub fn evaluate_policy(
    ctx: &EvaluationContext,
    name: &str,
    policy_type: PolicyType,
    policy_body: &str,
    json: &[u8],
) -> Result<(), PolicyEvaluationError> {
    ctx.ensure_active(name, policy_type)?;

    let backend = ctx.backend(policy_type);
    backend
        .evaluate(json, policy_body)
        .map_err(|error| PolicyEvaluationError::Evaluation {
            name: name.into(),
            policy_type: backend.policy_type(),
            error,
        })?;

    debug!(name, %policy_type, "Policy evaluation passed");
    Ok(())
}
