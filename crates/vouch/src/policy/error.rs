// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Policy evaluation error types

use super::PolicyType;
use thiserror::Error;

/// Failure reported by a policy backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The policy source failed to parse or compile
    #[error("failed to compile the {language} policy with error: {message}")]
    PolicyCompile {
        /// Language of the policy
        language: PolicyType,
        /// Compiler message
        message: String,
    },
    /// The JSON document could not be turned into a value of the policy language
    #[error("failed to compile the attestation data with error: {0}")]
    DocumentCompile(String),
    /// The document does not satisfy the policy
    #[error("failed to evaluate the policy with error: {0}")]
    NotSatisfied(String),
}

impl PolicyError {
    /// Create a new policy compile error
    pub fn policy_compile(language: PolicyType, message: impl Into<String>) -> Self {
        Self::PolicyCompile {
            language,
            message: message.into(),
        }
    }

    /// Create a new document compile error
    pub fn document_compile(message: impl Into<String>) -> Self {
        Self::DocumentCompile(message.into())
    }

    /// Create a new policy violation error
    pub fn not_satisfied(message: impl Into<String>) -> Self {
        Self::NotSatisfied(message.into())
    }
}

/// Classification of a [`PolicyEvaluationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The policy type tag is not one of the supported languages
    UnsupportedPolicyType,
    /// The call was aborted before the backend ran
    Aborted,
    /// The policy source is invalid
    PolicySourceCompile,
    /// The document is invalid
    DocumentCompile,
    /// The document was rejected by the policy
    PolicyNotSatisfied,
}

/// Error returned by the policy dispatcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvaluationError {
    /// The policy type tag is not supported
    #[error("sorry, policy type {0:?} is not supported yet")]
    UnsupportedPolicyType(String),
    /// The deadline of the call expired before the backend was invoked
    #[error("evaluating {policy_type} policy for {name}: deadline exceeded")]
    DeadlineExceeded {
        /// Label of the evaluated document
        name: String,
        /// Selected policy language
        policy_type: PolicyType,
    },
    /// The call was cancelled before the backend was invoked
    #[error("evaluating {policy_type} policy for {name}: cancelled")]
    Cancelled {
        /// Label of the evaluated document
        name: String,
        /// Selected policy language
        policy_type: PolicyType,
    },
    /// The backend rejected the document or failed to compile
    #[error("failed evaluating {policy_type} policy for {name}: {error}")]
    Evaluation {
        /// Label of the evaluated document
        name: String,
        /// Selected policy language
        policy_type: PolicyType,
        /// The backend failure
        error: PolicyError,
    },
}

impl PolicyEvaluationError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedPolicyType(_) => ErrorKind::UnsupportedPolicyType,
            Self::DeadlineExceeded { .. } | Self::Cancelled { .. } => ErrorKind::Aborted,
            Self::Evaluation { error, .. } => match error {
                PolicyError::PolicyCompile { .. } => ErrorKind::PolicySourceCompile,
                PolicyError::DocumentCompile(_) => ErrorKind::DocumentCompile,
                PolicyError::NotSatisfied(_) => ErrorKind::PolicyNotSatisfied,
            },
        }
    }

    /// The backend failure, if a backend ran
    pub fn policy_error(&self) -> Option<&PolicyError> {
        match self {
            Self::Evaluation { error, .. } => Some(error),
            _ => None,
        }
    }
}
