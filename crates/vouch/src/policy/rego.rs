// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Rego policy backend

use super::{PolicyBackend, PolicyError, PolicyType};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// The rule of a rego module deciding about compliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegoEntrypoint {
    /// Package of the module
    pub package: String,
    /// Name of the rule
    pub rule: String,
}

impl Default for RegoEntrypoint {
    fn default() -> Self {
        Self {
            package: "sigstore".into(),
            rule: "isCompliant".into(),
        }
    }
}

impl RegoEntrypoint {
    /// The query evaluated for the entry rule, e.g. `data.sigstore.isCompliant`
    pub fn query(&self) -> String {
        format!("data.{}.{}", self.package, self.rule)
    }

    fn module_path(&self) -> String {
        format!("{}.rego", self.package)
    }
}

/// Evaluates a document as `input` of a rego module.
///
/// The entry rule must evaluate to `true`, or to an object with a boolean
/// `result` and optional `error` and `warning` messages.
#[derive(Debug, Clone, Default)]
pub struct RegoBackend {
    entrypoint: RegoEntrypoint,
}

impl RegoBackend {
    /// Create a backend evaluating `entrypoint`
    pub fn new(entrypoint: RegoEntrypoint) -> Self {
        Self { entrypoint }
    }

    fn check_result(&self, query: &str, result: serde_json::Value) -> Result<(), PolicyError> {
        let not_compliant = || format!("policy is not compliant for query '{query}'");

        match result {
            serde_json::Value::Bool(true) => Ok(()),
            serde_json::Value::Object(map) => {
                let message = |key: &str| map.get(key).and_then(|v| v.as_str()).unwrap_or("");
                match map.get("result") {
                    Some(serde_json::Value::Bool(true)) => {
                        let warning = message("warning");
                        if !warning.is_empty() {
                            warn!(query, "policy is compliant with warning: {warning}");
                        }
                        Ok(())
                    }
                    Some(serde_json::Value::Bool(false)) => {
                        let error = message("error");
                        if error.is_empty() {
                            Err(PolicyError::not_satisfied(not_compliant()))
                        } else {
                            Err(PolicyError::not_satisfied(format!(
                                "{} with error: {error}",
                                not_compliant()
                            )))
                        }
                    }
                    _ => Err(PolicyError::not_satisfied(format!(
                        "{}: result object has no boolean 'result' field",
                        not_compliant()
                    ))),
                }
            }
            _ => Err(PolicyError::not_satisfied(not_compliant())),
        }
    }
}

impl PolicyBackend for RegoBackend {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Rego
    }

    fn evaluate(&self, document: &[u8], policy: &str) -> Result<(), PolicyError> {
        trace!("Evaluating attestation: {}", String::from_utf8_lossy(document));
        trace!("Evaluating evaluator: {policy}");

        let document = std::str::from_utf8(document)
            .map_err(|e| PolicyError::document_compile(e.to_string()))?;
        // reject non JSON input with serde_json's messages before handing it to the engine
        serde_json::from_str::<serde_json::Value>(document)
            .map_err(|e| PolicyError::document_compile(e.to_string()))?;
        let input = regorus::Value::from_json_str(document)
            .map_err(|e| PolicyError::document_compile(e.to_string()))?;

        let mut engine = regorus::Engine::new();
        engine
            .add_policy(self.entrypoint.module_path(), policy.to_string())
            .map_err(|e| PolicyError::policy_compile(PolicyType::Rego, e.to_string()))?;
        engine.set_input(input);

        let query = self.entrypoint.query();
        let result = engine.eval_rule(query.clone()).map_err(|e| {
            PolicyError::not_satisfied(format!(
                "policy is not compliant for query '{query}' with err: {e}"
            ))
        })?;

        if result == regorus::Value::Undefined {
            return Err(PolicyError::not_satisfied(format!(
                "policy is not compliant for query '{query}': result is undefined"
            )));
        }

        let result = result
            .to_json_str()
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .ok_or_else(|| {
                PolicyError::not_satisfied(format!(
                    "policy is not compliant for query '{query}': unexpected result"
                ))
            })?;

        self.check_result(&query, result)
    }
}
