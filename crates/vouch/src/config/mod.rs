// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Configuration handling

use crate::{
    log::LogFormat,
    policy::{cue::CueOptions, rego::RegoEntrypoint, EvaluationContext},
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr};
use tracing::{level_filters::LevelFilter, trace};

/// Prefix of environment variables overriding the configuration, e.g. `VOUCH__CUE__CONCRETE`
pub const ENV_PREFIX: &str = "VOUCH";

/// Main configuration container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VouchConfig {
    /// Logging-specific configuration
    pub logging: LoggingConfig,
    /// Entry rule of rego policies
    pub rego: RegoEntrypoint,
    /// CUE validation options
    pub cue: CueOptions,
}

/// Configuration for logging behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// The logging level (e.g., "debug", "info", "warn", "error")
    pub level: String,
    /// Whether to output logs in JSON format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// The configured level as a filter
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level).map_err(|e| {
            ConfigError::Message(format!("invalid logging.level {:?}: {e}", self.level))
        })
    }

    /// The configured output format
    pub fn format(&self) -> LogFormat {
        if self.json {
            LogFormat::Json
        } else {
            LogFormat::Plain
        }
    }
}

impl VouchConfig {
    /// A fresh evaluation context with the configured backend settings
    pub fn evaluation_context(&self) -> EvaluationContext {
        EvaluationContext {
            rego: self.rego.clone(),
            cue: self.cue.clone(),
            ..Default::default()
        }
    }
}

/// Load the configuration.
///
/// Sources, later ones overriding earlier ones:
/// * built-in defaults
/// * `config/default.{yaml,json,toml}` if present
/// * the file at `path`, which must exist if given
/// * `VOUCH__<SECTION>__<KEY>` environment variables
pub fn load_config(path: Option<&Path>) -> Result<VouchConfig, ConfigError> {
    trace!("Loading config");
    let mut builder = Config::builder()
        .add_source(Config::try_from(&VouchConfig::default())?)
        .add_source(File::with_name("config/default").required(false));
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
