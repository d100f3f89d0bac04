// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Evaluate a JSON document against a CUE or Rego policy

#![deny(missing_docs)]
#![deny(clippy::all)]

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::{debug, error, level_filters::LevelFilter};
use vouch::{
    config::load_config,
    log::{setup_logging, LogLevelParser},
    policy::evaluate_policy_against_json,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    /// Log level for the log output, overrides the configured level.
    #[arg(long, value_parser = LogLevelParser)]
    log_level: Option<LevelFilter>,
    /// Configuration file.
    #[arg(long, env = "VOUCH_CONFIG")]
    config: Option<PathBuf>,
    /// Name of the document used in messages, defaults to the document path.
    #[arg(long)]
    name: Option<String>,
    /// Policy language (`cue` or `rego`), defaults to the policy file extension.
    #[arg(long)]
    policy_type: Option<String>,
    /// Policy source file.
    #[arg(long)]
    policy: PathBuf,
    /// Give up if the evaluation did not start within this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// JSON document to evaluate, `-` for stdin.
    #[clap(name = "document", value_parser)]
    document: ArgSource,
}

#[derive(Debug, Clone, PartialEq)]
enum ArgSource {
    File(PathBuf),
    Stdin,
}

impl FromStr for ArgSource {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" => Ok(ArgSource::Stdin),
            _ => Ok(ArgSource::File(PathBuf::from(s))),
        }
    }
}

impl ArgSource {
    fn read(&self) -> Result<(Vec<u8>, String)> {
        match self {
            ArgSource::File(path) => {
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read document {}", path.display()))?;
                Ok((bytes, path.display().to_string()))
            }
            ArgSource::Stdin => {
                let mut bytes = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut bytes)
                    .context("Failed to read document from stdin")?;
                Ok((bytes, "stdin".into()))
            }
        }
    }
}

/// The policy type tag, given explicitly or taken from the policy file extension
fn policy_type_tag(explicit: Option<String>, policy: &Path) -> Result<String> {
    match explicit {
        Some(tag) => Ok(tag),
        None => policy
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                anyhow!(
                    "cannot tell the policy type of {}, use --policy-type",
                    policy.display()
                )
            }),
    }
}

fn main_with_error() -> Result<()> {
    let args = Arguments::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let log_level = match args.log_level {
        Some(level) => level,
        None => config.logging.level_filter()?,
    };
    setup_logging(env!("CARGO_CRATE_NAME"), &log_level, config.logging.format())?;
    debug!(?config, "Loaded configuration");

    let policy_type = policy_type_tag(args.policy_type, &args.policy)?;
    let policy = fs::read_to_string(&args.policy)
        .with_context(|| format!("Failed to read policy {}", args.policy.display()))?;
    let (document, document_name) = args.document.read()?;
    let name = args.name.unwrap_or(document_name);

    let mut ctx = config.evaluation_context();
    if let Some(timeout_ms) = args.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(timeout_ms));
    }

    evaluate_policy_against_json(&ctx, &name, &policy_type, &policy, &document)?;

    println!("{name}: {policy_type} policy {} satisfied", args.policy.display());
    Ok(())
}

fn main() -> Result<()> {
    let ret = main_with_error();
    if let Err(e) = &ret {
        error!("Error: {}", e);
    }
    ret
}
