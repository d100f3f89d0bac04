// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Build verification bundles from transparency log and timestamp authority evidence

#![deny(missing_docs)]
#![deny(clippy::all)]

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use std::{fs, path::PathBuf};
use tracing::{debug, error, level_filters::LevelFilter};
use vouch::{
    bundle::{
        entry_to_bundle, entry_to_tsa_bundle, TimestampBundle, TimestampVerificationData,
        VerificationBundle, VerificationMaterial,
    },
    config::load_config,
    log::{setup_logging, LogLevelParser},
    tlog::parse_log_entries,
};

const NO_EVIDENCE: &str = "no verification evidence";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    /// Log level for the log output, overrides the configured level.
    #[arg(long, value_parser = LogLevelParser)]
    log_level: Option<LevelFilter>,
    /// Configuration file.
    #[arg(long, env = "VOUCH_CONFIG")]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: SubCommands,
}

#[derive(Args, Debug)]
struct TlogArgs {
    /// Rekor log entry, or a `{uuid: entry}` response, as JSON.
    #[arg(long)]
    entry: PathBuf,
    /// Timestamp authority response to include.
    #[arg(long)]
    tsa_response: Option<PathBuf>,
    /// Certificate (chain) of the signer.
    #[arg(long)]
    cert: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TsaArgs {
    /// Timestamp authority response.
    #[arg(long)]
    response: PathBuf,
    /// Time of the timestamp in RFC 3339 format.
    #[arg(long, value_parser = parse_rfc3339)]
    timestamp: DateTime<Utc>,
    /// Certificate chain of the timestamp authority.
    #[arg(long)]
    cert: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum SubCommands {
    /// Bundle a transparency log entry with optional timestamp authority evidence.
    Tlog(TlogArgs),
    /// Bundle a timestamp authority response.
    Tsa(TsaArgs),
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

fn read_optional(path: Option<&PathBuf>) -> Result<Option<Vec<u8>>> {
    path.map(|p| fs::read(p).with_context(|| format!("Failed to read {}", p.display())))
        .transpose()
}

/// Abbreviated hex of evidence bytes
fn short_hex(bytes: &[u8]) -> String {
    const SHOWN: usize = 16;
    if bytes.len() > SHOWN {
        format!("{}... ({} bytes)", hex::encode(&bytes[..SHOWN]), bytes.len())
    } else {
        format!("{} ({} bytes)", hex::encode(bytes), bytes.len())
    }
}

fn bundle_summary(uuid: Option<&str>, bundle: &VerificationBundle) -> String {
    let mut lines = Vec::new();
    if let Some(uuid) = uuid {
        lines.push(format!("entry: {uuid}"));
    }
    if let Some(payload) = bundle.payload() {
        let integrated = DateTime::from_timestamp(payload.integrated_time(), 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| payload.integrated_time().to_string());
        lines.push(format!("log id: {}", payload.log_id()));
        lines.push(format!("log index: {}", payload.log_index()));
        lines.push(format!("integrated time: {integrated}"));
        lines.push(format!("body: {} bytes", payload.body().len()));
    }
    if let Some(set) = bundle.signed_entry_timestamp() {
        lines.push(format!("signed entry timestamp: {}", short_hex(set)));
    }
    if let Some(tsa) = bundle.entry_timestamp_authority() {
        lines.push(format!("timestamp authority response: {}", short_hex(tsa)));
    }
    if let Some(cert) = bundle.material().cert_bytes() {
        lines.push(format!("certificate: {}", short_hex(cert)));
    }
    lines.join("\n")
}

fn tsa_summary(bundle: &TimestampBundle) -> String {
    [
        format!(
            "entry timestamp: {}",
            bundle
                .entry_timestamp()
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        format!("timestamp authority response: {}", short_hex(bundle.payload())),
        format!("certificate: {}", short_hex(bundle.cert_bytes())),
    ]
    .join("\n")
}

fn tlog(args: &TlogArgs) -> Result<()> {
    let json = fs::read(&args.entry)
        .with_context(|| format!("Failed to read log entry {}", args.entry.display()))?;
    let entries = parse_log_entries(&json)?;
    let tsa = read_optional(args.tsa_response.as_ref())?
        .map(TimestampVerificationData::from_timestamp_authority);
    let cert = read_optional(args.cert.as_ref())?;
    debug!(entries = entries.len(), tsa = tsa.is_some(), "Building bundles");

    for (uuid, entry) in &entries {
        match entry_to_bundle(Some(entry), tsa.as_ref()) {
            Some(bundle) => {
                let bundle = match &cert {
                    Some(cert) => {
                        bundle.with_material(VerificationMaterial::with_certificate(cert.clone()))
                    }
                    None => bundle,
                };
                println!("{}", bundle_summary(uuid.as_deref(), &bundle));
            }
            None => match uuid {
                Some(uuid) => println!("entry: {uuid}\n{NO_EVIDENCE}"),
                None => println!("{NO_EVIDENCE}"),
            },
        }
    }
    Ok(())
}

fn tsa(args: &TsaArgs) -> Result<()> {
    let response = fs::read(&args.response)
        .with_context(|| format!("Failed to read {}", args.response.display()))?;
    let cert = read_optional(args.cert.as_ref())?.unwrap_or_default();
    let bundle = entry_to_tsa_bundle(response, args.timestamp, cert);
    println!("{}", tsa_summary(&bundle));
    Ok(())
}

fn main_with_error() -> Result<()> {
    let args = Arguments::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let log_level = match args.log_level {
        Some(level) => level,
        None => config.logging.level_filter()?,
    };
    setup_logging(env!("CARGO_CRATE_NAME"), &log_level, config.logging.format())?;

    match &args.command {
        SubCommands::Tlog(tlog_args) => tlog(tlog_args),
        SubCommands::Tsa(tsa_args) => tsa(tsa_args),
    }
}

fn main() -> Result<()> {
    let ret = main_with_error();
    if let Err(e) = &ret {
        error!("Error: {}", e);
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vouch::bundle::RekorPayload;

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(
            parse_rfc3339("2024-06-10T18:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap()
        );
        assert!(parse_rfc3339("10.06.2024").is_err());
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(short_hex(b"\x01\x02"), "0102 (2 bytes)");
        assert_eq!(
            short_hex(&[0xab; 20]),
            "abababababababababababababababab... (20 bytes)"
        );
    }

    #[test]
    fn test_bundle_summary() {
        let bundle = VerificationBundle::new(
            Some(RekorPayload::new(&b"body"[..], 1718035200, 7, "abcd")),
            Some(TimestampVerificationData::new(
                Some(&b"\x01"[..]),
                None::<Vec<u8>>,
            )),
            VerificationMaterial::default(),
        )
        .unwrap();
        assert_eq!(
            bundle_summary(Some("uuid"), &bundle),
            "entry: uuid\nlog id: abcd\nlog index: 7\nintegrated time: 2024-06-10T16:00:00Z\n\
             body: 4 bytes\nsigned entry timestamp: 01 (1 bytes)"
        );
    }

    #[test]
    fn test_tsa_summary() {
        let bundle = entry_to_tsa_bundle(
            vec![0u8; 3],
            Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap(),
            Vec::<u8>::new(),
        );
        assert_eq!(
            tsa_summary(&bundle),
            "entry timestamp: 2024-06-10T16:00:00Z\n\
             timestamp authority response: 000000 (3 bytes)\ncertificate:  (0 bytes)"
        );
    }

    #[test]
    fn test_arguments() {
        let args = Arguments::try_parse_from([
            "vouch-bundle",
            "tsa",
            "--response",
            "r.tsr",
            "--timestamp",
            "2024-06-10T16:00:00Z",
        ])
        .unwrap();
        assert!(matches!(args.command, SubCommands::Tsa(TsaArgs { cert: None, .. })));
        assert!(Arguments::try_parse_from(["vouch-bundle", "tsa", "--response", "r"]).is_err());
    }
}
