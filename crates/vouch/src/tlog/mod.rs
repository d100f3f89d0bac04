// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Transparency log entry records as returned by a Rekor instance

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error parsing a transparency log entry
#[derive(Error, Debug)]
pub enum LogEntryError {
    /// The JSON could not be parsed as a log entry
    #[error("failed to parse log entry: {0}")]
    Json(#[from] serde_json::Error),
    /// The response did not contain any entry
    #[error("log entry response is empty")]
    Empty,
}

/// A transparency log entry.
///
/// All integer and identifier fields are mandatory, so a deserialized entry
/// is always fully populated.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// The raw logged entry (base64 in JSON)
    #[serde_as(as = "Base64")]
    pub body: Vec<u8>,
    /// Time the entry was integrated into the log (unix seconds)
    pub integrated_time: i64,
    /// Position in the log
    pub log_index: i64,
    /// Identifier of the log instance
    #[serde(rename = "logID")]
    pub log_id: String,
    /// Verification stamp issued by the log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<EntryVerification>,
}

/// Verification data embedded in a log entry
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryVerification {
    /// Signature of the log over the entry (base64 in JSON)
    #[serde_as(as = "Base64")]
    #[serde(default)]
    pub signed_entry_timestamp: Vec<u8>,
}

impl LogEntry {
    /// Returns the embedded verification stamp, if any
    pub fn verification(&self) -> Option<&EntryVerification> {
        self.verification.as_ref()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LogEntryDocument {
    Single(LogEntry),
    Response(BTreeMap<String, LogEntry>),
}

/// Parse either a single log entry or a `{uuid: entry}` response map.
///
/// Entries of a response map are returned ordered by uuid.
pub fn parse_log_entries(json: &[u8]) -> Result<Vec<(Option<String>, LogEntry)>, LogEntryError> {
    let entries = match serde_json::from_slice::<LogEntryDocument>(json) {
        Ok(LogEntryDocument::Single(entry)) => vec![(None, entry)],
        Ok(LogEntryDocument::Response(map)) => map
            .into_iter()
            .map(|(uuid, entry)| (Some(uuid), entry))
            .collect(),
        // untagged enums swallow the real error, so report the single entry one
        Err(_) => vec![(None, serde_json::from_slice::<LogEntry>(json)?)],
    };

    if entries.is_empty() {
        return Err(LogEntryError::Empty);
    }
    Ok(entries)
}
