// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Timestamp authority only bundles

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Metadata about recording a signature's ephemeral key with a timestamp authority,
/// without involving a transparency log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampBundle {
    entry_timestamp: DateTime<Utc>,
    payload: Bytes,
    cert_bytes: Bytes,
}

impl TimestampBundle {
    /// The time the timestamp authority attested
    pub fn entry_timestamp(&self) -> DateTime<Utc> {
        self.entry_timestamp
    }

    /// The raw timestamp authority response
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The certificate bytes
    pub fn cert_bytes(&self) -> &Bytes {
        &self.cert_bytes
    }
}

/// Package an already authenticated timestamp authority response.
///
/// No validation is performed.
pub fn entry_to_tsa_bundle(
    response: impl Into<Bytes>,
    timestamp: DateTime<Utc>,
    cert_bytes: impl Into<Bytes>,
) -> TimestampBundle {
    TimestampBundle {
        entry_timestamp: timestamp,
        payload: response.into(),
        cert_bytes: cert_bytes.into(),
    }
}
