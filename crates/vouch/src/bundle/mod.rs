// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Verification bundles
//!
//! A [`VerificationBundle`] combines the evidence recorded for a signature by a
//! transparency log and/or a timestamp authority. Every piece of evidence is
//! optional on its own, but a bundle always carries at least one of them:
//! [`entry_to_bundle`] returns `None` when there is nothing to verify.

mod tsa;

pub use tsa::{entry_to_tsa_bundle, TimestampBundle};

use crate::tlog::LogEntry;
use bytes::Bytes;

/// Canonical form of a transparency log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RekorPayload {
    body: Bytes,
    integrated_time: i64,
    log_index: i64,
    log_id: String,
}

impl RekorPayload {
    /// Create a payload from its four mandatory parts
    pub fn new(
        body: impl Into<Bytes>,
        integrated_time: i64,
        log_index: i64,
        log_id: impl Into<String>,
    ) -> Self {
        Self {
            body: body.into(),
            integrated_time,
            log_index,
            log_id: log_id.into(),
        }
    }

    /// The raw logged entry
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Time the log integrated the entry (unix seconds)
    pub fn integrated_time(&self) -> i64 {
        self.integrated_time
    }

    /// Position of the entry in the log
    pub fn log_index(&self) -> i64 {
        self.log_index
    }

    /// Identifier of the log instance
    pub fn log_id(&self) -> &str {
        &self.log_id
    }
}

impl From<&LogEntry> for RekorPayload {
    fn from(entry: &LogEntry) -> Self {
        Self::new(
            entry.body.clone(),
            entry.integrated_time,
            entry.log_index,
            entry.log_id.clone(),
        )
    }
}

/// Timestamp evidence for a signature.
///
/// Empty byte sequences are never stored: an empty input is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampVerificationData {
    signed_entry_timestamp: Option<Bytes>,
    entry_timestamp_authority: Option<Bytes>,
}

fn non_empty(bytes: Option<Bytes>) -> Option<Bytes> {
    bytes.filter(|b| !b.is_empty())
}

impl TimestampVerificationData {
    /// Create timestamp evidence from a signed entry timestamp and a timestamp
    /// authority response
    pub fn new(
        signed_entry_timestamp: Option<impl Into<Bytes>>,
        entry_timestamp_authority: Option<impl Into<Bytes>>,
    ) -> Self {
        Self {
            signed_entry_timestamp: non_empty(signed_entry_timestamp.map(Into::into)),
            entry_timestamp_authority: non_empty(entry_timestamp_authority.map(Into::into)),
        }
    }

    /// Evidence consisting only of a timestamp authority response
    pub fn from_timestamp_authority(response: impl Into<Bytes>) -> Self {
        Self::new(None::<Bytes>, Some(response))
    }

    /// The log's signature over the entry
    pub fn signed_entry_timestamp(&self) -> Option<&Bytes> {
        self.signed_entry_timestamp.as_ref()
    }

    /// The recorded timestamp authority response
    pub fn entry_timestamp_authority(&self) -> Option<&Bytes> {
        self.entry_timestamp_authority.as_ref()
    }

    /// `true` if neither field carries evidence
    pub fn is_empty(&self) -> bool {
        self.signed_entry_timestamp.is_none() && self.entry_timestamp_authority.is_none()
    }
}

/// Material needed to interpret the bundle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationMaterial {
    cert_bytes: Option<Bytes>,
}

impl VerificationMaterial {
    /// Material carrying the signer's certificate (chain)
    pub fn with_certificate(cert_bytes: impl Into<Bytes>) -> Self {
        Self {
            cert_bytes: non_empty(Some(cert_bytes.into())),
        }
    }

    /// The signer's certificate bytes
    pub fn cert_bytes(&self) -> Option<&Bytes> {
        self.cert_bytes.as_ref()
    }
}

/// Evidence record handed to a verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationBundle {
    payload: Option<RekorPayload>,
    timestamp: Option<TimestampVerificationData>,
    material: VerificationMaterial,
}

impl VerificationBundle {
    /// Compose a bundle. Returns `None` if neither transparency log nor
    /// timestamp evidence is present.
    pub fn new(
        payload: Option<RekorPayload>,
        timestamp: Option<TimestampVerificationData>,
        material: VerificationMaterial,
    ) -> Option<Self> {
        let timestamp = timestamp.filter(|t| !t.is_empty());
        if payload.is_none() && timestamp.is_none() {
            return None;
        }
        Some(Self {
            payload,
            timestamp,
            material,
        })
    }

    /// Replace the verification material
    pub fn with_material(self, material: VerificationMaterial) -> Self {
        Self { material, ..self }
    }

    /// The transparency log payload
    pub fn payload(&self) -> Option<&RekorPayload> {
        self.payload.as_ref()
    }

    /// The timestamp evidence
    pub fn timestamp(&self) -> Option<&TimestampVerificationData> {
        self.timestamp.as_ref()
    }

    /// The verification material
    pub fn material(&self) -> &VerificationMaterial {
        &self.material
    }

    /// Shortcut for the log's signed entry timestamp
    pub fn signed_entry_timestamp(&self) -> Option<&Bytes> {
        self.timestamp.as_ref()?.signed_entry_timestamp()
    }

    /// Shortcut for the timestamp authority response
    pub fn entry_timestamp_authority(&self) -> Option<&Bytes> {
        self.timestamp.as_ref()?.entry_timestamp_authority()
    }
}

/// Build a verification bundle from a transparency log entry and timestamp
/// authority evidence.
///
/// The log entry only contributes if it carries a verification stamp. Only the
/// timestamp authority response of `tsa` is taken over, and only if it is non-empty.
/// Returns `None` if nothing contributes.
pub fn entry_to_bundle(
    entry: Option<&LogEntry>,
    tsa: Option<&TimestampVerificationData>,
) -> Option<VerificationBundle> {
    let stamped = entry.and_then(|e| e.verification().map(|v| (e, v)));

    let payload = stamped.map(|(entry, _)| RekorPayload::from(entry));
    let signed_entry_timestamp =
        stamped.map(|(_, verification)| Bytes::from(verification.signed_entry_timestamp.clone()));
    let entry_timestamp_authority = tsa.and_then(|t| t.entry_timestamp_authority().cloned());

    VerificationBundle::new(
        payload,
        Some(TimestampVerificationData::new(
            signed_entry_timestamp,
            entry_timestamp_authority,
        )),
        VerificationMaterial::default(),
    )
}
