// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use vouch::{
    bundle::{
        entry_to_bundle, entry_to_tsa_bundle, TimestampVerificationData, VerificationMaterial,
    },
    tlog::parse_log_entries,
};

const REKOR_ENTRY: &[u8] = include_bytes!("test_data/rekor_entry.json");

#[test]
fn test_bundle_from_rekor_response() {
    let entries = parse_log_entries(REKOR_ENTRY).unwrap();
    assert_eq!(entries.len(), 1);
    let (uuid, entry) = &entries[0];
    assert_eq!(
        uuid.as_deref(),
        Some("24296fb24b8ad77a1ad7ed4c58d0e9b5a7e1a2c9d7f8e1f0b1c2d3e4f5a6b7c8d9")
    );

    let tsa = TimestampVerificationData::from_timestamp_authority(&b"rfc3161 response"[..]);
    let bundle = entry_to_bundle(Some(entry), Some(&tsa)).unwrap();

    let payload = bundle.payload().unwrap();
    assert!(payload.body().starts_with(br#"{"apiVersion":"0.0.1""#));
    assert_eq!(payload.integrated_time(), 1718035200);
    assert_eq!(payload.log_index(), 101374930);
    assert_eq!(
        payload.log_id(),
        "c0d23d6ad406973f9559f3ba2d1ca01f84147d8ffc5b8445c224f98b9591801d"
    );
    assert_eq!(
        bundle.signed_entry_timestamp(),
        Some(&Bytes::from_static(b"0123456789:;<=>?@ABCDEFGHIJKLMNO"))
    );
    assert_eq!(
        bundle.entry_timestamp_authority(),
        Some(&Bytes::from_static(b"rfc3161 response"))
    );
    assert_eq!(bundle.material().cert_bytes(), None);

    let bundle = bundle.with_material(VerificationMaterial::with_certificate(&b"cert"[..]));
    assert_eq!(
        bundle.material().cert_bytes(),
        Some(&Bytes::from_static(b"cert"))
    );
}

#[test]
fn test_entry_without_stamp_only_keeps_tsa() {
    let mut entries = parse_log_entries(REKOR_ENTRY).unwrap();
    let (_, mut entry) = entries.remove(0);
    entry.verification = None;

    assert_eq!(entry_to_bundle(Some(&entry), None), None);

    let tsa = TimestampVerificationData::new(
        Some(&b"ignored signed entry timestamp"[..]),
        Some(&b"tsa"[..]),
    );
    let bundle = entry_to_bundle(Some(&entry), Some(&tsa)).unwrap();
    assert!(bundle.payload().is_none());
    assert_eq!(bundle.signed_entry_timestamp(), None);
    assert_eq!(
        bundle.entry_timestamp_authority(),
        Some(&Bytes::from_static(b"tsa"))
    );
}

#[test]
fn test_single_entry_document() {
    let response: serde_json::Value = serde_json::from_slice(REKOR_ENTRY).unwrap();
    let single = response
        .as_object()
        .and_then(|map| map.values().next())
        .cloned()
        .unwrap();
    let entries = parse_log_entries(&serde_json::to_vec(&single).unwrap()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, None);
    assert_eq!(
        STANDARD.encode(&entries[0].1.body),
        single["body"].as_str().unwrap()
    );
}

#[test]
fn test_timestamp_bundle() {
    let timestamp = Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap();
    let bundle = entry_to_tsa_bundle(&b"response"[..], timestamp, &b"chain"[..]);
    assert_eq!(bundle.entry_timestamp(), timestamp);
    assert_eq!(bundle.payload(), &Bytes::from_static(b"response"));
    assert_eq!(bundle.cert_bytes(), &Bytes::from_static(b"chain"));

    let empty = entry_to_tsa_bundle(Vec::<u8>::new(), timestamp, Vec::<u8>::new());
    assert!(empty.payload().is_empty());
    assert!(empty.cert_bytes().is_empty());
}
