// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Verification bundles for transparency-log and timestamp-authority evidence,
//! and evaluation of attestation documents against CUE and Rego policies.

#![deny(missing_docs)]
#![deny(clippy::all)]

pub mod bundle;
pub mod config;
pub mod log;
pub mod policy;
pub mod tlog;
