// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Signing certificate pinning.

use ring::digest::{digest, SHA256};

use super::Observation;
use crate::platform::Platform;

/// Compare the SHA-256 of the signing certificate with `expected` (lowercase hex).
///
/// A missing signature is itself a positive signal.
pub(crate) fn signature_check(platform: &dyn Platform, expected: Option<&str>) -> Observation {
    let certificate = match platform.signing_certificate() {
        Ok(Some(der)) => der,
        Ok(None) => return Observation::positive("no code signature present".to_string()),
        Err(e) => return Observation::from_error(e),
    };

    let Some(expected) = expected else {
        return Observation::inconclusive("no reference digest configured".to_string());
    };

    let actual = hex::encode(digest(&SHA256, &certificate));
    if actual == expected {
        Observation::negative()
    } else {
        Observation::positive(format!("signing certificate digest mismatch: {}", actual))
    }
}
