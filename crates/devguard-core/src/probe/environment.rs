// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Environment variables and system properties.

use std::env;

use super::{any_of, Observation};
use crate::catalog::MatchMode;
use crate::platform::Platform;

/// Positive if any variable is set to a non-empty value. Values are never
/// copied into evidence.
pub(crate) fn env_vars(variables: &[String]) -> Observation {
    any_of(variables, "environment variable set", Clone::clone, |name| {
        Ok(env::var_os(name).is_some_and(|value| !value.is_empty()))
    })
}

pub(crate) fn system_property(
    platform: &dyn Platform,
    property: &str,
    values: &[String],
    mode: MatchMode,
) -> Observation {
    match platform.system_property(property) {
        Ok(Some(actual)) => {
            if values.iter().any(|expected| mode.matches(&actual, expected)) {
                Observation::positive(format!("{}={}", property, actual))
            } else {
                Observation::negative()
            }
        }
        Ok(None) => Observation::negative(),
        Err(e) => Observation::from_error(e),
    }
}
