// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Probes answered by the host's package registry and URL resolver.

use super::{any_of, Observation};
use crate::platform::Platform;

pub(crate) fn package_existence(platform: &dyn Platform, packages: &[String]) -> Observation {
    any_of(packages, "package installed", Clone::clone, |package| {
        platform.package_installed(package)
    })
}

pub(crate) fn url_scheme(platform: &dyn Platform, urls: &[String]) -> Observation {
    any_of(urls, "URL openable", Clone::clone, |url| platform.can_open_url(url))
}
