// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

use super::Observation;
use crate::catalog::SyscallFlag;
use crate::platform::Platform;

/// Read an OS trace/debug flag through the platform adapter.
pub(crate) fn syscall_flag(platform: &dyn Platform, flag: SyscallFlag) -> Observation {
    match platform.syscall_flag(flag) {
        Ok(true) => Observation::positive(format!("flag set: {}", flag.as_str())),
        Ok(false) => Observation::negative(),
        Err(e) => Observation::from_error(e),
    }
}
