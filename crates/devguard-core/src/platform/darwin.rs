// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! macOS / iOS bindings.

use std::ffi::CStr;
use std::io;
use std::mem;

use crate::error::ProbeError;

/// `PROC_FLAG_TRACED` from `<sys/proc_info.h>`.
const PROC_FLAG_TRACED: u32 = 0x2;

/// Whether the kernel reports a tracer attached to this process.
pub(crate) fn is_traced() -> Result<bool, ProbeError> {
    // SAFETY: proc_bsdinfo is plain old data; proc_pidinfo writes at most `size` bytes.
    let mut info: libc::proc_bsdinfo = unsafe { mem::zeroed() };
    let size = mem::size_of::<libc::proc_bsdinfo>() as libc::c_int;
    let written = unsafe {
        libc::proc_pidinfo(
            libc::getpid(),
            libc::PROC_PIDTBSDINFO,
            0,
            &mut info as *mut libc::proc_bsdinfo as *mut libc::c_void,
            size,
        )
    };

    if written != size {
        return Err(ProbeError::Io(io::Error::last_os_error()));
    }
    Ok(info.pbi_flags & PROC_FLAG_TRACED != 0)
}

/// Paths of every image dyld has loaded into this process.
pub(crate) fn loaded_images() -> Vec<String> {
    // SAFETY: dyld returns NUL-terminated strings owned by the loader, or null
    // for an index that raced with an unload.
    let count = unsafe { libc::_dyld_image_count() };
    (0..count)
        .filter_map(|index| {
            let name = unsafe { libc::_dyld_get_image_name(index) };
            if name.is_null() {
                None
            } else {
                Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
            }
        })
        .collect()
}
