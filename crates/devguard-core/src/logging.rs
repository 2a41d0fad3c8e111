// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Log sink setup for hosts without a tracing subscriber.
//!
//! The engine logs through `tracing`; with its `log` feature the events reach
//! the `log` facade when no subscriber is installed. On Android that facade is
//! routed to logcat.

/// Route engine logs to logcat under `tag`. Safe to call more than once.
#[cfg(target_os = "android")]
pub fn init_logging(tag: &str) {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Info)
            .with_tag(tag),
    );
}

/// No-op outside Android; binaries install a `tracing` subscriber instead.
#[cfg(not(target_os = "android"))]
pub fn init_logging(_tag: &str) {}
