// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Filesystem probes: indicator paths and the restricted-write canary.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, warn};

use super::{any_of, Observation};
use crate::error::ProbeError;

const CANARY_PREFIX: &str = ".devguard-canary";

/// Positive if any indicator path exists.
pub(crate) fn path_existence(paths: &[PathBuf]) -> Observation {
    any_of(
        paths,
        "path present",
        |path| path.display().to_string(),
        |path| path.try_exists().map_err(ProbeError::from),
    )
}

/// Positive if a fresh file can be created in any of `directories`.
///
/// A failed write is the healthy state and counts as Negative. Creation alone
/// decides the answer; every canary is removed again before this returns, and
/// a failed removal is only logged.
pub(crate) fn sandboxed_write(directories: &[PathBuf]) -> Observation {
    sandboxed_write_with(directories, remove_canary)
}

/// Removes a canary file; swapped out in tests to simulate an unlink failure.
type Remover = fn(&Path) -> io::Result<()>;

fn remove_canary(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

fn sandboxed_write_with(directories: &[PathBuf], remove: Remover) -> Observation {
    let rng = SystemRandom::new();
    let mut writable = Vec::new();
    let mut randomness_failed = false;

    for directory in directories {
        let Some(canary) = canary_path(&rng, directory) else {
            randomness_failed = true;
            continue;
        };

        match write_canary(&canary, remove) {
            Ok(()) => writable.push(directory.display().to_string()),
            Err(e) => debug!(directory = %directory.display(), error = %e, "restricted write refused"),
        }
    }

    if !writable.is_empty() {
        Observation::positive(format!("restricted location writable: {}", writable.join(", ")))
    } else if randomness_failed {
        Observation::inconclusive("could not generate a unique canary name".to_string())
    } else {
        Observation::negative()
    }
}

/// `<dir>/.devguard-canary-<pid>-<random>`, unique per invocation.
fn canary_path(rng: &SystemRandom, directory: &Path) -> Option<PathBuf> {
    let mut suffix = [0u8; 8];
    rng.fill(&mut suffix).ok()?;
    Some(directory.join(format!(
        "{}-{}-{}",
        CANARY_PREFIX,
        std::process::id(),
        hex::encode(suffix)
    )))
}

/// `Ok` once the canary was created; a failed cleanup is logged by the guard
/// and does not change the answer.
fn write_canary(path: &Path, remove: Remover) -> io::Result<()> {
    // create_new: never touch a file this probe did not create.
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let guard = CanaryGuard::new(path.to_path_buf(), remove);

    let written = file.write_all(b"devguard").and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        debug!(path = %path.display(), error = %e, "canary created but not written");
    }

    guard.release();
    Ok(())
}

/// Removes the canary file when dropped, including during unwinding.
struct CanaryGuard {
    path: PathBuf,
    remove: Remover,
    armed: bool,
}

impl CanaryGuard {
    fn new(path: PathBuf, remove: Remover) -> Self {
        Self {
            path,
            remove,
            armed: true,
        }
    }

    /// Remove now; the drop handler becomes a no-op.
    fn release(mut self) {
        self.armed = false;
        self.remove_now();
    }

    fn remove_now(&self) {
        if let Err(e) = (self.remove)(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove canary file");
        }
    }
}

impl Drop for CanaryGuard {
    fn drop(&mut self) {
        if self.armed {
            self.remove_now();
        }
    }
}
