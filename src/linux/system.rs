// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::OpenOptions;
use std::io::{Result, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hal::Platform;

/// Directory holding the Android-style `wake_lock` and `wake_unlock` files.
pub const DEFAULT_WAKE_LOCK_DIR: &str = "/sys/power";
/// Name the idle hint is taken under.
pub const WAKE_LOCK_NAME: &str = "nfc_wl";

/// Sleeps on the calling thread and keeps the system awake through the
/// user-space wake lock interface, where the kernel offers one.
#[derive(Debug, Clone, Default)]
pub struct LinuxPlatform {
    wake_lock_dir: Option<PathBuf>,
}

impl LinuxPlatform {
    /// Use the wake lock interface in `dir` if it exists there.
    pub fn with_wake_lock_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        if dir.join("wake_lock").exists() && dir.join("wake_unlock").exists() {
            Self {
                wake_lock_dir: Some(dir.to_path_buf()),
            }
        } else {
            log::debug!("no wake lock interface in {}, idle hints disabled", dir.display());
            Self::without_wake_lock()
        }
    }

    pub fn without_wake_lock() -> Self {
        Self {
            wake_lock_dir: None,
        }
    }

    pub fn has_wake_lock(&self) -> bool {
        self.wake_lock_dir.is_some()
    }

    fn write_control(&self, file: &str, line: &str) {
        let Some(dir) = self.wake_lock_dir.as_ref() else {
            return;
        };
        if let Err(err) = write_line(&dir.join(file), line) {
            log::warn!("writing {} to {} failed: {}", line, file, err);
        }
    }
}

fn write_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(line.as_bytes())
}

impl Platform for LinuxPlatform {
    fn sleep_for(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn prevent_idle_for(&self, duration: Duration) {
        self.write_control(
            "wake_lock",
            &format!("{} {}", WAKE_LOCK_NAME, duration.as_nanos()),
        );
    }

    fn allow_idle(&self) {
        self.write_control("wake_unlock", WAKE_LOCK_NAME);
    }
}
