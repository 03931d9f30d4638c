// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Attach-time configuration of a controller instance.

use std::time::Duration;

/// Consumer labels the lines are requested under.
pub const ENABLE_CONSUMER: &str = "pn547_ven";
pub const FIRMWARE_CONSUMER: &str = "pn547_fw";
pub const DATA_READY_CONSUMER: &str = "pn547_irq";

/// How long each read keeps the platform out of idle.
pub const DEFAULT_IDLE_HINT: Duration = Duration::from_millis(100);

/// GPIO offsets wired to the controller, as a board description would
/// provide them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOffsets {
    /// `VEN`, the controller's enable input.
    pub enable: u32,
    /// Firmware download select.
    pub firmware_select: u32,
    /// Data-ready output of the controller, used as the interrupt source.
    pub data_ready: u32,
}

/// What to do when a power line does not read back the level it was
/// driven to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Log the mismatch and report the transition as successful.
    #[default]
    Log,
    /// Fail the control request once the transition has run to completion.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub lines: LineOffsets,
    pub idle_hint: Duration,
    pub mismatch_policy: MismatchPolicy,
}

impl DeviceConfig {
    pub const fn new(lines: LineOffsets) -> Self {
        Self {
            lines,
            idle_hint: DEFAULT_IDLE_HINT,
            mismatch_policy: MismatchPolicy::Log,
        }
    }

    pub const fn with_idle_hint(self, idle_hint: Duration) -> Self {
        Self { idle_hint, ..self }
    }

    pub const fn with_mismatch_policy(self, mismatch_policy: MismatchPolicy) -> Self {
        Self {
            mismatch_policy,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let LineOffsets {
            enable,
            firmware_select,
            data_ready,
        } = self.lines;

        if enable == firmware_select || enable == data_ready {
            return Err(ConfigError::DuplicateLine(enable));
        }
        if firmware_select == data_ready {
            return Err(ConfigError::DuplicateLine(firmware_select));
        }
        if self.idle_hint.is_zero() {
            return Err(ConfigError::ZeroIdleHint);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("GPIO line {0} is assigned to more than one function")]
    DuplicateLine(u32),
    #[error("Idle hint duration must be non-zero")]
    ZeroIdleHint,
}
