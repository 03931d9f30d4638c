// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Power and firmware-mode sequencing over the `VEN` and firmware-select
//! lines.

use std::fmt;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::gate::InterruptGate;
use crate::hal::{IrqLine, Pin, Platform};

/// Settling time after each step of the firmware-download reset.
pub const FIRMWARE_HOLD: Duration = Duration::from_millis(60);
/// Settling time after powering on in normal mode.
pub const POWER_ON_HOLD: Duration = Duration::from_millis(20);
/// Settling time after powering off.
pub const POWER_OFF_HOLD: Duration = Duration::from_millis(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PowerState {
    #[default]
    Off,
    On,
    /// Powered with the firmware-select line asserted, so the controller
    /// boots into its download mode.
    OnWithFirmwareDownload,
}

impl PowerState {
    pub const fn is_powered(self) -> bool {
        !matches!(self, PowerState::Off)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLine {
    Enable,
    FirmwareSelect,
}

impl fmt::Display for PowerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerLine::Enable => f.write_str("enable"),
            PowerLine::FirmwareSelect => f.write_str("firmware select"),
        }
    }
}

pub(crate) struct PowerLines<P> {
    pub(crate) enable: P,
    pub(crate) firmware_select: P,
}

impl<P: Pin> PowerLines<P> {
    fn drive(&self, line: PowerLine, value: bool) -> Result<()> {
        let pin = match line {
            PowerLine::Enable => &self.enable,
            PowerLine::FirmwareSelect => &self.firmware_select,
        };
        pin.set(value).map_err(Error::Gpio)
    }

    /// Read `line` back and compare against the level it was driven to.
    fn verify(&self, line: PowerLine, expected: bool) -> Result<Option<Error>> {
        let pin = match line {
            PowerLine::Enable => &self.enable,
            PowerLine::FirmwareSelect => &self.firmware_select,
        };
        if pin.get().map_err(Error::Gpio)? == expected {
            return Ok(None);
        }
        log::error!(
            "{} line reads {} after being driven {}",
            line,
            if expected { "low" } else { "high" },
            if expected { "high" } else { "low" },
        );
        Ok(Some(Error::HardwareMismatch { line, expected }))
    }
}

/// Tracks the last completed transition and runs new ones.
///
/// The sequencer is not reentrant; the device keeps it behind the control
/// lock so transitions never interleave.
#[derive(Debug, Default)]
pub(crate) struct PowerSequencer {
    state: PowerState,
}

impl PowerSequencer {
    pub(crate) fn state(&self) -> PowerState {
        self.state
    }

    /// Run the full transition to `target`, blocking for its holds.
    ///
    /// A readback mismatch does not stop the sequence. It is returned once
    /// the transition has completed, and the state still advances since the
    /// lines are left as commanded. A GPIO failure aborts the sequence on the
    /// spot and leaves the recorded state untouched.
    pub(crate) fn set_power<P, L, S>(
        &mut self,
        target: PowerState,
        lines: &PowerLines<P>,
        gate: &InterruptGate<L>,
        platform: &S,
    ) -> Result<()>
    where
        P: Pin,
        L: IrqLine,
        S: Platform,
    {
        log::info!("power transition {:?} -> {:?}", self.state, target);

        let mismatch = match target {
            PowerState::OnWithFirmwareDownload => {
                // The controller only samples firmware select across a reset.
                lines.drive(PowerLine::Enable, true)?;
                lines.drive(PowerLine::FirmwareSelect, true)?;
                platform.sleep_for(FIRMWARE_HOLD);
                lines.drive(PowerLine::Enable, false)?;
                platform.sleep_for(FIRMWARE_HOLD);
                lines.drive(PowerLine::Enable, true)?;
                platform.sleep_for(FIRMWARE_HOLD);
                None
            }
            PowerState::On => {
                lines.drive(PowerLine::FirmwareSelect, false)?;
                lines.drive(PowerLine::Enable, true)?;
                let mismatch = lines.verify(PowerLine::Enable, true)?;
                gate.set_wake(true)?;
                platform.sleep_for(POWER_ON_HOLD);
                mismatch
            }
            PowerState::Off => {
                lines.drive(PowerLine::FirmwareSelect, false)?;
                lines.drive(PowerLine::Enable, false)?;
                let mismatch = lines.verify(PowerLine::Enable, false)?;
                gate.set_wake(false)?;
                platform.sleep_for(POWER_OFF_HOLD);
                mismatch
            }
        };

        self.state = target;
        match mismatch {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
