// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! User-space backend on the GPIO v2 and i2c-dev character devices.
//!
//! ```no_run
//! use pn547_cdev::linux::{self, LinuxConfig};
//! use pn547_cdev::{DeviceConfig, LineOffsets, OpenFlags, PowerState};
//!
//! # fn main() -> Result<(), pn547_cdev::Error> {
//! let lines = LineOffsets { enable: 23, firmware_select: 24, data_ready: 25 };
//! let device = linux::open(
//!     DeviceConfig::new(lines),
//!     &LinuxConfig::new("/dev/gpiochip0", "/dev/i2c-1"),
//! )?;
//! let nfc = device.open(OpenFlags::empty())?;
//! nfc.set_power(PowerState::On)?;
//! nfc.write(&[0x20, 0x00, 0x01, 0x01])?;
//! let response = nfc.read_frame()?;
//! println!("{:02x?}", &response[..]);
//! # Ok(()) }
//! ```

use std::path::{Path, PathBuf};

use crate::config::DeviceConfig;
use crate::device::Device;
use crate::errors::{Error, Result};
use crate::hal::Hardware;

pub mod gpio;
pub mod i2c;
pub mod irq;
pub mod system;

pub use gpio::{Chip, ChipInfo, LineHandle};
pub use i2c::I2cDevice;
pub use irq::{EdgeInterrupts, EdgeIrq};
pub use system::LinuxPlatform;

/// Default 7-bit bus address of the controller.
pub const DEFAULT_ADDRESS: u16 = 0x28;

#[derive(Debug)]
pub struct LinuxHardware;

impl Hardware for LinuxHardware {
    type Bus = I2cDevice;
    type Pin = LineHandle;
    type Irq = EdgeIrq;
    type Platform = LinuxPlatform;
}

pub type LinuxDevice = Device<LinuxHardware>;

/// Where the controller is wired on a Linux host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxConfig {
    pub gpio_chip: PathBuf,
    pub i2c_bus: PathBuf,
    pub address: u16,
    /// Directory with the `wake_lock`/`wake_unlock` files, `None` to never
    /// take wake locks.
    pub wake_lock: Option<PathBuf>,
}

impl LinuxConfig {
    pub fn new(gpio_chip: impl AsRef<Path>, i2c_bus: impl AsRef<Path>) -> Self {
        Self {
            gpio_chip: gpio_chip.as_ref().to_path_buf(),
            i2c_bus: i2c_bus.as_ref().to_path_buf(),
            address: DEFAULT_ADDRESS,
            wake_lock: Some(PathBuf::from(system::DEFAULT_WAKE_LOCK_DIR)),
        }
    }

    pub fn with_address(self, address: u16) -> Self {
        Self { address, ..self }
    }

    pub fn with_wake_lock(self, wake_lock: Option<PathBuf>) -> Self {
        Self { wake_lock, ..self }
    }
}

/// Open the chip and bus named by `linux` and attach the controller.
pub fn open(config: DeviceConfig, linux: &LinuxConfig) -> Result<LinuxDevice> {
    config.validate()?;
    let mut chip = Chip::open(&linux.gpio_chip).map_err(Error::Gpio)?;
    let bus = I2cDevice::open(&linux.i2c_bus, linux.address).map_err(Error::BusIo)?;
    let platform = match &linux.wake_lock {
        Some(dir) => LinuxPlatform::with_wake_lock_dir(dir),
        None => LinuxPlatform::without_wake_lock(),
    };

    Device::attach(config, bus, &mut chip, &mut EdgeInterrupts, platform)
}
