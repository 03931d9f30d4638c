// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The `pn547-cdev` crate drives an NXP PN547 NFC controller wired to a
//! two-wire bus, an enable line (`VEN`), a firmware-download select line and
//! a data-ready interrupt line.
//!
//! The controller speaks a message oriented protocol: the host writes a
//! command and the controller raises data-ready when its response (or an
//! unsolicited notification) is waiting. This crate provides:
//!
//! * power sequencing, including the reset into firmware-download mode;
//! * blocking and non-blocking reads that park on the data-ready interrupt
//!   and can be cancelled from another thread;
//! * writes that are never held up by a parked reader, while no two bus
//!   transfers ever overlap;
//! * an ioctl-style control entry point ([`Handle::control`]).
//!
//! The driver core is written against the traits in [`hal`]. The [`linux`]
//! module implements them with the GPIO v2 and i2c-dev character devices.
//!
//! # Examples
//!
//! Power the controller up, send `CORE_RESET_CMD` and wait for the response:
//!
//! ```no_run
//! use pn547_cdev::linux::{self, LinuxConfig};
//! use pn547_cdev::{DeviceConfig, LineOffsets, OpenFlags, PowerState};
//!
//! # fn main() -> Result<(), pn547_cdev::Error> {
//! let lines = LineOffsets {
//!     enable: 23,
//!     firmware_select: 24,
//!     data_ready: 25,
//! };
//! let device = linux::open(
//!     DeviceConfig::new(lines),
//!     &LinuxConfig::new("/dev/gpiochip0", "/dev/i2c-1"),
//! )?;
//!
//! let nfc = device.open(OpenFlags::empty())?;
//! nfc.set_power(PowerState::On)?;
//! nfc.write(&[0x20, 0x00, 0x01, 0x01])?;
//! let response = nfc.read_frame()?;
//! println!("CORE_RESET_RSP: {:02x?}", &response[..]);
//! # Ok(()) }
//! ```
//!
//! A second thread can release a reader parked waiting for data:
//!
//! ```no_run
//! # use pn547_cdev::{Error, Handle, hal::Hardware};
//! # fn demo<H: Hardware>(nfc: Handle<H>) {
//! let reader = nfc.clone();
//! let t = std::thread::spawn(move || reader.read_frame());
//! nfc.cancel_read();
//! assert!(matches!(t.join().unwrap(), Err(Error::Cancelled)));
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;

pub mod config;
pub mod device;
pub mod fixed_str;
mod gate;
pub mod hal;
pub mod power;
pub mod transfer;

#[cfg(feature = "linux")]
#[cfg_attr(docsrs, doc(cfg(feature = "linux")))]
pub mod linux;

#[cfg(feature = "linux")]
mod uapi;

#[cfg(feature = "async-tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
pub mod async_tokio;

#[cfg(test)]
mod mock;

pub use config::{DeviceConfig, LineOffsets, MismatchPolicy};
pub use device::{ControlRequest, Device, Handle, OpenFlags, PN547_SET_PWR};
pub use errors::{Error, Result};
pub use power::{PowerLine, PowerState};
pub use transfer::{Frame, ReadMode, MAX_TRANSFER_SIZE};

#[cfg(feature = "async-tokio")]
pub use async_tokio::AsyncHandle;
