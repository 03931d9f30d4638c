// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{self, Read, Result, Write};
use std::os::fd::AsRawFd;
use std::path::Path;

use crate::hal::Bus;
use crate::uapi::i2c::{i2c_set_slave, I2C_ADDRESS_MAX};

/// An i2c-dev endpoint (`/dev/i2c-N`) bound to one target address.
///
/// Every `read` and `write` on the fd is a single bus message.
#[derive(Debug)]
pub struct I2cDevice {
    file: File,
    address: u16,
}

impl I2cDevice {
    pub fn open(path: impl AsRef<Path>, address: u16) -> Result<Self> {
        if address > I2C_ADDRESS_MAX {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("i2c address {:#x} is not a 7-bit address", address),
            ));
        }
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        unsafe {
            let _ = i2c_set_slave(file.as_raw_fd(), libc::c_int::from(address))?;
        }
        log::debug!("bound {} to address {:#04x}", path.as_ref().display(), address);
        Ok(Self { file, address })
    }

    pub fn address(&self) -> u16 {
        self.address
    }
}

impl Bus for I2cDevice {
    fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        loop {
            match self.file.write(bytes) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.file.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}
