// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io::{Error as IOError, ErrorKind as IOErrorKind};

use crate::config::ConfigError;
use crate::power::PowerLine;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-blocking read found no data waiting.
    #[error("No data available from the controller")]
    WouldBlock,
    /// A blocked read was released by an explicit cancel request.
    #[error("Pending read was cancelled")]
    Cancelled,
    /// The bus send or receive primitive failed.
    #[error("Bus transfer failed: {0}")]
    BusIo(#[source] IOError),
    /// The bus accepted fewer bytes than were handed to it.
    #[error("Bus transfer was short: {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },
    /// The bus endpoint returned more bytes than were asked for.
    #[error("Received {received} bytes for a {requested} byte read")]
    Protocol { requested: usize, received: usize },
    /// A power line read back a different level than it was driven to.
    #[error("Power line {line} does not read back {}", level_name(.expected))]
    HardwareMismatch { line: PowerLine, expected: bool },
    /// A recognised control opcode was given an argument it does not know.
    #[error("Invalid control argument {0}")]
    InvalidArgument(u64),
    #[error("Unsupported control operation {0:#x}")]
    UnsupportedOperation(u32),
    #[error("GPIO line access failed: {0}")]
    Gpio(#[source] IOError),
    #[error("Interrupt setup failed: {0}")]
    Interrupt(#[source] IOError),
    #[error("Invalid device configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Device has been detached")]
    Detached,
    #[error(transparent)]
    Io(#[from] IOError),
}

fn level_name(level: &bool) -> &'static str {
    if *level {
        "high"
    } else {
        "low"
    }
}

impl Error {
    /// True for the conditions the device contract reports as bus I/O failures.
    pub fn is_bus_error(&self) -> bool {
        matches!(self, Error::BusIo(_) | Error::ShortTransfer { .. })
    }

    fn io_kind(&self) -> IOErrorKind {
        match self {
            Error::WouldBlock => IOErrorKind::WouldBlock,
            Error::Cancelled => IOErrorKind::Interrupted,
            Error::BusIo(err) | Error::Gpio(err) | Error::Interrupt(err) | Error::Io(err) => {
                err.kind()
            }
            Error::ShortTransfer { .. } => IOErrorKind::WriteZero,
            Error::Protocol { .. } | Error::HardwareMismatch { .. } => IOErrorKind::InvalidData,
            Error::InvalidArgument(_) | Error::Config(_) => IOErrorKind::InvalidInput,
            Error::UnsupportedOperation(_) => IOErrorKind::Unsupported,
            Error::Detached => IOErrorKind::NotConnected,
        }
    }
}

impl From<Error> for IOError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => IOError::new(other.io_kind(), other),
        }
    }
}
