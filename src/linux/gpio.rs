// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{self, Read, Result};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::path::Path;
use std::sync::Arc;

use crate::fixed_str::FixedStr;
use crate::hal::{Gpio, LineMode, Pin};
use crate::uapi::gpio::{
    self as uapi, gpio_line_attribute, gpio_line_attribute_union, LineAttrId, LineEventId,
    LineFlags, GPIO_MAX_NAME_SIZE,
};

/// Identity of an opened GPIO chip.
#[derive(Debug, Clone)]
pub struct ChipInfo {
    name: FixedStr<GPIO_MAX_NAME_SIZE>,
    label: FixedStr<GPIO_MAX_NAME_SIZE>,
    lines: u32,
}

impl ChipInfo {
    /// The name of the device driving this GPIO chip in the kernel
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// A functional name for this GPIO chip, such as a product number.  Might
    /// be an empty string.
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    pub const fn num_lines(&self) -> u32 {
        self.lines
    }
}

/// A GPIO chip character device (`/dev/gpiochipN`).
///
/// The controller's enable, firmware-select and data-ready lines must all
/// sit on the one chip.
#[derive(Debug)]
pub struct Chip {
    fd: OwnedFd,
    info: ChipInfo,
}

impl Chip {
    /// Open the GPIO Chip at the provided path (e.g. `/dev/gpiochip<N>`)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        let fd = OwnedFd::from(f);

        let mut info: uapi::gpio_chip_info = unsafe { std::mem::zeroed() };
        // Error condition: -1, already handled
        let _ = unsafe { uapi::gpio_get_chipinfo(fd.as_raw_fd(), &mut info)? };
        let info = ChipInfo {
            name: FixedStr::from_byte_array(info.name)?,
            label: FixedStr::from_byte_array(info.label)?,
            lines: info.lines,
        };
        log::debug!(
            "opened {} ({}, {} lines)",
            info.name(),
            info.label(),
            info.num_lines()
        );

        Ok(Self { fd, info })
    }

    pub fn info(&self) -> &ChipInfo {
        &self.info
    }

    /// Request exclusive use of the line at `offset`, labelled `consumer`.
    pub fn request_line(&self, offset: u32, consumer: &str, mode: LineMode) -> Result<LineHandle> {
        if offset >= self.info.lines {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "line {} out of range for {} ({} lines)",
                    offset,
                    self.info.name(),
                    self.info.lines
                ),
            ));
        }

        let mut req = uapi::gpio_line_request::zeroed();
        req.num_lines = 1;
        req.offsets[0] = offset;
        req.consumer = FixedStr::<GPIO_MAX_NAME_SIZE>::new(consumer)?.into_byte_array();
        match mode {
            LineMode::Output { initial } => {
                req.config.flags = LineFlags::OUTPUT;
                let values = gpio_line_attribute {
                    id: LineAttrId::OUTPUT_VALUES,
                    _padding: 0,
                    attribute: gpio_line_attribute_union {
                        values: u64::from(initial),
                    },
                };
                req.config.push_attr(values, 1);
            }
            LineMode::Interrupt => {
                req.config.flags = LineFlags::INPUT | LineFlags::EDGE_RISING;
            }
        }

        let line_fd = unsafe {
            let _ = uapi::gpio_get_line(self.fd.as_raw_fd(), &mut req)?;
            File::from_raw_fd(req.fd)
        };
        log::debug!("requested line {} as {:?} for {}", offset, mode, consumer);

        Ok(LineHandle {
            fd: Arc::new(line_fd),
            offset,
        })
    }
}

impl Gpio for Chip {
    type Pin = LineHandle;

    fn request(&mut self, offset: u32, consumer: &str, mode: LineMode) -> Result<LineHandle> {
        self.request_line(offset, consumer, mode)
    }
}

impl AsFd for Chip {
    #[inline(always)]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Handle to one requested line. The line is released when the last clone
/// is dropped.
#[derive(Debug, Clone)]
pub struct LineHandle {
    fd: Arc<File>,
    offset: u32,
}

/// A rising or falling edge read from an edge-detecting line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    pub timestamp_ns: u64,
    pub rising: bool,
    pub sequence: u32,
}

impl LineHandle {
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Read one queued edge event. Blocks if none is queued, so callers
    /// poll the fd first.
    pub(crate) fn read_event(&self) -> Result<LineEvent> {
        let mut buf = [0; uapi::gpio_line_event::SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            match (&*self.fd).read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "line event fd closed",
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        let event = unsafe { uapi::gpio_line_event::from_bytes(buf) };
        Ok(LineEvent {
            timestamp_ns: event.timestamp_ns,
            rising: event.id == LineEventId::RISING_EDGE,
            sequence: event.line_seqno,
        })
    }
}

impl Pin for LineHandle {
    fn get(&self) -> Result<bool> {
        let mut data = uapi::gpio_line_values { bits: 0, mask: 1 };
        unsafe {
            let _ = uapi::gpio_line_get_values(self.fd.as_raw_fd(), &mut data)?;
        }
        Ok(data.bits & 1 == 1)
    }

    fn set(&self, value: bool) -> Result<()> {
        let mut data = uapi::gpio_line_values {
            bits: u64::from(value),
            mask: 1,
        };
        unsafe {
            let _ = uapi::gpio_line_set_values(self.fd.as_raw_fd(), &mut data)?;
        }
        Ok(())
    }
}

impl AsFd for LineHandle {
    #[inline(always)]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
