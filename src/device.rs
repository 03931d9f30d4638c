// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};

use bitflags::bitflags;

use crate::config::{
    DeviceConfig, MismatchPolicy, DATA_READY_CONSUMER, ENABLE_CONSUMER, FIRMWARE_CONSUMER,
};
use crate::errors::{Error, Result};
use crate::gate::InterruptGate;
use crate::hal::{Gpio, Hardware, Interrupts, IrqHandler, LineMode, Pin};
use crate::power::{PowerLines, PowerSequencer, PowerState};
use crate::transfer::{Frame, ReadMode, ReadPath, TransferCoordinator, MAX_TRANSFER_SIZE};

/// ioctl type byte of the controller's control interface.
pub const PN547_MAGIC: u8 = 0xE9;

/// `_IOW(0xE9, 0x01, unsigned int)`: the power control request. Its argument
/// selects the operation, see [`ControlRequest`].
pub const PN547_SET_PWR: u32 =
    nix::request_code_write!(PN547_MAGIC, 0x01, std::mem::size_of::<libc::c_uint>()) as u32;

/// Arguments accepted by [`PN547_SET_PWR`].
pub mod power_arg {
    pub const OFF: u64 = 0;
    pub const ON: u64 = 1;
    pub const ON_FIRMWARE_DOWNLOAD: u64 = 2;
    pub const CANCEL_READ: u64 = 3;
}

/// A decoded control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    SetPower(PowerState),
    /// Release a reader parked waiting for data.
    CancelRead,
}

impl ControlRequest {
    pub fn decode(cmd: u32, arg: u64) -> Result<Self> {
        if cmd != PN547_SET_PWR {
            log::error!("unsupported control request {:#x}", cmd);
            return Err(Error::UnsupportedOperation(cmd));
        }
        match arg {
            power_arg::OFF => Ok(Self::SetPower(PowerState::Off)),
            power_arg::ON => Ok(Self::SetPower(PowerState::On)),
            power_arg::ON_FIRMWARE_DOWNLOAD => Ok(Self::SetPower(PowerState::OnWithFirmwareDownload)),
            power_arg::CANCEL_READ => Ok(Self::CancelRead),
            other => {
                log::error!("bad power control argument {}", other);
                Err(Error::InvalidArgument(other))
            }
        }
    }

    pub const fn encode(self) -> (u32, u64) {
        let arg = match self {
            Self::SetPower(PowerState::Off) => power_arg::OFF,
            Self::SetPower(PowerState::On) => power_arg::ON,
            Self::SetPower(PowerState::OnWithFirmwareDownload) => power_arg::ON_FIRMWARE_DOWNLOAD,
            Self::CancelRead => power_arg::CANCEL_READ,
        };
        (PN547_SET_PWR, arg)
    }
}

bitflags! {
    /// Per-open flags.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Fail reads with [`Error::WouldBlock`] instead of waiting for data.
        const NONBLOCK = (1 << 0);
    }
}

struct Lines<P> {
    power: PowerLines<P>,
    data_ready: P,
}

/// State shared by every handle and the interrupt handler.
struct Shared<H: Hardware> {
    config: DeviceConfig,
    platform: H::Platform,
    gate: InterruptGate<H::Irq>,
    lines: RwLock<Option<Lines<H::Pin>>>,
    power: Mutex<PowerSequencer>,
    transfer: TransferCoordinator<H::Bus>,
    detached: AtomicBool,
}

impl<H: Hardware> Shared<H> {
    /// Interrupt context: only the gate and signal locks are taken.
    fn on_data_ready(&self) {
        let lines = match self.lines.try_read() {
            Ok(lines) => lines,
            Err(_) => return,
        };
        let ready = match lines.as_ref().map(|lines| lines.data_ready.get()) {
            Some(Ok(ready)) => ready,
            Some(Err(err)) => {
                log::warn!("data-ready line read failed in handler: {}", err);
                return;
            }
            None => return,
        };
        drop(lines);

        if !ready {
            log::trace!("spurious data-ready interrupt");
            return;
        }

        self.gate.disarm();
        self.transfer.signal.notify_data();
    }

    fn check_attached(&self) -> Result<()> {
        if self.detached.load(Ordering::Acquire) {
            return Err(Error::Detached);
        }
        Ok(())
    }

    fn read(&self, buf: &mut [u8], mode: ReadMode) -> Result<usize> {
        self.check_attached()?;
        let lines = self.lines.read().unwrap_or_else(PoisonError::into_inner);
        let lines = lines.as_ref().ok_or(Error::Detached)?;
        self.transfer.read(
            buf,
            mode,
            ReadPath {
                data_ready: &lines.data_ready,
                gate: &self.gate,
                platform: &self.platform,
                idle_hint: self.config.idle_hint,
            },
        )
    }

    fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.check_attached()?;
        self.transfer.write(bytes)
    }

    fn set_power(&self, target: PowerState) -> Result<()> {
        self.check_attached()?;
        let mut sequencer = self.power.lock().unwrap_or_else(PoisonError::into_inner);
        let lines = self.lines.read().unwrap_or_else(PoisonError::into_inner);
        let lines = lines.as_ref().ok_or(Error::Detached)?;

        match sequencer.set_power(target, &lines.power, &self.gate, &self.platform) {
            Err(err @ Error::HardwareMismatch { .. })
                if self.config.mismatch_policy == MismatchPolicy::Log =>
            {
                log::warn!("continuing after power fault: {}", err);
                Ok(())
            }
            other => other,
        }
    }

    fn power_state(&self) -> PowerState {
        self.power
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("detaching, waiting for transfers in flight");
        if self.power_state().is_powered() {
            log::warn!("detaching with the controller still powered");
        }

        let bus = self.transfer.shut_down();
        drop(self.gate.release());
        let lines = self
            .lines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(lines);
        drop(bus);

        log::info!("detached");
    }
}

/// One attached controller.
///
/// Dropping the device detaches it: it waits for any read or write in
/// flight, then frees the interrupt, the GPIO lines and the bus. Handles
/// that outlive it fail every call with [`Error::Detached`].
pub struct Device<H: Hardware> {
    shared: Arc<Shared<H>>,
}

impl<H: Hardware> Device<H> {
    /// Reserve the lines, register the data-ready handler and leave the
    /// interrupt masked until a reader needs it.
    pub fn attach<G, I>(
        config: DeviceConfig,
        bus: H::Bus,
        gpio: &mut G,
        interrupts: &mut I,
        platform: H::Platform,
    ) -> Result<Self>
    where
        G: Gpio<Pin = H::Pin>,
        I: Interrupts<H::Pin, Line = H::Irq>,
    {
        config.validate()?;
        let offsets = config.lines;

        let data_ready = gpio
            .request(offsets.data_ready, DATA_READY_CONSUMER, LineMode::Interrupt)
            .map_err(Error::Gpio)?;
        let firmware_select = gpio
            .request(
                offsets.firmware_select,
                FIRMWARE_CONSUMER,
                LineMode::Output { initial: false },
            )
            .map_err(Error::Gpio)?;
        let enable = gpio
            .request(
                offsets.enable,
                ENABLE_CONSUMER,
                LineMode::Output { initial: false },
            )
            .map_err(Error::Gpio)?;

        // The handler exists before the state it reports into.
        let slot: Arc<OnceLock<Weak<Shared<H>>>> = Arc::default();
        let handler: IrqHandler = {
            let slot = slot.clone();
            Arc::new(move || {
                if let Some(shared) = slot.get().and_then(Weak::upgrade) {
                    shared.on_data_ready();
                }
            })
        };
        let line = interrupts
            .register(&data_ready, handler)
            .map_err(Error::Interrupt)?;

        let shared = Arc::new(Shared {
            config,
            platform,
            gate: InterruptGate::new(line),
            lines: RwLock::new(Some(Lines {
                power: PowerLines {
                    enable,
                    firmware_select,
                },
                data_ready,
            })),
            power: Mutex::new(PowerSequencer::default()),
            transfer: TransferCoordinator::new(bus),
            detached: AtomicBool::new(false),
        });
        let _ = slot.set(Arc::downgrade(&shared));
        shared.gate.disarm();

        log::info!(
            "attached: enable {}, firmware select {}, data-ready {}",
            offsets.enable,
            offsets.firmware_select,
            offsets.data_ready
        );
        Ok(Self { shared })
    }

    /// Open a handle on the device. All handles share the one controller.
    pub fn open(&self, flags: OpenFlags) -> Result<Handle<H>> {
        self.shared.check_attached()?;
        Ok(Handle {
            shared: self.shared.clone(),
            flags,
        })
    }

    pub fn detach(self) {
        drop(self)
    }
}

impl<H: Hardware> Drop for Device<H> {
    fn drop(&mut self) {
        self.shared.detach();
    }
}

/// An open handle, the equivalent of one open file on the device node.
pub struct Handle<H: Hardware> {
    shared: Arc<Shared<H>>,
    flags: OpenFlags,
}

impl<H: Hardware> Clone for Handle<H> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            flags: self.flags,
        }
    }
}

impl<H: Hardware> Handle<H> {
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.flags.set(OpenFlags::NONBLOCK, nonblocking);
    }

    fn mode(&self) -> ReadMode {
        if self.flags.contains(OpenFlags::NONBLOCK) {
            ReadMode::NonBlocking
        } else {
            ReadMode::Blocking
        }
    }

    /// Read one message from the controller into `buf`.
    ///
    /// Without [`OpenFlags::NONBLOCK`] this waits, without a timeout, for the
    /// controller to raise data-ready or for [`Handle::cancel_read`].
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.shared.read(buf, self.mode())
    }

    /// Read one message of up to [`MAX_TRANSFER_SIZE`] bytes.
    pub fn read_frame(&self) -> Result<Frame> {
        let mut buf = [0u8; MAX_TRANSFER_SIZE];
        let n = self.read(&mut buf)?;
        Ok(buf[..n].iter().copied().collect())
    }

    /// Send `bytes` to the controller as one message.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.shared.write(bytes)
    }

    /// Raw control entry point, as an ioctl would reach it.
    pub fn control(&self, cmd: u32, arg: u64) -> Result<()> {
        self.request(ControlRequest::decode(cmd, arg)?)
    }

    pub fn request(&self, request: ControlRequest) -> Result<()> {
        match request {
            ControlRequest::SetPower(target) => self.set_power(target),
            ControlRequest::CancelRead => {
                self.cancel_read();
                Ok(())
            }
        }
    }

    pub fn set_power(&self, target: PowerState) -> Result<()> {
        self.shared.set_power(target)
    }

    /// Release a parked reader with [`Error::Cancelled`]. A no-op if nobody
    /// is waiting.
    pub fn cancel_read(&self) {
        self.shared.transfer.signal.cancel();
    }

    /// The last power transition that ran to completion.
    pub fn power_state(&self) -> PowerState {
        self.shared.power_state()
    }

    pub fn is_interrupt_armed(&self) -> bool {
        self.shared.gate.is_armed()
    }
}

impl<H: Hardware> io::Read for Handle<H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Handle::read(self, buf).map_err(io::Error::from)
    }
}

impl<H: Hardware> io::Write for Handle<H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Handle::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
