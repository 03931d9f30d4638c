// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The blocking read state machine and bus serialization.
//!
//! A read that finds the data-ready line low arms the interrupt and parks on
//! a condition variable until the handler reports data or a cancel request
//! arrives. Two locks serialize the bus:
//!
//! * the read lock, held by one reader for its whole sequence, so only one
//!   caller is ever parked waiting for data;
//! * the bus lock, held by a reader or writer only around its single bus
//!   transfer, so a parked reader never holds up a command write.
//!
//! Lock order is read lock, then bus lock. The handler takes neither.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::gate::InterruptGate;
use crate::hal::{Bus, IrqLine, Pin, Platform};

/// Largest single transfer in either direction.
pub const MAX_TRANSFER_SIZE: usize = 512;

/// A received message, sized to what the bus returned.
pub type Frame = heapless::Vec<u8, MAX_TRANSFER_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Blocking,
    NonBlocking,
}

#[derive(Debug, Default)]
struct SignalState {
    data_pending: bool,
    cancel_requested: bool,
    waiting: bool,
}

/// Single-slot wakeup shared between the handler, the reader and cancel.
#[derive(Debug, Default)]
pub(crate) struct ReadSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

/// Why a parked reader woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Data,
    Cancelled,
}

impl ReadSignal {
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reset the per-wait flags ahead of arming the interrupt.
    fn prepare(&self) {
        let mut state = self.lock();
        state.data_pending = false;
        state.cancel_requested = false;
        state.waiting = true;
    }

    /// Called from the handler once data is known to be ready.
    pub(crate) fn notify_data(&self) {
        let mut state = self.lock();
        state.data_pending = true;
        self.cond.notify_one();
    }

    pub(crate) fn cancel(&self) {
        let mut state = self.lock();
        state.cancel_requested = true;
        if !state.waiting {
            log::debug!("cancel requested with no reader waiting");
        }
        self.cond.notify_all();
    }

    fn wait(&self) -> Wake {
        let mut state = self.lock();
        while !state.data_pending && !state.cancel_requested {
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.waiting = false;
        state.data_pending = false;
        if state.cancel_requested {
            state.cancel_requested = false;
            Wake::Cancelled
        } else {
            Wake::Data
        }
    }

    fn wait_abandoned(&self) {
        let mut state = self.lock();
        state.waiting = false;
        state.data_pending = false;
    }

    #[cfg(test)]
    pub(crate) fn is_waiting(&self) -> bool {
        self.lock().waiting
    }
}

/// Holds the platform out of idle for the life of one read.
struct WakeGuard<'a, S: Platform> {
    platform: &'a S,
}

impl<'a, S: Platform> WakeGuard<'a, S> {
    fn hold(platform: &'a S, duration: Duration) -> Self {
        platform.prevent_idle_for(duration);
        Self { platform }
    }
}

impl<S: Platform> Drop for WakeGuard<'_, S> {
    fn drop(&mut self) {
        self.platform.allow_idle();
    }
}

/// Everything a read touches besides the bus.
pub(crate) struct ReadPath<'a, P, L, S> {
    pub(crate) data_ready: &'a P,
    pub(crate) gate: &'a InterruptGate<L>,
    pub(crate) platform: &'a S,
    pub(crate) idle_hint: Duration,
}

pub(crate) struct TransferCoordinator<B> {
    read_lock: Mutex<()>,
    bus: Mutex<Option<B>>,
    pub(crate) signal: ReadSignal,
}

impl<B: Bus> TransferCoordinator<B> {
    pub(crate) fn new(bus: B) -> Self {
        Self {
            read_lock: Mutex::new(()),
            bus: Mutex::new(Some(bus)),
            signal: ReadSignal::default(),
        }
    }

    fn lock_bus(&self) -> MutexGuard<'_, Option<B>> {
        self.bus.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read one message of at most `buf.len()` bytes (capped at
    /// [`MAX_TRANSFER_SIZE`]) into `buf`.
    pub(crate) fn read<P, L, S>(
        &self,
        buf: &mut [u8],
        mode: ReadMode,
        path: ReadPath<'_, P, L, S>,
    ) -> Result<usize>
    where
        P: Pin,
        L: IrqLine,
        S: Platform,
    {
        let len = buf.len().min(MAX_TRANSFER_SIZE);
        if len == 0 {
            return Ok(0);
        }

        let hint = WakeGuard::hold(path.platform, path.idle_hint);
        let sequence = self.read_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.lock_bus().is_none() {
            return Err(Error::Detached);
        }

        if !path.data_ready.get().map_err(Error::Gpio)? {
            if mode == ReadMode::NonBlocking {
                return Err(Error::WouldBlock);
            }
            self.wait_for_data(&path)?;
        }

        let mut frame = [0u8; MAX_TRANSFER_SIZE];
        let received = {
            let mut bus = self.lock_bus();
            let bus = bus.as_mut().ok_or(Error::Detached)?;
            bus.receive(&mut frame[..len])
        };
        drop(sequence);
        drop(hint);

        let received = received.map_err(|err| {
            log::error!("bus receive failed: {}", err);
            Error::BusIo(err)
        })?;
        if received > len {
            log::error!("received too many bytes from bus ({} > {})", received, len);
            return Err(Error::Protocol {
                requested: len,
                received,
            });
        }

        log::trace!("read {} bytes", received);
        buf[..received].copy_from_slice(&frame[..received]);
        Ok(received)
    }

    fn wait_for_data<P, L, S>(&self, path: &ReadPath<'_, P, L, S>) -> Result<()>
    where
        P: Pin,
        L: IrqLine,
        S: Platform,
    {
        self.signal.prepare();
        path.gate.arm();

        // An edge that arrived between the first check and arming may not be
        // replayed by the controller.
        match path.data_ready.get() {
            Ok(true) => self.signal.notify_data(),
            Ok(false) => {}
            Err(err) => {
                path.gate.disarm();
                self.signal.wait_abandoned();
                return Err(Error::Gpio(err));
            }
        }

        log::debug!("waiting for data-ready");
        let wake = self.signal.wait();
        path.gate.disarm();

        match wake {
            Wake::Data => Ok(()),
            Wake::Cancelled => {
                log::debug!("pending read cancelled");
                Err(Error::Cancelled)
            }
        }
    }

    /// Send `bytes` (capped at [`MAX_TRANSFER_SIZE`]) as one message.
    pub(crate) fn write(&self, bytes: &[u8]) -> Result<usize> {
        let len = bytes.len().min(MAX_TRANSFER_SIZE);
        let sent = {
            let mut bus = self.lock_bus();
            let bus = bus.as_mut().ok_or(Error::Detached)?;
            bus.send(&bytes[..len])
        };

        let sent = sent.map_err(|err| {
            log::error!("bus send failed: {}", err);
            Error::BusIo(err)
        })?;
        if sent != len {
            log::error!("bus send accepted {} of {} bytes", sent, len);
            return Err(Error::ShortTransfer {
                expected: len,
                actual: sent,
            });
        }

        log::trace!("wrote {} bytes", sent);
        Ok(sent)
    }

    /// Wait out any read or write in flight, then take the bus out.
    pub(crate) fn shut_down(&self) -> Option<B> {
        let _sequence = self.read_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.lock_bus().take()
    }
}
