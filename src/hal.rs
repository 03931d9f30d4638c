// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Boundary traits for the hardware the driver sits on.
//!
//! The driver core never talks to a kernel interface directly. It is handed
//! a bus endpoint, requests its three lines through a [`Gpio`] provider,
//! registers its data-ready handler through an [`Interrupts`] provider and
//! sleeps and holds the platform awake through a [`Platform`]. The
//! [`linux`](crate::linux) module implements all of them on top of the
//! GPIO and i2c-dev character devices.

use std::io::Result;
use std::sync::Arc;
use std::time::Duration;

/// The addressed two-wire bus endpoint of the controller.
///
/// Each call is one complete bus message: the controller's protocol is
/// message oriented, so a transfer is never split or resumed.
pub trait Bus: Send {
    /// Send `bytes` as one message, returning how many the bus accepted.
    fn send(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Receive one message into `buf`, returning the byte count the bus
    /// reports.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// A requested GPIO line. Dropping it releases the line.
pub trait Pin: Send + Sync {
    fn get(&self) -> Result<bool>;

    fn set(&self, value: bool) -> Result<()>;
}

/// How a line is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    /// Push-pull output driven to `initial` on request.
    Output { initial: bool },
    /// Input that raises an interrupt on its rising edge.
    Interrupt,
}

pub trait Gpio {
    type Pin: Pin;

    /// Reserve the line at `offset`. Fails if the line is unknown or already
    /// in use.
    fn request(&mut self, offset: u32, consumer: &str, mode: LineMode) -> Result<Self::Pin>;
}

/// Callback invoked from interrupt context when the data-ready line fires.
///
/// The handler never blocks on anything but the interrupt gate's short lock
/// and never touches the bus.
pub type IrqHandler = Arc<dyn Fn() + Send + Sync>;

/// A registered interrupt line.
///
/// Registration leaves the line unmasked. Dropping the line frees the
/// interrupt and must not return while the handler is still running, so no
/// handler invocation can outlive it. Implementations must never invoke the
/// handler synchronously from within `mask` or `unmask`.
pub trait IrqLine: Send + Sync {
    fn mask(&self);

    fn unmask(&self);

    /// Allow or forbid the line to wake the platform from suspend.
    fn set_wake(&self, enabled: bool) -> Result<()>;
}

pub trait Interrupts<P> {
    type Line: IrqLine;

    /// Attach `handler` to the interrupt raised by `pin`.
    fn register(&mut self, pin: &P, handler: IrqHandler) -> Result<Self::Line>;
}

/// Timing and power-management services of the host.
pub trait Platform: Send + Sync {
    fn sleep_for(&self, duration: Duration);

    /// Keep the platform out of idle for at most `duration`.
    fn prevent_idle_for(&self, duration: Duration);

    /// Drop an idle hold early.
    fn allow_idle(&self);
}

/// Ties together the concrete collaborator types of one backend.
pub trait Hardware: 'static {
    type Bus: Bus + 'static;
    type Pin: Pin + 'static;
    type Irq: IrqLine + 'static;
    type Platform: Platform + 'static;
}
