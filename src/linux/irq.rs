// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Data-ready interrupts from GPIO edge events.
//!
//! The kernel queues an event on the line's fd for each rising edge. A
//! dedicated thread waits on that fd and on a shutdown pipe, and runs the
//! handler for every edge seen while the line is unmasked.

use std::fs::File;
use std::io::{self, Result, Write};
use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout};

use super::gpio::LineHandle;
use crate::hal::{Interrupts, IrqHandler, IrqLine};

const THREAD_NAME: &str = "pn547-irq";

#[derive(Debug, Default)]
pub struct EdgeInterrupts;

impl Interrupts<LineHandle> for EdgeInterrupts {
    type Line = EdgeIrq;

    fn register(&mut self, pin: &LineHandle, handler: IrqHandler) -> Result<EdgeIrq> {
        EdgeIrq::spawn(pin.clone(), handler)
    }
}

#[derive(Debug, Default)]
struct IrqState {
    masked: AtomicBool,
    wake: AtomicBool,
    faults: AtomicUsize,
}

impl IrqState {
    fn record_fault(&self, err: &io::Error, what: &str) {
        let faults = self.faults.fetch_add(1, Ordering::AcqRel) + 1;
        log::error!("{} failed ({} faults so far): {}", what, faults, err);
    }
}

/// A registered data-ready interrupt. Dropping it stops and joins the event
/// thread.
pub struct EdgeIrq {
    state: Arc<IrqState>,
    stop: File,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl EdgeIrq {
    fn spawn(line: LineHandle, handler: IrqHandler) -> Result<Self> {
        let (stop_rx, stop_tx) = pipe()?;
        let state = Arc::new(IrqState::default());

        let thread = {
            let state = state.clone();
            std::thread::Builder::new()
                .name(THREAD_NAME.to_owned())
                .spawn(move || run(&line, &stop_rx, &state, &handler))?
        };
        let thread_id = thread.thread().id();
        log::debug!("interrupt thread started");

        Ok(Self {
            state,
            stop: File::from(stop_tx),
            thread: Some(thread),
            thread_id,
        })
    }

    pub fn is_wake_source(&self) -> bool {
        self.state.wake.load(Ordering::Acquire)
    }

    /// Poll and read failures the event thread has recovered from.
    pub fn faults(&self) -> usize {
        self.state.faults.load(Ordering::Acquire)
    }
}

impl IrqLine for EdgeIrq {
    fn mask(&self) {
        self.state.masked.store(true, Ordering::Release);
    }

    fn unmask(&self) {
        self.state.masked.store(false, Ordering::Release);
    }

    fn set_wake(&self, enabled: bool) -> Result<()> {
        // User space cannot mark a wake source; remember the request.
        self.state.wake.store(enabled, Ordering::Release);
        log::debug!("data-ready wake source {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }
}

impl Drop for EdgeIrq {
    fn drop(&mut self) {
        self.mask();
        if let Err(err) = (&self.stop).write_all(&[1]) {
            log::error!("failed to signal interrupt thread: {}", err);
        }
        // The last device reference can be dropped by the handler itself.
        if std::thread::current().id() == self.thread_id {
            return;
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("interrupt handler panicked");
            }
        }
    }
}

/// Pause after a failed poll or read so a persistent fault does not spin.
const FAULT_BACKOFF: Duration = Duration::from_millis(10);

fn run(line: &LineHandle, stop: &OwnedFd, state: &IrqState, handler: &IrqHandler) {
    loop {
        let (event_ready, stop_ready) = match wait_for_readable(line.as_fd(), stop.as_fd()) {
            Ok(ready) => ready,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                state.record_fault(&err, "polling data-ready line");
                std::thread::sleep(FAULT_BACKOFF);
                continue;
            }
        };
        if stop_ready {
            log::debug!("interrupt thread stopping");
            return;
        }
        if !event_ready {
            continue;
        }

        let event = match line.read_event() {
            Ok(event) => event,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                log::error!("data-ready event fd closed, interrupt thread stopping");
                return;
            }
            Err(err) => {
                state.record_fault(&err, "reading data-ready event");
                std::thread::sleep(FAULT_BACKOFF);
                continue;
            }
        };
        if !event.rising {
            continue;
        }
        if state.masked.load(Ordering::Acquire) {
            log::trace!("edge {} while masked, dropped", event.sequence);
            continue;
        }
        handler();
    }
}

/// Block until the event fd or the stop pipe becomes readable.
fn wait_for_readable(events: BorrowedFd<'_>, stop: BorrowedFd<'_>) -> Result<(bool, bool)> {
    let mut fds = [
        PollFd::new(events, PollFlags::POLLIN),
        PollFd::new(stop, PollFlags::POLLIN),
    ];
    nix::poll::poll(&mut fds, PollTimeout::NONE)?;

    let readable = |fd: &PollFd<'_>| {
        fd.revents()
            .map_or(false, |r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR))
    };
    Ok((readable(&fds[0]), readable(&fds[1])))
}

pub(super) fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}
