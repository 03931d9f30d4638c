// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::{Mutex, MutexGuard};

use crate::errors::{Error, Result};
use crate::hal::IrqLine;

struct GateState<L> {
    enabled: bool,
    line: Option<L>,
}

/// Owner of the data-ready interrupt's mask state.
///
/// `enabled` mirrors the controller exactly: it is only changed together with
/// a mask or unmask call, under a lock that is held for nothing else. The
/// handler takes this lock, so it is never held across a bus transfer or a
/// wait.
pub struct InterruptGate<L> {
    state: Mutex<GateState<L>>,
}

impl<L: IrqLine> InterruptGate<L> {
    /// Wrap a freshly registered line. Registration leaves it unmasked.
    pub(crate) fn new(line: L) -> Self {
        Self {
            state: Mutex::new(GateState {
                enabled: true,
                line: Some(line),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState<L>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Unmask the interrupt unless it already is.
    pub fn arm(&self) {
        let mut state = self.lock();
        if state.enabled {
            return;
        }
        if let Some(line) = state.line.as_ref() {
            line.unmask();
            state.enabled = true;
            log::debug!("data-ready interrupt armed");
        }
    }

    /// Mask the interrupt unless it already is. Safe from the handler.
    pub fn disarm(&self) {
        let mut state = self.lock();
        if !state.enabled {
            return;
        }
        if let Some(line) = state.line.as_ref() {
            line.mask();
        }
        state.enabled = false;
        log::debug!("data-ready interrupt disarmed");
    }

    pub fn is_armed(&self) -> bool {
        self.lock().enabled
    }

    pub(crate) fn set_wake(&self, enabled: bool) -> Result<()> {
        let state = self.lock();
        let line = state.line.as_ref().ok_or(Error::Detached)?;
        line.set_wake(enabled).map_err(Error::Interrupt)
    }

    /// Mask the line and hand it back so the caller can free it outside the
    /// gate lock. Freeing waits for a running handler, which may itself be
    /// waiting on this lock.
    pub(crate) fn release(&self) -> Option<L> {
        let mut state = self.lock();
        let line = state.line.take();
        if state.enabled {
            if let Some(line) = line.as_ref() {
                line.mask();
            }
            state.enabled = false;
        }
        line
    }
}
