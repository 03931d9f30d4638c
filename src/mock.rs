// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Recording stand-ins for the hardware traits, shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{DeviceConfig, LineOffsets};
use crate::device::Device;
use crate::hal::{Bus, Gpio, Hardware, Interrupts, IrqHandler, IrqLine, LineMode, Pin, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Set(&'static str, bool),
    Sleep(Duration),
    Mask,
    Unmask,
    Wake(bool),
    IdleHold(Duration),
    IdleRelease,
    Send(usize),
    Receive(usize),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Spin until `cond` holds, failing the test after a generous deadline.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Debug, Default)]
struct PinState {
    level: AtomicBool,
    stuck: Mutex<Option<bool>>,
    fail_writes: AtomicBool,
    rise_after: Mutex<Option<usize>>,
    fail_after: Mutex<Option<usize>>,
}

#[derive(Debug, Clone)]
pub struct MockPin {
    name: &'static str,
    state: Arc<PinState>,
    log: Option<EventLog>,
}

impl MockPin {
    pub fn new(name: &'static str, level: bool) -> Self {
        let state = PinState::default();
        state.level.store(level, Ordering::SeqCst);
        Self {
            name,
            state: Arc::new(state),
            log: None,
        }
    }

    pub fn logged(self, log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..self
        }
    }

    pub fn level(&self) -> bool {
        self.state.level.load(Ordering::SeqCst)
    }

    /// Change the level from the controller's side, unrecorded.
    pub fn drive(&self, level: bool) {
        self.state.level.store(level, Ordering::SeqCst);
    }

    /// Make reads return `level` regardless of what is driven.
    pub fn stick_at(&self, level: Option<bool>) {
        *self.state.stuck.lock().unwrap() = level;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Read low for the next `reads` reads, then high.
    pub fn rise_after_reads(&self, reads: usize) {
        *self.state.rise_after.lock().unwrap() = Some(reads);
    }

    /// Let the next `reads` reads through, then fail every read.
    pub fn fail_reads_after(&self, reads: usize) {
        *self.state.fail_after.lock().unwrap() = Some(reads);
    }

    /// Number of live handles to this line, including the caller's.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.state)
    }
}

impl Pin for MockPin {
    fn get(&self) -> io::Result<bool> {
        if let Some(remaining) = self.state.fail_after.lock().unwrap().as_mut() {
            if *remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "line read failed"));
            }
            *remaining -= 1;
        }
        let mut rise_after = self.state.rise_after.lock().unwrap();
        if let Some(remaining) = rise_after.as_mut() {
            if *remaining == 0 {
                *rise_after = None;
                self.drive(true);
            } else {
                *remaining -= 1;
                return Ok(false);
            }
        }
        if let Some(level) = *self.state.stuck.lock().unwrap() {
            return Ok(level);
        }
        Ok(self.level())
    }

    fn set(&self, value: bool) -> io::Result<()> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "line write failed"));
        }
        self.state.level.store(value, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.push(Event::Set(self.name, value));
        }
        Ok(())
    }
}

/// Hands out pre-built pins by offset and refuses double requests.
#[derive(Debug, Default)]
pub struct MockGpio {
    pins: HashMap<u32, MockPin>,
    requested: HashSet<u32>,
    consumers: Vec<(u32, String)>,
}

impl MockGpio {
    pub fn with_pin(mut self, offset: u32, pin: MockPin) -> Self {
        self.pins.insert(offset, pin);
        self
    }

    pub fn consumers(&self) -> &[(u32, String)] {
        &self.consumers
    }
}

impl Gpio for MockGpio {
    type Pin = MockPin;

    fn request(&mut self, offset: u32, consumer: &str, mode: LineMode) -> io::Result<MockPin> {
        let pin = self
            .pins
            .get(&offset)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such line"))?;
        if !self.requested.insert(offset) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "line busy"));
        }
        if let LineMode::Output { initial } = mode {
            pin.set(initial)?;
        }
        self.consumers.push((offset, consumer.to_owned()));
        Ok(pin)
    }
}

struct IrqState {
    masked: AtomicBool,
    mask_calls: AtomicUsize,
    unmask_calls: AtomicUsize,
    wake: Mutex<Option<bool>>,
    handler: Mutex<Option<IrqHandler>>,
    freed: AtomicBool,
    log: Option<EventLog>,
}

impl IrqState {
    fn record(&self, event: Event) {
        if let Some(log) = &self.log {
            log.push(event);
        }
    }
}

/// The registered line, owned by the driver. Dropping it frees the
/// interrupt.
pub struct MockIrqLine {
    state: Arc<IrqState>,
}

impl MockIrqLine {
    pub fn probe(&self) -> IrqProbe {
        IrqProbe {
            state: self.state.clone(),
        }
    }
}

impl IrqLine for MockIrqLine {
    fn mask(&self) {
        self.state.masked.store(true, Ordering::SeqCst);
        self.state.mask_calls.fetch_add(1, Ordering::SeqCst);
        self.state.record(Event::Mask);
    }

    fn unmask(&self) {
        self.state.masked.store(false, Ordering::SeqCst);
        self.state.unmask_calls.fetch_add(1, Ordering::SeqCst);
        self.state.record(Event::Unmask);
    }

    fn set_wake(&self, enabled: bool) -> io::Result<()> {
        *self.state.wake.lock().unwrap() = Some(enabled);
        self.state.record(Event::Wake(enabled));
        Ok(())
    }
}

impl Drop for MockIrqLine {
    fn drop(&mut self) {
        self.state.handler.lock().unwrap().take();
        self.state.freed.store(true, Ordering::SeqCst);
    }
}

/// Test-side view of an interrupt line: observes the mask and raises edges.
#[derive(Clone)]
pub struct IrqProbe {
    state: Arc<IrqState>,
}

impl IrqProbe {
    pub fn is_masked(&self) -> bool {
        self.state.masked.load(Ordering::SeqCst)
    }

    pub fn mask_calls(&self) -> usize {
        self.state.mask_calls.load(Ordering::SeqCst)
    }

    pub fn unmask_calls(&self) -> usize {
        self.state.unmask_calls.load(Ordering::SeqCst)
    }

    pub fn wake(&self) -> Option<bool> {
        *self.state.wake.lock().unwrap()
    }

    pub fn is_freed(&self) -> bool {
        self.state.freed.load(Ordering::SeqCst)
    }

    /// Raise an edge. The handler runs on the calling thread if the line is
    /// registered and unmasked; returns whether it ran.
    pub fn fire(&self) -> bool {
        if self.is_masked() {
            return false;
        }
        let handler = self.state.handler.lock().unwrap().clone();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct MockInterrupts {
    log: Option<EventLog>,
    probe: Option<IrqProbe>,
}

impl MockInterrupts {
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            probe: None,
        }
    }

    pub fn probe(&self) -> Option<IrqProbe> {
        self.probe.clone()
    }
}

impl Interrupts<MockPin> for MockInterrupts {
    type Line = MockIrqLine;

    fn register(&mut self, _pin: &MockPin, handler: IrqHandler) -> io::Result<MockIrqLine> {
        let line = MockIrqLine {
            state: Arc::new(IrqState {
                masked: AtomicBool::new(false),
                mask_calls: AtomicUsize::new(0),
                unmask_calls: AtomicUsize::new(0),
                wake: Mutex::new(None),
                handler: Mutex::new(Some(handler)),
                freed: AtomicBool::new(false),
                log: self.log.clone(),
            }),
        };
        self.probe = Some(line.probe());
        Ok(line)
    }
}

#[derive(Debug, Clone)]
pub struct MockPlatform {
    log: EventLog,
}

impl MockPlatform {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Platform for MockPlatform {
    fn sleep_for(&self, duration: Duration) {
        self.log.push(Event::Sleep(duration));
    }

    fn prevent_idle_for(&self, duration: Duration) {
        self.log.push(Event::IdleHold(duration));
    }

    fn allow_idle(&self) {
        self.log.push(Event::IdleRelease);
    }
}

#[derive(Debug, Default)]
struct BusState {
    rx: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    accept_at_most: Option<usize>,
    overreport: usize,
    fail_next_receive: bool,
    transfer_time: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
    in_use: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    log: EventLog,
}

impl MockBus {
    pub fn new(log: EventLog) -> Self {
        Self {
            state: Arc::default(),
            in_use: Arc::default(),
            overlaps: Arc::default(),
            log,
        }
    }

    pub fn queue_frame(&self, frame: &[u8]) {
        self.state.lock().unwrap().rx.push_back(frame.to_vec());
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn accept_at_most(&self, count: usize) {
        self.state.lock().unwrap().accept_at_most = Some(count);
    }

    pub fn overreport_by(&self, extra: usize) {
        self.state.lock().unwrap().overreport = extra;
    }

    pub fn fail_next_receive(&self) {
        self.state.lock().unwrap().fail_next_receive = true;
    }

    /// Hold each transfer open for `time` to widen any overlap window.
    pub fn slow_transfers(&self, time: Duration) {
        self.state.lock().unwrap().transfer_time = Some(time);
    }

    /// Number of transfers that started while another was in progress.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.state)
    }

    fn begin(&self) {
        if self.in_use.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let transfer_time = self.state.lock().unwrap().transfer_time;
        if let Some(time) = transfer_time {
            std::thread::sleep(time);
        }
    }

    fn end(&self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

impl Bus for MockBus {
    fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.begin();
        self.log.push(Event::Send(bytes.len()));
        let accepted = {
            let mut state = self.state.lock().unwrap();
            let accepted = state.accept_at_most.map_or(bytes.len(), |n| n.min(bytes.len()));
            state.sent.push(bytes.to_vec());
            accepted
        };
        self.end();
        Ok(accepted)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.begin();
        self.log.push(Event::Receive(buf.len()));
        let result = {
            let mut state = self.state.lock().unwrap();
            if std::mem::take(&mut state.fail_next_receive) {
                Err(io::Error::new(io::ErrorKind::TimedOut, "no acknowledge"))
            } else {
                let frame = state.rx.pop_front().unwrap_or_else(|| vec![0; buf.len()]);
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n + state.overreport)
            }
        };
        self.end();
        result
    }
}

pub struct MockHardware;

impl Hardware for MockHardware {
    type Bus = MockBus;
    type Pin = MockPin;
    type Irq = MockIrqLine;
    type Platform = MockPlatform;
}

pub const LINES: LineOffsets = LineOffsets {
    enable: 10,
    firmware_select: 11,
    data_ready: 12,
};

/// An attached device with every collaborator reachable from the test.
pub struct DeviceRig {
    pub device: Device<MockHardware>,
    pub bus: MockBus,
    pub enable: MockPin,
    pub firmware_select: MockPin,
    pub data_ready: MockPin,
    pub irq: IrqProbe,
    pub log: EventLog,
}

impl DeviceRig {
    pub fn attach() -> Self {
        Self::attach_with(DeviceConfig::new(LINES))
    }

    pub fn attach_with(config: DeviceConfig) -> Self {
        let log = EventLog::default();
        let bus = MockBus::new(log.clone());
        let enable = MockPin::new("enable", false).logged(log.clone());
        let firmware_select = MockPin::new("firmware_select", false).logged(log.clone());
        let data_ready = MockPin::new("data_ready", false);

        let mut gpio = MockGpio::default()
            .with_pin(LINES.enable, enable.clone())
            .with_pin(LINES.firmware_select, firmware_select.clone())
            .with_pin(LINES.data_ready, data_ready.clone());
        let mut interrupts = MockInterrupts::with_log(log.clone());

        let device = Device::attach(
            config,
            bus.clone(),
            &mut gpio,
            &mut interrupts,
            MockPlatform::new(log.clone()),
        )
        .unwrap();
        let irq = interrupts.probe().unwrap();
        log.take();

        Self {
            device,
            bus,
            enable,
            firmware_select,
            data_ready,
            irq,
            log,
        }
    }

    /// Simulate the controller raising data-ready with `frame` queued.
    pub fn deliver(&self, frame: &[u8]) -> bool {
        self.bus.queue_frame(frame);
        self.data_ready.drive(true);
        self.irq.fire()
    }
}
