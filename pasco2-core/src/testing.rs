//! Hand-written fakes shared by the unit tests.

use crate::pasco2::MeasurementConfig;
use crate::sensor::{Co2Sensor, MeasurementControl, PressureSensor, ReadOutcome};
use crate::status::SensorStatus;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};
use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Error returned by [`RegisterBus`] when failure is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeBusError;

impl i2c::Error for FakeBusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

#[derive(Default)]
struct BusState {
    registers: HashMap<(u8, u8), u8>,
    stuck: HashSet<(u8, u8)>,
    fail: bool,
    writes: usize,
}

/// I2C fake backed by one auto-incrementing register file per address.
#[derive(Clone, Default)]
pub struct RegisterBus {
    state: Arc<Mutex<BusState>>,
}

impl RegisterBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    pub fn set_register(&self, address: u8, register: u8, value: u8) {
        self.state
            .lock()
            .unwrap()
            .registers
            .insert((address, register), value);
    }

    pub fn set_registers(&self, address: u8, start: u8, values: &[u8]) {
        for (offset, value) in values.iter().enumerate() {
            self.set_register(address, start + offset as u8, *value);
        }
    }

    /// Pin a register to `value`; writes to it are ignored.
    pub fn stick_register(&self, address: u8, register: u8, value: u8) {
        self.set_register(address, register, value);
        self.state.lock().unwrap().stuck.insert((address, register));
    }

    pub fn register(&self, address: u8, register: u8) -> u8 {
        self.state
            .lock()
            .unwrap()
            .registers
            .get(&(address, register))
            .copied()
            .unwrap_or(0)
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

impl i2c::ErrorType for RegisterBus {
    type Error = FakeBusError;
}

impl i2c::I2c for RegisterBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail {
            return Err(FakeBusError);
        }

        let mut pointer: Option<u8> = None;
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    let mut data = bytes.iter().copied();
                    if pointer.is_none() {
                        pointer = data.next();
                    }
                    for value in data {
                        let register = pointer.unwrap_or(0);
                        if !state.stuck.contains(&(address, register)) {
                            state.registers.insert((address, register), value);
                        }
                        state.writes += 1;
                        pointer = Some(register.wrapping_add(1));
                    }
                }
                Operation::Read(buffer) => {
                    for slot in buffer.iter_mut() {
                        let register = pointer.unwrap_or(0);
                        *slot = state
                            .registers
                            .get(&(address, register))
                            .copied()
                            .unwrap_or(0);
                        pointer = Some(register.wrapping_add(1));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Delay that returns immediately.
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Delay that counts how often it was asked to wait.
#[derive(Default)]
pub struct CountingDelay {
    pub total_ms: u64,
    pub calls: u32,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += u64::from(ms);
    }
}

/// Output pin whose level can be observed from the test.
#[derive(Clone, Default)]
pub struct RecordingPin {
    level: Rc<Cell<Option<bool>>>,
}

impl RecordingPin {
    /// `None` until the pin was driven for the first time.
    pub fn level(&self) -> Option<bool> {
        self.level.get()
    }
}

impl digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(Some(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(Some(true));
        Ok(())
    }
}

/// Error of the scripted fakes below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError;

/// Terminal fed from a script. Reading past the end fails.
#[derive(Default)]
pub struct ScriptedTerminal {
    input: VecDeque<u8>,
    pub output: Vec<u8>,
}

impl ScriptedTerminal {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }
}

/// Script exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted;

impl embedded_io::Error for Exhausted {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::BrokenPipe
    }
}

impl embedded_io::ErrorType for ScriptedTerminal {
    type Error = Exhausted;
}

impl embedded_io::Read for ScriptedTerminal {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.input.pop_front() {
            Some(byte) => {
                buf[0] = byte;
                Ok(1)
            }
            None => Err(Exhausted),
        }
    }
}

impl embedded_io::Write for ScriptedTerminal {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A configuration call seen by [`FakeControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCall {
    Config(MeasurementConfig),
    Rate(u16),
}

/// Measurement control that records calls and can fail on the n-th one.
#[derive(Default)]
pub struct FakeControl {
    pub calls: Vec<ControlCall>,
    /// Zero-based indices of calls that fail.
    pub fail_on: Vec<usize>,
}

impl FakeControl {
    pub fn failing_on(fail_on: &[usize]) -> Self {
        Self {
            calls: Vec::new(),
            fail_on: fail_on.to_vec(),
        }
    }

    fn record(&mut self, call: ControlCall) -> Result<(), FakeError> {
        let index = self.calls.len();
        self.calls.push(call);

        if self.fail_on.contains(&index) {
            Err(FakeError)
        } else {
            Ok(())
        }
    }
}

impl MeasurementControl for FakeControl {
    type Error = FakeError;

    fn set_measurement_config(&mut self, config: MeasurementConfig) -> Result<(), Self::Error> {
        self.record(ControlCall::Config(config))
    }

    fn set_measurement_rate(&mut self, seconds: u16) -> Result<(), Self::Error> {
        self.record(ControlCall::Rate(seconds))
    }
}

/// CO2 sensor returning scripted results.
pub struct FakeCo2 {
    pub reads: VecDeque<Result<u16, ReadOutcome>>,
    pub statuses: VecDeque<Result<SensorStatus, FakeError>>,
    /// Pressure passed to each compensated read.
    pub pressures: Rc<std::cell::RefCell<Vec<u16>>>,
}

impl FakeCo2 {
    pub fn new() -> Self {
        Self {
            reads: VecDeque::new(),
            statuses: VecDeque::new(),
            pressures: Rc::default(),
        }
    }
}

impl Co2Sensor for FakeCo2 {
    type Error = FakeError;

    fn compensated_read(&mut self, pressure_hpa: u16) -> Result<u16, ReadOutcome> {
        self.pressures.borrow_mut().push(pressure_hpa);
        self.reads
            .pop_front()
            .unwrap_or(Err(ReadOutcome::NotReady))
    }

    fn status(&mut self) -> Result<SensorStatus, Self::Error> {
        self.statuses.pop_front().unwrap_or(Ok(SensorStatus(0)))
    }
}

/// Pressure sensor returning scripted results.
pub struct FakePressure {
    pub readings: VecDeque<Result<(f32, f32), FakeError>>,
}

impl FakePressure {
    pub fn new(readings: &[Result<(f32, f32), FakeError>]) -> Self {
        Self {
            readings: readings.iter().copied().collect(),
        }
    }
}

impl PressureSensor for FakePressure {
    type Error = FakeError;

    fn read(&mut self) -> Result<(f32, f32), Self::Error> {
        self.readings.pop_front().unwrap_or(Err(FakeError))
    }
}
