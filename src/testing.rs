//! Test doubles for the board, storage, host framework and touch panel.

use embedded_storage::{ReadStorage, Storage};

use crate::{
    config::{AXIS_MIDPOINT, MATRIX_COLS, MATRIX_ROWS},
    hal::{AnalogInput, AxisChannel, Board, Clock, JoystickId, MatrixInput},
    joystick::{AxisReport, JoystickKey},
    touch::{TouchError, Touchscreen},
};

pub struct MockBoard {
    pub now: u32,
    pub keys: [[bool; MATRIX_COLS]; MATRIX_ROWS],
    /// Raw readings indexed by `AxisChannel::index`.
    pub axes: [u16; 4],
    pub mode_switches: [bool; 2],
    pub delays: Vec<u32>,
}

impl Default for MockBoard {
    fn default() -> Self {
        Self {
            now: 0,
            keys: [[false; MATRIX_COLS]; MATRIX_ROWS],
            axes: [AXIS_MIDPOINT; 4],
            mode_switches: [true; 2],
            delays: Vec::new(),
        }
    }
}

impl Clock for MockBoard {
    fn now_ms(&self) -> u32 {
        self.now
    }
}

impl MatrixInput for MockBoard {
    fn key_closed(&mut self, row: usize, col: usize) -> bool {
        self.keys[row][col]
    }
}

impl AnalogInput for MockBoard {
    fn read_axis(&mut self, channel: AxisChannel) -> u16 {
        self.axes[channel.index()]
    }
}

impl Board for MockBoard {
    fn mode_switch_level(&mut self, joystick: JoystickId) -> bool {
        self.mode_switches[joystick.index()]
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds;

/// Byte addressable storage that counts write calls.
#[derive(Debug, Clone)]
pub struct MemStorage {
    pub bytes: Vec<u8>,
    pub writes: usize,
    pub fail_writes: bool,
}

impl MemStorage {
    /// Looks like freshly erased flash.
    pub fn erased(len: usize) -> Self {
        Self {
            bytes: vec![0xFF; len],
            writes: 0,
            fail_writes: false,
        }
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, OutOfBounds> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(OutOfBounds)?;
        if end > self.bytes.len() {
            return Err(OutOfBounds);
        }
        Ok(start..end)
    }
}

impl ReadStorage for MemStorage {
    type Error = OutOfBounds;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for MemStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(OutOfBounds);
        }
        let range = self.range(offset, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    KeyDown(JoystickKey),
    KeyUp(JoystickKey),
    Axes(AxisReport),
    CombosEnabled(bool),
    Layer(u8),
    DefaultLayer(u8),
    Line(String),
}

#[derive(Default)]
pub struct RecordingHost {
    pub events: Vec<HostEvent>,
}

impl RecordingHost {
    pub fn lines(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Line(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn key_events(&self) -> Vec<&HostEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, HostEvent::KeyDown(_) | HostEvent::KeyUp(_)))
            .collect()
    }

    pub fn last_axes(&self) -> Option<AxisReport> {
        self.events.iter().rev().find_map(|e| match e {
            HostEvent::Axes(report) => Some(*report),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl crate::host::HostLink for RecordingHost {
    fn register_key(&mut self, key: JoystickKey) {
        self.events.push(HostEvent::KeyDown(key));
    }

    fn unregister_key(&mut self, key: JoystickKey) {
        self.events.push(HostEvent::KeyUp(key));
    }

    fn send_axes(&mut self, report: &AxisReport) {
        self.events.push(HostEvent::Axes(*report));
    }

    fn set_combos_enabled(&mut self, enabled: bool) {
        self.events.push(HostEvent::CombosEnabled(enabled));
    }

    fn move_to_layer(&mut self, layer: u8) {
        self.events.push(HostEvent::Layer(layer));
    }

    fn set_default_layer(&mut self, layer: u8) {
        self.events.push(HostEvent::DefaultLayer(layer));
    }

    fn print_line(&mut self, line: &str) {
        self.events.push(HostEvent::Line(line.into()));
    }
}

#[derive(Default)]
pub struct MockTouch {
    pub reset_levels: Vec<bool>,
    pub probes: usize,
    pub absent: bool,
    pub pending: bool,
    pub handled: usize,
    pub calibrations: usize,
    pub touching: bool,
}

impl Touchscreen for MockTouch {
    fn set_reset(&mut self, asserted: bool) {
        self.reset_levels.push(asserted);
    }

    fn probe(&mut self) -> Result<(), TouchError> {
        self.probes += 1;
        if self.absent {
            Err(TouchError::NotPresent)
        } else {
            Ok(())
        }
    }

    fn interrupt_pending(&mut self) -> bool {
        self.pending
    }

    fn handle_touch(&mut self) {
        self.handled += 1;
        self.pending = false;
    }

    fn calibrate(&mut self) -> bool {
        self.calibrations += 1;
        !self.absent
    }

    fn is_touching(&self) -> bool {
        self.touching
    }
}
