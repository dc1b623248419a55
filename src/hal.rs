/**
 *  Hardware capabilities the input core is built on. The firmware implements
 *  these for the RP2040, tests implement them with scripted values.
 */
use embedded_hal::digital::InputPin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum JoystickId {
    One,
    Two,
}

impl JoystickId {
    pub const ALL: [JoystickId; 2] = [JoystickId::One, JoystickId::Two];

    pub fn index(self) -> usize {
        match self {
            JoystickId::One => 0,
            JoystickId::Two => 1,
        }
    }

    /// Zero based lookup, `None` for anything but 0 and 1.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(JoystickId::One),
            1 => Some(JoystickId::Two),
            _ => None,
        }
    }

    /// The number printed on the case, 1 or 2.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
}

/// One ADC input: an axis of one joystick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct AxisChannel {
    pub joystick: JoystickId,
    pub axis: Axis,
}

impl AxisChannel {
    pub const fn new(joystick: JoystickId, axis: Axis) -> Self {
        Self { joystick, axis }
    }

    /// Position in the 4 channel ADC scan, X1 Y1 X2 Y2.
    pub fn index(self) -> usize {
        self.joystick.index() * 2
            + match self.axis {
                Axis::X => 0,
                Axis::Y => 1,
            }
    }
}

/// Monotonic millisecond counter. Wraps at `u32::MAX`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

pub trait MatrixInput {
    /// Whether the switch at `row`/`col` is closed right now (no debounce).
    fn key_closed(&mut self, row: usize, col: usize) -> bool;
}

pub trait AnalogInput {
    fn read_axis(&mut self, channel: AxisChannel) -> u16;

    fn adc_resolution_bits(&self) -> u8 {
        10
    }
}

/// Everything the dispatcher needs from the board.
pub trait Board: Clock + MatrixInput + AnalogInput {
    /// Raw level of a joystick's mode switch. Pulled up, so `false` while
    /// the switch is held.
    fn mode_switch_level(&mut self, joystick: JoystickId) -> bool;

    /// Bounded busy-wait, only used around touchscreen resets.
    fn delay_ms(&mut self, ms: u32);
}

/// Key matrix wired as one pin per switch, pulled up and shorted to ground
/// when pressed.
pub struct DirectPinMatrix<P, const R: usize, const C: usize> {
    pins: [[P; C]; R],
}

impl<P: InputPin, const R: usize, const C: usize> DirectPinMatrix<P, R, C> {
    pub fn new(pins: [[P; C]; R]) -> Self {
        Self { pins }
    }
}

impl<P: InputPin, const R: usize, const C: usize> MatrixInput for DirectPinMatrix<P, R, C> {
    fn key_closed(&mut self, row: usize, col: usize) -> bool {
        // a pin that can't be read counts as released
        self.pins
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .map(|pin| pin.is_low().unwrap_or(false))
            .unwrap_or(false)
    }
}
