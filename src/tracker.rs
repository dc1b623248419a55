/**
 *  Registry of logical inputs with their own debounce and press timing.
 *  Higher level code asks the tracker whether an input is down instead of
 *  poking at the matrix or the sampler directly.
 */
use crate::{
    analog::AnalogSampler,
    config::{ScannerConfig, MATRIX_COLS, MATRIX_ROWS, MAX_TRACKED_INPUTS},
    hal::JoystickId,
    helpers::elapsed_ms,
    joystick::Direction,
    matrix::MatrixScanner,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum InputKind {
    /// `id` is `row * MATRIX_COLS + col`.
    #[default]
    Button,
    /// `id` is `joystick * 4 + direction`.
    JoystickDigital,
    /// `id` is the joystick index. Active while outside the deadzone.
    JoystickAnalog,
    /// Active while the touchscreen reports contact.
    Touch,
}

/// Position in the tracker table. Only valid until the next `untrack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct TrackHandle(u8);

impl TrackHandle {
    pub const INVALID: TrackHandle = TrackHandle(u8::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct TrackedInput {
    pub id: u8,
    pub kind: InputKind,
    pub active: bool,
    pub previous: bool,
    pub press_time: u32,
    pub release_time: u32,
    /// Length of the last completed press.
    pub duration: u32,
    pub debounced: bool,
}

/// Sources a tracked input can be read from, as of the last tick.
pub struct InputSnapshot<'a> {
    pub matrix: &'a MatrixScanner<MATRIX_ROWS, MATRIX_COLS>,
    pub sampler: &'a AnalogSampler,
    pub touching: bool,
}

impl InputSnapshot<'_> {
    fn is_active(&self, kind: InputKind, id: u8) -> bool {
        let id = usize::from(id);
        match kind {
            InputKind::Button => self.matrix.is_pressed(id / MATRIX_COLS, id % MATRIX_COLS),
            InputKind::JoystickDigital => {
                match (JoystickId::from_index(id / 4), Direction::from_index(id % 4)) {
                    (Some(joystick), Some(direction)) => {
                        self.sampler.state(joystick).is_pushed(direction)
                    }
                    _ => false,
                }
            }
            InputKind::JoystickAnalog => JoystickId::from_index(id)
                .map(|joystick| !self.sampler.state(joystick).in_deadzone)
                .unwrap_or(false),
            InputKind::Touch => self.touching,
        }
    }
}

pub struct InputTracker {
    inputs: [TrackedInput; MAX_TRACKED_INPUTS],
    len: usize,
    debounce_ms: u32,
    joystick_debounce_ms: u32,
}

impl InputTracker {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            inputs: [TrackedInput::default(); MAX_TRACKED_INPUTS],
            len: 0,
            debounce_ms: config.debounce_time_ms,
            joystick_debounce_ms: config.joystick_debounce_ms,
        }
    }

    pub fn set_config(&mut self, config: &ScannerConfig) {
        self.debounce_ms = config.debounce_time_ms;
        self.joystick_debounce_ms = config.joystick_debounce_ms;
    }

    /// Returns `TrackHandle::INVALID` when the table is full.
    pub fn track(&mut self, kind: InputKind, id: u8) -> TrackHandle {
        if self.len >= MAX_TRACKED_INPUTS {
            warn!("Input tracker full, can't track input {}", id);
            return TrackHandle::INVALID;
        }

        self.inputs[self.len] = TrackedInput {
            id,
            kind,
            ..TrackedInput::default()
        };
        self.len += 1;

        TrackHandle((self.len - 1) as u8)
    }

    /// Removes the input and shifts later entries down, which invalidates
    /// every handle at or past this one.
    pub fn untrack(&mut self, handle: TrackHandle) -> bool {
        let index = handle.index();
        if index >= self.len {
            return false;
        }

        self.inputs.copy_within(index + 1..self.len, index);
        self.len -= 1;
        self.inputs[self.len] = TrackedInput::default();
        true
    }

    pub fn get(&self, handle: TrackHandle) -> Option<&TrackedInput> {
        self.inputs[..self.len].get(handle.index())
    }

    pub fn is_active(&self, handle: TrackHandle) -> bool {
        self.get(handle).map(|i| i.active && i.debounced).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.inputs = [TrackedInput::default(); MAX_TRACKED_INPUTS];
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedInput> {
        self.inputs[..self.len].iter()
    }

    pub fn update(&mut self, handle: TrackHandle, snapshot: &InputSnapshot, now: u32) -> bool {
        let index = handle.index();
        if index >= self.len {
            return false;
        }

        let window = match self.inputs[index].kind {
            InputKind::JoystickDigital | InputKind::JoystickAnalog => self.joystick_debounce_ms,
            InputKind::Button | InputKind::Touch => self.debounce_ms,
        };
        let input = &mut self.inputs[index];

        input.previous = input.active;
        input.active = snapshot.is_active(input.kind, input.id);

        match (input.active, input.previous) {
            (true, false) => {
                input.press_time = now;
                input.debounced = false;
            }
            (false, true) => {
                input.release_time = now;
                input.duration = elapsed_ms(input.press_time, now);
                input.debounced = false;
            }
            _ => {}
        }

        if input.active && !input.debounced && elapsed_ms(input.press_time, now) >= window {
            input.debounced = true;
        }

        true
    }

    pub fn update_all(&mut self, snapshot: &InputSnapshot, now: u32) {
        for index in 0..self.len {
            self.update(TrackHandle(index as u8), snapshot, now);
        }
    }
}
