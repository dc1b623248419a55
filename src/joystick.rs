use packed_struct::{derive::PackedStruct, PackedStruct};

use crate::{
    analog::{Directions, JoystickState},
    config::{JoystickSettings, AXIS_LIMIT, DEFAULT_SENSITIVITY},
    hal::JoystickId,
    helpers::XyValuePair,
    host::HostLink,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum JoystickMode {
    /// Continuous axes, direction flags are ignored.
    #[default]
    Analog,
    /// Directions are sent as key presses, axes are held at zero.
    Digital,
}

impl JoystickMode {
    pub fn from_analog(analog: bool) -> Self {
        if analog {
            JoystickMode::Analog
        } else {
            JoystickMode::Digital
        }
    }

    pub fn is_analog(self) -> bool {
        self == JoystickMode::Analog
    }

    pub fn toggled(self) -> Self {
        match self {
            JoystickMode::Analog => JoystickMode::Digital,
            JoystickMode::Digital => JoystickMode::Analog,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Up => 2,
            Direction::Down => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A direction key produced by a stick in digital mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct JoystickKey {
    pub joystick: JoystickId,
    pub direction: Direction,
}

/// Four axis report handed to the HID transport, little endian on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct AxisReport {
    #[packed_field(size_bits = "16")]
    pub joy1_x: i16,
    #[packed_field(size_bits = "16")]
    pub joy1_y: i16,
    #[packed_field(size_bits = "16")]
    pub joy2_x: i16,
    #[packed_field(size_bits = "16")]
    pub joy2_y: i16,
}

impl AxisReport {
    pub fn set(&mut self, joystick: JoystickId, axes: XyValuePair<i16>) {
        match joystick {
            JoystickId::One => {
                self.joy1_x = axes.x;
                self.joy1_y = axes.y;
            }
            JoystickId::Two => {
                self.joy2_x = axes.x;
                self.joy2_y = axes.y;
            }
        }
    }

    pub fn get(&self, joystick: JoystickId) -> XyValuePair<i16> {
        match joystick {
            JoystickId::One => XyValuePair::new(self.joy1_x, self.joy1_y),
            JoystickId::Two => XyValuePair::new(self.joy2_x, self.joy2_y),
        }
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        // only i16 fields, packing can't fail
        self.pack().unwrap_or_default()
    }
}

/// Scales by `sensitivity` eighths, applies inversion and clamps to the
/// 10 bit axis range.
pub fn shape_axes(
    position: XyValuePair<i16>,
    sensitivity: u8,
    invert: XyValuePair<bool>,
) -> XyValuePair<i16> {
    let shape = |value: i16, inverted: bool| {
        let mut scaled = i32::from(value) * i32::from(sensitivity) / i32::from(DEFAULT_SENSITIVITY);
        if inverted {
            scaled = -scaled;
        }
        scaled.clamp(-i32::from(AXIS_LIMIT), i32::from(AXIS_LIMIT)) as i16
    };

    XyValuePair::new(shape(position.x, invert.x), shape(position.y, invert.y))
}

/// Per-stick mode state machine. Only explicit toggles or profile loads
/// change the mode.
pub struct JoystickEngine {
    id: JoystickId,
    mode: JoystickMode,
    sensitivity: u8,
    invert: XyValuePair<bool>,
    held: Directions,
}

impl JoystickEngine {
    pub fn new(id: JoystickId) -> Self {
        Self {
            id,
            mode: JoystickMode::Analog,
            sensitivity: DEFAULT_SENSITIVITY,
            invert: XyValuePair::default(),
            held: Directions::default(),
        }
    }

    pub fn id(&self) -> JoystickId {
        self.id
    }

    pub fn mode(&self) -> JoystickMode {
        self.mode
    }

    pub fn held(&self) -> Directions {
        self.held
    }

    /// Changing away from digital mode releases every key still held.
    pub fn set_mode<H: HostLink>(&mut self, mode: JoystickMode, host: &mut H) {
        if mode == self.mode {
            return;
        }
        if self.mode == JoystickMode::Digital {
            self.release_all(host);
        }
        debug!("Joystick {} mode: {}", self.id.number(), mode.is_analog());
        self.mode = mode;
    }

    pub fn toggle_mode<H: HostLink>(&mut self, host: &mut H) -> JoystickMode {
        self.set_mode(self.mode.toggled(), host);
        self.mode
    }

    pub fn apply_settings<H: HostLink>(&mut self, settings: &JoystickSettings, host: &mut H) {
        self.sensitivity = settings.sensitivity;
        self.invert = settings.invert;
        self.set_mode(settings.mode, host);
    }

    /// Handles one fresh sample. Returns the axes to report, zero in digital
    /// mode.
    pub fn process<H: HostLink>(&mut self, state: &JoystickState, host: &mut H) -> XyValuePair<i16> {
        match self.mode {
            JoystickMode::Analog => shape_axes(state.position, self.sensitivity, self.invert),
            JoystickMode::Digital => {
                for direction in Direction::ALL {
                    let pushed = state.directions.get(direction);
                    let key = JoystickKey {
                        joystick: self.id,
                        direction,
                    };

                    match (pushed, self.held.get(direction)) {
                        (true, false) => host.register_key(key),
                        (false, true) => host.unregister_key(key),
                        _ => continue,
                    }
                    self.held.set(direction, pushed);
                }
                XyValuePair::default()
            }
        }
    }

    fn release_all<H: HostLink>(&mut self, host: &mut H) {
        for direction in Direction::ALL {
            if self.held.get(direction) {
                host.unregister_key(JoystickKey {
                    joystick: self.id,
                    direction,
                });
                self.held.set(direction, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HostEvent, RecordingHost};

    fn pushed(x: i16, y: i16) -> JoystickState {
        let position = XyValuePair::new(x, y);
        JoystickState {
            position,
            directions: Directions::from_position(position, 200),
            ..JoystickState::default()
        }
    }

    fn right_key() -> JoystickKey {
        JoystickKey {
            joystick: JoystickId::One,
            direction: Direction::Right,
        }
    }

    #[test]
    fn digital_mode_emits_one_pair_per_edge() {
        let mut host = RecordingHost::default();
        let mut engine = JoystickEngine::new(JoystickId::One);
        engine.set_mode(JoystickMode::Digital, &mut host);

        assert_eq!(engine.process(&pushed(0, 0), &mut host), XyValuePair::default());
        assert!(host.events.is_empty());

        for _ in 0..5 {
            assert_eq!(engine.process(&pushed(400, 0), &mut host), XyValuePair::default());
        }
        assert_eq!(host.events, vec![HostEvent::KeyDown(right_key())]);

        engine.process(&pushed(0, 0), &mut host);
        engine.process(&pushed(0, 0), &mut host);
        assert_eq!(
            host.events,
            vec![HostEvent::KeyDown(right_key()), HostEvent::KeyUp(right_key())]
        );
    }

    #[test]
    fn analog_mode_forwards_axes_and_ignores_directions() {
        let mut host = RecordingHost::default();
        let mut engine = JoystickEngine::new(JoystickId::One);

        assert_eq!(engine.process(&pushed(300, -250), &mut host), XyValuePair::new(300, -250));
        assert!(host.events.is_empty());
    }

    #[test]
    fn leaving_digital_releases_held_keys() {
        let mut host = RecordingHost::default();
        let mut engine = JoystickEngine::new(JoystickId::One);
        engine.set_mode(JoystickMode::Digital, &mut host);
        engine.process(&pushed(400, 300), &mut host);
        assert_eq!(host.events.len(), 2);

        assert_eq!(engine.toggle_mode(&mut host), JoystickMode::Analog);
        assert_eq!(host.events.len(), 4);
        assert!(matches!(host.events[2], HostEvent::KeyUp(_)));
        assert!(matches!(host.events[3], HostEvent::KeyUp(_)));
        assert_eq!(engine.held(), Directions::default());
    }

    #[test]
    fn axes_are_scaled_inverted_and_clamped() {
        let unity = XyValuePair::new(false, false);
        assert_eq!(shape_axes(XyValuePair::new(100, -100), 8, unity), XyValuePair::new(100, -100));
        assert_eq!(shape_axes(XyValuePair::new(100, -100), 4, unity), XyValuePair::new(50, -50));
        assert_eq!(
            shape_axes(XyValuePair::new(400, -400), 15, unity),
            XyValuePair::new(511, -511)
        );
        assert_eq!(
            shape_axes(XyValuePair::new(100, 60), 8, XyValuePair::new(true, false)),
            XyValuePair::new(-100, 60)
        );
    }

    #[test]
    fn report_is_little_endian() {
        let mut report = AxisReport::default();
        report.set(JoystickId::One, XyValuePair::new(1, -1));
        report.set(JoystickId::Two, XyValuePair::new(0x0102, 0));

        assert_eq!(report.to_bytes(), [0x01, 0x00, 0xFF, 0xFF, 0x02, 0x01, 0x00, 0x00]);
        assert_eq!(report.get(JoystickId::Two), XyValuePair::new(0x0102, 0));
        assert_eq!(AxisReport::unpack(&report.to_bytes()).unwrap(), report);
    }

    #[test]
    fn mode_helpers() {
        assert_eq!(JoystickMode::from_analog(false), JoystickMode::Digital);
        assert!(JoystickMode::Digital.toggled().is_analog());
        assert_eq!(Direction::from_index(3), Some(Direction::Down));
        assert_eq!(Direction::from_index(4), None);
    }
}
