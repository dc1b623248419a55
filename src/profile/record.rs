/**
 *  Persisted layouts. Every record is packed explicitly with packed_struct,
 *  so the bytes in flash don't depend on how the compiler lays out structs.
 */
use packed_struct::{derive::PackedStruct, PackedStruct, PackingError};

use crate::{
    combo::ALL_COMBOS_MASK,
    config::{
        DeviceSettings, JoystickSettings, AXIS_MIDPOINT, CONFIG_VERSION, DEFAULT_COMBO_TERM_MS,
        DEFAULT_DEADZONE, DEFAULT_SENSITIVITY, DEFAULT_TOUCH_POLL_MS, JOYSTICK_COUNT,
        MAX_SENSITIVITY, PROFILE_NAME_LENGTH,
    },
    hal::JoystickId,
    helpers::{crc16_ccitt, XyValuePair},
    joystick::JoystickMode,
};

pub const QUICK_SETTINGS_LEN: usize = 4;
pub const MANAGER_RECORD_LEN: usize = 11;
pub const PROFILE_RECORD_LEN: usize = 71;

/// The settings restored on every boot, packed into one 32 bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "4")]
pub struct QuickSettings {
    #[packed_field(bits = "0..=1")]
    pub active_profile: u8,
    #[packed_field(bits = "2")]
    pub joy1_analog: bool,
    #[packed_field(bits = "3")]
    pub joy2_analog: bool,
    #[packed_field(bits = "4")]
    pub touchscreen_enabled: bool,
    #[packed_field(bits = "5")]
    pub combo_enabled: bool,
    #[packed_field(bits = "6..=9")]
    pub joy1_sensitivity: u8,
    #[packed_field(bits = "10..=13")]
    pub joy2_sensitivity: u8,
    #[packed_field(bits = "14..=21")]
    pub joy1_deadzone: u8,
    #[packed_field(bits = "22..=29")]
    pub joy2_deadzone: u8,
    #[packed_field(bits = "30..=31")]
    pub reserved: u8,
}

impl Default for QuickSettings {
    fn default() -> Self {
        Self {
            active_profile: 0,
            joy1_analog: true,
            joy2_analog: true,
            touchscreen_enabled: true,
            combo_enabled: true,
            joy1_sensitivity: DEFAULT_SENSITIVITY,
            joy2_sensitivity: DEFAULT_SENSITIVITY,
            joy1_deadzone: DEFAULT_DEADZONE as u8,
            joy2_deadzone: DEFAULT_DEADZONE as u8,
            reserved: 0,
        }
    }
}

impl QuickSettings {
    /// The word as the framework's user config register sees it.
    pub fn raw(&self) -> u32 {
        self.pack().map(u32::from_be_bytes).unwrap_or(0)
    }

    /// Takes the live values, narrowed to the widths of the word.
    pub fn capture(&mut self, settings: &DeviceSettings) {
        let [joy1, joy2] = &settings.joysticks;

        self.active_profile = settings.current_profile & 0b11;
        self.joy1_analog = joy1.mode.is_analog();
        self.joy2_analog = joy2.mode.is_analog();
        self.touchscreen_enabled = settings.touchscreen_enabled;
        self.combo_enabled = settings.combo_enabled;
        self.joy1_sensitivity = joy1.sensitivity.min(MAX_SENSITIVITY);
        self.joy2_sensitivity = joy2.sensitivity.min(MAX_SENSITIVITY);
        self.joy1_deadzone = joy1.deadzone.min(u16::from(u8::MAX)) as u8;
        self.joy2_deadzone = joy2.deadzone.min(u16::from(u8::MAX)) as u8;
    }

    pub fn apply(&self, settings: &mut DeviceSettings) {
        let [joy1, joy2] = &mut settings.joysticks;

        joy1.mode = JoystickMode::from_analog(self.joy1_analog);
        joy2.mode = JoystickMode::from_analog(self.joy2_analog);
        joy1.sensitivity = self.joy1_sensitivity;
        joy2.sensitivity = self.joy2_sensitivity;
        joy1.deadzone = u16::from(self.joy1_deadzone);
        joy2.deadzone = u16::from(self.joy2_deadzone);
        settings.touchscreen_enabled = self.touchscreen_enabled;
        settings.combo_enabled = self.combo_enabled;
        settings.current_profile = self.active_profile;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct ManagerRecord {
    #[packed_field(size_bits = "8")]
    pub active_profile: u8,
    #[packed_field(size_bits = "8")]
    pub profile_count: u8,
    #[packed_field(size_bits = "1")]
    pub auto_load_on_boot: bool,
    #[packed_field(size_bits = "1")]
    pub switching_enabled: bool,
    #[packed_field(size_bits = "1")]
    pub auto_save: bool,
    #[packed_field(size_bits = "5")]
    pub reserved: u8,
    #[packed_field(size_bits = "32")]
    pub last_save_time: u32,
    #[packed_field(size_bits = "16")]
    pub config_version: u16,
    #[packed_field(size_bits = "16")]
    pub checksum: u16,
}

impl Default for ManagerRecord {
    fn default() -> Self {
        let mut record = Self {
            active_profile: 0,
            profile_count: crate::config::MAX_PROFILES as u8,
            auto_load_on_boot: true,
            switching_enabled: true,
            auto_save: true,
            reserved: 0,
            last_save_time: 0,
            config_version: CONFIG_VERSION,
            checksum: 0,
        };
        record.seal();
        record
    }
}

impl ManagerRecord {
    fn body_crc(&self) -> Result<u16, PackingError> {
        let bytes = self.pack()?;
        Ok(crc16_ccitt(&bytes[..MANAGER_RECORD_LEN - 2]))
    }

    pub fn seal(&mut self) {
        self.checksum = self.body_crc().unwrap_or(0);
    }

    pub fn is_intact(&self) -> bool {
        self.body_crc().map(|crc| crc == self.checksum).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct JoystickProfile {
    #[packed_field(size_bits = "1")]
    pub analog_mode: bool,
    #[packed_field(size_bits = "1")]
    pub inverted_x: bool,
    #[packed_field(size_bits = "1")]
    pub inverted_y: bool,
    #[packed_field(size_bits = "5")]
    pub reserved: u8,
    #[packed_field(size_bits = "16")]
    pub x_center: u16,
    #[packed_field(size_bits = "16")]
    pub y_center: u16,
    #[packed_field(size_bits = "16")]
    pub deadzone: u16,
    #[packed_field(size_bits = "8")]
    pub sensitivity: u8,
}

impl JoystickProfile {
    pub const fn new(mode: JoystickMode) -> Self {
        Self {
            analog_mode: matches!(mode, JoystickMode::Analog),
            inverted_x: false,
            inverted_y: false,
            reserved: 0,
            x_center: AXIS_MIDPOINT,
            y_center: AXIS_MIDPOINT,
            deadzone: DEFAULT_DEADZONE,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }

    pub fn to_settings(&self) -> JoystickSettings {
        JoystickSettings {
            mode: JoystickMode::from_analog(self.analog_mode),
            center: XyValuePair::new(self.x_center, self.y_center),
            deadzone: self.deadzone,
            sensitivity: self.sensitivity.min(MAX_SENSITIVITY),
            invert: XyValuePair::new(self.inverted_x, self.inverted_y),
        }
    }

    pub fn capture(&mut self, settings: &JoystickSettings) {
        self.analog_mode = settings.mode.is_analog();
        self.x_center = settings.center.x;
        self.y_center = settings.center.y;
        self.deadzone = settings.deadzone;
        self.sensitivity = settings.sensitivity;
        self.inverted_x = settings.invert.x;
        self.inverted_y = settings.invert.y;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct ComboProfile {
    #[packed_field(size_bits = "1")]
    pub enabled: bool,
    #[packed_field(size_bits = "1")]
    pub strict_timing: bool,
    #[packed_field(size_bits = "6")]
    pub reserved: u8,
    #[packed_field(size_bits = "16")]
    pub timeout_ms: u16,
    /// One bit per combo index.
    #[packed_field(size_bits = "16")]
    pub enabled_mask: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct TouchPoint {
    #[packed_field(size_bits = "16")]
    pub x: u16,
    #[packed_field(size_bits = "16")]
    pub y: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct TouchscreenProfile {
    #[packed_field(size_bits = "1")]
    pub enabled: bool,
    #[packed_field(size_bits = "1")]
    pub haptic_feedback: bool,
    #[packed_field(size_bits = "6")]
    pub reserved: u8,
    #[packed_field(size_bits = "8")]
    pub sensitivity: u8,
    #[packed_field(element_size_bytes = "4")]
    pub calibration: [TouchPoint; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct LayerProfile {
    #[packed_field(size_bits = "8")]
    pub default_layer: u8,
    #[packed_field(size_bits = "1")]
    pub layer_lock: bool,
    #[packed_field(size_bits = "7")]
    pub reserved: u8,
    #[packed_field(element_size_bytes = "1")]
    pub quick_layers: [u8; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct TimingProfile {
    #[packed_field(size_bits = "16")]
    pub debounce_ms: u16,
    #[packed_field(size_bits = "16")]
    pub joystick_poll_ms: u16,
    #[packed_field(size_bits = "16")]
    pub touch_poll_ms: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct FeatureFlags {
    #[packed_field(size_bits = "1")]
    pub auto_save: bool,
    #[packed_field(size_bits = "1")]
    pub quick_switch: bool,
    #[packed_field(size_bits = "1")]
    pub reset_protection: bool,
    #[packed_field(size_bits = "5")]
    pub reserved: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "msb")]
pub struct ProfileRecord {
    #[packed_field(element_size_bytes = "1")]
    pub name: [u8; 16],
    #[packed_field(size_bits = "1")]
    pub enabled: bool,
    #[packed_field(size_bits = "7")]
    pub reserved: u8,
    #[packed_field(size_bytes = "8")]
    pub joystick1: JoystickProfile,
    #[packed_field(size_bytes = "8")]
    pub joystick2: JoystickProfile,
    #[packed_field(size_bytes = "5")]
    pub combo: ComboProfile,
    #[packed_field(size_bytes = "18")]
    pub touchscreen: TouchscreenProfile,
    #[packed_field(size_bytes = "6")]
    pub layer: LayerProfile,
    #[packed_field(size_bytes = "6")]
    pub timing: TimingProfile,
    #[packed_field(size_bytes = "1")]
    pub features: FeatureFlags,
    #[packed_field(size_bits = "16")]
    pub checksum: u16,
}

const TEMPLATE_NAMES: [&str; 4] = ["Gaming", "Productivity", "Minimal", "Advanced"];
const TEMPLATE_JOY1_MODES: [JoystickMode; 4] = [
    JoystickMode::Analog,
    JoystickMode::Digital,
    JoystickMode::Analog,
    JoystickMode::Digital,
];
const TEMPLATE_JOY2_MODES: [JoystickMode; 4] = [
    JoystickMode::Analog,
    JoystickMode::Digital,
    JoystickMode::Digital,
    JoystickMode::Analog,
];

impl ProfileRecord {
    /// Compiled-in defaults for a slot. Slots past the last template get
    /// the first one.
    pub fn template(slot: usize) -> Self {
        let slot = if slot < TEMPLATE_NAMES.len() { slot } else { 0 };

        let mut record = Self {
            name: [0; PROFILE_NAME_LENGTH],
            enabled: true,
            reserved: 0,
            joystick1: JoystickProfile::new(TEMPLATE_JOY1_MODES[slot]),
            joystick2: JoystickProfile::new(TEMPLATE_JOY2_MODES[slot]),
            combo: ComboProfile {
                enabled: true,
                strict_timing: false,
                reserved: 0,
                timeout_ms: DEFAULT_COMBO_TERM_MS,
                enabled_mask: ALL_COMBOS_MASK,
            },
            touchscreen: TouchscreenProfile {
                enabled: true,
                haptic_feedback: false,
                reserved: 0,
                sensitivity: 5,
                calibration: [TouchPoint::default(); 4],
            },
            layer: LayerProfile {
                default_layer: 0,
                layer_lock: false,
                reserved: 0,
                quick_layers: [0; 4],
            },
            timing: TimingProfile {
                debounce_ms: 5,
                joystick_poll_ms: 10,
                touch_poll_ms: DEFAULT_TOUCH_POLL_MS,
            },
            features: FeatureFlags {
                auto_save: true,
                quick_switch: true,
                reset_protection: false,
                reserved: 0,
            },
            checksum: 0,
        };

        match slot {
            0 => record.combo.timeout_ms = 150,
            2 => record.touchscreen.enabled = false,
            3 => {
                record.combo.strict_timing = true;
                record.touchscreen.haptic_feedback = true;
                record.layer.quick_layers = [1, 2, 3, 0];
                record.features.reset_protection = true;
            }
            _ => {}
        }

        record.set_name(TEMPLATE_NAMES[slot]);
        record.seal();
        record
    }

    /// Name up to the first NUL. Invalid UTF-8 reads as empty.
    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PROFILE_NAME_LENGTH);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// Stores as much of `name` as fits, cut on a character boundary.
    pub fn set_name(&mut self, name: &str) {
        let mut len = name.len().min(PROFILE_NAME_LENGTH);
        while !name.is_char_boundary(len) {
            len -= 1;
        }

        self.name = [0; PROFILE_NAME_LENGTH];
        self.name[..len].copy_from_slice(&name.as_bytes()[..len]);
    }

    pub fn joystick(&self, id: JoystickId) -> &JoystickProfile {
        match id {
            JoystickId::One => &self.joystick1,
            JoystickId::Two => &self.joystick2,
        }
    }

    pub fn joystick_mut(&mut self, id: JoystickId) -> &mut JoystickProfile {
        match id {
            JoystickId::One => &mut self.joystick1,
            JoystickId::Two => &mut self.joystick2,
        }
    }

    fn body_crc(&self) -> Result<u16, PackingError> {
        let bytes = self.pack()?;
        Ok(crc16_ccitt(&bytes[..PROFILE_RECORD_LEN - 2]))
    }

    pub fn seal(&mut self) {
        self.checksum = self.body_crc().unwrap_or(0);
    }

    pub fn is_intact(&self) -> bool {
        self.body_crc().map(|crc| crc == self.checksum).unwrap_or(false)
    }

    /// Writes everything this profile controls into the live settings.
    /// The debug flag and current profile index are left alone.
    pub fn apply(&self, settings: &mut DeviceSettings) {
        let joysticks: [JoystickSettings; JOYSTICK_COUNT] =
            [self.joystick1.to_settings(), self.joystick2.to_settings()];

        settings.joysticks = joysticks;
        settings.combo_enabled = self.combo.enabled;
        settings.touchscreen_enabled = self.touchscreen.enabled;
        settings.default_layer = self.layer.default_layer;
        settings.debounce_ms = self.timing.debounce_ms;
        settings.joystick_poll_ms = self.timing.joystick_poll_ms;
        settings.touch_poll_ms = self.timing.touch_poll_ms;
    }

    /// Applies what the quick settings word doesn't carry, plus the
    /// deadzones the word only holds narrowed to a byte.
    pub fn apply_extended(&self, settings: &mut DeviceSettings) {
        for id in JoystickId::ALL {
            let stored = self.joystick(id);
            let live = settings.joystick_mut(id);
            live.center = XyValuePair::new(stored.x_center, stored.y_center);
            live.invert = XyValuePair::new(stored.inverted_x, stored.inverted_y);
            live.deadzone = stored.deadzone;
        }
        settings.default_layer = self.layer.default_layer;
        settings.debounce_ms = self.timing.debounce_ms;
        settings.joystick_poll_ms = self.timing.joystick_poll_ms;
        settings.touch_poll_ms = self.timing.touch_poll_ms;
    }

    pub fn capture(&mut self, settings: &DeviceSettings) {
        self.joystick1.capture(&settings.joysticks[0]);
        self.joystick2.capture(&settings.joysticks[1]);
        self.combo.enabled = settings.combo_enabled;
        self.touchscreen.enabled = settings.touchscreen_enabled;
        self.layer.default_layer = settings.default_layer;
        self.timing.debounce_ms = settings.debounce_ms;
        self.timing.joystick_poll_ms = settings.joystick_poll_ms;
        self.timing.touch_poll_ms = settings.touch_poll_ms;
        self.seal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(QuickSettings::default().pack().unwrap().len(), QUICK_SETTINGS_LEN);
        assert_eq!(ManagerRecord::default().pack().unwrap().len(), MANAGER_RECORD_LEN);
        assert_eq!(ProfileRecord::template(0).pack().unwrap().len(), PROFILE_RECORD_LEN);
    }

    #[test]
    fn quick_settings_bit_positions() {
        let quick = QuickSettings {
            active_profile: 2,
            joy1_analog: true,
            joy2_analog: false,
            touchscreen_enabled: false,
            combo_enabled: true,
            joy1_sensitivity: 8,
            joy2_sensitivity: 15,
            joy1_deadzone: 50,
            joy2_deadzone: 255,
            reserved: 0,
        };

        let raw = quick.raw();
        assert_eq!(raw & 0b11, 2);
        assert_eq!((raw >> 2) & 1, 1);
        assert_eq!((raw >> 3) & 1, 0);
        assert_eq!((raw >> 5) & 1, 1);
        assert_eq!((raw >> 6) & 0xF, 8);
        assert_eq!((raw >> 10) & 0xF, 15);
        assert_eq!((raw >> 14) & 0xFF, 50);
        assert_eq!((raw >> 22) & 0xFF, 255);

        assert_eq!(QuickSettings::unpack(&quick.pack().unwrap()).unwrap(), quick);
    }

    #[test]
    fn templates_follow_mode_tables() {
        let expected = [
            (true, true),
            (false, false),
            (true, false),
            (false, true),
        ];
        for (slot, (joy1, joy2)) in expected.iter().enumerate() {
            let record = ProfileRecord::template(slot);
            assert_eq!(record.joystick1.analog_mode, *joy1);
            assert_eq!(record.joystick2.analog_mode, *joy2);
            assert!(record.is_intact());
        }
        assert_eq!(ProfileRecord::template(0).name(), "Gaming");
        assert_eq!(ProfileRecord::template(3).name(), "Advanced");
        assert_eq!(ProfileRecord::template(0).combo.timeout_ms, 150);
        assert_eq!(ProfileRecord::template(9), ProfileRecord::template(0));
    }

    #[test]
    fn checksum_catches_a_flipped_byte() {
        let record = ProfileRecord::template(1);
        let mut bytes = record.pack().unwrap();
        bytes[20] ^= 0x40;

        let damaged = ProfileRecord::unpack(&bytes).unwrap();
        assert!(!damaged.is_intact());

        let mut manager = ManagerRecord::default();
        assert!(manager.is_intact());
        manager.active_profile = 3;
        assert!(!manager.is_intact());
        manager.seal();
        assert!(manager.is_intact());
    }

    #[test]
    fn names_are_bounded() {
        let mut record = ProfileRecord::template(0);
        record.set_name("A rather long profile name");
        assert_eq!(record.name(), "A rather long pr");

        // 'é' is two bytes and would straddle the limit
        record.set_name("abcdefghijklmnoé");
        assert_eq!(record.name(), "abcdefghijklmno");

        record.set_name("");
        assert_eq!(record.name(), "");
    }

    #[test]
    fn capture_then_apply_keeps_live_values() {
        let mut settings = DeviceSettings::default();
        settings.joysticks[1].mode = JoystickMode::Digital;
        settings.joysticks[0].center = XyValuePair::new(500, 530);
        settings.joysticks[0].invert.y = true;
        settings.default_layer = 2;
        settings.debounce_ms = 8;

        let mut record = ProfileRecord::template(0);
        record.capture(&settings);
        assert!(record.is_intact());

        let mut restored = DeviceSettings::default();
        record.apply(&mut restored);
        assert_eq!(restored, settings);
    }

    #[test]
    fn quick_settings_capture_narrows() {
        let mut settings = DeviceSettings::default();
        settings.joysticks[0].deadzone = 400;
        settings.joysticks[1].sensitivity = 20;
        settings.current_profile = 3;

        let mut quick = QuickSettings::default();
        quick.capture(&settings);
        assert_eq!(quick.joy1_deadzone, 255);
        assert_eq!(quick.joy2_sensitivity, 15);
        assert_eq!(quick.active_profile, 3);

        let mut applied = DeviceSettings::default();
        quick.apply(&mut applied);
        assert_eq!(applied.joysticks[0].deadzone, 255);
        assert_eq!(applied.current_profile, 3);
    }
}
