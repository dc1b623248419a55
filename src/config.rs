/**
 *  Board constants and the runtime-tunable settings shared by the scanner,
 *  the analog sampler, the joystick engines and the profile store.
 */
use crate::{hal::JoystickId, helpers::XyValuePair, joystick::JoystickMode};

pub const MATRIX_ROWS: usize = 2;
pub const MATRIX_COLS: usize = 4;
pub const JOYSTICK_COUNT: usize = 2;

pub const MAX_PROFILES: usize = 4;
pub const PROFILE_NAME_LENGTH: usize = 16;
pub const MAX_TRACKED_INPUTS: usize = 16;

/// Axis values are handled at 10 bit resolution regardless of the ADC.
pub const AXIS_RESOLUTION_BITS: u8 = 10;
pub const AXIS_MIDPOINT: u16 = 1 << (AXIS_RESOLUTION_BITS - 1);
pub const AXIS_LIMIT: i16 = AXIS_MIDPOINT as i16 - 1;

pub const DEFAULT_DEADZONE: u16 = 50;
/// Sensitivity is a multiplier in eighths, 8 leaves the axis untouched.
pub const DEFAULT_SENSITIVITY: u8 = 8;
pub const MAX_SENSITIVITY: u8 = 15;
/// Deflection past which a stick counts as pushed in a direction.
pub const DIGITAL_THRESHOLD: i16 = 200;
pub const CALIBRATION_SAMPLES: u16 = 16;

pub const DEFAULT_COMBO_TERM_MS: u16 = 200;
pub const MODE_SWITCH_POLL_MS: u32 = 50;
pub const AUTO_SAVE_QUIESCENCE_MS: u32 = 5000;
pub const DEFAULT_TOUCH_POLL_MS: u16 = 10;
pub const MAX_LAYERS: u8 = 8;

/// First keycode of the custom range handed to us by the keyboard framework.
pub const CUSTOM_KEYCODE_BASE: u16 = 0x7E40;

/// This needs to be incremented for ANY change to the persisted records
/// else we risk loading a layout we can't read.
pub const CONFIG_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct ScannerConfig {
    pub scan_interval_ms: u32,
    pub debounce_time_ms: u32,
    pub joystick_debounce_ms: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 5,
            debounce_time_ms: 5,
            joystick_debounce_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct SamplerConfig {
    pub sample_interval_ms: u32,
    pub smoothing_enabled: bool,
    /// EMA weight, 1..=8. Anything else turns smoothing off.
    pub smoothing_factor: u8,
    pub digital_threshold: i16,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10,
            smoothing_enabled: true,
            smoothing_factor: 4,
            digital_threshold: DIGITAL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct JoystickSettings {
    pub mode: JoystickMode,
    pub center: XyValuePair<u16>,
    pub deadzone: u16,
    pub sensitivity: u8,
    pub invert: XyValuePair<bool>,
}

impl Default for JoystickSettings {
    fn default() -> Self {
        Self {
            mode: JoystickMode::Analog,
            center: XyValuePair::new(AXIS_MIDPOINT, AXIS_MIDPOINT),
            deadzone: DEFAULT_DEADZONE,
            sensitivity: DEFAULT_SENSITIVITY,
            invert: XyValuePair::default(),
        }
    }
}

/// Live device state. Owned by the controller, written by profile loads
/// and user actions, pushed down into the input pipeline after each change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct DeviceSettings {
    pub joysticks: [JoystickSettings; JOYSTICK_COUNT],
    pub touchscreen_enabled: bool,
    pub combo_enabled: bool,
    pub current_profile: u8,
    pub debug_mode: bool,
    pub debounce_ms: u16,
    pub joystick_poll_ms: u16,
    pub touch_poll_ms: u16,
    pub default_layer: u8,
}

impl DeviceSettings {
    pub fn joystick(&self, id: JoystickId) -> &JoystickSettings {
        &self.joysticks[id.index()]
    }

    pub fn joystick_mut(&mut self, id: JoystickId) -> &mut JoystickSettings {
        &mut self.joysticks[id.index()]
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        let scanner = ScannerConfig::default();
        let sampler = SamplerConfig::default();

        Self {
            joysticks: [JoystickSettings::default(); JOYSTICK_COUNT],
            touchscreen_enabled: true,
            combo_enabled: true,
            current_profile: 0,
            debug_mode: false,
            debounce_ms: scanner.debounce_time_ms as u16,
            joystick_poll_ms: sampler.sample_interval_ms as u16,
            touch_poll_ms: DEFAULT_TOUCH_POLL_MS,
            default_layer: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_board_constants() {
        let scanner = ScannerConfig::default();
        assert_eq!(scanner.scan_interval_ms, 5);
        assert_eq!(scanner.debounce_time_ms, 5);
        assert_eq!(scanner.joystick_debounce_ms, 10);

        let sampler = SamplerConfig::default();
        assert_eq!(sampler.sample_interval_ms, 10);
        assert!(sampler.smoothing_enabled);
        assert_eq!(sampler.smoothing_factor, 4);
        assert_ne!(i32::from(sampler.digital_threshold), i32::from(DEFAULT_DEADZONE));

        let settings = DeviceSettings::default();
        assert_eq!(settings.joystick(JoystickId::Two).center, XyValuePair::new(512, 512));
        assert_eq!(settings.joystick(JoystickId::One).mode, JoystickMode::Analog);
        assert!(settings.combo_enabled && settings.touchscreen_enabled);
        assert_eq!(AXIS_LIMIT, 511);
    }
}
