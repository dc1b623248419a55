/**
 *  Seam to the keyboard framework that owns the USB HID transport, layers,
 *  the combo detector and the console.
 */
use crate::{config::CUSTOM_KEYCODE_BASE, joystick::{AxisReport, JoystickKey}};

pub trait HostLink {
    /// A digital-mode joystick direction went down.
    fn register_key(&mut self, key: JoystickKey);

    fn unregister_key(&mut self, key: JoystickKey);

    fn send_axes(&mut self, report: &AxisReport);

    /// Turns the framework's combo detection on or off.
    fn set_combos_enabled(&mut self, enabled: bool);

    fn move_to_layer(&mut self, layer: u8);

    fn set_default_layer(&mut self, layer: u8);

    /// Diagnostic console, one line per call.
    fn print_line(&mut self, line: &str);
}

/// Answer to the framework's per-key callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum KeyDisposition {
    /// Handled here, the framework should do nothing else with it.
    Consumed,
    PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum CustomKeycode {
    /// Zero based profile slot.
    Profile(u8),
    Joystick1Mode,
    Joystick2Mode,
    TouchCalibrate,
    ComboToggle,
}

impl CustomKeycode {
    pub const COUNT: u16 = 8;

    pub fn from_keycode(keycode: u16) -> Option<Self> {
        let offset = keycode.checked_sub(CUSTOM_KEYCODE_BASE)?;
        Some(match offset {
            0..=3 => CustomKeycode::Profile(offset as u8),
            4 => CustomKeycode::Joystick1Mode,
            5 => CustomKeycode::Joystick2Mode,
            6 => CustomKeycode::TouchCalibrate,
            7 => CustomKeycode::ComboToggle,
            _ => return None,
        })
    }

    pub fn keycode(self) -> u16 {
        CUSTOM_KEYCODE_BASE
            + match self {
                CustomKeycode::Profile(slot) => u16::from(slot.min(3)),
                CustomKeycode::Joystick1Mode => 4,
                CustomKeycode::Joystick2Mode => 5,
                CustomKeycode::TouchCalibrate => 6,
                CustomKeycode::ComboToggle => 7,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keycodes_map_both_ways() {
        for offset in 0..CustomKeycode::COUNT {
            let keycode = CUSTOM_KEYCODE_BASE + offset;
            let custom = CustomKeycode::from_keycode(keycode).unwrap();
            assert_eq!(custom.keycode(), keycode);
        }
        assert_eq!(
            CustomKeycode::from_keycode(CUSTOM_KEYCODE_BASE + 2),
            Some(CustomKeycode::Profile(2))
        );
    }

    #[test]
    fn regular_keycodes_are_not_custom() {
        assert_eq!(CustomKeycode::from_keycode(0x04), None);
        assert_eq!(CustomKeycode::from_keycode(CUSTOM_KEYCODE_BASE - 1), None);
        assert_eq!(
            CustomKeycode::from_keycode(CUSTOM_KEYCODE_BASE + CustomKeycode::COUNT),
            None
        );
    }
}
