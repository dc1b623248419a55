/**
 *  Combo table shared with the framework's combo detector. The detector
 *  reports completions by index, this module knows what each index means.
 */
use crate::{config::DEFAULT_COMBO_TERM_MS, hal::JoystickId};

pub const COMBO_COUNT: usize = 15;

/// Bitmask with every combo enabled.
pub const ALL_COMBOS_MASK: u16 = (1 << COMBO_COUNT) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct MatrixPos {
    pub row: u8,
    pub col: u8,
}

const K00: MatrixPos = MatrixPos { row: 0, col: 0 };
const K01: MatrixPos = MatrixPos { row: 0, col: 1 };
const K02: MatrixPos = MatrixPos { row: 0, col: 2 };
const K03: MatrixPos = MatrixPos { row: 0, col: 3 };
const K10: MatrixPos = MatrixPos { row: 1, col: 0 };
const K11: MatrixPos = MatrixPos { row: 1, col: 1 };
const K12: MatrixPos = MatrixPos { row: 1, col: 2 };
const K13: MatrixPos = MatrixPos { row: 1, col: 3 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ComboId {
    Profile1,
    Profile2,
    Profile3,
    Profile4,
    Joystick1Toggle,
    Joystick2Toggle,
    Calibrate,
    ResetSettings,
    Layer1,
    Layer2,
    Layer3,
    EmergencyReset,
    TouchToggle,
    DebugMode,
    FactoryReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ComboAction {
    SwitchProfile(u8),
    ToggleJoystickMode(JoystickId),
    Calibrate,
    ResetSettings,
    MoveToLayer(u8),
    EmergencyReset,
    ToggleTouchscreen,
    ToggleDebug,
    FactoryReset,
}

impl ComboId {
    pub const ALL: [ComboId; COMBO_COUNT] = [
        ComboId::Profile1,
        ComboId::Profile2,
        ComboId::Profile3,
        ComboId::Profile4,
        ComboId::Joystick1Toggle,
        ComboId::Joystick2Toggle,
        ComboId::Calibrate,
        ComboId::ResetSettings,
        ComboId::Layer1,
        ComboId::Layer2,
        ComboId::Layer3,
        ComboId::EmergencyReset,
        ComboId::TouchToggle,
        ComboId::DebugMode,
        ComboId::FactoryReset,
    ];

    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Bit of this combo in a profile's enable mask.
    pub fn mask_bit(self) -> u16 {
        1 << self.index()
    }

    /// Matrix positions that make up the chord.
    pub fn keys(self) -> &'static [MatrixPos] {
        match self {
            ComboId::Profile1 => &[K00, K10],
            ComboId::Profile2 => &[K01, K11],
            ComboId::Profile3 => &[K02, K12],
            ComboId::Profile4 => &[K03, K13],
            ComboId::Joystick1Toggle => &[K00, K01],
            ComboId::Joystick2Toggle => &[K02, K03],
            ComboId::Calibrate => &[K10, K11, K12],
            ComboId::ResetSettings => &[K00, K01, K02],
            ComboId::Layer1 => &[K00, K11],
            ComboId::Layer2 => &[K01, K12],
            ComboId::Layer3 => &[K02, K13],
            ComboId::EmergencyReset => &[K00, K03, K10, K13],
            ComboId::TouchToggle => &[K10, K12],
            ComboId::DebugMode => &[K01, K02, K11, K12],
            ComboId::FactoryReset => &[K00, K01, K02, K03],
        }
    }

    /// How long the detector waits for the whole chord.
    pub fn term_ms(self) -> u16 {
        match self {
            // dangerous, make them deliberate
            ComboId::EmergencyReset | ComboId::FactoryReset => 500,
            ComboId::Calibrate | ComboId::DebugMode => 300,
            _ => DEFAULT_COMBO_TERM_MS,
        }
    }

    pub fn must_tap(self) -> bool {
        matches!(
            self,
            ComboId::Profile1
                | ComboId::Profile2
                | ComboId::Profile3
                | ComboId::Profile4
                | ComboId::Joystick1Toggle
                | ComboId::Joystick2Toggle
                | ComboId::TouchToggle
        )
    }

    pub fn must_hold(self) -> bool {
        matches!(self, ComboId::EmergencyReset | ComboId::FactoryReset)
    }

    pub fn action(self) -> ComboAction {
        match self {
            ComboId::Profile1 => ComboAction::SwitchProfile(0),
            ComboId::Profile2 => ComboAction::SwitchProfile(1),
            ComboId::Profile3 => ComboAction::SwitchProfile(2),
            ComboId::Profile4 => ComboAction::SwitchProfile(3),
            ComboId::Joystick1Toggle => ComboAction::ToggleJoystickMode(JoystickId::One),
            ComboId::Joystick2Toggle => ComboAction::ToggleJoystickMode(JoystickId::Two),
            ComboId::Calibrate => ComboAction::Calibrate,
            ComboId::ResetSettings => ComboAction::ResetSettings,
            ComboId::Layer1 => ComboAction::MoveToLayer(1),
            ComboId::Layer2 => ComboAction::MoveToLayer(2),
            ComboId::Layer3 => ComboAction::MoveToLayer(3),
            ComboId::EmergencyReset => ComboAction::EmergencyReset,
            ComboId::TouchToggle => ComboAction::ToggleTouchscreen,
            ComboId::DebugMode => ComboAction::ToggleDebug,
            ComboId::FactoryReset => ComboAction::FactoryReset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MATRIX_COLS, MATRIX_ROWS};

    #[test]
    fn index_round_trip() {
        for (i, combo) in ComboId::ALL.iter().enumerate() {
            assert_eq!(usize::from(combo.index()), i);
            assert_eq!(ComboId::from_index(i as u16), Some(*combo));
        }
        assert_eq!(ComboId::from_index(COMBO_COUNT as u16), None);
        assert_eq!(ALL_COMBOS_MASK, 0x7FFF);
    }

    #[test]
    fn dangerous_combos_are_slow_and_held() {
        assert_eq!(ComboId::FactoryReset.term_ms(), 500);
        assert_eq!(ComboId::EmergencyReset.term_ms(), 500);
        assert_eq!(ComboId::Calibrate.term_ms(), 300);
        assert_eq!(ComboId::DebugMode.term_ms(), 300);
        assert_eq!(ComboId::Layer2.term_ms(), DEFAULT_COMBO_TERM_MS);

        for combo in ComboId::ALL {
            assert!(!(combo.must_tap() && combo.must_hold()));
        }
        assert!(ComboId::FactoryReset.must_hold());
        assert!(ComboId::Profile3.must_tap());
        assert!(!ComboId::Calibrate.must_tap() && !ComboId::Calibrate.must_hold());
    }

    #[test]
    fn chords_are_distinct_and_on_the_matrix() {
        for (i, a) in ComboId::ALL.iter().enumerate() {
            assert!(a.keys().len() >= 2);
            for key in a.keys() {
                assert!(usize::from(key.row) < MATRIX_ROWS && usize::from(key.col) < MATRIX_COLS);
            }
            for b in &ComboId::ALL[i + 1..] {
                assert_ne!(a.keys(), b.keys());
            }
        }
    }

    #[test]
    fn layer_combos_target_layers_one_to_three() {
        assert_eq!(ComboId::Layer1.action(), ComboAction::MoveToLayer(1));
        assert_eq!(ComboId::Layer3.action(), ComboAction::MoveToLayer(3));
        assert_eq!(ComboId::Profile4.action(), ComboAction::SwitchProfile(3));
    }
}
