use crate::hal::Board;

pub const RESET_PULSE_MS: u32 = 10;
pub const RESET_SETTLE_MS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TouchError {
    /// Nothing answered after reset.
    NotPresent,
    Bus,
}

/// The touch controller as seen from the dispatcher. Register access and
/// gesture decoding live behind this.
pub trait Touchscreen {
    /// Drives the reset line. `true` holds the controller in reset.
    fn set_reset(&mut self, asserted: bool);

    fn probe(&mut self) -> Result<(), TouchError>;

    /// The controller's interrupt line is asserted.
    fn interrupt_pending(&mut self) -> bool;

    fn handle_touch(&mut self);

    fn calibrate(&mut self) -> bool;

    fn is_touching(&self) -> bool;
}

/// Stand-in for boards without a touch panel.
pub struct Detached;

impl Touchscreen for Detached {
    fn set_reset(&mut self, _asserted: bool) {}

    fn probe(&mut self) -> Result<(), TouchError> {
        Err(TouchError::NotPresent)
    }

    fn interrupt_pending(&mut self) -> bool {
        false
    }

    fn handle_touch(&mut self) {}

    fn calibrate(&mut self) -> bool {
        false
    }

    fn is_touching(&self) -> bool {
        false
    }
}

/// Pulses reset and checks the controller answers. Busy-waits for the
/// pulse and the settle time.
pub fn power_up<T: Touchscreen, B: Board>(touch: &mut T, board: &mut B) -> Result<(), TouchError> {
    touch.set_reset(true);
    board.delay_ms(RESET_PULSE_MS);
    touch.set_reset(false);
    board.delay_ms(RESET_SETTLE_MS);

    touch.probe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBoard, MockTouch};

    #[test]
    fn power_up_pulses_reset_then_probes() {
        let mut board = MockBoard::default();
        let mut touch = MockTouch::default();

        assert_eq!(power_up(&mut touch, &mut board), Ok(()));
        assert_eq!(touch.reset_levels, vec![true, false]);
        assert_eq!(board.delays, vec![RESET_PULSE_MS, RESET_SETTLE_MS]);
        assert_eq!(touch.probes, 1);
    }

    #[test]
    fn detached_panel_is_reported() {
        let mut board = MockBoard::default();
        assert_eq!(power_up(&mut Detached, &mut board), Err(TouchError::NotPresent));
        assert!(!Detached.is_touching());
    }
}
