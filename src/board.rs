/**
 *  RP2040 side of the board capabilities: direct-wired keys, the four
 *  joystick axes on the ADC pins and the two mode switches.
 */
use combo_kiboard::{
    config::{JOYSTICK_COUNT, MATRIX_COLS, MATRIX_ROWS},
    hal::{AnalogInput, AxisChannel, Board, Clock, DirectPinMatrix, JoystickId, MatrixInput},
};
use defmt::warn;
use embassy_rp::{
    adc::{self, Adc},
    gpio::{AnyPin, Input},
};
use embassy_time::{block_for, Duration, Instant};

pub type KeyPin = Input<'static, AnyPin>;

pub struct RpBoard {
    keys: DirectPinMatrix<KeyPin, MATRIX_ROWS, MATRIX_COLS>,
    adc: Adc<'static, adc::Blocking>,
    /// X1, Y1, X2, Y2.
    axes: [adc::Channel<'static>; 4],
    /// Last good reading per channel, reused when a conversion fails.
    last_axes: [u16; 4],
    mode_switches: [KeyPin; JOYSTICK_COUNT],
}

impl RpBoard {
    pub fn new(
        keys: [[KeyPin; MATRIX_COLS]; MATRIX_ROWS],
        adc: Adc<'static, adc::Blocking>,
        axes: [adc::Channel<'static>; 4],
        mode_switches: [KeyPin; JOYSTICK_COUNT],
    ) -> Self {
        Self {
            keys: DirectPinMatrix::new(keys),
            adc,
            axes,
            last_axes: [1 << 11; 4],
            mode_switches,
        }
    }
}

impl Clock for RpBoard {
    fn now_ms(&self) -> u32 {
        // wraps after ~49 days, everything downstream uses wrapping math
        Instant::now().as_millis() as u32
    }
}

impl MatrixInput for RpBoard {
    fn key_closed(&mut self, row: usize, col: usize) -> bool {
        self.keys.key_closed(row, col)
    }
}

impl AnalogInput for RpBoard {
    fn read_axis(&mut self, channel: AxisChannel) -> u16 {
        let index = channel.index();
        match self.adc.blocking_read(&mut self.axes[index]) {
            Ok(value) => {
                self.last_axes[index] = value;
                value
            }
            Err(e) => {
                warn!("ADC read failed on channel {}: {}", index, e);
                self.last_axes[index]
            }
        }
    }

    fn adc_resolution_bits(&self) -> u8 {
        12
    }
}

impl Board for RpBoard {
    fn mode_switch_level(&mut self, joystick: JoystickId) -> bool {
        self.mode_switches[joystick.index()].is_high()
    }

    fn delay_ms(&mut self, ms: u32) {
        block_for(Duration::from_millis(u64::from(ms)));
    }
}
