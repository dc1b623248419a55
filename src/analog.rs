use crate::{
    config::{SamplerConfig, AXIS_MIDPOINT, AXIS_RESOLUTION_BITS, JOYSTICK_COUNT, DEFAULT_DEADZONE},
    hal::{AnalogInput, Axis, AxisChannel, JoystickId},
    helpers::{Cadence, XyValuePair},
    joystick::Direction,
};

/// Exponential moving average. A `factor` of 0 or above 8 returns
/// `current` unchanged.
pub fn smooth_analog_value(current: i16, previous: i16, factor: u8) -> i16 {
    if factor == 0 || factor > 8 {
        return current;
    }
    let factor = i32::from(factor);
    ((i32::from(previous) * (factor - 1) + i32::from(current)) / factor) as i16
}

/// Circular deadzone. Inside it the value is forced to (0, 0) and `true`
/// is returned, outside it the value is left alone.
pub fn apply_deadzone(value: &mut XyValuePair<i16>, deadzone: u16) -> bool {
    let magnitude_squared = i64::from(value.x).pow(2) + i64::from(value.y).pow(2);
    if magnitude_squared <= i64::from(deadzone).pow(2) {
        *value = XyValuePair::default();
        return true;
    }
    false
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Directions {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl Directions {
    pub fn from_position(position: XyValuePair<i16>, threshold: i16) -> Self {
        Self {
            left: position.x < -threshold,
            right: position.x > threshold,
            up: position.y > threshold,
            down: position.y < -threshold,
        }
    }

    pub fn get(&self, direction: Direction) -> bool {
        match direction {
            Direction::Left => self.left,
            Direction::Right => self.right,
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }

    pub fn set(&mut self, direction: Direction, value: bool) {
        match direction {
            Direction::Left => self.left = value,
            Direction::Right => self.right = value,
            Direction::Up => self.up = value,
            Direction::Down => self.down = value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct JoystickState {
    /// Smoothed, deadzone-applied deflection from the calibrated center.
    pub position: XyValuePair<i16>,
    pub previous: XyValuePair<i16>,
    pub directions: Directions,
    pub previous_directions: Directions,
    pub last_movement_ms: u32,
    pub in_deadzone: bool,
}

impl JoystickState {
    pub fn is_pushed(&self, direction: Direction) -> bool {
        self.directions.get(direction)
    }

    pub fn just_pushed(&self, direction: Direction) -> bool {
        self.directions.get(direction) && !self.previous_directions.get(direction)
    }

    pub fn just_released(&self, direction: Direction) -> bool {
        !self.directions.get(direction) && self.previous_directions.get(direction)
    }
}

pub struct AnalogSampler {
    joysticks: [JoystickState; JOYSTICK_COUNT],
    centers: [XyValuePair<u16>; JOYSTICK_COUNT],
    deadzones: [u16; JOYSTICK_COUNT],
    config: SamplerConfig,
    cadence: Cadence,
}

impl AnalogSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            joysticks: [JoystickState::default(); JOYSTICK_COUNT],
            centers: [XyValuePair::new(AXIS_MIDPOINT, AXIS_MIDPOINT); JOYSTICK_COUNT],
            deadzones: [DEFAULT_DEADZONE; JOYSTICK_COUNT],
            cadence: Cadence::new(config.sample_interval_ms),
            config,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SamplerConfig) {
        self.cadence.set_period_ms(config.sample_interval_ms);
        self.config = config;
    }

    pub fn state(&self, joystick: JoystickId) -> &JoystickState {
        &self.joysticks[joystick.index()]
    }

    pub fn center(&self, joystick: JoystickId) -> XyValuePair<u16> {
        self.centers[joystick.index()]
    }

    pub fn set_center(&mut self, joystick: JoystickId, center: XyValuePair<u16>) {
        self.centers[joystick.index()] = center;
    }

    pub fn deadzone(&self, joystick: JoystickId) -> u16 {
        self.deadzones[joystick.index()]
    }

    pub fn set_deadzone(&mut self, joystick: JoystickId, deadzone: u16) {
        self.deadzones[joystick.index()] = deadzone;
    }

    /// Samples both sticks if `sample_interval_ms` has passed. Returns
    /// whether new values are available.
    pub fn tick<A: AnalogInput>(&mut self, adc: &mut A, now: u32) -> bool {
        if !self.cadence.poll(now) {
            return false;
        }
        for joystick in JoystickId::ALL {
            self.sample(adc, joystick, now);
        }
        true
    }

    pub fn sample<A: AnalogInput>(&mut self, adc: &mut A, joystick: JoystickId, now: u32) {
        let center = self.centers[joystick.index()];
        let raw = XyValuePair::new(
            centered(read_normalized(adc, AxisChannel::new(joystick, Axis::X)), center.x),
            centered(read_normalized(adc, AxisChannel::new(joystick, Axis::Y)), center.y),
        );

        let config = self.config;
        let deadzone = self.deadzones[joystick.index()];
        let state = &mut self.joysticks[joystick.index()];

        state.previous = state.position;
        state.previous_directions = state.directions;

        let mut value = if config.smoothing_enabled {
            XyValuePair::new(
                smooth_analog_value(raw.x, state.previous.x, config.smoothing_factor),
                smooth_analog_value(raw.y, state.previous.y, config.smoothing_factor),
            )
        } else {
            raw
        };

        state.in_deadzone = apply_deadzone(&mut value, deadzone);
        state.position = value;
        state.directions = Directions::from_position(value, config.digital_threshold);

        if state.position != state.previous {
            state.last_movement_ms = now;
        }
    }

    /// Averages `samples` raw readings per axis and uses the result as the
    /// stick's new resting center.
    pub fn calibrate<A: AnalogInput>(
        &mut self,
        adc: &mut A,
        joystick: JoystickId,
        samples: u16,
    ) -> XyValuePair<u16> {
        let samples = samples.max(1);
        let mut sum = XyValuePair::new(0u32, 0u32);

        for _ in 0..samples {
            sum.x += u32::from(read_normalized(adc, AxisChannel::new(joystick, Axis::X)));
            sum.y += u32::from(read_normalized(adc, AxisChannel::new(joystick, Axis::Y)));
        }

        let center = sum.map(|s| (s / u32::from(samples)) as u16);
        self.centers[joystick.index()] = center;
        self.joysticks[joystick.index()] = JoystickState::default();

        info!(
            "Joystick {} centered at {}/{}",
            joystick.number(),
            center.x,
            center.y
        );

        center
    }
}

/// Reads a channel and rescales it to `AXIS_RESOLUTION_BITS`.
fn read_normalized<A: AnalogInput>(adc: &mut A, channel: AxisChannel) -> u16 {
    let raw = adc.read_axis(channel);
    let bits = adc.adc_resolution_bits();

    if bits > AXIS_RESOLUTION_BITS {
        raw >> (bits - AXIS_RESOLUTION_BITS)
    } else {
        raw << (AXIS_RESOLUTION_BITS - bits)
    }
}

fn centered(raw: u16, center: u16) -> i16 {
    (i32::from(raw) - i32::from(center)).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Adc {
        values: [u16; 4],
        bits: u8,
    }

    impl AnalogInput for Adc {
        fn read_axis(&mut self, channel: AxisChannel) -> u16 {
            self.values[channel.index()]
        }

        fn adc_resolution_bits(&self) -> u8 {
            self.bits
        }
    }

    fn sampler_without_smoothing() -> AnalogSampler {
        AnalogSampler::new(SamplerConfig {
            smoothing_enabled: false,
            ..SamplerConfig::default()
        })
    }

    #[test]
    fn smoothing_boundaries() {
        assert_eq!(smooth_analog_value(100, 0, 0), 100);
        assert_eq!(smooth_analog_value(100, 0, 9), 100);
        assert_eq!(smooth_analog_value(100, 0, 4), 25);
        assert_eq!(smooth_analog_value(100, 0, 1), 100);
        assert_eq!(smooth_analog_value(-80, 40, 8), 25);
    }

    #[test]
    fn deadzone_zeroes_everything_inside_the_circle() {
        for x in -60i16..=60 {
            for y in -60i16..=60 {
                let mut value = XyValuePair::new(x, y);
                let inside = apply_deadzone(&mut value, 50);
                if i32::from(x).pow(2) + i32::from(y).pow(2) <= 2500 {
                    assert!(inside);
                    assert_eq!(value, XyValuePair::new(0, 0));
                } else {
                    assert!(!inside);
                    assert_eq!(value, XyValuePair::new(x, y));
                }
            }
        }
    }

    #[test]
    fn deadzone_handles_extremes_without_overflow() {
        let mut value = XyValuePair::new(i16::MIN, i16::MIN);
        assert!(!apply_deadzone(&mut value, 40_000));
        assert_eq!(value, XyValuePair::new(i16::MIN, i16::MIN));
    }

    #[test]
    fn sample_centers_on_midpoint_and_derives_directions() {
        let mut sampler = sampler_without_smoothing();
        let mut adc = Adc {
            values: [512 + 300, 512, 512, 512 - 250],
            bits: 10,
        };

        assert!(sampler.tick(&mut adc, 0));

        let one = sampler.state(JoystickId::One);
        assert_eq!(one.position, XyValuePair::new(300, 0));
        assert!(one.directions.right && !one.directions.left);
        assert!(!one.in_deadzone);
        assert!(one.just_pushed(Direction::Right));

        let two = sampler.state(JoystickId::Two);
        assert_eq!(two.position, XyValuePair::new(0, -250));
        assert!(two.is_pushed(Direction::Down));
    }

    #[test]
    fn directions_use_threshold_not_deadzone() {
        let mut sampler = sampler_without_smoothing();
        let mut adc = Adc {
            values: [512 + 120, 512, 512, 512],
            bits: 10,
        };

        sampler.sample(&mut adc, JoystickId::One, 0);
        let state = sampler.state(JoystickId::One);
        assert!(!state.in_deadzone);
        assert_eq!(state.position.x, 120);
        assert_eq!(state.directions, Directions::default());
    }

    #[test]
    fn twelve_bit_readings_are_scaled_down() {
        let mut sampler = sampler_without_smoothing();
        let mut adc = Adc {
            values: [2048 + 800, 2048, 2048, 2048],
            bits: 12,
        };

        sampler.sample(&mut adc, JoystickId::One, 0);
        assert_eq!(sampler.state(JoystickId::One).position.x, 200);
        sampler.sample(&mut adc, JoystickId::Two, 0);
        assert!(sampler.state(JoystickId::Two).in_deadzone);
    }

    #[test]
    fn smoothing_feeds_from_previous_output() {
        let mut sampler = AnalogSampler::new(SamplerConfig::default());
        sampler.set_deadzone(JoystickId::One, 0);
        let mut adc = Adc {
            values: [512 + 400, 512, 512, 512],
            bits: 10,
        };

        sampler.sample(&mut adc, JoystickId::One, 0);
        assert_eq!(sampler.state(JoystickId::One).position.x, 100);
        sampler.sample(&mut adc, JoystickId::One, 10);
        assert_eq!(sampler.state(JoystickId::One).position.x, 175);
        assert_eq!(sampler.state(JoystickId::One).last_movement_ms, 10);
    }

    #[test]
    fn calibration_moves_the_center() {
        let mut sampler = sampler_without_smoothing();
        let mut adc = Adc {
            values: [530, 490, 512, 512],
            bits: 10,
        };

        let center = sampler.calibrate(&mut adc, JoystickId::One, 8);
        assert_eq!(center, XyValuePair::new(530, 490));
        assert_eq!(sampler.center(JoystickId::One), center);

        sampler.sample(&mut adc, JoystickId::One, 0);
        assert_eq!(sampler.state(JoystickId::One).position, XyValuePair::new(0, 0));
        assert!(sampler.state(JoystickId::One).in_deadzone);
    }

    #[test]
    fn sampling_is_gated_by_interval() {
        let mut sampler = sampler_without_smoothing();
        let mut adc = Adc {
            values: [512; 4],
            bits: 10,
        };

        assert!(sampler.tick(&mut adc, 0));
        assert!(!sampler.tick(&mut adc, 9));
        assert!(sampler.tick(&mut adc, 10));
    }
}
