use core::ops::{Add, Sub};

#[derive(Debug, Clone, Default, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct XyValuePair<T> {
    pub x: T,
    pub y: T,
}

impl<T> XyValuePair<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> XyValuePair<U> {
        XyValuePair {
            x: f(self.x),
            y: f(self.y),
        }
    }
}

impl<T: Add<Output = T>> Add for XyValuePair<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl<T: Sub<Output = T>> Sub for XyValuePair<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Milliseconds between two readings of the 32 bit uptime counter.
///
/// The counter wraps after ~49.7 days, so this must be used instead of
/// comparing raw timestamps.
#[inline]
pub fn elapsed_ms(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Non-blocking "at least N ms since the last run" gate.
///
/// The first poll always fires, after that a poll fires once `period_ms`
/// has elapsed and re-arms from the time it fired.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period_ms: u32,
    last_ms: Option<u32>,
}

impl Cadence {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    pub fn set_period_ms(&mut self, period_ms: u32) {
        self.period_ms = period_ms;
    }

    pub fn poll(&mut self, now: u32) -> bool {
        match self.last_ms {
            Some(last) if elapsed_ms(last, now) < self.period_ms => false,
            _ => {
                self.last_ms = Some(now);
                true
            }
        }
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection).
pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_survives_counter_wrap() {
        let last = u32::MAX - 4;
        let now = 5;
        assert_eq!(elapsed_ms(last, now), 10);
        assert_eq!(elapsed_ms(100, 150), 50);
        assert_eq!(elapsed_ms(7, 7), 0);
    }

    #[test]
    fn cadence_fires_first_then_on_period() {
        let mut cadence = Cadence::new(10);
        assert!(cadence.poll(1000));
        assert!(!cadence.poll(1005));
        assert!(!cadence.poll(1009));
        assert!(cadence.poll(1010));
        assert!(!cadence.poll(1011));
    }

    #[test]
    fn cadence_across_wrap() {
        let mut cadence = Cadence::new(50);
        assert!(cadence.poll(u32::MAX - 20));
        assert!(!cadence.poll(10));
        assert!(cadence.poll(29));
    }

    #[test]
    fn cadence_with_zero_period_always_fires() {
        let mut cadence = Cadence::new(0);
        assert!(cadence.poll(3));
        assert!(cadence.poll(3));
    }

    #[test]
    fn crc_matches_reference_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
        assert_eq!(crc16_ccitt(&[]), 0xFFFF);
    }

    #[test]
    fn xy_pair_arithmetic() {
        let a = XyValuePair::new(3i16, -4);
        let b = XyValuePair::new(1i16, 1);
        assert_eq!(a + b, XyValuePair::new(4, -3));
        assert_eq!(a - b, XyValuePair::new(2, -5));
        assert_eq!(a.map(|v| v * 2), XyValuePair::new(6, -8));
    }
}
