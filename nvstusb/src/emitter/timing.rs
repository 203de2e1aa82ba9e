// The emitter's 8051 core runs from a 48 MHz clock. Timer 0 counts at
// clock/12, timer 2 at clock/4. Both count up to overflow, so a duration is
// loaded as a negative tick count.

pub const CLOCK_HZ: f64 = 48_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDomain {
    T0,
    T2,
}

impl TimerDomain {
    pub fn clock_hz(self) -> f64 {
        match self {
            TimerDomain::T0 => CLOCK_HZ / 12.0,
            TimerDomain::T2 => CLOCK_HZ / 4.0,
        }
    }

    pub fn ticks_per_us(self) -> f64 {
        self.clock_hz() / 1_000_000.0
    }
}

/// Reload value for a countdown of `micros` microseconds.
///
/// The `+ 1` matches the hardware reload. Nothing is range checked: a duration
/// too long for the field silently wraps on the device.
pub fn count(domain: TimerDomain, micros: f64) -> i32 {
    (-(micros * domain.ticks_per_us()) + 1.0) as i32
}

/// `count` as it goes on the wire, two's complement little-endian.
pub fn count_le(domain: TimerDomain, micros: f64) -> [u8; 4] {
    (count(domain, micros) as u32).to_le_bytes()
}

/// Length of one frame at `rate` Hz, in microseconds.
pub fn frame_period_us(rate: f64) -> f64 {
    1_000_000.0 / rate
}
