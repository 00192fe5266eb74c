//! Timestamp and time base handling.
//!
//! Presentation times in this tool are exact rationals: a raw counter value
//! plus the time base that interprets it. Field offsets (1001/60000 s and
//! 1001/120000 s) and track end times all flow through these types.

use crate::rational::Rational;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// A time base for converting between timestamp units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBase(pub Rational);

impl TimeBase {
    /// Create a new time base from numerator and denominator.
    pub fn new(num: i64, den: i64) -> Self {
        Self(Rational::new(num, den))
    }

    /// QuickTime movie timescale used for output files (1/120000).
    ///
    /// Large enough to express both 60000- and 120000-denominator field
    /// times without loss.
    pub const MOVIE: Self = Self(Rational { num: 1, den: 120000 });

    /// Millisecond time base (1/1000).
    pub const MILLISECONDS: Self = Self(Rational { num: 1, den: 1000 });

    /// Convert a raw value from this time base to another.
    pub fn convert(&self, value: i64, target: TimeBase) -> i64 {
        self.0.rescale(value, target.0)
    }

    /// Convert a raw value in this time base to seconds.
    pub fn to_seconds(&self, value: i64) -> f64 {
        value as f64 * self.0.to_f64()
    }

    /// Get the time base as a rational.
    pub fn as_rational(&self) -> Rational {
        self.0
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::MOVIE
    }
}

/// A presentation timestamp with an associated time base.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    /// The raw timestamp value.
    pub value: i64,
    /// The time base for interpreting the value.
    pub time_base: TimeBase,
}

impl Timestamp {
    /// Value representing an undefined timestamp.
    pub const NONE: i64 = i64::MIN;

    /// Create a new timestamp.
    pub fn new(value: i64, time_base: TimeBase) -> Self {
        Self { value, time_base }
    }

    /// Create the zero timestamp in the given time base.
    pub fn zero(time_base: TimeBase) -> Self {
        Self { value: 0, time_base }
    }

    /// Create an undefined timestamp.
    pub fn none() -> Self {
        Self {
            value: Self::NONE,
            time_base: TimeBase::default(),
        }
    }

    /// Check if this timestamp is defined.
    pub fn is_valid(&self) -> bool {
        self.value != Self::NONE
    }

    /// Convert to a different time base.
    pub fn rescale(&self, target: TimeBase) -> Self {
        if !self.is_valid() {
            return Self::none();
        }
        Self {
            value: self.time_base.convert(self.value, target),
            time_base: target,
        }
    }

    /// Convert to seconds.
    pub fn to_seconds(&self) -> Option<f64> {
        if self.is_valid() {
            Some(self.time_base.to_seconds(self.value))
        } else {
            None
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::none()
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return !self.is_valid() && !other.is_valid();
        }
        // Compare exactly via cross-multiplication, not in either time base:
        // 1/60000 and 1/120000 values must compare without truncation.
        let lhs = self.value as i128
            * self.time_base.0.num as i128
            * other.time_base.0.den as i128;
        let rhs = other.value as i128
            * other.time_base.0.num as i128
            * self.time_base.0.den as i128;
        lhs == rhs
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        if !self.is_valid() {
            return if !other.is_valid() {
                Ordering::Equal
            } else {
                Ordering::Less
            };
        }
        if !other.is_valid() {
            return Ordering::Greater;
        }

        let lhs = self.value as i128
            * self.time_base.0.num as i128
            * other.time_base.0.den as i128;
        let rhs = other.value as i128
            * other.time_base.0.num as i128
            * self.time_base.0.den as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(secs) = self.to_seconds() {
            let hours = (secs / 3600.0) as u32;
            let mins = ((secs % 3600.0) / 60.0) as u32;
            let secs = secs % 60.0;
            write!(f, "{:02}:{:02}:{:06.3}", hours, mins, secs)
        } else {
            write!(f, "NONE")
        }
    }
}

/// A duration with an associated time base.
///
/// The second field of an interlaced frame sits one `Duration` after the
/// frame's own timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    /// The raw duration value.
    pub value: i64,
    /// The time base for interpreting the value.
    pub time_base: TimeBase,
}

impl Duration {
    /// Create a new duration.
    pub fn new(value: i64, time_base: TimeBase) -> Self {
        Self { value, time_base }
    }

    /// Create a zero duration.
    pub fn zero() -> Self {
        Self {
            value: 0,
            time_base: TimeBase::default(),
        }
    }

    /// Check if this duration is zero.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Convert to a different time base.
    pub fn rescale(&self, target: TimeBase) -> Self {
        Self {
            value: self.time_base.convert(self.value, target),
            time_base: target,
        }
    }

    /// Convert to seconds.
    pub fn to_seconds(&self) -> f64 {
        self.time_base.to_seconds(self.value)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        if !self.is_valid() {
            return self;
        }
        // Land on the finer of the two time bases so a 1/60000 timestamp
        // plus a 1/120000 field offset stays exact.
        if rhs.time_base.0.to_f64() < self.time_base.0.to_f64() {
            let lhs = self.rescale(rhs.time_base);
            Timestamp {
                value: lhs.value + rhs.value,
                time_base: rhs.time_base,
            }
        } else {
            let rhs = rhs.rescale(self.time_base);
            Timestamp {
                value: self.value + rhs.value,
                time_base: self.time_base,
            }
        }
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        if !self.is_valid() || !rhs.is_valid() {
            return Duration::zero();
        }
        let rhs = rhs.rescale(self.time_base);
        Duration {
            value: self.value - rhs.value,
            time_base: self.time_base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_base_convert() {
        let frame = TimeBase::new(1, 30000);
        // 1001/30000 s at the movie timescale.
        assert_eq!(frame.convert(1001, TimeBase::MOVIE), 4004);
    }

    #[test]
    fn test_add_field_duration() {
        // Frame PTS 1001 at 1/60000, field offset 1001 at 1/120000.
        let pts = Timestamp::new(1001, TimeBase::new(1, 60000));
        let field = Duration::new(1001, TimeBase::new(1, 120000));
        let second = pts + field;
        assert_eq!(second.time_base, TimeBase::new(1, 120000));
        assert_eq!(second.value, 3003);

        // The offset survives the round trip exactly.
        assert_eq!(second - pts, field.rescale(second.time_base));
        assert!((field.to_seconds() - 1001.0 / 120000.0).abs() < 1e-12);
    }

    #[test]
    fn test_cross_base_equality() {
        let a = Timestamp::new(1001, TimeBase::new(1, 60000));
        let b = Timestamp::new(2002, TimeBase::new(1, 120000));
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering_with_none() {
        let none = Timestamp::none();
        let zero = Timestamp::zero(TimeBase::MOVIE);
        assert!(none < zero);
        assert_eq!(none, Timestamp::none());
    }

    #[test]
    fn test_display() {
        let ts = Timestamp::new(3_723_500, TimeBase::MILLISECONDS);
        assert_eq!(format!("{}", ts), "01:02:03.500");
    }
}
