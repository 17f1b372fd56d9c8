//! Wire-level time types.
//!
//! [`Timestamp`] is microseconds since the Unix epoch as a signed 64-bit
//! integer; [`TimeDuration`] is signed 64-bit nanoseconds. Both are
//! monotonically comparable and additive with saturating arithmetic.

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::reader::Reader;
use crate::ser::AtnDecode;
use crate::ser::AtnEncode;
use crate::writer::Writer;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Microseconds since the Unix epoch, signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    micros: i64,
}

impl Timestamp {
    /// The Unix epoch itself.
    pub const UNIX_EPOCH: Self = Self { micros: 0 };

    /// Build from microseconds since the epoch.
    pub const fn from_micros_since_epoch(micros: i64) -> Self {
        Self { micros }
    }

    /// Microseconds since the epoch.
    pub const fn to_micros_since_epoch(self) -> i64 {
        self.micros
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert from a [`SystemTime`], saturating outside the representable range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let micros = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_micros()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_micros()).map_or(i64::MIN, |m| -m),
        };
        Self { micros }
    }

    /// Convert to a [`SystemTime`].
    pub fn to_system_time(self) -> SystemTime {
        if self.micros >= 0 {
            UNIX_EPOCH + Duration::from_micros(self.micros as u64)
        } else {
            UNIX_EPOCH - Duration::from_micros(self.micros.unsigned_abs())
        }
    }

    /// Add a duration, saturating on overflow.
    pub fn saturating_add(self, duration: TimeDuration) -> Self {
        Self {
            micros: self.micros.saturating_add(duration.to_micros()),
        }
    }

    /// Elapsed time from `earlier` to `self`.
    pub fn duration_since(self, earlier: Self) -> TimeDuration {
        TimeDuration::from_micros(self.micros.saturating_sub(earlier.micros))
    }
}

impl std::ops::Add<TimeDuration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: TimeDuration) -> Timestamp {
        self.saturating_add(rhs)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.micros)
    }
}

impl AtnEncode for Timestamp {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_i64(self.micros);
        Ok(())
    }
}

impl AtnDecode for Timestamp {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { micros: r.get_i64()? })
    }
}

/// Signed duration in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TimeDuration {
    nanos: i64,
}

impl TimeDuration {
    /// The zero duration.
    pub const ZERO: Self = Self { nanos: 0 };

    /// Build from nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Build from microseconds, saturating on overflow.
    pub const fn from_micros(micros: i64) -> Self {
        Self {
            nanos: micros.saturating_mul(1_000),
        }
    }

    /// Nanoseconds.
    pub const fn to_nanos(self) -> i64 {
        self.nanos
    }

    /// Whole microseconds, truncating toward zero.
    pub const fn to_micros(self) -> i64 {
        self.nanos / 1_000
    }

    /// Convert from a std [`Duration`], saturating on overflow.
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            nanos: i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX),
        }
    }

    /// Convert to a std [`Duration`]; negative durations clamp to zero.
    pub fn to_duration(self) -> Duration {
        Duration::from_nanos(self.nanos.max(0) as u64)
    }
}

impl std::ops::Add for TimeDuration {
    type Output = TimeDuration;

    fn add(self, rhs: Self) -> Self {
        Self {
            nanos: self.nanos.saturating_add(rhs.nanos),
        }
    }
}

impl std::fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.nanos)
    }
}

impl AtnEncode for TimeDuration {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_i64(self.nanos);
        Ok(())
    }
}

impl AtnDecode for TimeDuration {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { nanos: r.get_i64()? })
    }
}
