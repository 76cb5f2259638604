//! Simulated time: femtosecond timestamps plus delta cycles, and duration parsing.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::SimError;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

const UNITS: [(&str, u64); 6] = [
    ("s", FS_PER_S),
    ("ms", FS_PER_MS),
    ("us", FS_PER_US),
    ("ns", FS_PER_NS),
    ("ps", FS_PER_PS),
    ("fs", 1),
];

/// A point in simulated time.
///
/// Ordered by femtoseconds, then by delta cycle. Delta cycles order signal
/// updates that happen at the same instant: a value driven by a process
/// becomes visible one delta later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// Simulated time in femtoseconds.
    pub fs: u64,
    /// Delta cycle within this instant.
    pub delta: u32,
}

impl SimTime {
    /// Time zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A time in femtoseconds, delta 0.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs, delta: 0 }
    }

    /// A time in picoseconds, delta 0.
    pub fn from_ps(ps: u64) -> Self {
        Self::from_fs(ps * FS_PER_PS)
    }

    /// A time in nanoseconds, delta 0.
    pub fn from_ns(ns: u64) -> Self {
        Self::from_fs(ns * FS_PER_NS)
    }

    /// A time in microseconds, delta 0.
    pub fn from_us(us: u64) -> Self {
        Self::from_fs(us * FS_PER_US)
    }

    /// The next delta cycle at the same instant.
    pub fn next_delta(self) -> Self {
        Self {
            fs: self.fs,
            delta: self.delta + 1,
        }
    }

    /// Moves forward to `fs`, resetting the delta counter.
    pub fn advance_to(self, fs: u64) -> Self {
        debug_assert!(fs >= self.fs, "time cannot run backwards: {} -> {fs}", self.fs);
        Self::from_fs(fs)
    }

    /// The instant `duration_fs` after this one (delta 0).
    pub fn after(self, duration_fs: u64) -> Self {
        Self::from_fs(self.fs.saturating_add(duration_fs))
    }

    /// Whole nanoseconds, truncated.
    pub fn to_ns(self) -> u64 {
        self.fs / FS_PER_NS
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fs.cmp(&other.fs).then(self.delta.cmp(&other.delta))
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_duration(self.fs))?;
        if self.delta > 0 {
            write!(f, "+d{}", self.delta)?;
        }
        Ok(())
    }
}

/// Formats a femtosecond duration with the largest unit that divides it exactly.
pub fn format_duration(fs: u64) -> String {
    if fs == 0 {
        return "0 fs".to_string();
    }
    for (unit, scale) in UNITS {
        if fs >= scale && fs % scale == 0 {
            return format!("{} {unit}", fs / scale);
        }
    }
    format!("{fs} fs")
}

/// Parses a duration such as `"4ns"`, `"2 us"` or `"250ps"` into femtoseconds.
pub fn parse_duration(input: &str) -> Result<u64, SimError> {
    let s = input.trim();
    let invalid = |reason: &str| SimError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    if s.is_empty() {
        return Err(invalid("empty duration"));
    }

    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digit_end == 0 {
        return Err(invalid("no numeric value"));
    }
    let number: u64 = s[..digit_end]
        .parse()
        .map_err(|_| invalid("number out of range"))?;

    let unit = s[digit_end..].trim();
    if unit.is_empty() {
        return Err(invalid("missing unit (use fs, ps, ns, us, ms or s)"));
    }
    let scale = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, scale)| *scale)
        .ok_or_else(|| invalid("unknown unit (use fs, ps, ns, us, ms or s)"))?;

    number
        .checked_mul(scale)
        .ok_or_else(|| invalid("duration overflows 64-bit femtoseconds"))
}
