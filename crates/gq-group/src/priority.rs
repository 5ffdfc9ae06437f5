use std::fmt;
use std::str::FromStr;

/// Priorities are stored in tenths (one decimal place), the precision the
/// scheduler file carries.
pub const PRIORITY_SCALE: u64 = 10;

/// Positive scheduler priority weight, fixed-point in tenths.
///
/// Construction from `f64` rounds to the nearest tenth, so rendering with one
/// decimal place and parsing back is exact. Zero, negative, and non-finite
/// weights are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority {
    tenths: u64,
}

impl Priority {
    /// Default weight for new groups (10.0).
    pub const DEFAULT: Priority = Priority { tenths: 100 };

    pub fn from_tenths(tenths: u64) -> Option<Self> {
        (tenths > 0).then_some(Self { tenths })
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let scaled = (value * PRIORITY_SCALE as f64).round();
        if scaled < 1.0 || scaled >= u64::MAX as f64 {
            return None;
        }
        Self::from_tenths(scaled as u64)
    }

    pub fn tenths(self) -> u64 {
        self.tenths
    }

    pub fn as_f64(self) -> f64 {
        self.tenths as f64 / PRIORITY_SCALE as f64
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.tenths / PRIORITY_SCALE,
            self.tenths % PRIORITY_SCALE
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid priority '{0}': expected a number greater than zero")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<f64>()
            .ok()
            .and_then(Priority::from_f64)
            .ok_or_else(|| ParsePriorityError(s.to_string()))
    }
}
