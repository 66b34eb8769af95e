//! Shared value types for the vibrator domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values with invariants (durations are strictly positive and fit the 32-bit
//! wire field) and participate in protocol decisions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::VibratorError;

// ---------------------------------------------------------------------------
// Duration
// ---------------------------------------------------------------------------

/// How long the actuator stays on, in milliseconds.
///
/// Always strictly positive and never larger than `i32::MAX`, because the value
/// is written to the request as a signed 32-bit integer.
/// Deserialization goes through [`DurationMs::new`], so serialized reports
/// cannot smuggle in a value the parser would reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct DurationMs(i32);

impl DurationMs {
    /// Creates a [`DurationMs`], returning `None` if `ms` is zero, negative, or
    /// does not fit in an `i32`.
    #[must_use]
    pub fn new(ms: i64) -> Option<Self> {
        match i32::try_from(ms) {
            Ok(v) if v > 0 => Some(Self(v)),
            _ => None,
        }
    }

    /// Parses a command-line argument into a duration.
    ///
    /// Surrounding whitespace is ignored. Anything that is not a positive
    /// decimal integer is rejected.
    pub fn parse(arg: &str) -> Result<Self, VibratorError> {
        arg.trim()
            .parse::<i64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| VibratorError::InvalidDuration {
                input: arg.to_owned(),
            })
    }

    /// Returns the value as it is encoded on the wire.
    pub fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns the value as a [`std::time::Duration`] for the blocking delay.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(u64::from(self.0.unsigned_abs()))
    }
}

impl TryFrom<i64> for DurationMs {
    type Error = VibratorError;

    fn try_from(ms: i64) -> Result<Self, Self::Error> {
        Self::new(ms).ok_or_else(|| VibratorError::InvalidDuration {
            input: ms.to_string(),
        })
    }
}

impl From<DurationMs> for i32 {
    fn from(duration: DurationMs) -> Self {
        duration.0
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// Dialect
// ---------------------------------------------------------------------------

/// Interface-definition generation spoken by the remote vibrator service.
///
/// Decided once, when the resolver finds the service, and fixed for the rest of
/// the session. It selects both the opcode table row and the payload shape of
/// every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceDialect {
    /// Not resolved. Transactions under this dialect are rejected.
    None,
    /// HIDL `android.hardware.vibrator@1.0` on `/dev/hwbinder`.
    LegacyHidl,
    /// Stable AIDL `android.hardware.vibrator` on `/dev/binder`.
    ModernAidl,
}

impl InterfaceDialect {
    /// Returns `true` if turn-on requests must carry a callback reference.
    pub fn requires_callback(self) -> bool {
        matches!(self, Self::ModernAidl)
    }
}

impl std::fmt::Display for InterfaceDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::LegacyHidl => "HIDL",
            Self::ModernAidl => "AIDL",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
