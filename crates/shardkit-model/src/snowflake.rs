//! 64-bit snowflake identifiers: an embedded millisecond timestamp plus
//! worker id, process id, and per-millisecond increment bits.
//!
//! Grounded on `crates/ipico-core/src/read.rs`'s style of a small `Copy`
//! value type with a `TryFrom` constructor that rejects out-of-range
//! input rather than silently clamping it.

use crate::ModelError;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Inclusive lower bound on a valid snowflake's bit length.
pub const SNOWFLAKE_MINIMUM_BIT_LENGTH: u32 = 51;
/// Inclusive upper bound on a valid snowflake's bit length.
///
/// The source (`snakecord/utils.py`) checks against Python's arbitrary-
/// precision `int.bit_length()`, where this bound is meaningful. A `u64`
/// can never exceed 64 bits, so this half of the range check is always
/// satisfied here; it is kept for fidelity with the original constant.
pub const SNOWFLAKE_MAXIMUM_BIT_LENGTH: u32 = 111;

/// The platform epoch, in Unix milliseconds, added to a snowflake's
/// timestamp bits.
const EPOCH_MS: i64 = 1_420_070_400_000;

/// A validated 64-bit identifier encoding a timestamp and provenance bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(u64);

impl Snowflake {
    /// Construct a snowflake, rejecting values whose bit length falls
    /// outside `[SNOWFLAKE_MINIMUM_BIT_LENGTH, SNOWFLAKE_MAXIMUM_BIT_LENGTH]`.
    pub fn new(value: u64) -> Result<Self, ModelError> {
        let bits = bit_length(value);
        if bits < SNOWFLAKE_MINIMUM_BIT_LENGTH || u64::from(bits) > u64::from(SNOWFLAKE_MAXIMUM_BIT_LENGTH) {
            return Err(ModelError::BadValue(format!(
                "snowflake bit length should be {SNOWFLAKE_MINIMUM_BIT_LENGTH} to \
                 {SNOWFLAKE_MAXIMUM_BIT_LENGTH}, got {bits} (value {value})"
            )));
        }
        Ok(Snowflake(value))
    }

    /// The raw 64-bit value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The embedded creation timestamp.
    pub fn datetime(self) -> DateTime<Utc> {
        let millis = i64::try_from(self.0 >> 22).unwrap_or(i64::MAX).saturating_add(EPOCH_MS);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Bits 17-21: the worker id.
    pub const fn worker_id(self) -> u64 {
        (self.0 & 0x3E_0000) >> 17
    }

    /// Bits 12-16: the process id.
    pub const fn process_id(self) -> u64 {
        (self.0 & 0x1_F000) >> 12
    }

    /// Bits 0-11: the per-millisecond increment.
    pub const fn increment(self) -> u64 {
        self.0 & 0xFFF
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for Snowflake {
    type Error = ModelError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Snowflake::new(value)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

fn bit_length(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_values_below_minimum_bit_length() {
        assert!(Snowflake::new(0).is_err());
        assert!(Snowflake::new(1).is_err());
        // 2^50 - 1 has bit length 50, one short of the minimum.
        assert!(Snowflake::new((1u64 << 50) - 1).is_err());
    }

    #[test]
    fn accepts_values_at_and_above_minimum_bit_length() {
        // 2^50 has bit length 51, the minimum.
        assert!(Snowflake::new(1u64 << 50).is_ok());
        assert!(Snowflake::new(u64::MAX).is_ok());
    }

    #[test]
    fn decodes_timestamp_worker_process_and_increment() {
        let worker: u64 = 7;
        let process: u64 = 3;
        let increment: u64 = 42;
        let ms_since_epoch: u64 = 1_000_000;
        let raw = (ms_since_epoch << 22) | (worker << 17) | (process << 12) | increment;
        let id = Snowflake::new(raw).expect("valid snowflake");

        assert_eq!(id.worker_id(), worker);
        assert_eq!(id.process_id(), process);
        assert_eq!(id.increment(), increment);

        let expected_millis = i64::try_from(ms_since_epoch).unwrap() + EPOCH_MS;
        assert_eq!(id.datetime().timestamp_millis(), expected_millis);
    }

    #[test]
    fn display_prints_raw_integer() {
        let id = Snowflake::new(1u64 << 50).unwrap();
        assert_eq!(id.to_string(), (1u64 << 50).to_string());
    }
}
