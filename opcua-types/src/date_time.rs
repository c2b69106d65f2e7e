// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `DateTime`: 100-nanosecond ticks since 1601-01-01 UTC (spec §3), encoded
//! as a signed 64-bit integer.

use std::{
    fmt,
    io::{Read, Write},
};

use std::ops::{Add, Sub};

use chrono::{DateTime as ChronoDateTime, Duration, TimeZone, Utc};

use crate::encoding::*;

/// Number of 100ns ticks between 1601-01-01 and 1970-01-01 (the Windows FILETIME epoch offset).
const EPOCH_OFFSET_TICKS: i64 = 116_444_736_000_000_000;

/// An OPC UA timestamp: 100ns ticks since 1601-01-01 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(i64);

impl Default for DateTime {
    fn default() -> Self {
        DateTime(0)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_chrono())
    }
}

impl DateTime {
    /// The current time.
    pub fn now() -> Self {
        Self::from_chrono(Utc::now())
    }

    /// The null/minimum timestamp (OPC UA epoch, 1601-01-01).
    pub fn null() -> Self {
        DateTime(0)
    }

    /// Build from raw 100ns ticks since 1601-01-01.
    pub fn from_ticks(ticks: i64) -> Self {
        DateTime(ticks)
    }

    /// Raw 100ns ticks since 1601-01-01.
    pub fn ticks(&self) -> i64 {
        self.0
    }

    /// Convert from a `chrono::DateTime<Utc>`.
    pub fn from_chrono(dt: ChronoDateTime<Utc>) -> Self {
        let unix_ticks = dt.timestamp() * 10_000_000 + i64::from(dt.timestamp_subsec_nanos()) / 100;
        DateTime(unix_ticks + EPOCH_OFFSET_TICKS)
    }

    /// Convert to a `chrono::DateTime<Utc>`. Ticks before the Unix epoch
    /// saturate to `DateTime::<Utc>::MIN_UTC`.
    pub fn as_chrono(&self) -> ChronoDateTime<Utc> {
        let unix_ticks = self.0 - EPOCH_OFFSET_TICKS;
        let secs = unix_ticks.div_euclid(10_000_000);
        let subsec_ticks = unix_ticks.rem_euclid(10_000_000);
        Utc.timestamp_opt(secs, (subsec_ticks * 100) as u32)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
    }
}

impl BinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_i64(stream, self.0)
    }
}

impl Add<Duration> for DateTime {
    type Output = DateTime;

    fn add(self, rhs: Duration) -> DateTime {
        let ticks = rhs.num_nanoseconds().map(|ns| ns / 100).unwrap_or(i64::MAX);
        DateTime(self.0.saturating_add(ticks))
    }
}

impl Sub for DateTime {
    type Output = Duration;

    fn sub(self, rhs: DateTime) -> Duration {
        Duration::nanoseconds(self.0.saturating_sub(rhs.0).saturating_mul(100))
    }
}

impl BinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(DateTime(read_i64(stream)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let now = DateTime::now();
        let bytes = now.encode_to_vec();
        let decoded = DateTime::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, now);
    }

    #[test]
    fn epoch_conversion() {
        let unix_epoch = Utc.timestamp_opt(0, 0).unwrap();
        let dt = DateTime::from_chrono(unix_epoch);
        assert_eq!(dt.ticks(), EPOCH_OFFSET_TICKS);
    }
}
