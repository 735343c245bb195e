// Licensed under the Apache-2.0 license

use crate::der::{DerWriter, DER_GENERALIZED_TIME_TAG, DER_UTC_TIME_TAG};

const EPOCH_BASE_YEAR: u32 = 2000;

/// Packed value meaning "no well-defined expiration".
pub const NO_WELL_DEFINED_EXPIRY: u32 = 0;

/// Calendar time in UTC as carried by a Weave certificate.
///
/// Certificates store validity times packed into a `u32` that orders the same
/// way the calendar does, so packed values can be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CertTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CertTime {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub fn pack(&self) -> u32 {
        let years = (self.year as u32).saturating_sub(EPOCH_BASE_YEAR);
        let months = years * 12 + (self.month as u32).saturating_sub(1);
        let days = months * 31 + (self.day as u32).saturating_sub(1);
        let hours = days * 24 + self.hour as u32;
        let minutes = hours * 60 + self.minute as u32;
        minutes * 60 + self.second as u32
    }

    pub fn unpack(packed: u32) -> Self {
        let mut rest = packed;
        let second = (rest % 60) as u8;
        rest /= 60;
        let minute = (rest % 60) as u8;
        rest /= 60;
        let hour = (rest % 24) as u8;
        rest /= 24;
        let day = (rest % 31) as u8 + 1;
        rest /= 31;
        let month = (rest % 12) as u8 + 1;
        rest /= 12;
        Self::new(
            (rest + EPOCH_BASE_YEAR) as u16,
            month,
            day,
            hour,
            minute,
            second,
        )
    }

    /// Converts seconds since the Unix epoch. Times before 2000 clamp to the
    /// packed epoch.
    pub fn from_unix(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;
        let (year, month, day) = civil_from_days(days);
        if year < EPOCH_BASE_YEAR as i64 {
            return Self::new(EPOCH_BASE_YEAR as u16, 1, 1, 0, 0, 0);
        }
        Self::new(
            year as u16,
            month,
            day,
            (rem / 3600) as u8,
            (rem / 60 % 60) as u8,
            (rem % 60) as u8,
        )
    }

    pub fn with_years_added(&self, years: u16) -> Self {
        Self {
            year: self.year + years,
            ..*self
        }
    }

    fn digits(&self, full_year: bool) -> String {
        let year = if full_year {
            format!("{:04}", self.year)
        } else {
            format!("{:02}", self.year % 100)
        };
        format!(
            "{}{:02}{:02}{:02}{:02}{:02}Z",
            year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Encodes a packed certificate time as an X.509 `Time`.
pub(crate) fn der_encode_time(packed: u32, der: &mut DerWriter) {
    if packed == NO_WELL_DEFINED_EXPIRY {
        der.tlv(DER_GENERALIZED_TIME_TAG, b"99991231235959Z");
        return;
    }
    let time = CertTime::unpack(packed);
    if (1950..2050).contains(&time.year) {
        der.tlv(DER_UTC_TIME_TAG, time.digits(false).as_bytes());
    } else {
        der.tlv(DER_GENERALIZED_TIME_TAG, time.digits(true).as_bytes());
    }
}

// Howard Hinnant's days-to-civil conversion.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
