//! Secret-offset timestamps.

use crate::error::{SecureError, SecureResult};
use crate::field::TemporalPrecision;
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeDelta, Utc};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an RFC 3339 timestamp, rejecting ones without a timezone.
pub(crate) fn parse_aware(text: &str) -> SecureResult<DateTime<FixedOffset>> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(t) => Ok(t),
        Err(e) => {
            let naive = NAIVE_FORMATS
                .iter()
                .any(|f| NaiveDateTime::parse_from_str(text, f).is_ok());
            if naive {
                Err(SecureError::config(format!(
                    "naive timestamp '{text}' rejected: TEMPORAL_OFFSET requires timezone information"
                )))
            } else {
                Err(SecureError::config(format!("invalid timestamp '{text}': {e}")))
            }
        }
    }
}

/// Truncates (in UTC) then shifts forward by `offset`.
pub(crate) fn shift(
    t: DateTime<FixedOffset>,
    precision: Option<TemporalPrecision>,
    offset: TimeDelta,
) -> SecureResult<DateTime<Utc>> {
    let mut utc = t.with_timezone(&Utc);
    if let Some(precision) = precision {
        // Whole seconds keep every representable year in range.
        let step = precision.as_delta().num_seconds();
        let floored = utc.timestamp().div_euclid(step) * step;
        utc = DateTime::from_timestamp(floored, 0)
            .ok_or_else(|| SecureError::config(format!("cannot truncate timestamp {t}")))?;
    }
    utc.checked_add_signed(offset)
        .ok_or_else(|| SecureError::config("timestamp out of range after offset"))
}

/// Shifts back by `offset`.
pub(crate) fn unshift(t: DateTime<Utc>, offset: TimeDelta) -> SecureResult<DateTime<Utc>> {
    t.checked_sub_signed(offset)
        .ok_or_else(|| SecureError::config("timestamp out of range after offset"))
}

pub(crate) fn format(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
