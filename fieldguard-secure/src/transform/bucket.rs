//! Bucketed range descriptors.

use crate::error::{SecureError, SecureResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The half-open interval `[min, max)` a value falls in.
///
/// `None` bounds are infinite and persist as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub label: String,
}

/// Places `value` among ascending `boundaries`.
///
/// With boundaries `b0 < ... < bn-1`, the result is `[b(i-1), b(i))` where
/// `b(-1) = -inf` and `b(n) = +inf`.
pub fn bucket_for(value: f64, boundaries: &[f64]) -> SecureResult<Bucket> {
    if boundaries.is_empty() {
        return Err(SecureError::config("bucket boundary list is empty"));
    }
    if !value.is_finite() {
        return Err(SecureError::config("bucketed value must be finite"));
    }

    let i = boundaries.partition_point(|b| *b <= value);
    let min = i.checked_sub(1).map(|j| boundaries[j]);
    let max = boundaries.get(i).copied();

    let label = match (min, max) {
        (None, Some(hi)) => format!("(-inf, {hi})"),
        (Some(lo), Some(hi)) => format!("[{lo}, {hi})"),
        (Some(lo), None) => format!("[{lo}, +inf)"),
        (None, None) => unreachable!("non-empty boundaries always bound one side"),
    };

    Ok(Bucket { min, max, label })
}

/// Reads a numeric JSON value for a numeric strategy.
pub(crate) fn numeric(value: &Value) -> SecureResult<f64> {
    value.as_f64().ok_or_else(|| {
        SecureError::config(format!("BUCKETED fields require a numeric value, got {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: [f64; 3] = [0.0, 10.0, 20.0];

    #[test]
    fn just_below_boundary() {
        let b = bucket_for(9.999, &BOUNDS).unwrap();
        assert_eq!((b.min, b.max), (Some(0.0), Some(10.0)));
        assert_eq!(b.label, "[0, 10)");
    }

    #[test]
    fn boundary_belongs_to_upper_bucket() {
        let b = bucket_for(10.0, &BOUNDS).unwrap();
        assert_eq!((b.min, b.max), (Some(10.0), Some(20.0)));
        assert_eq!(b.label, "[10, 20)");
    }

    #[test]
    fn below_first_boundary_is_unbounded_below() {
        let b = bucket_for(-5.0, &BOUNDS).unwrap();
        assert_eq!((b.min, b.max), (None, Some(0.0)));
        assert_eq!(b.label, "(-inf, 0)");
    }

    #[test]
    fn above_last_boundary_is_unbounded_above() {
        let b = bucket_for(20.0, &BOUNDS).unwrap();
        assert_eq!((b.min, b.max), (Some(20.0), None));
        assert_eq!(b.label, "[20, +inf)");
    }

    #[test]
    fn empty_boundaries_fail() {
        assert!(matches!(
            bucket_for(1.0, &[]),
            Err(SecureError::Configuration(_))
        ));
    }

    #[test]
    fn non_numeric_values_fail() {
        assert!(numeric(&Value::String("5".into())).is_err());
        assert_eq!(numeric(&serde_json::json!(5)).unwrap(), 5.0);
    }

    #[test]
    fn infinite_bounds_serialize_as_null() {
        let json = serde_json::to_value(bucket_for(-1.0, &BOUNDS).unwrap()).unwrap();
        assert_eq!(json["min"], Value::Null);
        assert_eq!(json["max"], serde_json::json!(0.0));
    }
}
