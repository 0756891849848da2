//! Finite-or-null serialization for float fields.
//!
//! Every float that leaves the core goes through one of these serializers, so
//! NaN and ±Infinity are written as `null` regardless of the encoder in use.

use serde::Serializer;

/// `Some(x)` when `x` is finite, `None` otherwise.
pub fn finite_value(x: f64) -> Option<f64> {
    if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

/// Flatten an undefined or non-finite value to 0.0.
///
/// Lossy: only for sort keys and the explicitly documented score blends.
pub fn or_zero(value: Option<f64>) -> f64 {
    value.and_then(finite_value).unwrap_or(0.0)
}

pub fn finite<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match finite_value(*value) {
        Some(v) => serializer.serialize_f64(v),
        None => serializer.serialize_none(),
    }
}

pub fn finite_opt<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value.and_then(finite_value) {
        Some(v) => serializer.serialize_f64(v),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Sample {
        #[serde(serialize_with = "finite")]
        plain: f64,
        #[serde(serialize_with = "finite_opt")]
        optional: Option<f64>,
    }

    #[test]
    fn test_non_finite_becomes_null() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let json = serde_json::to_value(Sample { plain: bad, optional: Some(bad) }).unwrap();
            assert_eq!(json, json!({"plain": null, "optional": null}));
        }
    }

    #[test]
    fn test_finite_values_pass_through() {
        let json = serde_json::to_value(Sample { plain: 1.5, optional: None }).unwrap();
        assert_eq!(json, json!({"plain": 1.5, "optional": null}));
    }

    #[test]
    fn test_or_zero() {
        assert_eq!(or_zero(None), 0.0);
        assert_eq!(or_zero(Some(f64::NAN)), 0.0);
        assert_eq!(or_zero(Some(-2.5)), -2.5);
    }
}
