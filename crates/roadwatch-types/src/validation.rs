//! Field validation shared by every record that enters the store.
//!
//! Validation happens once, when an untrusted `New*` input is turned into a
//! stored record. Stored records are immutable afterwards, so nothing
//! downstream re-validates them.

use chrono::{DateTime, Utc};

/// Smallest accepted surface probability.
pub const MIN_PROBABILITY: f64 = 0.0;

/// Largest accepted surface probability.
pub const MAX_PROBABILITY: f64 = 100.0;

/// A required field was missing or carried an unusable value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A mandatory field was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A timestamp field could not be parsed as RFC3339.
    #[error("field {field} is not a valid RFC3339 timestamp: {value:?}")]
    InvalidTimestamp {
        /// The offending field.
        field: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },

    /// A numeric field was non-finite or outside its accepted range.
    #[error("field {field} is out of range: {value}")]
    OutOfRange {
        /// The offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// An observation interval ends before it starts.
    #[error("observation interval ends ({to}) before it starts ({from})")]
    InvertedInterval {
        /// Interval start.
        from: DateTime<Utc>,
        /// Interval end.
        to: DateTime<Utc>,
    },
}

/// Parse an RFC3339 timestamp into UTC.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTimestamp`] if `value` is not RFC3339.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_parse| ValidationError::InvalidTimestamp {
            field,
            value: value.to_owned(),
        })
}

/// Parse a timestamp that must be present.
///
/// # Errors
///
/// Returns [`ValidationError::MissingField`] for `None` or a blank string,
/// [`ValidationError::InvalidTimestamp`] if the value does not parse.
pub fn require_timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<DateTime<Utc>, ValidationError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => parse_timestamp(field, raw),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Parse a timestamp that may be absent.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTimestamp`] if a value is present but
/// does not parse.
pub fn optional_timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    value.map(|raw| parse_timestamp(field, raw)).transpose()
}

/// Check that a surface probability is finite and within `[0, 100]`.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] otherwise.
pub fn check_probability(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (MIN_PROBABILITY..=MAX_PROBABILITY).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field: "probability",
            value,
        })
    }
}

/// Check that a measurement is finite and non-negative.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] otherwise.
pub fn check_non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_and_offset_timestamps() {
        let utc = parse_timestamp("t", "2016-12-07T11:10:00Z");
        let offset = parse_timestamp("t", "2016-12-07T12:10:00+01:00");
        assert!(utc.is_ok());
        assert_eq!(utc.ok(), offset.ok());
    }

    #[test]
    fn interval_string_is_not_a_timestamp() {
        let result = parse_timestamp("dateObserved", "2016-12-07T11:10:00Z/2016-12-07T11:15:00Z");
        assert!(matches!(
            result,
            Err(ValidationError::InvalidTimestamp { field: "dateObserved", .. })
        ));
    }

    #[test]
    fn blank_required_timestamp_is_missing() {
        assert_eq!(
            require_timestamp("dateObserved", Some("  ")),
            Err(ValidationError::MissingField("dateObserved"))
        );
        assert_eq!(
            require_timestamp("dateObserved", None),
            Err(ValidationError::MissingField("dateObserved"))
        );
    }

    #[test]
    fn probability_bounds_are_inclusive() {
        assert!(check_probability(0.0).is_ok());
        assert!(check_probability(100.0).is_ok());
        assert!(check_probability(100.5).is_err());
        assert!(check_probability(-1.0).is_err());
        assert!(check_probability(f64::NAN).is_err());
    }

    #[test]
    fn negative_speed_is_rejected() {
        assert!(check_non_negative("averageVehicleSpeed", 17.3).is_ok());
        assert!(check_non_negative("averageVehicleSpeed", -0.1).is_err());
        assert!(check_non_negative("averageVehicleSpeed", f64::INFINITY).is_err());
    }
}
