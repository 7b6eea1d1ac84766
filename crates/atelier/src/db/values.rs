//! Column value encoding shared by the repositories.
//!
//! Timestamps are stored as RFC 3339 text, money as decimal text.
//! Decoding is read-tolerant: malformed values are logged and replaced.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

pub fn parse_optional_timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("parse_timestamp: dropping unparseable '{}': {}", s, e);
            None
        }
    })
}

pub fn format_decimal(d: Decimal) -> String {
    d.normalize().to_string()
}

pub fn parse_decimal(s: &str, column: &str, row_id: &str) -> Decimal {
    Decimal::from_str(s.trim()).unwrap_or_else(|e| {
        log::warn!(
            "Invalid decimal '{}' in column {} of row {}, treating as 0: {}",
            s,
            column,
            row_id,
            e
        );
        Decimal::ZERO
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(now));
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_optional_timestamp_drops_garbage() {
        assert!(parse_optional_timestamp(Some("yesterday")).is_none());
        assert!(parse_optional_timestamp(None).is_none());
        assert!(parse_optional_timestamp(Some("2026-01-01T00:00:00Z")).is_some());
    }

    #[test]
    fn test_decimal_format_strips_trailing_zeros() {
        assert_eq!(format_decimal(Decimal::new(55000, 2)), "550");
        assert_eq!(format_decimal(Decimal::new(12345, 2)), "123.45");
    }

    #[test]
    fn test_parse_decimal_falls_back_to_zero() {
        assert_eq!(parse_decimal("abc", "amount", "r1"), Decimal::ZERO);
        assert_eq!(parse_decimal(" 42.5 ", "amount", "r1"), Decimal::new(425, 1));
    }
}
