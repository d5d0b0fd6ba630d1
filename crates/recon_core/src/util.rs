//! Field parsing and normalization helpers shared by the feed readers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::conf::{
    C_TIMESTAMP_DISPLAY_FORMAT, N_EPOCH_SECONDS_MAX, N_EPOCH_TEXT_DIGITS_MIN, TUP_DATE_FORMATS,
    TUP_TIMESTAMP_FORMATS,
};

/// Case-insensitive, whitespace-trimmed header key.
pub(crate) fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

/// Parse a ledger/event amount.
///
/// Accepts thousands separators, a leading currency sign, an explicit sign and
/// accounting negatives such as `(12.50)`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut c_value = raw.trim();
    let mut if_negative = false;
    if let Some(inner) = c_value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        c_value = inner.trim();
        if_negative = true;
    }
    if let Some(rest) = c_value.strip_prefix('-') {
        c_value = rest.trim_start();
        if_negative = !if_negative;
    } else if let Some(rest) = c_value.strip_prefix('+') {
        c_value = rest.trim_start();
    }
    let c_value = c_value.trim_start_matches('$').replace(',', "");
    if c_value.is_empty() || c_value.starts_with(['-', '+']) {
        return None;
    }

    let amount = Decimal::from_str(&c_value)
        .or_else(|_| Decimal::from_scientific(&c_value))
        .ok()?;
    Some(if if_negative { -amount } else { amount })
}

/// Signed amount in integer cents, rounded half away from zero.
pub fn derive_amount_cents(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Parse a post date. Timestamp strings contribute their date part.
pub fn parse_post_date(raw: &str) -> Option<NaiveDate> {
    let c_value = raw.trim();
    if c_value.is_empty() {
        return None;
    }
    TUP_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(c_value, fmt).ok())
        .or_else(|| parse_timestamp(c_value).map(|ts| ts.date_naive()))
}

/// Parse a timestamp into UTC. Values without an offset are taken as UTC.
///
/// Bare numbers are epoch values only with at least ten integer digits, so a
/// compact date such as `20240301` is rejected rather than read as 1970.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let c_value = raw.trim();
    if c_value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(c_value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(ts) = TUP_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(c_value, fmt).ok())
    {
        return Some(ts.and_utc());
    }
    let n_digits = c_value
        .trim_start_matches(['-', '+'])
        .split('.')
        .next()
        .map_or(0, str::len);
    if n_digits < N_EPOCH_TEXT_DIGITS_MIN {
        return None;
    }
    c_value.parse::<f64>().ok().and_then(derive_timestamp_from_epoch)
}

/// Epoch seconds below `1e11`, epoch milliseconds otherwise.
pub fn derive_timestamp_from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let n_ms = if value.abs() < N_EPOCH_SECONDS_MAX {
        value * 1000.0
    } else {
        value
    };
    DateTime::from_timestamp_millis(n_ms.round() as i64)
}

/// Display form used in the frames and the workbook.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(C_TIMESTAMP_DISPLAY_FORMAT).to_string()
}

/// Walk `a.b.c` through nested JSON objects.
pub(crate) fn lookup_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(found) = value.get(path) {
        return Some(found);
    }
    path.split('.')
        .try_fold(value, |cur, key| cur.get(key))
        .filter(|v| !v.is_null())
}

/// Scalar JSON value as trimmed text; `null`, objects and arrays give `None`.
pub(crate) fn derive_json_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let c_value = s.trim();
            (!c_value.is_empty()).then(|| c_value.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JSON timestamp: numbers are epoch values, strings go through [`parse_timestamp`].
pub(crate) fn derive_json_timestamp(
    value: Option<&Value>,
) -> Result<Option<DateTime<Utc>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(derive_timestamp_from_epoch)
            .map(Some)
            .ok_or_else(|| format!("invalid epoch timestamp {n}")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| format!("invalid timestamp {s:?}")),
        Some(other) => Err(format!("invalid timestamp {other}")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_amount_variants() {
        assert_eq!(parse_amount("1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_amount(" $12.00 "), Some(dec!(12.00)));
        assert_eq!(parse_amount("-5"), Some(dec!(-5)));
        assert_eq!(parse_amount("(12.50)"), Some(dec!(-12.50)));
        assert_eq!(parse_amount("-$3.10"), Some(dec!(-3.10)));
        assert_eq!(parse_amount("+7"), Some(dec!(7)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("--1"), None);
    }

    #[test]
    fn amount_cents_rounds_half_away_from_zero() {
        assert_eq!(derive_amount_cents(dec!(12.345)), Some(1235));
        assert_eq!(derive_amount_cents(dec!(-12.345)), Some(-1235));
        assert_eq!(derive_amount_cents(dec!(0.1)), Some(10));
    }

    #[test]
    fn parse_post_date_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        for raw in [
            "2024-03-01",
            "03/01/2024",
            "3/1/2024",
            "20240301",
            "03/01/24",
            "01-Mar-2024",
            "2024-03-01T10:00:00Z",
        ] {
            assert_eq!(parse_post_date(raw), Some(d), "{raw}");
        }
        assert_eq!(parse_post_date("not a date"), None);
    }

    #[test]
    fn parse_timestamp_formats() {
        let ts = parse_timestamp("2024-03-01 10:15:30.250").expect("ts");
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (10, 15, 30));
        assert_eq!(ts.timestamp_subsec_millis(), 250);

        let ts_offset = parse_timestamp("2024-03-01T10:15:30+02:00").expect("rfc3339");
        assert_eq!(ts_offset.hour(), 8);

        let ts_db2 = parse_timestamp("2024-03-01-10.15.30.123456").expect("db2");
        assert_eq!(ts_db2.timestamp_subsec_millis(), 123);

        let ts_us = parse_timestamp("03/01/2024 10:15:30").expect("us");
        assert_eq!(ts_us.day(), 1);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn epoch_seconds_and_millis() {
        let ts_s = derive_timestamp_from_epoch(1_709_287_200.0).expect("s");
        let ts_ms = derive_timestamp_from_epoch(1_709_287_200_000.0).expect("ms");
        assert_eq!(ts_s, ts_ms);
        assert_eq!(parse_timestamp("1709287200"), Some(ts_s));
        assert_eq!(parse_timestamp("1709287200000.0"), Some(ts_s));
    }

    #[test]
    fn short_bare_numbers_are_not_epochs() {
        assert_eq!(parse_timestamp("20240301"), None);
        assert_eq!(parse_timestamp("123456789"), None);
        assert_eq!(parse_timestamp("-42"), None);
        // JSON numbers keep the plain epoch reading.
        assert!(derive_json_timestamp(Some(&json!(20_240_301))).expect("epoch").is_some());
    }

    #[test]
    fn json_path_lookup_and_text() {
        let value = json!({
            "timing": {"received_at": "2024-03-01 10:00:00"},
            "amount": -12.5,
            "id": null
        });
        assert_eq!(
            derive_json_text(lookup_json_path(&value, "timing.received_at")).as_deref(),
            Some("2024-03-01 10:00:00")
        );
        assert_eq!(
            derive_json_text(lookup_json_path(&value, "amount")).as_deref(),
            Some("-12.5")
        );
        assert_eq!(derive_json_text(lookup_json_path(&value, "id")), None);
        assert!(lookup_json_path(&value, "timing.missing").is_none());
    }

    #[test]
    fn json_timestamp_variants() {
        assert_eq!(derive_json_timestamp(None), Ok(None));
        assert_eq!(derive_json_timestamp(Some(&json!(""))), Ok(None));
        assert!(derive_json_timestamp(Some(&json!(1_709_287_200))).expect("epoch").is_some());
        assert!(derive_json_timestamp(Some(&json!("garbage"))).is_err());
        assert!(derive_json_timestamp(Some(&json!([1]))).is_err());
    }
}
