//! Schema-driven type coercion of row sets.
//!
//! Values that cannot be represented under the target type become
//! [`Value::Null`]; nothing is reported beyond per-column null counts.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::core::{FieldSpec, FieldType, RowSet, Value};

/// Per-column count of non-null source values turned into nulls.
pub type CoercionStats = BTreeMap<String, usize>;

/// Naive date-time layouts tried after RFC 3339, in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Offset-carrying layouts (e.g. `2023-01-02 10:00:00+02:00`).
const DATETIME_TZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Years BigQuery accepts in a TIMESTAMP column.
const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Lowercase column names, then coerce every column named in `fields`.
///
/// Columns with no matching field pass through untouched; fields with no
/// matching column are skipped.
pub fn coerce_row_set(rows: &mut RowSet, fields: &[FieldSpec]) -> CoercionStats {
    rows.lowercase_columns();

    let mut stats = CoercionStats::new();
    for field in fields {
        let name = field.name.to_lowercase();
        for idx in rows.column_indexes(&name) {
            let null_as_true =
                field.field_type == FieldType::Boolean && boolean_null_is_true(rows, idx);
            let mut nulled = 0usize;
            rows.map_column(idx, |v| {
                let was_null = v.is_null();
                let out = match v {
                    Value::Null if field.field_type == FieldType::Boolean => {
                        Value::Boolean(null_as_true)
                    }
                    v => coerce_value(v, field.field_type),
                };
                if !was_null && out.is_null() {
                    nulled += 1;
                }
                out
            });
            if nulled > 0 {
                debug!(
                    "Column {}: {} value(s) not convertible to {}, set to NULL",
                    name, nulled, field.field_type
                );
                *stats.entry(name.clone()).or_insert(0) += nulled;
            }
        }
    }
    stats
}

/// How NULL casts in a BOOLEAN column.
///
/// A column whose non-null values are all numeric holds NULL as NaN, which
/// is truthy. In any other column (text, mixed, or all NULL) NULL is false.
fn boolean_null_is_true(rows: &RowSet, idx: usize) -> bool {
    let mut present = rows.column_values(idx).filter(|v| !v.is_null()).peekable();
    present.peek().is_some()
        && present.all(|v| matches!(v, Value::Integer(_) | Value::Float(_)))
}

/// Coerce one value to `field_type`.
///
/// A lone NULL cast to BOOLEAN is false; [`coerce_row_set`] decides per
/// column.
pub fn coerce_value(value: Value, field_type: FieldType) -> Value {
    match field_type {
        FieldType::Integer => to_integer(&value).map_or(Value::Null, Value::Integer),
        FieldType::Float => to_float(&value).map_or(Value::Null, Value::Float),
        FieldType::Boolean => Value::Boolean(to_boolean(&value)),
        FieldType::Timestamp => to_timestamp(&value).map_or(Value::Null, Value::Timestamp),
        FieldType::String => value,
    }
}

/// Numeric parse of a value, `None` when unparsable or NaN.
pub fn to_float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Boolean(b) => f64::from(u8::from(*b)),
        Value::Text(s) => parse_number(s)?,
        Value::Bytes(b) => parse_number(std::str::from_utf8(b).ok()?)?,
        Value::Null | Value::Timestamp(_) => return None,
    };
    if f.is_nan() {
        None
    } else {
        Some(f)
    }
}

/// Numeric parse to a whole number.
///
/// Fractional, non-finite, and out-of-range values yield `None`.
pub fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Boolean(b) => Some(i64::from(*b)),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| float_to_int(parse_number(s)?))
        }
        other => float_to_int(to_float(other)?),
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or past it overflows i64.
    if f.is_finite()
        && f.fract() == 0.0
        && f >= -9.223_372_036_854_776e18
        && f < 9.223_372_036_854_776e18
    {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    // Rust's float parser also accepts "inf"/"infinity"/"nan" spellings.
    s.parse::<f64>().ok()
}

/// Direct truthiness cast. NaN is truthy; a bare NULL is false.
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Integer(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Boolean(b) => *b,
        Value::Text(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::Timestamp(_) => true,
    }
}

/// Date-time parse, normalized to UTC. Numbers are Unix epoch nanoseconds.
///
/// Results outside BigQuery's TIMESTAMP range are `None`.
pub fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let ts = match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Integer(nanos) => Some(DateTime::from_timestamp_nanos(*nanos)),
        Value::Float(f) => epoch_nanos(*f),
        Value::Text(s) => parse_timestamp(s),
        Value::Bytes(b) => parse_timestamp(std::str::from_utf8(b).ok()?),
        Value::Null | Value::Boolean(_) => None,
    }?;
    TIMESTAMP_YEARS.contains(&ts.year()).then_some(ts)
}

fn epoch_nanos(f: f64) -> Option<DateTime<Utc>> {
    let nanos = f.round();
    // 2^63 is exactly representable; anything at or past it overflows i64.
    if !nanos.is_finite()
        || nanos < -9.223_372_036_854_776e18
        || nanos >= 9.223_372_036_854_776e18
    {
        return None;
    }
    Some(DateTime::from_timestamp_nanos(nanos as i64))
}

/// Parse a textual timestamp in any of the accepted layouts.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_TZ_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    // Trailing "Z" / " UTC" on an otherwise naive value.
    let naive_part = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s);
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive_part, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(naive_part, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::default_tables;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(coerce_value(Value::Integer(7), FieldType::Integer), Value::Integer(7));
        assert_eq!(coerce_value(Value::from(" 42 "), FieldType::Integer), Value::Integer(42));
        assert_eq!(coerce_value(Value::from("3.0"), FieldType::Integer), Value::Integer(3));
        assert_eq!(coerce_value(Value::Float(5.0), FieldType::Integer), Value::Integer(5));
        assert_eq!(coerce_value(Value::from("1e3"), FieldType::Integer), Value::Integer(1000));
        assert!(coerce_value(Value::from("abc"), FieldType::Integer).is_null());
        assert!(coerce_value(Value::from(""), FieldType::Integer).is_null());
        assert!(coerce_value(Value::Float(2.5), FieldType::Integer).is_null());
        assert!(coerce_value(Value::Float(f64::INFINITY), FieldType::Integer).is_null());
        assert!(coerce_value(Value::Null, FieldType::Integer).is_null());
    }

    #[test]
    fn test_integer_keeps_full_i64_precision() {
        let big = "9223372036854775807";
        assert_eq!(
            coerce_value(Value::from(big), FieldType::Integer),
            Value::Integer(i64::MAX)
        );
        assert!(coerce_value(Value::from("1e19"), FieldType::Integer).is_null());
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(coerce_value(Value::from("19.99"), FieldType::Float), Value::Float(19.99));
        assert_eq!(coerce_value(Value::Integer(3), FieldType::Float), Value::Float(3.0));
        assert!(coerce_value(Value::from("12,50"), FieldType::Float).is_null());
        assert!(coerce_value(Value::from("NaN"), FieldType::Float).is_null());
        assert!(coerce_value(Value::Null, FieldType::Float).is_null());
    }

    #[test]
    fn test_boolean_is_a_plain_cast() {
        assert_eq!(coerce_value(Value::Integer(0), FieldType::Boolean), Value::Boolean(false));
        assert_eq!(coerce_value(Value::Integer(1), FieldType::Boolean), Value::Boolean(true));
        assert_eq!(coerce_value(Value::Float(0.0), FieldType::Boolean), Value::Boolean(false));
        assert_eq!(coerce_value(Value::from(""), FieldType::Boolean), Value::Boolean(false));
        // Any non-empty string is truthy, including "false".
        assert_eq!(coerce_value(Value::from("false"), FieldType::Boolean), Value::Boolean(true));
        assert_eq!(coerce_value(Value::Float(f64::NAN), FieldType::Boolean), Value::Boolean(true));
        assert_eq!(coerce_value(Value::Null, FieldType::Boolean), Value::Boolean(false));
    }

    fn refunded(values: Vec<Value>) -> Vec<Value> {
        let mut rows = RowSet::from_rows(
            vec!["Refunded".into()],
            values.into_iter().map(|v| vec![v]).collect(),
        )
        .unwrap();
        coerce_row_set(&mut rows, &[FieldSpec::new("refunded", FieldType::Boolean)]);
        rows.column_values(0).cloned().collect()
    }

    #[test]
    fn test_boolean_null_in_numeric_column_is_true() {
        assert_eq!(
            refunded(vec![Value::Integer(0), Value::Null, Value::Integer(1)]),
            vec![Value::Boolean(false), Value::Boolean(true), Value::Boolean(true)]
        );
        assert_eq!(
            refunded(vec![Value::Float(0.0), Value::Null]),
            vec![Value::Boolean(false), Value::Boolean(true)]
        );
    }

    #[test]
    fn test_boolean_null_in_text_column_is_false() {
        assert_eq!(
            refunded(vec![Value::from("yes"), Value::Null]),
            vec![Value::Boolean(true), Value::Boolean(false)]
        );
        // Mixed storage classes behave like text.
        assert_eq!(
            refunded(vec![Value::Integer(1), Value::from("0"), Value::Null]),
            vec![Value::Boolean(true), Value::Boolean(true), Value::Boolean(false)]
        );
        assert_eq!(
            refunded(vec![Value::Null, Value::Null]),
            vec![Value::Boolean(false), Value::Boolean(false)]
        );
    }

    #[test]
    fn test_timestamp_coercion() {
        assert_eq!(
            to_timestamp(&Value::from("2023-01-02 10:00:00")),
            Some(ts("2023-01-02T10:00:00Z"))
        );
        assert_eq!(
            to_timestamp(&Value::from("2023-01-02T10:00:00.250")),
            Some(ts("2023-01-02T10:00:00.250Z"))
        );
        assert_eq!(
            to_timestamp(&Value::from("2023-01-02T10:00:00+02:00")),
            Some(ts("2023-01-02T08:00:00Z"))
        );
        assert_eq!(
            to_timestamp(&Value::from("2023-01-02 10:00:00+0200")),
            Some(ts("2023-01-02T08:00:00Z"))
        );
        assert_eq!(
            to_timestamp(&Value::from("2023-01-02 10:00:00 UTC")),
            Some(ts("2023-01-02T10:00:00Z"))
        );
        assert_eq!(to_timestamp(&Value::from("2023-01-02")), Some(ts("2023-01-02T00:00:00Z")));
        assert_eq!(to_timestamp(&Value::from("2023/01/02")), Some(ts("2023-01-02T00:00:00Z")));
        assert_eq!(to_timestamp(&Value::Integer(0)), Some(ts("1970-01-01T00:00:00Z")));
    }

    #[test]
    fn test_numeric_timestamps_are_epoch_nanoseconds() {
        assert_eq!(
            to_timestamp(&Value::Integer(1_600_000_000)),
            Some(ts("1970-01-01T00:00:01.600Z"))
        );
        assert_eq!(
            to_timestamp(&Value::Integer(1_600_000_000_000_000_000)),
            Some(ts("2020-09-13T12:26:40Z"))
        );
        assert_eq!(to_timestamp(&Value::Float(1.5e9)), Some(ts("1970-01-01T00:00:01.500Z")));
        assert!(to_timestamp(&Value::Float(1e19)).is_none());
    }

    #[test]
    fn test_timestamp_outside_bigquery_range_is_null() {
        let far = NaiveDate::from_ymd_opt(52671, 12, 25)
            .unwrap()
            .and_hms_opt(12, 26, 40)
            .unwrap()
            .and_utc();
        assert!(coerce_value(Value::Timestamp(far), FieldType::Timestamp).is_null());

        let last = ts("9999-12-31T23:59:59Z");
        assert_eq!(
            coerce_value(Value::Timestamp(last), FieldType::Timestamp),
            Value::Timestamp(last)
        );
        assert_eq!(
            to_timestamp(&Value::from("0001-01-01")),
            Some(ts("0001-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn test_timestamp_failures_become_null() {
        for bad in ["not-a-date", "", "2023-13-01", "2023-02-30 10:00:00", "yesterday"] {
            assert!(
                coerce_value(Value::from(bad), FieldType::Timestamp).is_null(),
                "{bad:?} should not parse"
            );
        }
        assert!(coerce_value(Value::Float(f64::NAN), FieldType::Timestamp).is_null());
    }

    #[test]
    fn test_string_untouched() {
        assert_eq!(coerce_value(Value::Integer(5), FieldType::String), Value::Integer(5));
        assert_eq!(coerce_value(Value::from("x"), FieldType::String), Value::from("x"));
    }

    #[test]
    fn test_providers_bad_registered_date() {
        let providers = &default_tables()[1];
        let mut rows = RowSet::from_rows(
            vec![
                "Id".into(),
                "DefaultOfferType".into(),
                "Country".into(),
                "RegisteredDate".into(),
            ],
            vec![
                vec![
                    Value::Integer(1),
                    Value::from("bag"),
                    Value::from("DK"),
                    Value::from("2021-05-01 09:30:00"),
                ],
                vec![
                    Value::Integer(2),
                    Value::from("meal"),
                    Value::from("SE"),
                    Value::from("not-a-date"),
                ],
                vec![
                    Value::Integer(3),
                    Value::from("bag"),
                    Value::from("FI"),
                    Value::from("2022-11-11"),
                ],
            ],
        )
        .unwrap();

        let stats = coerce_row_set(&mut rows, &providers.fields);

        assert_eq!(
            rows.columns(),
            &["id", "defaultoffertype", "country", "registereddate"]
        );
        let idx = rows.column_index("registereddate").unwrap();
        let dates: Vec<&Value> = rows.column_values(idx).collect();
        assert_eq!(dates[0], &Value::Timestamp(ts("2021-05-01T09:30:00Z")));
        assert!(dates[1].is_null());
        assert_eq!(dates[2], &Value::Timestamp(ts("2022-11-11T00:00:00Z")));
        assert_eq!(stats.get("registereddate"), Some(&1));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_unlisted_columns_pass_through_and_missing_fields_skip() {
        let users = &default_tables()[2];
        let mut rows = RowSet::from_rows(
            vec!["ID".into(), "Nickname".into()],
            vec![vec![Value::from("10"), Value::from("0042")]],
        )
        .unwrap();

        let stats = coerce_row_set(&mut rows, &users.fields);

        assert_eq!(rows.columns(), &["id", "nickname"]);
        assert_eq!(rows.rows()[0], vec![Value::Integer(10), Value::from("0042")]);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_orders_row_coercion() {
        let orders = &default_tables()[0];
        let mut rows = RowSet::from_rows(
            vec![
                "id".into(),
                "createdAt".into(),
                "userId".into(),
                "quantity".into(),
                "refunded".into(),
                "currency".into(),
                "sales".into(),
                "providerId".into(),
            ],
            vec![vec![
                Value::from("1"),
                Value::from("2023-03-04 05:06:07"),
                Value::Integer(9),
                Value::from("two"),
                Value::Integer(0),
                Value::from("EUR"),
                Value::from("12.5"),
                Value::Null,
            ]],
        )
        .unwrap();

        let stats = coerce_row_set(&mut rows, &orders.fields);

        assert_eq!(
            rows.rows()[0],
            vec![
                Value::Integer(1),
                Value::Timestamp(ts("2023-03-04T05:06:07Z")),
                Value::Integer(9),
                Value::Null,
                Value::Boolean(false),
                Value::from("EUR"),
                Value::Float(12.5),
                Value::Null,
            ]
        );
        // providerid was already NULL, so only quantity counts.
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.get("quantity"), Some(&1));
    }

    #[test]
    fn test_coercion_is_deterministic() {
        let fields = &default_tables()[2].fields;
        let build = || {
            RowSet::from_rows(
                vec!["id".into(), "registereddate".into()],
                vec![vec![Value::from("5"), Value::from("2020-02-02")]],
            )
            .unwrap()
        };
        let mut a = build();
        let mut b = build();
        coerce_row_set(&mut a, fields);
        coerce_row_set(&mut b, fields);
        assert_eq!(a, b);

        // Coercing already-coerced data changes nothing.
        let before = a.clone();
        coerce_row_set(&mut a, fields);
        assert_eq!(a, before);
    }
}
