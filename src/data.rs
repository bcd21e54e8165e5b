use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Output shape used for every normalized date/datetime.
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A scalar cell as it travels from the source file through the transform
/// chain into the target store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// True for null and for strings with no characters at all.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Date-only layouts in priority order. Day-first wins over month-first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Datetime layouts tried after every date-only layout has failed.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S"];

/// `%Y` in chrono accepts short years; only four-digit years count as a match.
const YEARS: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Parses `value` against the fixed pattern list, first match wins.
pub fn parse_date_or_datetime(value: &str) -> Option<NaiveDateTime> {
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt)
            && YEARS.contains(&parsed.year())
        {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt)
            && YEARS.contains(&parsed.year())
        {
            return Some(parsed);
        }
    }
    None
}

pub fn format_iso_datetime(value: &NaiveDateTime) -> String {
    value.format(ISO_DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_prefers_day_first_over_month_first() {
        let parsed = parse_date_or_datetime("04/03/2021").unwrap();
        assert_eq!(format_iso_datetime(&parsed), "2021-03-04T00:00:00");
    }

    #[test]
    fn parse_date_falls_back_to_month_first_when_day_is_out_of_range() {
        let parsed = parse_date_or_datetime("12/31/2020").unwrap();
        assert_eq!(format_iso_datetime(&parsed), "2020-12-31T00:00:00");
    }

    #[test]
    fn parse_date_accepts_slashed_year_first_and_datetime() {
        let parsed = parse_date_or_datetime("2022/07/09").unwrap();
        assert_eq!(format_iso_datetime(&parsed), "2022-07-09T00:00:00");

        let parsed = parse_date_or_datetime("2022-07-09T13:45:10").unwrap();
        assert_eq!(format_iso_datetime(&parsed), "2022-07-09T13:45:10");
    }

    #[test]
    fn parse_date_rejects_free_text() {
        assert!(parse_date_or_datetime("next tuesday").is_none());
        assert!(parse_date_or_datetime("").is_none());
    }

    #[test]
    fn parse_date_requires_four_digit_years() {
        assert!(parse_date_or_datetime("5/6/22").is_none());
        assert!(parse_date_or_datetime("1/2/3").is_none());
        assert!(parse_date_or_datetime("22-06-05").is_none());
        assert!(parse_date_or_datetime("0022-06-05T00:00:00").is_none());
        let parsed = parse_date_or_datetime("5/6/2022").unwrap();
        assert_eq!(format_iso_datetime(&parsed), "2022-06-05T00:00:00");
    }

    #[test]
    fn value_serializes_untagged() {
        let encoded = serde_json::to_string(&vec![
            Value::Null,
            Value::Integer(3),
            Value::from("x"),
            Value::Boolean(true),
        ])
        .unwrap();
        assert_eq!(encoded, r#"[null,3,"x",true]"#);
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Integer(5));
    }
}
