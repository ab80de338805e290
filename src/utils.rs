//! Lenient decoding of backend payloads.
//!
//! The backend is loose about types: ids and amounts show up as numbers or
//! numeric strings, dates may carry a time suffix and the returned flag can be
//! a boolean, `0`/`1` or a timestamp. These helpers normalise all of that at
//! the decoding boundary so the rest of the crate sees one representation.

use chrono::NaiveDate;
use reqwest::multipart::Form;
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

/// Wire envelope for list endpoints: either a bare array or `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Wrapped { data } | Listing::Bare(data) => data,
        }
    }
}

/// Wire envelope for single-record responses.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Single<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Single<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Single::Wrapped { data } | Single::Bare(data) => data,
        }
    }
}

/// Build a multipart body out of plain text fields.
pub(crate) fn multipart(fields: Vec<(&'static str, String)>) -> Form {
    fields
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value))
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                // decimal columns come back as "3000.00"
                let (whole, frac) = s.split_once('.')?;
                if frac.chars().all(|c| c == '0') {
                    whole.parse().ok()
                } else {
                    None
                }
            })
        }
        _ => None,
    }
}

pub(crate) fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(d)?;
    integer(&value)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("expected a non-negative integer, got {value}")))
}

pub(crate) fn opt_year<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
    let value = Value::deserialize(d)?;
    match &value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        other => integer(other)
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a year, got {value}"))),
    }
}

pub(crate) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Interpret the backend's returned marker.
///
/// Missing, `null`, `false`, `0` and empty strings mean not returned. Any
/// other value, a return timestamp included, means returned.
pub(crate) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Parse the date part of `2024-01-10`, `2024-01-10 08:00:00` or an ISO timestamp.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub(crate) fn date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(d)?;
    parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date {raw:?}")))
}

pub(crate) fn opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "flag")]
        returned: bool,
        #[serde(default, deserialize_with = "amount")]
        amount: u64,
    }

    fn probe(v: Value) -> Probe {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn returned_flag_accepts_backend_variants() {
        assert!(!probe(json!({})).returned);
        assert!(!probe(json!({"returned": null})).returned);
        assert!(!probe(json!({"returned": 0})).returned);
        assert!(!probe(json!({"returned": "0"})).returned);
        assert!(probe(json!({"returned": 1})).returned);
        assert!(probe(json!({"returned": true})).returned);
        assert!(probe(json!({"returned": "2024-01-12 10:00:00"})).returned);
    }

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(probe(json!({"amount": 3000})).amount, 3000);
        assert_eq!(probe(json!({"amount": "3000"})).amount, 3000);
        assert_eq!(probe(json!({"amount": "3000.00"})).amount, 3000);
        assert!(serde_json::from_value::<Probe>(json!({"amount": "3000.50"})).is_err());
        assert!(serde_json::from_value::<Probe>(json!({"amount": -5})).is_err());
    }

    #[test]
    fn dates_drop_time_suffix() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(parse_date("2024-01-10"), Some(d));
        assert_eq!(parse_date("2024-01-10 08:30:00"), Some(d));
        assert_eq!(parse_date("2024-01-10T00:00:00.000000Z"), Some(d));
        assert_eq!(parse_date("10/01/2024"), None);
    }

    #[test]
    fn listing_accepts_bare_and_wrapped_arrays() {
        let bare: Listing<u32> = serde_json::from_value(json!([1, 2])).unwrap();
        let wrapped: Listing<u32> =
            serde_json::from_value(json!({"message": "ok", "data": [3]})).unwrap();
        assert_eq!(bare.into_vec(), vec![1, 2]);
        assert_eq!(wrapped.into_vec(), vec![3]);
    }
}
