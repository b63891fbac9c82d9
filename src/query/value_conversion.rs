//! Value conversion utilities for SeaQuery to the engine's JSON parameters.
//!
//! Statements are rendered with `MysqlQueryBuilder`, whose backtick identifier quoting
//! matches the engine dialect. Its positional `?` placeholders are then rewritten to the
//! engine's named `@p1`, `@p2`, ... form and each `sea_query::Value` becomes the JSON
//! value bound to that name.

use crate::error::RunnerError;
use crate::executor::SqlStatement;
use chrono::{SecondsFormat, Utc};
use sea_query::{MysqlQueryBuilder, SelectStatement, Value};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Render a SELECT as an engine statement
pub fn render_select(query: &SelectStatement) -> Result<SqlStatement, RunnerError> {
    let (sql, values) = query.build(MysqlQueryBuilder);
    let params = values_to_params(&values)?;
    Ok(SqlStatement::with_params(rewrite_placeholders(&sql), params))
}

/// Bind values to `p1..pN` in order
pub fn values_to_params(values: &sea_query::Values) -> Result<BTreeMap<String, JsonValue>, RunnerError> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| Ok((format!("p{}", i + 1), value_to_json(value)?)))
        .collect()
}

/// Convert a single SeaQuery value
pub fn value_to_json(value: &Value) -> Result<JsonValue, RunnerError> {
    let json = match value {
        Value::Bool(Some(b)) => JsonValue::Bool(*b),
        Value::TinyInt(Some(i)) => JsonValue::from(*i),
        Value::SmallInt(Some(i)) => JsonValue::from(*i),
        Value::Int(Some(i)) => JsonValue::from(*i),
        Value::BigInt(Some(i)) => JsonValue::from(*i),
        Value::TinyUnsigned(Some(u)) => JsonValue::from(*u),
        Value::SmallUnsigned(Some(u)) => JsonValue::from(*u),
        Value::Unsigned(Some(u)) => JsonValue::from(*u),
        Value::BigUnsigned(Some(u)) => {
            if *u > i64::MAX as u64 {
                return Err(RunnerError::Shape(format!(
                    "BigUnsigned value {} exceeds INT64 range",
                    u
                )));
            }
            JsonValue::from(*u)
        }
        Value::Float(Some(f)) => JsonValue::from(*f as f64),
        Value::Double(Some(d)) => JsonValue::from(*d),
        Value::String(Some(s)) => JsonValue::String(s.to_string()),
        Value::Char(Some(c)) => JsonValue::String(c.to_string()),
        Value::Bytes(Some(b)) => JsonValue::Array(b.iter().map(|x| JsonValue::from(*x)).collect()),
        Value::Json(Some(j)) => JsonValue::clone(j),
        Value::ChronoDate(Some(d)) => JsonValue::String(d.to_string()),
        // TIMESTAMP parameters are RFC 3339 in UTC
        Value::ChronoDateTime(Some(dt)) => {
            JsonValue::String(dt.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        Value::ChronoDateTimeUtc(Some(dt)) => {
            JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        Value::ChronoDateTimeWithTimeZone(Some(dt)) => JsonValue::String(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        Value::Uuid(Some(u)) => JsonValue::String(u.to_string()),
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::String(None)
        | Value::Char(None)
        | Value::Bytes(None)
        | Value::Json(None)
        | Value::ChronoDate(None)
        | Value::ChronoDateTime(None)
        | Value::ChronoDateTimeUtc(None)
        | Value::ChronoDateTimeWithTimeZone(None)
        | Value::Uuid(None) => JsonValue::Null,
        _ => {
            return Err(RunnerError::Shape(format!(
                "Unsupported value type in query: {:?}",
                value
            )));
        }
    };
    Ok(json)
}

/// Replace `?` placeholders outside quoted regions with `@p1`, `@p2`, ...
pub fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut next = 1;
    for ch in sql.chars() {
        match quote {
            Some(q) => {
                out.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None if ch == '?' => {
                out.push_str(&format!("@p{next}"));
                next += 1;
            }
            None => {
                if matches!(ch, '\'' | '"' | '`') {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

/// Name positional parameters `p1..pN`
pub fn positional_params(values: Vec<JsonValue>) -> BTreeMap<String, JsonValue> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (format!("p{}", i + 1), v))
        .collect()
}
