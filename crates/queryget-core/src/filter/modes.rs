//! Value handling for the built-in filter modes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use queryget_proto::{CompareOp, Predicate, Value};

use crate::error::{Error, Result};

/// Filter modes understood without hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMode {
    /// No mode declared: custom filter hook, else plain equality.
    Default,
    /// Equality, or membership for lists.
    Plain,
    /// Forced membership.
    In,
    /// Traverse into a relation.
    Relation,
    /// Case-insensitive text match with operator prefixes.
    Text,
    /// Numeric comparison with operator prefixes.
    Number,
    /// Boolean flag.
    Flag,
    /// Timestamp comparison with a fixed operator.
    Date(CompareOp),
    /// Spatial column; only null tests are supported.
    Point,
    /// Unknown mode, resolved through hooks.
    Custom(String),
}

impl FilterMode {
    /// Parse a declared mode. Unknown names are preserved verbatim.
    pub fn parse(mode: Option<&str>) -> Self {
        let Some(raw) = mode else {
            return FilterMode::Default;
        };
        match crate::catalog::mode_key(raw).as_str() {
            "" | "null" | "default" => FilterMode::Default,
            "plain" => FilterMode::Plain,
            "in" => FilterMode::In,
            "relation" | "rel" => FilterMode::Relation,
            "string" | "text" => FilterMode::Text,
            "number" => FilterMode::Number,
            "bool" | "boolean" | "flag" => FilterMode::Flag,
            "date" | "datetime" | "time" => FilterMode::Date(CompareOp::Eq),
            "datemin" | "datetimemin" | "timemin" | "min" => FilterMode::Date(CompareOp::Ge),
            "datemax" | "datetimemax" | "timemax" | "max" => FilterMode::Date(CompareOp::Le),
            "datebefore" | "before" => FilterMode::Date(CompareOp::Lt),
            "dateafter" | "after" => FilterMode::Date(CompareOp::Gt),
            "point" => FilterMode::Point,
            _ => FilterMode::Custom(raw.to_string()),
        }
    }

    /// Check if a registered mode hook may replace this mode.
    ///
    /// Plain, membership and relation filters are structural and never
    /// dispatched to hooks.
    pub fn is_overridable(&self) -> bool {
        !matches!(self, FilterMode::Plain | FilterMode::In | FilterMode::Relation)
    }
}

/// Null tests and the empty-string test written as request values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sentinel {
    Null,
    NotNull,
    Empty,
}

impl Sentinel {
    /// Recognize `null:`, `notnull:`, `empty:` and the legacy `:null`, `:notnull`.
    pub(crate) fn parse(value: &Value) -> Option<Self> {
        let text = value.as_str()?.trim().to_ascii_lowercase();
        match text.as_str() {
            "null:" | ":null" => Some(Sentinel::Null),
            "notnull:" | ":notnull" => Some(Sentinel::NotNull),
            "empty:" => Some(Sentinel::Empty),
            _ => None,
        }
    }

    fn null_test(self, column: &str) -> Option<Predicate> {
        match self {
            Sentinel::Null => Some(Predicate::is_null(column)),
            Sentinel::NotNull => Some(Predicate::is_not_null(column)),
            Sentinel::Empty => None,
        }
    }
}

/// Split a comma-separated string into a list.
pub(crate) fn split_list(value: &Value) -> Vec<Value> {
    match value {
        Value::String(s) if s.contains(',') => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Value::from)
            .collect(),
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Equality, or membership when the value is a list.
pub(crate) fn plain(column: &str, value: &Value) -> Option<Predicate> {
    Some(match value {
        Value::List(items) => Predicate::in_values(column, items.clone()),
        other => Predicate::eq(column, other.clone()),
    })
}

/// Membership. Comma-separated strings are split.
pub(crate) fn membership(column: &str, value: &Value) -> Option<Predicate> {
    Some(Predicate::in_values(column, split_list(value)))
}

/// Case-insensitive text match.
///
/// Lists compile to a disjunction of their elements.
pub(crate) fn text(column: &str, value: &Value) -> Option<Predicate> {
    if value.is_empty() {
        return None;
    }
    if let Value::List(items) = value {
        let branches = items.iter().filter_map(|item| text(column, item)).collect();
        return Predicate::any(branches);
    }

    match Sentinel::parse(value) {
        Some(Sentinel::Empty) => return Some(Predicate::eq(column, "")),
        Some(sentinel) => return sentinel.null_test(column),
        None => {}
    }

    let lower = value.to_text()?.to_lowercase();
    if let Some(rest) = lower.strip_prefix("not:") {
        Some(Predicate::not_ilike(column, rest))
    } else if let Some(rest) = lower.strip_prefix("like:") {
        Some(Predicate::ilike(column, rest))
    } else {
        Some(Predicate::ilike(column, lower))
    }
}

/// Numeric comparison with `lt:`, `lte:`, `gt:`, `gte:` prefixes.
pub(crate) fn number(column: &str, value: &Value) -> Option<Predicate> {
    if value.is_null() {
        return None;
    }
    if let Some(sentinel) = Sentinel::parse(value) {
        return sentinel.null_test(column);
    }
    if let Value::List(items) = value {
        let values = items.iter().cloned().map(Value::numeric).collect();
        return Some(Predicate::in_values(column, values));
    }

    if let Some(s) = value.as_str() {
        let lower = s.trim().to_ascii_lowercase();
        for (prefix, op) in [
            ("lte:", CompareOp::Le),
            ("lt:", CompareOp::Lt),
            ("gte:", CompareOp::Ge),
            ("gt:", CompareOp::Gt),
        ] {
            if let Some(rest) = lower.strip_prefix(prefix) {
                return Some(Predicate::compare(
                    column,
                    op,
                    Value::from(rest.trim()).numeric(),
                ));
            }
        }
    }
    Some(Predicate::eq(column, value.clone().numeric()))
}

/// Parse a boolean token.
pub(crate) fn flag_token(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(1) => Some(true),
        Value::Int(0) => Some(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Boolean flag. Unrecognized tokens compare with `false` unless `strict`.
pub(crate) fn flag(column: &str, value: &Value, key: &str, strict: bool) -> Result<Option<Predicate>> {
    if value.is_null() {
        return Ok(None);
    }
    if let Some(sentinel) = Sentinel::parse(value) {
        return Ok(sentinel.null_test(column));
    }
    match flag_token(value) {
        Some(b) => Ok(Some(Predicate::eq(column, b))),
        None if strict => Err(Error::invalid_value(
            key,
            format!("{value} is not a boolean token"),
        )),
        None => Ok(Some(Predicate::eq(column, false))),
    }
}

/// Timestamp comparison.
pub(crate) fn date(column: &str, op: CompareOp, value: &Value, key: &str) -> Result<Option<Predicate>> {
    if value.is_empty() {
        return Ok(None);
    }
    if let Some(sentinel) = Sentinel::parse(value) {
        return Ok(sentinel.null_test(column));
    }
    let at = parse_timestamp(value)
        .ok_or_else(|| Error::invalid_value(key, format!("{value} is not a timestamp")))?;
    Ok(Some(Predicate::compare(column, op, at)))
}

/// Spatial filter: null tests only; any other value matches everything.
pub(crate) fn point(column: &str, value: &Value) -> Option<Predicate> {
    Sentinel::parse(value).and_then(|s| s.null_test(column))
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or epoch seconds as UTC.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(t) => Some(*t),
        Value::Int(secs) => Utc.timestamp_opt(*secs, 0).single(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Some(t.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
                if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(t.and_utc());
                }
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
            }
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                return s.parse().ok().and_then(|secs| Utc.timestamp_opt(secs, 0).single());
            }
            None
        }
        _ => None,
    }
}
