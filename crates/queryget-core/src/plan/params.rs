//! Flat request parameters.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use queryget_proto::Value;

use crate::error::{Error, Result};

/// Request parameters: string keys to scalar-or-list values, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Create empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URL query string.
    ///
    /// Keys and values are percent-decoded with `+` read as a space. A key
    /// ending in `[]` collects every occurrence into a list; an empty value
    /// is null; a repeated plain key keeps the last value.
    pub fn from_query_str(query: &str) -> Self {
        let mut params = Params::new();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(raw_key);
            let value = decode(raw_value);

            if let Some(list_key) = key.strip_suffix("[]") {
                params.append(list_key, Value::String(value));
            } else if value.is_empty() {
                params.insert(key, Value::Null);
            } else {
                params.insert(key, Value::String(value));
            }
        }
        params
    }

    /// Parse a flat JSON object.
    pub fn from_json(text: &str) -> Result<Self> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut params = Params::new();
        for (key, raw) in object {
            if raw.is_object() {
                return Err(Error::invalid_value(key, "nested objects are not supported"));
            }
            let value: Value = serde_json::from_value(raw)?;
            params.insert(key, value);
        }
        Ok(params)
    }

    /// Set a parameter, replacing an earlier value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`Params::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Append to a list parameter, turning a scalar into a list.
    pub fn append(&mut self, key: &str, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, Value::List(items))) => items.push(value),
            Some((_, slot)) => {
                let previous = std::mem::replace(slot, Value::Null);
                *slot = match previous {
                    Value::Null => Value::List(vec![value]),
                    other => Value::List(vec![other, value]),
                };
            }
            None => self.entries.push((key.to_string(), Value::List(vec![value]))),
        }
    }

    /// Get a parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// First non-null parameter among `names`.
    pub fn first_of<S: AsRef<str>>(&self, names: &[S]) -> Option<&Value> {
        names
            .iter()
            .filter_map(|name| self.get(name.as_ref()))
            .find(|v| !v.is_null())
    }

    /// A parameter read as a list of strings.
    ///
    /// Lists yield their scalar items, strings split on commas. Blank items
    /// are dropped.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(string_list).unwrap_or_default()
    }

    /// Parameters in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Read a value as a list of strings, splitting comma-separated text.
pub(crate) fn string_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::List(items) => items.iter().filter_map(Value::to_text).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        other => other.to_text().into_iter().collect(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn decode(raw: &str) -> String {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
