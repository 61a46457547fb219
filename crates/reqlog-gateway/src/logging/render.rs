//! Rendering of HTTP pieces into metadata values

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde_json::{Map, Value};

/// Bodies above this are summarized instead of logged (1MB)
pub const MAX_BODY_LOG_SIZE: usize = 1024 * 1024;

/// Logged for a body of unknown length that was passed through unread
pub const STREAMED_BODY: &str = "[streamed]";

/// What a logging stage saw of a request or response body
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedBody {
    /// Read in full; its announced length was within [`MAX_BODY_LOG_SIZE`]
    Buffered(Bytes),
    /// Passed through unread, with its announced length if there was one
    Skipped(Option<u64>),
}

impl CapturedBody {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Buffered(bytes) => body_to_json(bytes),
            Self::Skipped(Some(len)) => Value::String(format!("[{} bytes]", len)),
            Self::Skipped(None) => Value::String(STREAMED_BODY.to_string()),
        }
    }
}

impl From<&'static [u8]> for CapturedBody {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Buffered(Bytes::from_static(bytes))
    }
}

/// Body as JSON when it parses, else text
///
/// Oversized and non-UTF-8 bodies are replaced by a size summary.
pub fn body_to_json(bytes: &[u8]) -> Value {
    if bytes.len() > MAX_BODY_LOG_SIZE {
        return Value::String(format!("[{} bytes]", bytes.len()));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::from_str::<Value>(text)
            .ok()
            .filter(|v| v.is_object() || v.is_array())
            .unwrap_or_else(|| Value::String(text.to_string())),
        Err(_) => Value::String(format!("[binary: {} bytes]", bytes.len())),
    }
}

/// Header map as a JSON object; repeated headers become arrays
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let mut values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        map.insert(name.as_str().to_string(), value);
    }
    Value::Object(map)
}

/// Query string as a JSON object; repeated keys become arrays
pub fn query_to_json(query: Option<&str>) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(existing)) => existing.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(map)
}
