//! The parsed IPC request (`Message`) and its wire decoding.
//!
//! Messages arrive as a URL-shaped string (`route.name?key=value&...`) plus
//! an optional out-of-band binary buffer (spec §6.1). Parsing happens once;
//! `Message` is immutable afterwards and handlers only ever read from it.

use bytes::Bytes;
use std::collections::HashMap;

use crate::error::RouteError;

/// Array-valued parameters (`args`, `env`) are `0x01`-delimited on the wire.
pub const ARRAY_SEPARATOR: char = '\u{1}';

/// Correlation id meaning "no reply expected, this is a stream".
pub const STREAM_SEQ: &str = "-1";

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub seq: String,
    pub index: i32,
    pub buffer: Bytes,
    params: HashMap<String, String>,
}

impl Message {
    /// Parses `name?key=value&key=value` into a `Message`. `index` defaults
    /// to `-1` (no target window) unless the payload sets `index=`.
    pub fn parse(raw: &str, buffer: Bytes) -> Self {
        let (name, query) = match raw.split_once('?') {
            Some((n, q)) => (n, q),
            None => (raw, ""),
        };

        let mut params = HashMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            let key = percent_decode(key);
            let value = percent_decode(value);
            params.insert(key, value);
        }

        let seq = params
            .get("seq")
            .cloned()
            .unwrap_or_else(|| STREAM_SEQ.to_string());
        let index = params
            .get("index")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(-1);

        Self {
            name: name.to_string(),
            seq,
            index,
            buffer,
            params,
        }
    }

    #[cfg(test)]
    pub fn for_test(name: &str, params: &[(&str, &str)]) -> Self {
        let mut m = Message::parse(name, Bytes::new());
        for (k, v) in params {
            m.params.insert(k.to_string(), v.to_string());
        }
        m
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.get(key).is_some_and(|v| !v.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn get_str(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true") | Some("1"))
    }

    /// Splits a `0x01`-delimited array parameter (`args`, `env`).
    pub fn get_array(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(v) if !v.is_empty() => v.split(ARRAY_SEPARATOR).map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// `REQUIRE_AND_GET_MESSAGE_VALUE(var, name, parse)` for a required
    /// decimal parameter. Missing → `BadRequestError` "Expecting"; malformed
    /// → `BadRequestError` "Invalid".
    pub fn require_u64(&self, key: &str) -> Result<u64, RouteError> {
        self.require(key)?
            .parse::<u64>()
            .map_err(|_| RouteError::invalid_parameter(key))
    }

    pub fn require_i64(&self, key: &str) -> Result<i64, RouteError> {
        self.require(key)?
            .parse::<i64>()
            .map_err(|_| RouteError::invalid_parameter(key))
    }

    pub fn require_i32(&self, key: &str) -> Result<i32, RouteError> {
        self.require(key)?
            .parse::<i32>()
            .map_err(|_| RouteError::invalid_parameter(key))
    }

    pub fn require_str<'a>(&'a self, key: &str) -> Result<&'a str, RouteError> {
        self.require(key)
    }

    fn require<'a>(&'a self, key: &str) -> Result<&'a str, RouteError> {
        match self.get(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(RouteError::missing_parameter(key)),
        }
    }

    pub fn is_stream(&self) -> bool {
        self.seq == STREAM_SEQ
    }

    /// Validates that every name in `names` is present and non-empty, per
    /// `validateMessageParameters`. Returns the first missing name's error.
    pub fn validate(&self, names: &[&str]) -> Result<(), RouteError> {
        for name in names {
            if !self.has(name) {
                return Err(RouteError::missing_parameter(name));
            }
        }
        Ok(())
    }
}

fn percent_decode(input: &str) -> String {
    percent_encoding::percent_decode_str(input)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_params() {
        let m = Message::parse("fs.open?id=42&path=%2Ftmp%2Ft&flags=577&mode=438", Bytes::new());
        assert_eq!(m.name, "fs.open");
        assert_eq!(m.get("path"), Some("/tmp/t"));
        assert_eq!(m.require_u64("id").unwrap(), 42);
        assert_eq!(m.require_i32("flags").unwrap(), 577);
    }

    #[test]
    fn defaults_seq_to_stream() {
        let m = Message::parse("udp.readStart?id=7", Bytes::new());
        assert_eq!(m.seq, STREAM_SEQ);
        assert!(m.is_stream());
    }

    #[test]
    fn missing_required_param_errors() {
        let m = Message::parse("fs.open?path=/tmp/t", Bytes::new());
        let err = m.require_u64("id").unwrap_err();
        assert_eq!(err.message, "Expecting 'id' in parameters");
    }

    #[test]
    fn invalid_required_param_errors() {
        let m = Message::parse("fs.open?id=not-a-number", Bytes::new());
        let err = m.require_u64("id").unwrap_err();
        assert_eq!(err.message, "Invalid 'id' given in parameters");
    }

    #[test]
    fn array_param_splits_on_unit_separator() {
        let raw = format!("child_process.spawn?args=sleep{}100", ARRAY_SEPARATOR);
        let m = Message::parse(&raw, Bytes::new());
        assert_eq!(m.get_array("args"), vec!["sleep", "100"]);
    }
}
