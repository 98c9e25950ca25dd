//! Schema-on-read access to vendor JSON
//!
//! IQ payloads change shape between server versions, so every field is read
//! through these accessors. A missing or mistyped field yields a typed
//! default, never an error.

use serde_json::Value;

pub trait Fields {
    /// String value of `key`; numbers and booleans are rendered, anything else is empty
    fn str_field(&self, key: &str) -> String;

    /// Non-empty string value of `key`
    fn opt_str(&self, key: &str) -> Option<&str>;

    /// Integer value of `key`, accepting numeric strings; 0 otherwise
    fn int_field(&self, key: &str) -> i64;

    fn bool_field(&self, key: &str) -> bool;

    /// Array value of `key`, empty when absent
    fn list_field(&self, key: &str) -> &[Value];
}

impl Fields for Value {
    fn str_field(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    fn opt_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn int_field(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn bool_field(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn list_field(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
