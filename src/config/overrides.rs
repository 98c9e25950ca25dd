use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::report::Strategy;

/// Values given on the command line; anything left unset falls through to lower layers
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub organization_id: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub stages: Vec<String>,
    pub strategy: Option<Strategy>,
    pub skip_clean_components: Option<bool>,
    pub consolidated: Option<bool>,
    pub keep_raw_json: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub retry: RetryOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetryOverrides {
    pub max_attempts: Option<u32>,
}

impl ConfigOverrides {
    /// Only the values actually given, ready to merge over everything else
    pub fn to_value(&self) -> Value {
        filter_unset(self)
    }
}

/// Drop nulls, empty arrays and objects left empty by that
pub fn filter_unset<T: Serialize>(input: T) -> Value {
    let mut value = serde_json::to_value(input).unwrap_or(Value::Null);
    filter_unset_recursive(&mut value);
    value
}

fn filter_unset_recursive(value: &mut Value) {
    if let Value::Object(map) = value {
        for v in map.values_mut() {
            filter_unset_recursive(v);
        }
        map.retain(|_, v| match v {
            Value::Null => false,
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(inner) => !inner.is_empty(),
            _ => true,
        });
    }
}
