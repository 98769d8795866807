use regex::Regex;
use serde_json::Value;

use crate::core::error::IntelError;

const MARKUP_PATTERN: &str = r"<[^>]*>";

/// Scrubs inbound payloads before they reach the entity model: markup tags and
/// control characters are removed from every string value.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    markup: Regex,
}

impl Sanitizer {
    pub fn new() -> Result<Self, IntelError> {
        let markup = Regex::new(MARKUP_PATTERN).map_err(|e| IntelError::Config(e.to_string()))?;
        Ok(Self { markup })
    }

    pub fn sanitize_str(&self, input: &str) -> String {
        let stripped = self.markup.replace_all(input, "");
        stripped.chars().filter(|c| (*c as u32) >= 32).collect()
    }

    /// Object keys are left alone; only string values are rewritten.
    pub fn sanitize_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.sanitize_str(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.sanitize_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.sanitize_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}
