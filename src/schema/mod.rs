//! Declarative record shapes and the validator that checks JSON values against them.
//!
//! Schemas are plain data (`Rule` trees) so they can be shipped as configuration; the
//! core only ever sees them through [`SchemaLookup`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::{IntelError, ValidationError};

pub mod builtin;

/// Section key in the actor snapshot paired with the schema that governs it.
pub const RECORD_SECTIONS: [(&str, &str); 5] = [
    ("core_identification", "identification"),
    ("technical_profile", "technical"),
    ("behavioral_analysis", "behavioral"),
    ("strategic_context", "strategic"),
    ("metadata", "metadata"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    String {
        #[serde(default)]
        min_length: Option<usize>,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        one_of: Vec<String>,
    },
    Integer {
        #[serde(default)]
        minimum: Option<i64>,
        #[serde(default)]
        maximum: Option<i64>,
    },
    Number {
        #[serde(default)]
        minimum: Option<f64>,
        #[serde(default)]
        maximum: Option<f64>,
    },
    Boolean,
    DateTime,
    Array {
        items: Box<Rule>,
        #[serde(default)]
        unique: bool,
    },
    /// Declared fields are checked; undeclared keys are checked against `additional`
    /// when it is set and accepted as-is otherwise.
    Object {
        #[serde(default)]
        fields: BTreeMap<String, FieldSpec>,
        #[serde(default)]
        additional: Option<Box<Rule>>,
    },
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub rule: Rule,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub name: String,
    pub root: Rule,
}

/// A schema with its regex patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    schema: Schema,
    patterns: HashMap<String, Regex>,
}

impl CompiledSchema {
    pub fn compile(schema: Schema) -> Result<Self, IntelError> {
        if !matches!(schema.root, Rule::Object { .. }) {
            return Err(IntelError::Config(format!(
                "schema {} must have an object root",
                schema.name
            )));
        }
        let mut patterns = HashMap::new();
        collect_patterns(&schema.root, &mut patterns)?;
        Ok(Self { schema, patterns })
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn check(&self, data: &Value) -> Result<(), ValidationError> {
        self.check_rule(&self.schema.root, data, "$")
    }

    fn fail(&self, path: &str, constraint: impl Into<String>) -> ValidationError {
        ValidationError::schema(&self.schema.name, path, constraint)
    }

    fn check_rule(&self, rule: &Rule, value: &Value, path: &str) -> Result<(), ValidationError> {
        match rule {
            Rule::String {
                min_length,
                pattern,
                one_of,
            } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| self.fail(path, format!("expected string, got {}", kind_of(value))))?;
                if let Some(min) = min_length {
                    if s.chars().count() < *min {
                        return Err(self.fail(path, format!("string shorter than {} characters", min)));
                    }
                }
                if let Some(pat) = pattern {
                    // every pattern was compiled in `compile`
                    if let Some(re) = self.patterns.get(pat) {
                        if !re.is_match(s) {
                            return Err(self.fail(path, format!("'{}' does not match pattern {}", s, pat)));
                        }
                    }
                }
                if !one_of.is_empty() && !one_of.iter().any(|allowed| allowed == s) {
                    return Err(self.fail(
                        path,
                        format!("'{}' is not one of [{}]", s, one_of.join(", ")),
                    ));
                }
                Ok(())
            }
            Rule::Integer { minimum, maximum } => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| self.fail(path, format!("expected integer, got {}", kind_of(value))))?;
                if let Some(min) = minimum {
                    if n < *min {
                        return Err(self.fail(path, format!("value {} is below minimum {}", n, min)));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return Err(self.fail(path, format!("value {} exceeds maximum {}", n, max)));
                    }
                }
                Ok(())
            }
            Rule::Number { minimum, maximum } => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| self.fail(path, format!("expected number, got {}", kind_of(value))))?;
                if let Some(min) = minimum {
                    if n < *min {
                        return Err(self.fail(path, format!("value {} is below minimum {}", n, min)));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return Err(self.fail(path, format!("value {} exceeds maximum {}", n, max)));
                    }
                }
                Ok(())
            }
            Rule::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(self.fail(path, format!("expected boolean, got {}", kind_of(value))))
                }
            }
            Rule::DateTime => {
                let s = value
                    .as_str()
                    .ok_or_else(|| self.fail(path, format!("expected date-time, got {}", kind_of(value))))?;
                chrono::DateTime::parse_from_rfc3339(s)
                    .map(|_| ())
                    .map_err(|_| self.fail(path, format!("'{}' is not an RFC 3339 date-time", s)))
            }
            Rule::Array { items, unique } => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| self.fail(path, format!("expected array, got {}", kind_of(value))))?;
                for (idx, item) in arr.iter().enumerate() {
                    self.check_rule(items, item, &format!("{}[{}]", path, idx))?;
                }
                if *unique {
                    for (idx, item) in arr.iter().enumerate() {
                        if arr[..idx].contains(item) {
                            return Err(self.fail(
                                &format!("{}[{}]", path, idx),
                                "duplicate item in unique array",
                            ));
                        }
                    }
                }
                Ok(())
            }
            Rule::Object { fields, additional } => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| self.fail(path, format!("expected object, got {}", kind_of(value))))?;
                for (name, spec) in fields {
                    let child = format!("{}.{}", path, name);
                    match obj.get(name) {
                        None if spec.required => {
                            return Err(self.fail(&child, "missing required field"));
                        }
                        None => {}
                        Some(Value::Null) if spec.nullable => {}
                        Some(Value::Null) if !spec.required => {
                            return Err(self.fail(&child, "must not be null"));
                        }
                        Some(Value::Null) => {
                            return Err(self.fail(&child, "required field is null"));
                        }
                        Some(v) => self.check_rule(&spec.rule, v, &child)?,
                    }
                }
                if let Some(extra) = additional {
                    for (key, v) in obj.iter().filter(|(k, _)| !fields.contains_key(*k)) {
                        self.check_rule(extra, v, &format!("{}.{}", path, key))?;
                    }
                }
                Ok(())
            }
            Rule::Any => Ok(()),
        }
    }
}

fn collect_patterns(rule: &Rule, out: &mut HashMap<String, Regex>) -> Result<(), IntelError> {
    match rule {
        Rule::String {
            pattern: Some(pat), ..
        } => {
            if !out.contains_key(pat) {
                let re = Regex::new(pat)
                    .map_err(|e| IntelError::Config(format!("invalid pattern {}: {}", pat, e)))?;
                out.insert(pat.clone(), re);
            }
            Ok(())
        }
        Rule::Array { items, .. } => collect_patterns(items, out),
        Rule::Object { fields, additional } => {
            for spec in fields.values() {
                collect_patterns(&spec.rule, out)?;
            }
            if let Some(extra) = additional {
                collect_patterns(extra, out)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Name -> schema capability the entity model is validated through.
pub trait SchemaLookup {
    fn lookup(&self, name: &str) -> Option<&CompiledSchema>;

    fn validate(&self, data: &Value, schema_name: &str) -> Result<(), IntelError> {
        let schema = self
            .lookup(schema_name)
            .ok_or_else(|| IntelError::SchemaNotFound(schema_name.to_string()))?;
        schema.check(data).map_err(IntelError::from)
    }

    /// Validates every section of an actor snapshot, stopping at the first failure.
    fn validate_record(&self, record: &Value) -> Result<(), IntelError> {
        for (section, schema_name) in RECORD_SECTIONS {
            let data = record.get(section).ok_or_else(|| {
                ValidationError::schema(schema_name, "$", format!("missing section {}", section))
            })?;
            self.validate(data, schema_name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, CompiledSchema>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry preloaded with the five record section schemas.
    pub fn builtin() -> Result<Self, IntelError> {
        let mut registry = Self::empty();
        for schema in builtin::section_schemas() {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// Built-ins with `overrides` registered on top. Section schemas can be replaced
    /// but never dropped.
    pub fn with_overrides(overrides: Vec<Schema>) -> Result<Self, IntelError> {
        let mut registry = Self::builtin()?;
        for schema in overrides {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, schema: Schema) -> Result<(), IntelError> {
        let name = schema.name.clone();
        let compiled = CompiledSchema::compile(schema)?;
        if self.schemas.insert(name.clone(), compiled).is_some() {
            tracing::debug!(schema = %name, "schema replaced");
        } else {
            tracing::debug!(schema = %name, "schema registered");
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }
}

impl SchemaLookup for SchemaRegistry {
    fn lookup(&self, name: &str) -> Option<&CompiledSchema> {
        self.schemas.get(name)
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    schema: Vec<Schema>,
}

pub fn parse_schema_toml(content: &str) -> Result<Vec<Schema>, IntelError> {
    let file: SchemaFile = toml::from_str(content)?;
    Ok(file.schema)
}

pub fn load_schema_file(path: &Path) -> Result<Vec<Schema>, IntelError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| IntelError::Config(format!("{}: {}", path.display(), e)))?;
    parse_schema_toml(&content)
}
