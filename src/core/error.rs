use std::io;

use crate::core::update::ActorField;

/// Local checks a `Reference` must pass before it can be attached to an actor.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("source is required")]
    EmptySource,
    #[error("confidence must be between 0 and 5, got {0}")]
    ConfidenceOutOfRange(i32),
    #[error("url must start with http:// or https://: {0}")]
    InvalidUrl(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("schema '{schema}' violated at {path}: {constraint}")]
    Schema {
        schema: String,
        path: String,
        constraint: String,
    },
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("invalid reference: {0}")]
    Reference(ReferenceError),
    #[error("invalid update to {field}: {cause}")]
    Field {
        field: ActorField,
        cause: Box<ValidationError>,
    },
}

impl ValidationError {
    pub fn schema(schema: &str, path: &str, constraint: impl Into<String>) -> Self {
        ValidationError::Schema {
            schema: schema.to_string(),
            path: path.to_string(),
            constraint: constraint.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IntelError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("field {0} does not exist")]
    UnknownField(String),
    #[error("field {0} cannot be updated")]
    ImmutableField(String),
    #[error("schema {0} not found")]
    SchemaNotFound(String),
    #[error("malformed reference: {0}")]
    MalformedReference(#[from] ReferenceError),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IntelError {
    pub fn is_validation(&self) -> bool {
        matches!(self, IntelError::Validation(_))
    }
}

impl From<serde_json::Error> for IntelError {
    fn from(err: serde_json::Error) -> Self {
        IntelError::Validation(ValidationError::schema("record", "$", err.to_string()))
    }
}

impl From<toml::de::Error> for IntelError {
    fn from(err: toml::de::Error) -> Self {
        IntelError::Config(err.to_string())
    }
}
