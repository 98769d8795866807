use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::ReferenceError;
use crate::core::time::now_utc;

pub const DEFAULT_REFERENCE_TYPE: &str = "external";

/// One citation backing some of an actor's field values.
///
/// References are never edited once attached; equality is structural, so the same
/// value attached twice is stored once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    #[serde(default = "Uuid::new_v4")]
    pub reference_id: Uuid,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "now_utc")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub confidence: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields_referenced: Vec<String>,
}

fn default_kind() -> String {
    DEFAULT_REFERENCE_TYPE.to_string()
}

impl Reference {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            reference_id: Uuid::new_v4(),
            source: source.into(),
            url: None,
            date: now_utc(),
            title: None,
            description: None,
            kind: default_kind(),
            confidence: 0,
            tags: vec![],
            fields_referenced: vec![],
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_confidence(mut self, confidence: i32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields_referenced = fields;
        self
    }

    pub fn validate(&self) -> Result<(), ReferenceError> {
        if self.source.trim().is_empty() {
            return Err(ReferenceError::EmptySource);
        }
        if !(0..=5).contains(&self.confidence) {
            return Err(ReferenceError::ConfidenceOutOfRange(self.confidence));
        }
        if let Some(url) = &self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ReferenceError::InvalidUrl(url.clone()));
            }
        }
        Ok(())
    }
}
