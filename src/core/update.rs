use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::error::{IntelError, ValidationError};
use crate::core::types::{AttackPattern, GeoTarget, Relationship, Tool};

/// Every field of `ThreatActor` that may change after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActorField {
    ActorId,
    Name,
    Aliases,
    FirstObserved,
    LastObserved,
    ConfidenceLevel,
    CapabilityLevel,
    ToolsMalware,
    Infrastructure,
    TargetSectors,
    GeographicTargeting,
    AttackPatterns,
    Motivation,
    Goals,
    Relationships,
}

/// Fields that exist on an actor but are owned by the core's own bookkeeping.
pub const IMMUTABLE_FIELDS: [&str; 3] = ["uuid", "metadata", "references"];

impl ActorField {
    pub const ALL: [ActorField; 15] = [
        ActorField::ActorId,
        ActorField::Name,
        ActorField::Aliases,
        ActorField::FirstObserved,
        ActorField::LastObserved,
        ActorField::ConfidenceLevel,
        ActorField::CapabilityLevel,
        ActorField::ToolsMalware,
        ActorField::Infrastructure,
        ActorField::TargetSectors,
        ActorField::GeographicTargeting,
        ActorField::AttackPatterns,
        ActorField::Motivation,
        ActorField::Goals,
        ActorField::Relationships,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorField::ActorId => "actor_id",
            ActorField::Name => "name",
            ActorField::Aliases => "aliases",
            ActorField::FirstObserved => "first_observed",
            ActorField::LastObserved => "last_observed",
            ActorField::ConfidenceLevel => "confidence_level",
            ActorField::CapabilityLevel => "capability_level",
            ActorField::ToolsMalware => "tools_malware",
            ActorField::Infrastructure => "infrastructure",
            ActorField::TargetSectors => "target_sectors",
            ActorField::GeographicTargeting => "geographic_targeting",
            ActorField::AttackPatterns => "attack_patterns",
            ActorField::Motivation => "motivation",
            ActorField::Goals => "goals",
            ActorField::Relationships => "relationships",
        }
    }
}

impl fmt::Display for ActorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorField {
    type Err = IntelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(field) = ActorField::ALL.iter().find(|f| f.as_str() == s) {
            return Ok(*field);
        }
        if IMMUTABLE_FIELDS.contains(&s) {
            return Err(IntelError::ImmutableField(s.to_string()));
        }
        Err(IntelError::UnknownField(s.to_string()))
    }
}

/// Typed replacement value for a single actor field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    ActorId(String),
    Name(String),
    Aliases(BTreeSet<String>),
    FirstObserved(DateTime<Utc>),
    LastObserved(Option<DateTime<Utc>>),
    ConfidenceLevel(i32),
    CapabilityLevel(Option<String>),
    ToolsMalware(Vec<Tool>),
    Infrastructure(BTreeMap<String, Value>),
    TargetSectors(BTreeSet<String>),
    GeographicTargeting(BTreeMap<String, GeoTarget>),
    AttackPatterns(Vec<AttackPattern>),
    Motivation(Option<String>),
    Goals(Vec<String>),
    Relationships(Vec<Relationship>),
}

impl FieldUpdate {
    pub fn field(&self) -> ActorField {
        match self {
            FieldUpdate::ActorId(_) => ActorField::ActorId,
            FieldUpdate::Name(_) => ActorField::Name,
            FieldUpdate::Aliases(_) => ActorField::Aliases,
            FieldUpdate::FirstObserved(_) => ActorField::FirstObserved,
            FieldUpdate::LastObserved(_) => ActorField::LastObserved,
            FieldUpdate::ConfidenceLevel(_) => ActorField::ConfidenceLevel,
            FieldUpdate::CapabilityLevel(_) => ActorField::CapabilityLevel,
            FieldUpdate::ToolsMalware(_) => ActorField::ToolsMalware,
            FieldUpdate::Infrastructure(_) => ActorField::Infrastructure,
            FieldUpdate::TargetSectors(_) => ActorField::TargetSectors,
            FieldUpdate::GeographicTargeting(_) => ActorField::GeographicTargeting,
            FieldUpdate::AttackPatterns(_) => ActorField::AttackPatterns,
            FieldUpdate::Motivation(_) => ActorField::Motivation,
            FieldUpdate::Goals(_) => ActorField::Goals,
            FieldUpdate::Relationships(_) => ActorField::Relationships,
        }
    }

    /// String-keyed entry point for collaborators that only hold a field name and a
    /// JSON value.
    pub fn from_named(name: &str, value: Value) -> Result<Self, IntelError> {
        let field: ActorField = name.parse()?;
        let update = match field {
            ActorField::ActorId => FieldUpdate::ActorId(decode(field, value)?),
            ActorField::Name => FieldUpdate::Name(decode(field, value)?),
            ActorField::Aliases => FieldUpdate::Aliases(decode(field, value)?),
            ActorField::FirstObserved => FieldUpdate::FirstObserved(decode(field, value)?),
            ActorField::LastObserved => FieldUpdate::LastObserved(decode(field, value)?),
            ActorField::ConfidenceLevel => FieldUpdate::ConfidenceLevel(decode(field, value)?),
            ActorField::CapabilityLevel => FieldUpdate::CapabilityLevel(decode(field, value)?),
            ActorField::ToolsMalware => FieldUpdate::ToolsMalware(decode(field, value)?),
            ActorField::Infrastructure => FieldUpdate::Infrastructure(decode(field, value)?),
            ActorField::TargetSectors => FieldUpdate::TargetSectors(decode(field, value)?),
            ActorField::GeographicTargeting => {
                FieldUpdate::GeographicTargeting(decode(field, value)?)
            }
            ActorField::AttackPatterns => FieldUpdate::AttackPatterns(decode(field, value)?),
            ActorField::Motivation => FieldUpdate::Motivation(decode(field, value)?),
            ActorField::Goals => FieldUpdate::Goals(decode(field, value)?),
            ActorField::Relationships => FieldUpdate::Relationships(decode(field, value)?),
        };
        Ok(update)
    }
}

fn decode<T: DeserializeOwned>(field: ActorField, value: Value) -> Result<T, IntelError> {
    serde_json::from_value(value).map_err(|e| {
        IntelError::Validation(ValidationError::Field {
            field,
            cause: Box::new(ValidationError::Invariant(format!("wrong value type: {}", e))),
        })
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_field_name_round_trips() {
        for field in ActorField::ALL {
            assert_eq!(field.as_str().parse::<ActorField>().unwrap(), field);
        }
    }

    #[test]
    fn unknown_and_immutable_names_are_distinguished() {
        assert!(matches!(
            "favourite_colour".parse::<ActorField>(),
            Err(IntelError::UnknownField(_))
        ));
        assert!(matches!(
            "uuid".parse::<ActorField>(),
            Err(IntelError::ImmutableField(_))
        ));
    }

    #[test]
    fn named_update_decodes_typed_value() {
        let update = FieldUpdate::from_named("goals", json!(["espionage"])).unwrap();
        assert_eq!(update, FieldUpdate::Goals(vec!["espionage".to_string()]));
        let err = FieldUpdate::from_named("confidence_level", json!("high")).unwrap_err();
        assert!(err.is_validation());
    }
}
