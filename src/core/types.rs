use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Traffic Light Protocol sharing label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tlp {
    White,
    Green,
    #[default]
    Amber,
    Red,
}

impl fmt::Display for Tlp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tlp::White => write!(f, "WHITE"),
            Tlp::Green => write!(f, "GREEN"),
            Tlp::Amber => write!(f, "AMBER"),
            Tlp::Red => write!(f, "RED"),
        }
    }
}

impl FromStr for Tlp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WHITE" => Ok(Tlp::White),
            "GREEN" => Ok(Tlp::Green),
            "AMBER" => Ok(Tlp::Amber),
            "RED" => Ok(Tlp::Red),
            _ => Err(format!("invalid tlp level: {}", s)),
        }
    }
}

/// Well-known capability levels. Sources may also supply their own strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityLevel {
    Unknown,
    Basic,
    Intermediate,
    Advanced,
}

impl CapabilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityLevel::Unknown => "Unknown",
            CapabilityLevel::Basic => "Basic",
            CapabilityLevel::Intermediate => "Intermediate",
            CapabilityLevel::Advanced => "Advanced",
        }
    }

    /// Maps the low/medium/high sophistication scale used by community feeds.
    pub fn from_sophistication(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => CapabilityLevel::Basic,
            "medium" => CapabilityLevel::Intermediate,
            "high" => CapabilityLevel::Advanced,
            _ => CapabilityLevel::Unknown,
        }
    }
}

impl fmt::Display for CapabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tool {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Tool {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            first_seen: None,
            description: None,
            capabilities: vec![],
        }
    }
}

/// ATT&CK technique observed for an actor. `technique_id` is the stable key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttackPattern {
    pub technique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_observed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeoTarget {
    pub first_seen: DateTime<Utc>,
    pub confidence: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    #[serde(rename = "Collaborates With")]
    CollaboratesWith,
    #[serde(rename = "Competes With")]
    CompetesWith,
    #[serde(rename = "Provides Support To")]
    ProvidesSupportTo,
    #[serde(rename = "Shares Infrastructure With")]
    SharesInfrastructureWith,
    #[serde(rename = "Related To")]
    RelatedTo,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 5] = [
        RelationshipType::CollaboratesWith,
        RelationshipType::CompetesWith,
        RelationshipType::ProvidesSupportTo,
        RelationshipType::SharesInfrastructureWith,
        RelationshipType::RelatedTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::CollaboratesWith => "Collaborates With",
            RelationshipType::CompetesWith => "Competes With",
            RelationshipType::ProvidesSupportTo => "Provides Support To",
            RelationshipType::SharesInfrastructureWith => "Shares Infrastructure With",
            RelationshipType::RelatedTo => "Related To",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("invalid relationship type: {}", s))
    }
}

/// Denormalized edge to another actor, identified by name or id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relationship {
    pub related_actor: String,
    pub relationship_type: RelationshipType,
    pub first_observed: DateTime<Utc>,
    #[serde(default)]
    pub last_observed: Option<DateTime<Utc>>,
    pub confidence: i32,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_type_uses_display_names_on_the_wire() {
        let json = serde_json::to_string(&RelationshipType::SharesInfrastructureWith).unwrap();
        assert_eq!(json, "\"Shares Infrastructure With\"");
        assert_eq!(
            "Competes With".parse::<RelationshipType>().unwrap(),
            RelationshipType::CompetesWith
        );
        assert!("Friends With".parse::<RelationshipType>().is_err());
    }

    #[test]
    fn sophistication_maps_to_capability() {
        assert_eq!(CapabilityLevel::from_sophistication("HIGH"), CapabilityLevel::Advanced);
        assert_eq!(CapabilityLevel::from_sophistication("n/a"), CapabilityLevel::Unknown);
    }

    #[test]
    fn tlp_round_trips_uppercase() {
        assert_eq!(serde_json::to_string(&Tlp::Green).unwrap(), "\"GREEN\"");
        assert_eq!("amber".parse::<Tlp>().unwrap(), Tlp::Amber);
    }
}
