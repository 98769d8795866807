//! The five section schemas every actor record is checked against.

use std::collections::BTreeMap;

use crate::core::types::RelationshipType;
use crate::schema::{FieldSpec, Rule, Schema};

pub const ACTOR_ID_PATTERN: &str = r"^TA[0-9]{2}[A-Z0-9-]+$";
pub const TECHNIQUE_ID_PATTERN: &str = r"^T[0-9]{4}(\.[0-9]{3})?$";
pub const VERSION_PATTERN: &str = r"^[0-9]+\.[0-9]+\.[0-9]+$";
pub const TLP_LEVELS: [&str; 4] = ["WHITE", "GREEN", "AMBER", "RED"];

pub fn section_schemas() -> Vec<Schema> {
    vec![
        identification(),
        technical(),
        behavioral(),
        strategic(),
        metadata(),
    ]
}

pub fn identification() -> Schema {
    Schema {
        name: "identification".to_string(),
        root: object(vec![
            ("actor_id", required(pattern(ACTOR_ID_PATTERN))),
            ("name", required(non_empty())),
            ("aliases", optional(array(non_empty(), true))),
            ("first_observed", required(Rule::DateTime)),
            ("last_observed", nullable(Rule::DateTime)),
            ("confidence_level", required(int_range(0, 5))),
        ]),
    }
}

pub fn technical() -> Schema {
    let tool = object(vec![
        ("name", required(non_empty())),
        ("type", nullable(string())),
        ("first_seen", nullable(string())),
        ("description", nullable(string())),
        ("capabilities", optional(array(string(), false))),
    ]);
    Schema {
        name: "technical".to_string(),
        root: object(vec![
            ("capability_level", nullable(non_empty())),
            ("tools_malware", optional(array(tool, false))),
            ("infrastructure", optional(object(vec![]))),
        ]),
    }
}

pub fn behavioral() -> Schema {
    let geo_target = object(vec![
        ("first_seen", required(Rule::DateTime)),
        ("confidence", required(int_range(0, 5))),
    ]);
    let technique = object(vec![
        ("technique_id", required(pattern(TECHNIQUE_ID_PATTERN))),
        ("technique_name", nullable(string())),
        ("first_observed", nullable(Rule::DateTime)),
    ]);
    Schema {
        name: "behavioral".to_string(),
        root: object(vec![
            ("target_sectors", optional(array(non_empty(), true))),
            (
                "geographic_targeting",
                optional(Rule::Object {
                    fields: BTreeMap::new(),
                    additional: Some(Box::new(geo_target)),
                }),
            ),
            ("attack_patterns", optional(array(technique, false))),
        ]),
    }
}

pub fn strategic() -> Schema {
    let relationship_types: Vec<&str> = RelationshipType::ALL.iter().map(|t| t.as_str()).collect();
    let relationship = object(vec![
        ("related_actor", required(non_empty())),
        ("relationship_type", required(one_of(&relationship_types))),
        ("first_observed", required(Rule::DateTime)),
        ("last_observed", nullable(Rule::DateTime)),
        ("confidence", required(int_range(1, 5))),
        ("description", nullable(string())),
    ]);
    Schema {
        name: "strategic".to_string(),
        root: object(vec![
            ("motivation", nullable(non_empty())),
            ("goals", optional(array(non_empty(), false))),
            ("relationships", optional(array(relationship, false))),
        ]),
    }
}

pub fn metadata() -> Schema {
    let revision = object(vec![
        ("version", required(pattern(VERSION_PATTERN))),
        ("timestamp", required(Rule::DateTime)),
        ("type", required(one_of(&["major", "minor", "patch"]))),
    ]);
    Schema {
        name: "metadata".to_string(),
        root: object(vec![
            ("created", required(Rule::DateTime)),
            ("modified", required(Rule::DateTime)),
            ("version", required(pattern(VERSION_PATTERN))),
            ("creator", required(non_empty())),
            ("tlp_level", required(one_of(&TLP_LEVELS))),
            ("confidence_score", required(int_range(0, 5))),
            ("revision_history", optional(array(revision, false))),
        ]),
    }
}

fn string() -> Rule {
    Rule::String {
        min_length: None,
        pattern: None,
        one_of: vec![],
    }
}

fn non_empty() -> Rule {
    Rule::String {
        min_length: Some(1),
        pattern: None,
        one_of: vec![],
    }
}

fn pattern(pat: &str) -> Rule {
    Rule::String {
        min_length: Some(1),
        pattern: Some(pat.to_string()),
        one_of: vec![],
    }
}

fn one_of(values: &[&str]) -> Rule {
    Rule::String {
        min_length: None,
        pattern: None,
        one_of: values.iter().map(|v| v.to_string()).collect(),
    }
}

fn int_range(min: i64, max: i64) -> Rule {
    Rule::Integer {
        minimum: Some(min),
        maximum: Some(max),
    }
}

fn array(items: Rule, unique: bool) -> Rule {
    Rule::Array {
        items: Box::new(items),
        unique,
    }
}

fn object(fields: Vec<(&str, FieldSpec)>) -> Rule {
    Rule::Object {
        fields: fields
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect(),
        additional: None,
    }
}

fn required(rule: Rule) -> FieldSpec {
    FieldSpec {
        rule,
        required: true,
        nullable: false,
    }
}

fn optional(rule: Rule) -> FieldSpec {
    FieldSpec {
        rule,
        required: false,
        nullable: false,
    }
}

fn nullable(rule: Rule) -> FieldSpec {
    FieldSpec {
        rule,
        required: false,
        nullable: true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::schema::CompiledSchema;

    use super::*;

    #[test]
    fn identification_enforces_confidence_range() {
        let schema = CompiledSchema::compile(identification()).unwrap();
        let mut data = json!({
            "actor_id": "TA24RUS-APT1F3",
            "name": "Sandworm",
            "aliases": ["Voodoo Bear"],
            "first_observed": "2014-01-01T00:00:00Z",
            "last_observed": null,
            "confidence_level": 5
        });
        assert!(schema.check(&data).is_ok());
        data["confidence_level"] = json!(6);
        assert!(schema.check(&data).is_err());
        data["confidence_level"] = json!(3);
        data["actor_id"] = json!("sandworm");
        assert!(schema.check(&data).is_err());
    }

    #[test]
    fn technique_ids_follow_attack_format() {
        let schema = CompiledSchema::compile(behavioral()).unwrap();
        let ok = json!({"attack_patterns": [{"technique_id": "T1566.001"}]});
        let bad = json!({"attack_patterns": [{"technique_id": "phishing"}]});
        assert!(schema.check(&ok).is_ok());
        assert!(schema.check(&bad).is_err());
    }

    #[test]
    fn metadata_requires_known_tlp() {
        let schema = CompiledSchema::compile(metadata()).unwrap();
        let data = json!({
            "created": "2024-01-01T00:00:00Z",
            "modified": "2024-01-01T00:00:00Z",
            "version": "1.0.0",
            "creator": "STASIS",
            "tlp_level": "PURPLE",
            "confidence_score": 0,
            "revision_history": []
        });
        assert!(schema.check(&data).is_err());
    }
}
