use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::actor::ThreatActor;
use crate::core::reference::Reference;
use crate::core::time::parse_timestamp;
use crate::core::types::{Relationship, RelationshipType};
use crate::schema::SchemaLookup;

pub const DEFAULT_RELATIONSHIP_CONFIDENCE: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRelationship {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipImport {
    pub accepted: usize,
    pub skipped: Vec<SkippedRelationship>,
}

/// A relationship that passed the per-item checks, plus the feed it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRelationship {
    pub relationship: Relationship,
    pub source: Option<String>,
}

/// Per-item checks for one raw relationship. `first_observed` falls back to the actor's.
pub fn parse_relationship(
    raw: &Value,
    fallback_first_observed: DateTime<Utc>,
) -> Result<ParsedRelationship, String> {
    let obj = raw.as_object().ok_or("relationship must be an object")?;

    let related_actor = match obj.get("related_actor") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(_) => return Err("related_actor must be a non-empty string".into()),
        None => return Err("missing required field related_actor".into()),
    };
    let relationship_type = match obj.get("relationship_type") {
        Some(Value::String(s)) => s.parse::<RelationshipType>()?,
        Some(_) => return Err("relationship_type must be a string".into()),
        None => return Err("missing required field relationship_type".into()),
    };

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => DEFAULT_RELATIONSHIP_CONFIDENCE,
        Some(value) => {
            let n = confidence_of(value).ok_or("confidence must be an integer")?;
            if !(1..=5).contains(&n) {
                return Err(format!("confidence {} outside 1-5", n));
            }
            n
        }
    };

    let first_observed = match obj.get("first_observed") {
        Some(Value::String(s)) => {
            parse_timestamp(s).ok_or_else(|| format!("unparseable first_observed '{}'", s))?
        }
        Some(Value::Null) | None => fallback_first_observed,
        Some(_) => return Err("first_observed must be a string".into()),
    };
    let last_observed = match obj.get("last_observed") {
        Some(Value::String(s)) => Some(
            parse_timestamp(s).ok_or_else(|| format!("unparseable last_observed '{}'", s))?,
        ),
        Some(Value::Null) | None => None,
        Some(_) => return Err("last_observed must be a string".into()),
    };

    Ok(ParsedRelationship {
        relationship: Relationship {
            related_actor,
            relationship_type,
            first_observed,
            last_observed,
            confidence,
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        source: obj.get("source").and_then(Value::as_str).map(str::to_string),
    })
}

fn confidence_of(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Adds every acceptable relationship in `batch`, one validated commit each. Rejected
/// items are logged and reported; they never abort the rest of the batch.
pub fn import_relationships(
    actor: &mut ThreatActor,
    batch: &[Value],
    default_source: &str,
    schemas: &dyn SchemaLookup,
) -> RelationshipImport {
    let mut report = RelationshipImport::default();

    for (index, raw) in batch.iter().enumerate() {
        let outcome = parse_relationship(raw, actor.first_observed).and_then(|parsed| {
            commit_relationship(actor, parsed, default_source, schemas)
        });
        match outcome {
            Ok(()) => report.accepted += 1,
            Err(reason) => {
                tracing::warn!(
                    actor_id = %actor.actor_id,
                    index,
                    reason = %reason,
                    "skipping invalid relationship"
                );
                report.skipped.push(SkippedRelationship { index, reason });
            }
        }
    }

    tracing::info!(
        actor_id = %actor.actor_id,
        accepted = report.accepted,
        skipped = report.skipped.len(),
        "relationship import finished"
    );
    report
}

fn commit_relationship(
    actor: &mut ThreatActor,
    parsed: ParsedRelationship,
    default_source: &str,
    schemas: &dyn SchemaLookup,
) -> Result<(), String> {
    let relationship = parsed.relationship;
    let reference = Reference::new(parsed.source.unwrap_or_else(|| default_source.to_string()))
        .with_title(format!(
            "Relationship: {} -> {}",
            actor.name, relationship.related_actor
        ))
        .with_confidence(relationship.confidence)
        .with_fields(vec!["relationships".to_string()]);
    reference.validate().map_err(|e| e.to_string())?;

    let mut next = actor.clone();
    next.relationships.push(relationship);
    next.validate(schemas).map_err(|e| e.to_string())?;
    next.record_change(reference);
    *actor = next;
    Ok(())
}
