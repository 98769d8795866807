use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::core::actor::{ActorDraft, ThreatActor};
use crate::core::error::{IntelError, ValidationError};
use crate::core::metadata::Metadata;
use crate::core::reference::Reference;
use crate::core::time::parse_timestamp;
use crate::core::types::{AttackPattern, GeoTarget, Relationship, Tlp, Tool};
use crate::pipeline::scorer::{calculate_confidence, evidence_from_value};
use crate::schema::SchemaLookup;

/// Flat actor payload as exported by upstream tooling.
#[derive(Debug, Deserialize)]
struct ImportPayload {
    actor_id: String,
    name: String,
    #[serde(default)]
    uuid: Option<Uuid>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    first_observed: Option<String>,
    #[serde(default)]
    last_observed: Option<String>,
    #[serde(default)]
    confidence_level: Option<i32>,
    #[serde(default)]
    capability_level: Option<String>,
    #[serde(default)]
    tools_malware: Vec<Tool>,
    #[serde(default)]
    infrastructure: BTreeMap<String, Value>,
    #[serde(default)]
    target_sectors: Vec<String>,
    #[serde(default)]
    geographic_targeting: BTreeMap<String, GeoTarget>,
    #[serde(default)]
    attack_patterns: Vec<AttackPattern>,
    #[serde(default)]
    motivation: Option<String>,
    #[serde(default)]
    goals: Vec<String>,
    #[serde(default)]
    relationships: Vec<Relationship>,
    #[serde(default)]
    references: Vec<Reference>,
    #[serde(default)]
    tlp_level: Option<Tlp>,
    #[serde(default)]
    evidence: Option<Value>,
}

fn reject(path: &str, constraint: impl Into<String>) -> IntelError {
    ValidationError::schema("import", path, constraint).into()
}

/// Cheap shape checks run before a payload is turned into an actor.
pub fn check_import_payload(data: &Value) -> Result<(), IntelError> {
    let obj = data
        .as_object()
        .ok_or_else(|| reject("$", "payload must be an object"))?;

    for field in ["actor_id", "name"] {
        match obj.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(_) => return Err(reject(&format!("$.{}", field), "must be a non-empty string")),
            None => return Err(reject(&format!("$.{}", field), "missing required field")),
        }
    }
    if let Some(Value::String(id)) = obj.get("actor_id") {
        if !id.starts_with("TA") {
            return Err(reject("$.actor_id", format!("'{}' does not start with TA", id)));
        }
    }

    for field in ["first_observed", "last_observed"] {
        match obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if parse_timestamp(s).is_some() => {}
            Some(other) => {
                return Err(reject(
                    &format!("$.{}", field),
                    format!("unparseable timestamp {}", other),
                ))
            }
        }
    }

    match obj.get("confidence_level") {
        None | Some(Value::Null) => {}
        Some(value) => match value.as_i64() {
            Some(n) if (1..=5).contains(&n) => {}
            _ => {
                return Err(reject(
                    "$.confidence_level",
                    format!("{} is not an integer between 1 and 5", value),
                ))
            }
        },
    }
    Ok(())
}

/// Builds a validated actor from an already sanitized import payload.
pub fn import_record(
    data: &Value,
    config: &CoreConfig,
    schemas: &dyn SchemaLookup,
) -> Result<ThreatActor, IntelError> {
    check_import_payload(data)?;
    let payload: ImportPayload = serde_json::from_value(data.clone())?;

    let mut metadata = Metadata::new(
        config.import_creator.clone(),
        payload.tlp_level.unwrap_or(config.default_tlp),
    );
    if let Some(evidence) = &payload.evidence {
        metadata.confidence_score = calculate_confidence(&evidence_from_value(evidence));
    }

    let mut draft = ActorDraft::new(payload.actor_id, payload.name, metadata);
    draft.uuid = payload.uuid;
    draft.references = payload.references;
    draft.aliases = payload.aliases.into_iter().collect();
    if let Some(first) = payload.first_observed.as_deref().and_then(parse_timestamp) {
        draft.first_observed = first;
    }
    draft.last_observed = payload.last_observed.as_deref().and_then(parse_timestamp);
    draft.confidence_level = payload.confidence_level.unwrap_or(0);
    draft.capability_level = payload.capability_level;
    draft.tools_malware = payload.tools_malware;
    draft.infrastructure = payload.infrastructure;
    draft.target_sectors = payload.target_sectors.into_iter().collect();
    draft.geographic_targeting = payload.geographic_targeting;
    draft.attack_patterns = payload.attack_patterns;
    draft.motivation = payload.motivation;
    draft.goals = payload.goals;
    draft.relationships = payload.relationships;

    let actor = ThreatActor::new(draft, schemas)?;
    tracing::info!(
        actor_id = %actor.actor_id(),
        references = actor.references().len(),
        "actor imported"
    );
    Ok(actor)
}
