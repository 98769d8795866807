use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::core::actor::ThreatActor;
use crate::core::error::{IntelError, ValidationError};
use crate::core::metadata::Version;
use crate::core::reference::Reference;
use crate::core::time::parse_timestamp;
use crate::core::types::{CapabilityLevel, GeoTarget, Tool};
use crate::core::update::ActorField;
use crate::schema::SchemaLookup;

/// Partial actor data from a secondary source. Absent fields are left alone by a merge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeCandidate {
    #[serde(default)]
    pub aliases: Option<Vec<String>>,
    #[serde(default)]
    pub tools_malware: Option<Vec<Tool>>,
    #[serde(default)]
    pub target_sectors: Option<Vec<String>>,
    #[serde(default)]
    pub goals: Option<Vec<String>>,
    #[serde(default)]
    pub capability_level: Option<String>,
    /// low/medium/high feed vocabulary, used when `capability_level` is absent.
    #[serde(default)]
    pub sophistication: Option<String>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub confidence_level: Option<i32>,
    #[serde(default)]
    pub infrastructure: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub geographic_targeting: Option<BTreeMap<String, GeoTarget>>,
    #[serde(default)]
    pub last_observed: Option<String>,
}

impl MergeCandidate {
    pub fn from_value(value: &Value) -> Result<Self, IntelError> {
        if !value.is_object() {
            return Err(ValidationError::schema("merge", "$", "candidate must be an object").into());
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            IntelError::Validation(ValidationError::schema("merge", "$", e.to_string()))
        })
    }

    fn capability(&self) -> Option<String> {
        self.capability_level.clone().or_else(|| {
            self.sophistication
                .as_deref()
                .map(CapabilityLevel::from_sophistication)
                .filter(|level| *level != CapabilityLevel::Unknown)
                .map(|level| level.to_string())
        })
    }

    fn carries_gated_scalar(&self) -> bool {
        self.capability().is_some() || self.motivation.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Fields whose value differs from before the merge.
    pub changed: Vec<ActorField>,
    /// Whether the candidate carried a gated scalar and its confidence let it through.
    pub scalar_overwrite: bool,
    pub version: Version,
}

/// Folds `candidate` into `actor` field by field, validates the result and commits it
/// with `reference` as the single provenance entry. On error `actor` is untouched.
pub fn merge_into(
    actor: &mut ThreatActor,
    candidate: &MergeCandidate,
    reference: Reference,
    schemas: &dyn SchemaLookup,
) -> Result<MergeReport, IntelError> {
    reference.validate()?;
    let mut next = actor.clone();
    let mut changed = Vec::new();

    if let Some(aliases) = &candidate.aliases {
        let before = next.aliases.len();
        next.aliases.extend(aliases.iter().cloned());
        if next.aliases.len() != before {
            changed.push(ActorField::Aliases);
        }
    }
    if let Some(tools) = &candidate.tools_malware {
        if union_into(&mut next.tools_malware, tools) {
            changed.push(ActorField::ToolsMalware);
        }
    }
    if let Some(sectors) = &candidate.target_sectors {
        let before = next.target_sectors.len();
        next.target_sectors.extend(sectors.iter().cloned());
        if next.target_sectors.len() != before {
            changed.push(ActorField::TargetSectors);
        }
    }
    if let Some(goals) = &candidate.goals {
        if union_into(&mut next.goals, goals) {
            changed.push(ActorField::Goals);
        }
    }

    let gate_open = candidate
        .confidence_level
        .map_or(false, |incoming| incoming > actor.confidence_level);
    let scalar_overwrite = gate_open && candidate.carries_gated_scalar();
    if gate_open {
        if let Some(capability) = candidate.capability() {
            if next.capability_level.as_deref() != Some(capability.as_str()) {
                next.capability_level = Some(capability);
                changed.push(ActorField::CapabilityLevel);
            }
        }
        if let Some(motivation) = &candidate.motivation {
            if next.motivation.as_ref() != Some(motivation) {
                next.motivation = Some(motivation.clone());
                changed.push(ActorField::Motivation);
            }
        }
    } else if candidate.carries_gated_scalar() {
        tracing::debug!(
            actor_id = %actor.actor_id,
            existing = actor.confidence_level,
            incoming = ?candidate.confidence_level,
            "scalar overwrite declined by confidence gate"
        );
    }

    if let Some(infrastructure) = &candidate.infrastructure {
        if map_union(&mut next.infrastructure, infrastructure) {
            changed.push(ActorField::Infrastructure);
        }
    }
    if let Some(targets) = &candidate.geographic_targeting {
        if map_union(&mut next.geographic_targeting, targets) {
            changed.push(ActorField::GeographicTargeting);
        }
    }

    if let Some(raw) = &candidate.last_observed {
        let incoming = parse_timestamp(raw).ok_or_else(|| {
            ValidationError::schema("merge", "$.last_observed", format!("unparseable timestamp '{}'", raw))
        })?;
        if next.last_observed.map_or(true, |current| incoming > current) {
            next.last_observed = Some(incoming);
            changed.push(ActorField::LastObserved);
        }
    }

    next.validate(schemas)?;

    let fields = changed.iter().map(|f| f.as_str().to_string()).collect();
    next.record_change(reference.with_fields(fields));
    *actor = next;

    tracing::info!(
        actor_id = %actor.actor_id,
        changed = changed.len(),
        version = %actor.metadata.version,
        "merge committed"
    );

    Ok(MergeReport {
        changed,
        scalar_overwrite,
        version: actor.metadata.version,
    })
}

/// Set-style union on a list, collapsing structural duplicates already present.
pub(crate) fn union_into<T: Clone + PartialEq>(existing: &mut Vec<T>, incoming: &[T]) -> bool {
    let mut merged: Vec<T> = Vec::with_capacity(existing.len() + incoming.len());
    for item in existing.iter().chain(incoming.iter()) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    if merged == *existing {
        return false;
    }
    *existing = merged;
    true
}

fn map_union<V: Clone + PartialEq>(
    existing: &mut BTreeMap<String, V>,
    incoming: &BTreeMap<String, V>,
) -> bool {
    let mut changed = false;
    for (key, value) in incoming {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::core::actor::ActorDraft;
    use crate::core::metadata::Metadata;
    use crate::core::types::Tlp;
    use crate::schema::SchemaRegistry;

    use super::*;

    fn actor(schemas: &SchemaRegistry) -> ThreatActor {
        let mut draft = ActorDraft::new("TA24CHN-APT7C1", "APT41", Metadata::new("test", Tlp::Amber));
        draft.confidence_level = 4;
        draft.capability_level = Some("Intermediate".into());
        draft.goals = vec!["Espionage".into()];
        ThreatActor::new(draft, schemas).unwrap()
    }

    fn candidate(value: serde_json::Value) -> MergeCandidate {
        MergeCandidate::from_value(&value).unwrap()
    }

    #[test]
    fn list_union_collapses_duplicates() {
        let mut existing = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert!(union_into(&mut existing, &["b".to_string(), "c".to_string()]));
        assert_eq!(existing, vec!["a", "b", "c"]);
        assert!(!union_into(&mut existing, &["c".to_string()]));
    }

    #[test]
    fn sophistication_feeds_capability_when_absent() {
        let c = candidate(json!({"sophistication": "high", "confidence_level": 5}));
        assert_eq!(c.capability().as_deref(), Some("Advanced"));
        let c = candidate(json!({"sophistication": "unheard-of"}));
        assert!(c.capability().is_none());
    }

    #[test]
    fn gate_open_keeps_actor_confidence() {
        let schemas = SchemaRegistry::builtin().unwrap();
        let mut a = actor(&schemas);
        let report = merge_into(
            &mut a,
            &candidate(json!({"motivation": "Financial", "confidence_level": 5})),
            Reference::new("Data Merge"),
            &schemas,
        )
        .unwrap();
        assert!(report.scalar_overwrite);
        assert_eq!(a.motivation(), Some("Financial"));
        assert_eq!(a.confidence_level(), 4);
        assert_eq!(
            a.references()[0].fields_referenced,
            vec!["motivation".to_string()]
        );
    }

    #[test]
    fn later_source_above_actor_confidence_still_overwrites() {
        let schemas = SchemaRegistry::builtin().unwrap();
        let mut draft = ActorDraft::new("TA24CHN-APT7C1", "APT41", Metadata::new("test", Tlp::Amber));
        draft.confidence_level = 2;
        let mut a = ThreatActor::new(draft, &schemas).unwrap();

        merge_into(
            &mut a,
            &candidate(json!({"motivation": "Espionage", "confidence_level": 5})),
            Reference::new("Vendor A"),
            &schemas,
        )
        .unwrap();
        assert_eq!(a.confidence_level(), 2);

        let report = merge_into(
            &mut a,
            &candidate(json!({"capability_level": "Advanced", "confidence_level": 4})),
            Reference::new("Vendor B"),
            &schemas,
        )
        .unwrap();
        assert!(report.scalar_overwrite);
        assert_eq!(a.capability_level(), Some("Advanced"));
    }

    #[test]
    fn open_gate_without_scalars_is_not_an_overwrite() {
        let schemas = SchemaRegistry::builtin().unwrap();
        let mut a = actor(&schemas);
        let report = merge_into(
            &mut a,
            &candidate(json!({"goals": ["Financial Gain"], "confidence_level": 5})),
            Reference::new("Data Merge"),
            &schemas,
        )
        .unwrap();
        assert!(!report.scalar_overwrite);
        assert_eq!(report.changed, vec![ActorField::Goals]);
    }

    #[test]
    fn lists_merge_regardless_of_confidence() {
        let schemas = SchemaRegistry::builtin().unwrap();
        let mut a = actor(&schemas);
        let report = merge_into(
            &mut a,
            &candidate(json!({
                "goals": ["Espionage", "Financial Gain"],
                "aliases": ["Winnti"],
                "confidence_level": 1
            })),
            Reference::new("Data Merge"),
            &schemas,
        )
        .unwrap();
        assert!(!report.scalar_overwrite);
        assert_eq!(report.changed, vec![ActorField::Aliases, ActorField::Goals]);
        assert_eq!(a.goals(), ["Espionage", "Financial Gain"]);
        assert_eq!(a.confidence_level(), 4);
    }

    #[test]
    fn invalid_merge_leaves_actor_untouched() {
        let schemas = SchemaRegistry::builtin().unwrap();
        let mut a = actor(&schemas);
        let before = a.clone();
        let err = merge_into(
            &mut a,
            &candidate(json!({"aliases": [""]})),
            Reference::new("Data Merge"),
            &schemas,
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(a, before);

        let err = merge_into(
            &mut a,
            &candidate(json!({"last_observed": "yesterday-ish"})),
            Reference::new("Data Merge"),
            &schemas,
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(a, before);
    }

    #[test]
    fn earlier_last_observed_is_ignored() {
        let schemas = SchemaRegistry::builtin().unwrap();
        let mut a = actor(&schemas);
        let later = (a.first_observed() + chrono::Duration::days(30)).to_rfc3339();
        merge_into(
            &mut a,
            &candidate(json!({"last_observed": later})),
            Reference::new("Data Merge"),
            &schemas,
        )
        .unwrap();
        let recorded = a.last_observed();
        assert!(recorded.is_some());

        let earlier = (a.first_observed() + chrono::Duration::days(1)).to_rfc3339();
        let report = merge_into(
            &mut a,
            &candidate(json!({"last_observed": earlier})),
            Reference::new("Data Merge"),
            &schemas,
        )
        .unwrap();
        assert!(report.changed.is_empty());
        assert_eq!(a.last_observed(), recorded);
    }
}
