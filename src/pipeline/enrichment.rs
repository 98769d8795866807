use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::core::actor::ThreatActor;
use crate::core::error::IntelError;
use crate::core::reference::Reference;
use crate::core::types::{AttackPattern, GeoTarget};
use crate::core::update::ActorField;
use crate::schema::SchemaLookup;

pub const MITRE_SOURCE: &str = "MITRE ATT&CK";
pub const MITRE_CONFIDENCE: i32 = 4;
pub const OTX_SOURCE: &str = "AlienVault OTX";
pub const OTX_CONFIDENCE: i32 = 3;
const OTX_COUNTRY_CONFIDENCE: i32 = 3;
const MITRE_GROUP_BASE: &str = "https://attack.mitre.org/groups/";
const OTX_ACTOR_BASE: &str = "https://otx.alienvault.com/actor/";

/// `base` with `segment` appended as one percent-encoded path segment.
fn segment_url(base: &str, segment: &str) -> Result<String, IntelError> {
    let mut url = Url::parse(base).map_err(|e| IntelError::Config(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| IntelError::Config(format!("{} cannot take path segments", base)))?
        .pop_if_empty()
        .push(segment);
    Ok(url.to_string())
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MitreTechnique {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// ATT&CK group entry as already fetched by the caller.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MitreGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub techniques: Vec<MitreTechnique>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OtxIndicator {
    pub indicator: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// OTX adversary pulse, reduced to the parts that land on an actor.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct OtxActor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub indicators: Vec<OtxIndicator>,
    #[serde(default)]
    pub targeted_countries: Vec<String>,
}

pub fn apply_mitre(
    actor: &mut ThreatActor,
    group: &MitreGroup,
    schemas: &dyn SchemaLookup,
) -> Result<Vec<ActorField>, IntelError> {
    let mut next = actor.clone();
    let mut changed = Vec::new();

    let mut added_technique = false;
    for technique in &group.techniques {
        if next
            .attack_patterns
            .iter()
            .any(|p| p.technique_id == technique.id)
        {
            continue;
        }
        next.attack_patterns.push(AttackPattern {
            technique_id: technique.id.clone(),
            technique_name: technique.name.clone(),
            first_observed: Some(actor.first_observed),
        });
        added_technique = true;
    }
    if added_technique {
        changed.push(ActorField::AttackPatterns);
    }

    let before = next.aliases.len();
    next.aliases.extend(group.aliases.iter().cloned());
    if next.aliases.len() != before {
        changed.push(ActorField::Aliases);
    }

    let reference = Reference::new(MITRE_SOURCE)
        .with_url(segment_url(MITRE_GROUP_BASE, &group.id)?)
        .with_title(format!(
            "MITRE ATT&CK Group: {}",
            group.name.as_deref().unwrap_or(&group.id)
        ))
        .with_confidence(MITRE_CONFIDENCE);
    commit(actor, next, changed, reference, schemas)
}

pub fn apply_otx(
    actor: &mut ThreatActor,
    pulse: &OtxActor,
    schemas: &dyn SchemaLookup,
) -> Result<Vec<ActorField>, IntelError> {
    let mut next = actor.clone();
    let mut changed = Vec::new();

    let incoming: Vec<&str> = pulse
        .indicators
        .iter()
        .filter(|i| i.kind.eq_ignore_ascii_case("domain"))
        .map(|i| i.indicator.as_str())
        .collect();
    if !incoming.is_empty() {
        let (mut domains, mut dirty) = match next.infrastructure.get("domains") {
            Some(Value::Array(existing)) => (existing.clone(), false),
            Some(other) => {
                tracing::warn!(actor_id = %actor.actor_id, found = %other, "replacing non-list infrastructure.domains");
                (vec![], true)
            }
            None => (vec![], false),
        };
        for domain in incoming {
            let value = Value::String(domain.to_string());
            if !domains.contains(&value) {
                domains.push(value);
                dirty = true;
            }
        }
        if dirty {
            next.infrastructure
                .insert("domains".to_string(), Value::Array(domains));
            changed.push(ActorField::Infrastructure);
        }
    }

    let mut added_country = false;
    for country in &pulse.targeted_countries {
        if next.geographic_targeting.contains_key(country) {
            continue;
        }
        next.geographic_targeting.insert(
            country.clone(),
            GeoTarget {
                first_seen: actor.first_observed,
                confidence: OTX_COUNTRY_CONFIDENCE,
            },
        );
        added_country = true;
    }
    if added_country {
        changed.push(ActorField::GeographicTargeting);
    }

    let label = pulse.name.as_deref().unwrap_or(&actor.name);
    let reference = Reference::new(OTX_SOURCE)
        .with_url(segment_url(OTX_ACTOR_BASE, label)?)
        .with_title(format!("AlienVault OTX Actor: {}", label))
        .with_confidence(OTX_CONFIDENCE);
    commit(actor, next, changed, reference, schemas)
}

fn commit(
    actor: &mut ThreatActor,
    mut next: ThreatActor,
    changed: Vec<ActorField>,
    reference: Reference,
    schemas: &dyn SchemaLookup,
) -> Result<Vec<ActorField>, IntelError> {
    reference.validate()?;
    next.validate(schemas)?;
    let fields = changed.iter().map(|f| f.as_str().to_string()).collect();
    let source = reference.source.clone();
    next.record_change(reference.with_fields(fields));
    *actor = next;
    tracing::info!(actor_id = %actor.actor_id, source = %source, changed = changed.len(), "enrichment applied");
    Ok(changed)
}
