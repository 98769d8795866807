use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::error::{IntelError, ValidationError};
use crate::core::metadata::{BumpKind, Metadata};
use crate::core::reference::Reference;
use crate::core::time::now_utc;
use crate::core::types::{AttackPattern, GeoTarget, Relationship, Tool};
use crate::core::update::FieldUpdate;
use crate::schema::SchemaLookup;

/// Construction input for a [`ThreatActor`]. Only `actor_id`, `name` and `metadata` are
/// required; everything else starts empty.
#[derive(Debug, Clone)]
pub struct ActorDraft {
    pub actor_id: String,
    pub name: String,
    pub metadata: Metadata,
    pub uuid: Option<Uuid>,
    pub references: Vec<Reference>,
    pub aliases: BTreeSet<String>,
    pub first_observed: DateTime<Utc>,
    pub last_observed: Option<DateTime<Utc>>,
    pub confidence_level: i32,
    pub capability_level: Option<String>,
    pub tools_malware: Vec<Tool>,
    pub infrastructure: BTreeMap<String, Value>,
    pub target_sectors: BTreeSet<String>,
    pub geographic_targeting: BTreeMap<String, GeoTarget>,
    pub attack_patterns: Vec<AttackPattern>,
    pub motivation: Option<String>,
    pub goals: Vec<String>,
    pub relationships: Vec<Relationship>,
}

impl ActorDraft {
    pub fn new(actor_id: impl Into<String>, name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            actor_id: actor_id.into(),
            name: name.into(),
            metadata,
            uuid: None,
            references: vec![],
            aliases: BTreeSet::new(),
            first_observed: now_utc(),
            last_observed: None,
            confidence_level: 0,
            capability_level: None,
            tools_malware: vec![],
            infrastructure: BTreeMap::new(),
            target_sectors: BTreeSet::new(),
            geographic_targeting: BTreeMap::new(),
            attack_patterns: vec![],
            motivation: None,
            goals: vec![],
            relationships: vec![],
        }
    }
}

/// Canonical record for one adversary group.
///
/// Every instance in existence has passed full validation: construction validates,
/// and every mutation validates a candidate before it replaces the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatActor {
    pub(crate) actor_id: String,
    pub(crate) name: String,
    pub(crate) uuid: Uuid,
    pub(crate) metadata: Metadata,
    pub(crate) references: Vec<Reference>,
    pub(crate) aliases: BTreeSet<String>,
    pub(crate) first_observed: DateTime<Utc>,
    pub(crate) last_observed: Option<DateTime<Utc>>,
    pub(crate) confidence_level: i32,
    pub(crate) capability_level: Option<String>,
    pub(crate) tools_malware: Vec<Tool>,
    pub(crate) infrastructure: BTreeMap<String, Value>,
    pub(crate) target_sectors: BTreeSet<String>,
    pub(crate) geographic_targeting: BTreeMap<String, GeoTarget>,
    pub(crate) attack_patterns: Vec<AttackPattern>,
    pub(crate) motivation: Option<String>,
    pub(crate) goals: Vec<String>,
    pub(crate) relationships: Vec<Relationship>,
}

/// A mutation that failed validation, handing back the actor exactly as it was.
#[derive(Debug)]
pub struct Rejected {
    pub original: Box<ThreatActor>,
    pub error: IntelError,
}

impl From<Rejected> for IntelError {
    fn from(rejected: Rejected) -> Self {
        rejected.error
    }
}

impl ThreatActor {
    pub fn new(draft: ActorDraft, schemas: &dyn SchemaLookup) -> Result<Self, IntelError> {
        let actor = Self {
            actor_id: draft.actor_id,
            name: draft.name,
            uuid: draft.uuid.unwrap_or_else(Uuid::new_v4),
            metadata: draft.metadata,
            references: draft.references,
            aliases: draft.aliases,
            first_observed: draft.first_observed,
            last_observed: draft.last_observed,
            confidence_level: draft.confidence_level,
            capability_level: draft.capability_level,
            tools_malware: draft.tools_malware,
            infrastructure: draft.infrastructure,
            target_sectors: draft.target_sectors,
            geographic_targeting: draft.geographic_targeting,
            attack_patterns: draft.attack_patterns,
            motivation: draft.motivation,
            goals: draft.goals,
            relationships: draft.relationships,
        };
        actor.validate(schemas)?;
        Ok(actor)
    }

    /// Rebuilds an actor from a [`ThreatActor::to_value`] snapshot.
    pub fn from_value(value: &Value, schemas: &dyn SchemaLookup) -> Result<Self, IntelError> {
        schemas.validate_record(value)?;
        let record: ActorRecord = serde_json::from_value(value.clone())?;
        if let Some(top_level) = &record.actor_id {
            if top_level != &record.core_identification.actor_id {
                return Err(ValidationError::Invariant(format!(
                    "actor_id {} disagrees with core_identification.actor_id {}",
                    top_level, record.core_identification.actor_id
                ))
                .into());
            }
        }
        let ident = record.core_identification;
        let tech = record.technical_profile;
        let behavior = record.behavioral_analysis;
        let strategy = record.strategic_context;
        let draft = ActorDraft {
            actor_id: ident.actor_id,
            name: ident.name.or(record.name).unwrap_or_default(),
            metadata: record.metadata,
            uuid: record.uuid,
            references: record.references,
            aliases: ident.aliases,
            first_observed: ident.first_observed,
            last_observed: ident.last_observed,
            confidence_level: ident.confidence_level,
            capability_level: tech.capability_level,
            tools_malware: tech.tools_malware,
            infrastructure: tech.infrastructure,
            target_sectors: behavior.target_sectors,
            geographic_targeting: behavior.geographic_targeting,
            attack_patterns: behavior.attack_patterns,
            motivation: strategy.motivation,
            goals: strategy.goals,
            relationships: strategy.relationships,
        };
        ThreatActor::new(draft, schemas)
    }

    /// Full-record check: the five section schemas (fail fast), then the derived
    /// invariants the schemas cannot express.
    pub fn validate(&self, schemas: &dyn SchemaLookup) -> Result<(), IntelError> {
        schemas.validate_record(&self.to_value())?;
        if let Some(last) = self.last_observed {
            if last < self.first_observed {
                return Err(ValidationError::Invariant(format!(
                    "last_observed {} precedes first_observed {}",
                    last.to_rfc3339(),
                    self.first_observed.to_rfc3339()
                ))
                .into());
            }
        }
        for reference in &self.references {
            reference
                .validate()
                .map_err(|e| IntelError::Validation(ValidationError::Reference(e)))?;
        }
        Ok(())
    }

    /// Deterministic snapshot consumed by serializers and storage.
    pub fn to_value(&self) -> Value {
        json!({
            "actor_id": self.actor_id,
            "name": self.name,
            "uuid": self.uuid,
            "metadata": self.metadata,
            "references": self.references,
            "core_identification": {
                "actor_id": self.actor_id,
                "name": self.name,
                "aliases": self.aliases,
                "first_observed": self.first_observed,
                "last_observed": self.last_observed,
                "confidence_level": self.confidence_level
            },
            "technical_profile": {
                "capability_level": self.capability_level,
                "tools_malware": self.tools_malware,
                "infrastructure": self.infrastructure
            },
            "behavioral_analysis": {
                "target_sectors": self.target_sectors,
                "geographic_targeting": self.geographic_targeting,
                "attack_patterns": self.attack_patterns
            },
            "strategic_context": {
                "motivation": self.motivation,
                "goals": self.goals,
                "relationships": self.relationships
            }
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, IntelError> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    /// Applies `update` and returns the new actor, or hands the untouched original back
    /// alongside the failure.
    pub fn try_update(
        self,
        update: FieldUpdate,
        reference: Reference,
        schemas: &dyn SchemaLookup,
    ) -> Result<ThreatActor, Rejected> {
        match self.updated(update, reference, schemas) {
            Ok(next) => Ok(next),
            Err(error) => Err(Rejected {
                original: Box::new(self),
                error,
            }),
        }
    }

    /// In-place form of [`ThreatActor::try_update`]. On error `self` is unchanged.
    pub fn update_field(
        &mut self,
        update: FieldUpdate,
        reference: Reference,
        schemas: &dyn SchemaLookup,
    ) -> Result<(), IntelError> {
        *self = self.updated(update, reference, schemas)?;
        Ok(())
    }

    /// Appends `reference` unless an identical one is already attached. Returns whether
    /// it was appended; only an append touches metadata.
    pub fn add_reference(&mut self, reference: Reference) -> Result<bool, IntelError> {
        reference.validate()?;
        if self.references.contains(&reference) {
            tracing::debug!(actor_id = %self.actor_id, "duplicate reference ignored");
            return Ok(false);
        }
        self.references.push(reference);
        self.metadata.bump(BumpKind::Minor);
        Ok(true)
    }

    fn updated(
        &self,
        update: FieldUpdate,
        reference: Reference,
        schemas: &dyn SchemaLookup,
    ) -> Result<ThreatActor, IntelError> {
        reference.validate()?;
        let field = update.field();
        let mut candidate = self.clone();
        candidate.assign(update);
        match candidate.validate(schemas) {
            Ok(()) => {}
            Err(IntelError::Validation(cause)) => {
                tracing::debug!(actor_id = %self.actor_id, field = %field, error = %cause, "update rejected");
                return Err(ValidationError::Field {
                    field,
                    cause: Box::new(cause),
                }
                .into());
            }
            Err(other) => return Err(other),
        }
        candidate.record_change(reference);
        Ok(candidate)
    }

    pub(crate) fn assign(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::ActorId(v) => self.actor_id = v,
            FieldUpdate::Name(v) => self.name = v,
            FieldUpdate::Aliases(v) => self.aliases = v,
            FieldUpdate::FirstObserved(v) => self.first_observed = v,
            FieldUpdate::LastObserved(v) => self.last_observed = v,
            FieldUpdate::ConfidenceLevel(v) => self.confidence_level = v,
            FieldUpdate::CapabilityLevel(v) => self.capability_level = v,
            FieldUpdate::ToolsMalware(v) => self.tools_malware = v,
            FieldUpdate::Infrastructure(v) => self.infrastructure = v,
            FieldUpdate::TargetSectors(v) => self.target_sectors = v,
            FieldUpdate::GeographicTargeting(v) => self.geographic_targeting = v,
            FieldUpdate::AttackPatterns(v) => self.attack_patterns = v,
            FieldUpdate::Motivation(v) => self.motivation = v,
            FieldUpdate::Goals(v) => self.goals = v,
            FieldUpdate::Relationships(v) => self.relationships = v,
        }
    }

    /// Provenance and versioning for one committed change: the reference (deduplicated)
    /// and exactly one minor bump.
    pub(crate) fn record_change(&mut self, reference: Reference) {
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
        self.metadata.bump(BumpKind::Minor);
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    pub fn first_observed(&self) -> DateTime<Utc> {
        self.first_observed
    }

    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        self.last_observed
    }

    pub fn confidence_level(&self) -> i32 {
        self.confidence_level
    }

    pub fn capability_level(&self) -> Option<&str> {
        self.capability_level.as_deref()
    }

    pub fn tools_malware(&self) -> &[Tool] {
        &self.tools_malware
    }

    pub fn infrastructure(&self) -> &BTreeMap<String, Value> {
        &self.infrastructure
    }

    pub fn target_sectors(&self) -> &BTreeSet<String> {
        &self.target_sectors
    }

    pub fn geographic_targeting(&self) -> &BTreeMap<String, GeoTarget> {
        &self.geographic_targeting
    }

    pub fn attack_patterns(&self) -> &[AttackPattern] {
        &self.attack_patterns
    }

    pub fn motivation(&self) -> Option<&str> {
        self.motivation.as_deref()
    }

    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }
}

#[derive(Debug, Deserialize)]
struct ActorRecord {
    #[serde(default)]
    actor_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uuid: Option<Uuid>,
    metadata: Metadata,
    #[serde(default)]
    references: Vec<Reference>,
    core_identification: IdentificationSection,
    technical_profile: TechnicalSection,
    behavioral_analysis: BehavioralSection,
    strategic_context: StrategicSection,
}

#[derive(Debug, Deserialize)]
struct IdentificationSection {
    actor_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    aliases: BTreeSet<String>,
    first_observed: DateTime<Utc>,
    #[serde(default)]
    last_observed: Option<DateTime<Utc>>,
    confidence_level: i32,
}

#[derive(Debug, Deserialize)]
struct TechnicalSection {
    #[serde(default)]
    capability_level: Option<String>,
    #[serde(default)]
    tools_malware: Vec<Tool>,
    #[serde(default)]
    infrastructure: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BehavioralSection {
    #[serde(default)]
    target_sectors: BTreeSet<String>,
    #[serde(default)]
    geographic_targeting: BTreeMap<String, GeoTarget>,
    #[serde(default)]
    attack_patterns: Vec<AttackPattern>,
}

#[derive(Debug, Deserialize)]
struct StrategicSection {
    #[serde(default)]
    motivation: Option<String>,
    #[serde(default)]
    goals: Vec<String>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}
