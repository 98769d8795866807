pub mod enrichment;
pub mod importer;
pub mod merge;
pub mod normalizer;
pub mod relationships;
pub mod scorer;

use serde_json::Value;

use crate::config::CoreConfig;
use crate::core::actor::{ActorDraft, ThreatActor};
use crate::core::error::IntelError;
use crate::core::metadata::Metadata;
use crate::core::reference::Reference;
use crate::core::update::ActorField;
use crate::schema::{SchemaLookup, SchemaRegistry};

use enrichment::{MitreGroup, OtxActor};
use merge::{MergeCandidate, MergeReport};
use normalizer::Sanitizer;
use relationships::RelationshipImport;

/// Entry point for everything that folds outside data into canonical actors.
pub struct Reconciler<S: SchemaLookup = SchemaRegistry> {
    config: CoreConfig,
    schemas: S,
    sanitizer: Sanitizer,
}

impl Reconciler<SchemaRegistry> {
    /// Builds the registry the configuration points at.
    pub fn from_config(config: CoreConfig) -> Result<Self, IntelError> {
        let schemas = config.schema_registry()?;
        Reconciler::new(config, schemas)
    }
}

impl<S: SchemaLookup> Reconciler<S> {
    pub fn new(config: CoreConfig, schemas: S) -> Result<Self, IntelError> {
        config.validate()?;
        Ok(Self {
            config,
            schemas,
            sanitizer: Sanitizer::new()?,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn schemas(&self) -> &S {
        &self.schemas
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Draft stamped with the configured creator and TLP label.
    pub fn draft(&self, actor_id: impl Into<String>, name: impl Into<String>) -> ActorDraft {
        ActorDraft::new(
            actor_id,
            name,
            Metadata::new(self.config.creator.clone(), self.config.default_tlp),
        )
    }

    pub fn create(&self, draft: ActorDraft) -> Result<ThreatActor, IntelError> {
        ThreatActor::new(draft, &self.schemas)
    }

    pub fn merge(
        &self,
        actor: &mut ThreatActor,
        candidate: &Value,
        source: Option<&str>,
    ) -> Result<MergeReport, IntelError> {
        let cleaned = self.sanitizer.sanitize_value(candidate.clone());
        let candidate = MergeCandidate::from_value(&cleaned)?;
        let reference = Reference::new(source.unwrap_or(self.config.merge_source.as_str()))
            .with_title(format!("Merged Data: {}", actor.name()))
            .with_confidence(self.config.merge_confidence);
        merge::merge_into(actor, &candidate, reference, &self.schemas)
    }

    pub fn import_relationships(&self, actor: &mut ThreatActor, batch: &[Value]) -> RelationshipImport {
        let cleaned: Vec<Value> = batch
            .iter()
            .map(|raw| self.sanitizer.sanitize_value(raw.clone()))
            .collect();
        relationships::import_relationships(
            actor,
            &cleaned,
            &self.config.relationship_source,
            &self.schemas,
        )
    }

    pub fn apply_mitre(&self, actor: &mut ThreatActor, group: &MitreGroup) -> Result<Vec<ActorField>, IntelError> {
        enrichment::apply_mitre(actor, group, &self.schemas)
    }

    pub fn apply_otx(&self, actor: &mut ThreatActor, pulse: &OtxActor) -> Result<Vec<ActorField>, IntelError> {
        enrichment::apply_otx(actor, pulse, &self.schemas)
    }

    pub fn import_record(&self, data: &Value) -> Result<ThreatActor, IntelError> {
        let cleaned = self.sanitizer.sanitize_value(data.clone());
        importer::import_record(&cleaned, &self.config, &self.schemas)
    }
}
