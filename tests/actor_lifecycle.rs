use serde_json::json;
use stasis::core::actor::{ActorDraft, ThreatActor};
use stasis::core::error::{IntelError, ValidationError};
use stasis::core::metadata::Metadata;
use stasis::core::reference::Reference;
use stasis::core::types::{Tlp, Tool};
use stasis::core::update::{ActorField, FieldUpdate};
use stasis::schema::SchemaRegistry;

fn draft() -> ActorDraft {
    let mut d = ActorDraft::new("TA24PRK-CRM3A9", "Lazarus Group", Metadata::new("analyst", Tlp::Amber));
    d.confidence_level = 4;
    d.aliases = ["Hidden Cobra".to_string(), "ZINC".to_string()].into_iter().collect();
    d.tools_malware = vec![Tool::named("AppleJeus")];
    d.motivation = Some("Financial".into());
    d
}

#[test]
fn confidence_six_fails_at_construction() {
    let schemas = SchemaRegistry::builtin().unwrap();
    let mut d = draft();
    d.confidence_level = 6;
    let err = ThreatActor::new(d, &schemas).unwrap_err();
    match err {
        IntelError::Validation(ValidationError::Schema { schema, path, .. }) => {
            assert_eq!(schema, "identification");
            assert_eq!(path, "$.confidence_level");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn negative_reference_confidence_fails_at_construction() {
    let schemas = SchemaRegistry::builtin().unwrap();
    let mut d = draft();
    d.references = vec![Reference::new("feed").with_confidence(-1)];
    let err = ThreatActor::new(d, &schemas).unwrap_err();
    assert!(matches!(
        err,
        IntelError::Validation(ValidationError::Reference(_))
    ));
}

#[test]
fn identical_reference_is_stored_once() {
    let schemas = SchemaRegistry::builtin().unwrap();
    let mut actor = ThreatActor::new(draft(), &schemas).unwrap();
    let reference = Reference::new("CISA")
        .with_url("https://www.cisa.gov/news-events/cybersecurity-advisories/aa22-108a")
        .with_confidence(5);

    assert!(actor.add_reference(reference.clone()).unwrap());
    assert!(!actor.add_reference(reference).unwrap());
    assert_eq!(actor.references().len(), 1);
    assert_eq!(actor.metadata().revision_history.len(), 1);
}

#[test]
fn rejected_update_is_fully_rolled_back() {
    let schemas = SchemaRegistry::builtin().unwrap();
    let mut actor = ThreatActor::new(draft(), &schemas).unwrap();
    let before = actor.clone();

    let update = FieldUpdate::from_named("aliases", json!(["Hidden Cobra", ""])).unwrap();
    let err = actor
        .update_field(update, Reference::new("analyst"), &schemas)
        .unwrap_err();
    match err {
        IntelError::Validation(ValidationError::Field { field, .. }) => {
            assert_eq!(field, ActorField::Aliases)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(actor, before);
    assert_eq!(actor.metadata().version, before.metadata().version);
}

#[test]
fn unknown_and_immutable_fields_are_refused() {
    assert!(matches!(
        FieldUpdate::from_named("nickname", json!("x")),
        Err(IntelError::UnknownField(name)) if name == "nickname"
    ));
    assert!(matches!(
        FieldUpdate::from_named("metadata", json!({})),
        Err(IntelError::ImmutableField(_))
    ));
}

#[test]
fn try_update_hands_back_original() {
    let schemas = SchemaRegistry::builtin().unwrap();
    let actor = ThreatActor::new(draft(), &schemas).unwrap();
    let snapshot = actor.clone();

    let rejected = actor
        .try_update(FieldUpdate::ActorId("LAZARUS".into()), Reference::new("analyst"), &schemas)
        .unwrap_err();
    assert!(rejected.error.is_validation());
    assert_eq!(*rejected.original, snapshot);

    let updated = rejected
        .original
        .try_update(
            FieldUpdate::CapabilityLevel(Some("Advanced".into())),
            Reference::new("analyst").with_confidence(4),
            &schemas,
        )
        .unwrap();
    assert_eq!(updated.capability_level(), Some("Advanced"));
    assert_eq!(updated.metadata().version.to_string(), "1.1.0");
}

#[test]
fn versions_only_move_forward() {
    let schemas = SchemaRegistry::builtin().unwrap();
    let mut actor = ThreatActor::new(draft(), &schemas).unwrap();
    let mut last = actor.metadata().version;
    let mut successes = 0;

    let updates = vec![
        FieldUpdate::Goals(vec!["Revenue generation".into()]),
        FieldUpdate::ConfidenceLevel(7),
        FieldUpdate::ConfidenceLevel(5),
        FieldUpdate::Name(String::new()),
        FieldUpdate::Motivation(Some("Financial, Espionage".into())),
    ];
    for update in updates {
        if actor
            .update_field(update, Reference::new("analyst"), &schemas)
            .is_ok()
        {
            successes += 1;
        }
        assert!(actor.metadata().version >= last);
        last = actor.metadata().version;
        assert_eq!(actor.metadata().revision_history.len(), successes);
    }
    assert_eq!(successes, 3);
    assert_eq!(last.to_string(), "1.3.0");
}

#[test]
fn snapshot_round_trips() -> anyhow::Result<()> {
    let schemas = SchemaRegistry::builtin()?;
    let mut actor = ThreatActor::new(draft(), &schemas)?;
    actor.update_field(
        FieldUpdate::from_named("target_sectors", json!(["Finance", "Cryptocurrency"]))?,
        Reference::new("analyst").with_title("sector review").with_confidence(3),
        &schemas,
    )?;

    let value = actor.to_value();
    let rebuilt = ThreatActor::from_value(&value, &schemas)?;
    assert_eq!(rebuilt, actor);

    let text = actor.to_json_pretty()?;
    let reparsed: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(ThreatActor::from_value(&reparsed, &schemas)?, actor);
    Ok(())
}

#[test]
fn mismatched_actor_ids_in_snapshot_are_rejected() {
    let schemas = SchemaRegistry::builtin().unwrap();
    let actor = ThreatActor::new(draft(), &schemas).unwrap();
    let mut value = actor.to_value();
    value["actor_id"] = json!("TA24PRK-CRM000");
    assert!(ThreatActor::from_value(&value, &schemas)
        .unwrap_err()
        .is_validation());
}
