//! End-to-end decisions through rule tables loaded from TOML.

use engine::{Config, DiscardReason, Intake, PolicyEngine, ReferenceCopyStore, RequestContext};
use metadata::{
    Connection, Entity, InMemorySnapshots, InstanceProperties, InstanceStatus, NewEntity,
    Relationship, SnapshotProvider, TypeDef, TypeRegistry, ZONE_MEMBERSHIP_CLASSIFICATION,
    ZONE_MEMBERSHIP_PROPERTY,
};
use policy::{CatalogRouter, Decision, ElementGate, Principal, RulePolicy};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn from_config(toml: &str, snapshots: InMemorySnapshots) -> PolicyEngine {
    let config = Config::parse(toml).unwrap();
    let types = Arc::new(TypeRegistry::open_metadata());
    PolicyEngine::from_config(config, types, Arc::new(snapshots)).unwrap()
}

/// Permits every direct read and counts how often it was asked.
#[derive(Default)]
struct CountingReads {
    reads: AtomicUsize,
}

impl ElementGate for CountingReads {
    fn check_entity_read(&self, _: &Principal, _: &str, entity: &Entity) -> Decision<Entity> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(entity.clone())
    }
}

const GLOSSARY_RULES: &str = r#"
[principals]
alice = ["reader"]

[services]
"*" = { roles = ["*"] }

[[grant]]
roles = ["reader"]
operations = ["entity_read", "glossary_read"]

[[deny]]
roles = ["reader"]
operations = ["glossary_read"]
types = ["Glossary"]
"#;

#[test]
fn denied_glossary_hides_its_terms() {
    let glossary = Entity::new("G1", "Glossary", "local");
    let term = Entity::new("E1", "GlossaryTerm", "local").with_anchor("G1");
    let snapshots = InMemorySnapshots::new().with_entity(glossary);

    let config = Config::parse(GLOSSARY_RULES).unwrap();
    let types = Arc::new(TypeRegistry::open_metadata());
    let rules = Arc::new(RulePolicy::new(config.rules, types.clone()));
    let router = Arc::new(
        CatalogRouter::new(types)
            .anchors(rules.clone())
            .glossaries(rules.clone())
            .assets(rules.clone()),
    );
    let direct = Arc::new(CountingReads::default());
    let engine = PolicyEngine::builder(config.server, Arc::new(snapshots))
        .platform(rules.clone())
        .servers(rules.clone())
        .services(rules)
        .elements(direct.clone())
        .anchors(router)
        .build();

    let admission = engine.admit(&RequestContext::new("alice", "glossary-manager")).unwrap();
    assert_eq!(admission.read_entity(&term), None);
    assert_eq!(direct.reads.load(Ordering::SeqCst), 0);

    // The same principal still reads unanchored terms directly.
    let loose = Entity::new("E7", "GlossaryTerm", "local");
    assert_eq!(admission.read_entity(&loose), Some(loose.clone()));
    assert_eq!(direct.reads.load(Ordering::SeqCst), 1);
}

const CONNECTION_RULES: &str = r#"
[principals]
bob = ["reader"]
carol = ["reader", "secops"]
dave = ["guest"]

[services]
"*" = { roles = ["*"] }

[[grant]]
roles = ["reader"]
operations = ["asset_read", "connection_read"]

[connections]
credential_roles = ["secops"]
"#;

fn catalog_with_connections() -> (Entity, InMemorySnapshots) {
    let asset = Entity::new("A1", "DataSet", "local");
    let snapshots = InMemorySnapshots::new()
        .with_entity(asset.clone())
        .with_connection(
            "A1",
            Connection::new("C1", "orders-admin")
                .with_endpoint("jdbc:postgresql://db:5432/orders")
                .with_credentials("admin", "s3cret"),
        )
        .with_connection(
            "A1",
            Connection::new("C2", "orders-readonly")
                .with_endpoint("jdbc:postgresql://db:5432/orders"),
        );
    (asset, snapshots)
}

#[test]
fn uncleared_principal_gets_the_credential_free_connection() {
    let (asset, snapshots) = catalog_with_connections();
    let engine = from_config(CONNECTION_RULES, snapshots);

    let bob = engine.admit(&RequestContext::new("bob", "asset-consumer")).unwrap();
    let chosen = bob.connection_for_asset(&asset).unwrap().unwrap();
    assert_eq!(chosen.guid.as_str(), "C2");

    let carol = engine.admit(&RequestContext::new("carol", "asset-consumer")).unwrap();
    let chosen = carol.connection_for_asset(&asset).unwrap().unwrap();
    assert_eq!(chosen.guid.as_str(), "C1");

    // Cannot read the asset, so it has no connections at all.
    let dave = engine.admit(&RequestContext::new("dave", "asset-consumer")).unwrap();
    assert_eq!(dave.connection_for_asset(&asset).unwrap(), None);
}

#[test]
fn selection_is_deterministic() {
    let (asset, snapshots) = catalog_with_connections();
    let candidates = snapshots.connections(asset.guid()).unwrap();
    let engine = from_config(CONNECTION_RULES, snapshots);
    let bob = engine.admit(&RequestContext::new("bob", "asset-consumer")).unwrap();

    let first = bob.select_connection(&asset, &candidates);
    for _ in 0..10 {
        assert_eq!(bob.select_connection(&asset, &candidates), first);
    }

    assert!(bob.check_connection(&asset, &candidates[0]).is_err());
    assert!(bob.check_connection(&asset, &candidates[1]).is_ok());
}

#[derive(Default)]
struct Cache {
    saved: Vec<Entity>,
}

impl ReferenceCopyStore for Cache {
    fn save_entity(&mut self, entity: Entity) -> metadata::Result<()> {
        self.saved.push(entity);
        Ok(())
    }

    fn save_relationship(&mut self, _relationship: Relationship) -> metadata::Result<()> {
        Ok(())
    }
}

#[test]
fn rejected_reference_copy_is_discarded_quietly() {
    let engine = from_config(
        r#"
[services]
"*" = { roles = ["*"] }

[reference_copies]
accept_collections = ["remote-9"]
"#,
        InMemorySnapshots::new(),
    );
    let mut cache = Cache::default();
    let copy = Entity::new("E2", "GlossaryTerm", "remote-7");

    let outcome = engine.replica_intake().receive_entity(copy, &mut cache).unwrap();
    assert_eq!(outcome, Intake::Discarded(DiscardReason::NotAdmitted));
    assert!(cache.saved.is_empty());
}

const REPLICATION_RULES: &str = r#"
[principals]
server-npa = ["replicator"]

[services]
"*" = { roles = ["*"] }

[[grant]]
roles = ["*"]
operations = ["type_read"]

[[grant]]
roles = ["replicator"]
operations = ["entity_create"]
types = ["Comment"]

[reference_copies]
roles = ["replicator"]
deny_types = ["Comment"]
"#;

#[test]
fn admission_does_not_follow_authoring_rights() {
    let engine = from_config(REPLICATION_RULES, InMemorySnapshots::new());
    let npa = engine.admit(&RequestContext::new("server-npa", "repository-services")).unwrap();

    // Cannot author glossary terms here, yet accepts remote copies of them.
    assert!(
        npa.create_entity(&TypeDef::entity("GlossaryTerm"), &NewEntity::default())
            .is_err()
    );
    let mut cache = Cache::default();
    let term = Entity::new("E2", "GlossaryTerm", "remote-7");
    assert_eq!(
        engine.replica_intake().receive_entity(term.clone(), &mut cache).unwrap(),
        Intake::Saved
    );
    assert_eq!(cache.saved, vec![term]);

    // Authors comments here, yet refuses remote copies of them.
    assert!(
        npa.create_entity(&TypeDef::entity("Comment"), &NewEntity::default())
            .is_ok()
    );
    let comment = Entity::new("C1", "Comment", "remote-7");
    assert!(!npa.save_entity_reference_copy(&comment));
    assert_eq!(
        engine.replica_intake().receive_entity(comment, &mut cache).unwrap(),
        Intake::Discarded(DiscardReason::NotAdmitted)
    );
    assert_eq!(cache.saved.len(), 1);
}

const ASSET_RULES: &str = r#"
[principals]
alice = ["reader", "editor"]
dpo = ["reader", "privacy", "labeller"]
ops = ["reader", "editor", "curator"]

[services]
"*" = { roles = ["*"] }

[[grant]]
roles = ["reader"]
operations = ["asset_read"]

[[grant]]
roles = ["editor"]
operations = ["asset_detail_update"]

[[grant]]
roles = ["labeller"]
operations = ["classification_add"]

[[grant]]
roles = ["curator"]
operations = ["entity_status_update"]
types = ["Asset"]

[zones]
supported = ["data-lake"]

[[redact]]
types = ["Asset"]
properties = ["owner"]
exempt_roles = ["privacy"]
"#;

fn zoned(guid: &str, zone: &str) -> Entity {
    let membership =
        InstanceProperties::from([(ZONE_MEMBERSHIP_PROPERTY.to_string(), json!([zone]))]);
    Entity::new(guid, "DataSet", "local")
        .with_property("name", json!("orders"))
        .with_property("owner", json!("finance"))
        .with_classification(ZONE_MEMBERSHIP_CLASSIFICATION, membership)
}

#[test]
fn reads_are_redacted_never_expanded() {
    let engine = from_config(ASSET_RULES, InMemorySnapshots::new());
    let asset = zoned("A1", "data-lake");

    let alice = engine.admit(&RequestContext::new("alice", "asset-consumer")).unwrap();
    let visible = alice.read_entity(&asset).unwrap();
    assert!(!visible.properties.contains_key("owner"));
    assert!(visible.properties.keys().all(|k| asset.properties.contains_key(k)));
    assert_eq!(visible.classifications, asset.classifications);

    let dpo = engine.admit(&RequestContext::new("dpo", "asset-consumer")).unwrap();
    assert_eq!(dpo.read_entity(&asset), Some(asset));
}

#[test]
fn assets_outside_supported_zones_are_absent() {
    let engine = from_config(ASSET_RULES, InMemorySnapshots::new());
    let quarantined = zoned("A2", "quarantine");

    let dpo = engine.admit(&RequestContext::new("dpo", "asset-consumer")).unwrap();
    assert_eq!(dpo.read_entity(&quarantined), None);
    assert_eq!(dpo.read_entity_summary(&quarantined), None);
}

#[test]
fn update_and_classify_are_granted_separately() {
    let engine = from_config(ASSET_RULES, InMemorySnapshots::new());
    let asset = zoned("A1", "data-lake");
    let label = InstanceProperties::new();

    let alice = engine.admit(&RequestContext::new("alice", "asset-owner")).unwrap();
    assert!(alice.update_entity(&asset, &InstanceProperties::new()).is_ok());
    assert!(alice.classify_entity(&asset, "Confidentiality", &label).is_err());

    let dpo = engine.admit(&RequestContext::new("dpo", "asset-owner")).unwrap();
    assert!(dpo.update_entity(&asset, &InstanceProperties::new()).is_err());
    assert!(dpo.classify_entity(&asset, "Confidentiality", &label).is_ok());
}

#[test]
fn detail_rights_do_not_change_status() {
    let engine = from_config(ASSET_RULES, InMemorySnapshots::new());
    let asset = zoned("A1", "data-lake");

    let alice = engine.admit(&RequestContext::new("alice", "asset-owner")).unwrap();
    assert!(alice.update_entity(&asset, &InstanceProperties::new()).is_ok());
    let err = alice
        .update_entity_status(&asset, InstanceStatus::Deleted)
        .unwrap_err();
    assert!(err.is_not_authorized());

    let ops = engine.admit(&RequestContext::new("ops", "asset-owner")).unwrap();
    assert!(ops.update_entity_status(&asset, InstanceStatus::Deleted).is_ok());
}

const MEMBER_RULES: &str = r#"
[principals]
alice = ["reader"]
dpo = ["reader", "privacy"]

[services]
"*" = { roles = ["*"] }

[[grant]]
roles = ["reader"]
operations = ["entity_read", "asset_read", "glossary_read", "anchor_member_read"]

[zones]
supported = ["data-lake"]

[[redact]]
types = ["SchemaAttribute"]
properties = ["secret"]
exempt_roles = ["privacy"]

[[redact]]
types = ["Glossary", "GlossaryTerm"]
properties = ["draftNotes"]
"#;

fn column(guid: &str) -> Entity {
    Entity::new(guid, "SchemaAttribute", "local")
        .with_property("name", json!("card_number"))
        .with_property("secret", json!("pan"))
}

#[test]
fn anchored_members_keep_their_redactions() {
    let snapshots = InMemorySnapshots::new().with_entity(zoned("A1", "data-lake"));
    let engine = from_config(MEMBER_RULES, snapshots);
    let loose = column("S1");
    let anchored = column("S1").with_anchor("A1");

    let alice = engine.admit(&RequestContext::new("alice", "asset-consumer")).unwrap();
    for attribute in [&loose, &anchored] {
        let visible = alice.read_entity(attribute).unwrap();
        assert!(visible.properties.contains_key("name"));
        assert!(!visible.properties.contains_key("secret"));
    }

    let dpo = engine.admit(&RequestContext::new("dpo", "asset-consumer")).unwrap();
    assert_eq!(dpo.read_entity(&anchored), Some(anchored.clone()));
}

#[test]
fn glossaries_and_their_terms_are_redacted() {
    let glossary = Entity::new("G1", "Glossary", "local").with_property("draftNotes", json!("wip"));
    let snapshots = InMemorySnapshots::new().with_entity(glossary.clone());
    let engine = from_config(MEMBER_RULES, snapshots);
    let term = Entity::new("E1", "GlossaryTerm", "local")
        .with_anchor("G1")
        .with_property("displayName", json!("Revenue"))
        .with_property("draftNotes", json!("check with finance"));

    let alice = engine.admit(&RequestContext::new("alice", "glossary-view")).unwrap();
    let seen = alice.read_entity(&glossary).unwrap();
    assert!(!seen.properties.contains_key("draftNotes"));
    let seen = alice.read_entity(&term).unwrap();
    assert!(seen.properties.contains_key("displayName"));
    assert!(!seen.properties.contains_key("draftNotes"));
}

#[test]
fn members_of_hidden_assets_are_absent() {
    let snapshots = InMemorySnapshots::new().with_entity(zoned("A2", "quarantine"));
    let engine = from_config(MEMBER_RULES, snapshots);
    let anchored = column("S2").with_anchor("A2");

    let dpo = engine.admit(&RequestContext::new("dpo", "asset-consumer")).unwrap();
    assert_eq!(dpo.read_entity(&anchored), None);
    assert_eq!(dpo.read_entity_summary(&anchored), None);
}

#[test]
fn service_denial_prevents_admission() {
    let engine = from_config(
        r#"
[principals]
alice = ["reader"]

[services]
asset-owner = { roles = ["steward"] }
"#,
        InMemorySnapshots::new(),
    );

    let err = engine
        .admit(&RequestContext::new("alice", "asset-owner"))
        .err()
        .unwrap();
    assert!(err.is_not_authorized());
}
