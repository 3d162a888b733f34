//! Intake of reference copies from other cohort members.
//!
//! A copy is saved only when every gate agrees. Anything else is dropped
//! quietly: a rejected replica is a routine outcome, and the sending member
//! never hears about it.

use crate::engine::{PolicyEngine, RequestContext};
use crate::{Error, Result};
use metadata::{Entity, Relationship};
use policy::Principal;

/// Service name the intake is admitted under.
pub const REPLICATION_SERVICE: &str = "repository-services";

/// Local cache of reference copies.
pub trait ReferenceCopyStore {
    fn save_entity(&mut self, entity: Entity) -> metadata::Result<()>;

    fn save_relationship(&mut self, relationship: Relationship) -> metadata::Result<()>;
}

/// Why a copy was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Homed in the local collection, so it is not a reference copy.
    LocallyHomed,
    /// The admission decision said no.
    NotAdmitted,
    /// A coarse gate refused the server's own user.
    NotAuthorized,
}

/// Outcome of offering one copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    Saved,
    Discarded(DiscardReason),
}

pub struct ReplicaIntake<'e> {
    engine: &'e PolicyEngine,
    principal: Principal,
}

impl<'e> ReplicaIntake<'e> {
    pub(crate) fn new(engine: &'e PolicyEngine, principal: Principal) -> Self {
        Self { engine, principal }
    }

    fn discard(&self, guid: &metadata::Guid, home: &str, reason: DiscardReason) -> Result<Intake> {
        tracing::info!(
            principal = %self.principal,
            %guid,
            home,
            ?reason,
            "reference copy discarded"
        );
        Ok(Intake::Discarded(reason))
    }

    /// Run the coarse gates; a denial becomes a discard, contract violations
    /// propagate.
    fn admitted<T>(&self, run: impl FnOnce(&crate::Admission<'_>) -> T) -> Result<Option<T>> {
        let ctx = RequestContext::new(self.principal.clone(), REPLICATION_SERVICE);
        match self.engine.admit(&ctx) {
            Ok(admission) => Ok(Some(run(&admission))),
            Err(e) if e.is_not_authorized() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn is_local(&self, home: &str) -> bool {
        home == self.engine.server.metadata_collection_id
    }

    pub fn receive_entity<S>(&self, entity: Entity, store: &mut S) -> Result<Intake>
    where
        S: ReferenceCopyStore + ?Sized,
    {
        let home = entity.home_collection().to_string();
        if self.is_local(&home) {
            return self.discard(entity.guid(), &home, DiscardReason::LocallyHomed);
        }
        match self.admitted(|a| a.save_entity_reference_copy(&entity))? {
            None => self.discard(entity.guid(), &home, DiscardReason::NotAuthorized),
            Some(false) => self.discard(entity.guid(), &home, DiscardReason::NotAdmitted),
            Some(true) => {
                store.save_entity(entity).map_err(Error::from)?;
                Ok(Intake::Saved)
            }
        }
    }

    pub fn receive_relationship<S>(
        &self,
        relationship: Relationship,
        store: &mut S,
    ) -> Result<Intake>
    where
        S: ReferenceCopyStore + ?Sized,
    {
        let home = relationship.home_collection().to_string();
        if self.is_local(&home) {
            return self.discard(relationship.guid(), &home, DiscardReason::LocallyHomed);
        }
        match self.admitted(|a| a.save_relationship_reference_copy(&relationship))? {
            None => self.discard(relationship.guid(), &home, DiscardReason::NotAuthorized),
            Some(false) => self.discard(relationship.guid(), &home, DiscardReason::NotAdmitted),
            Some(true) => {
                store.save_relationship(relationship).map_err(Error::from)?;
                Ok(Intake::Saved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use metadata::InMemorySnapshots;
    use policy::{
        PlatformAction, PlatformGate, ReferenceCopyGate, ServerAction, ServerGate, ServiceGate,
    };
    use std::sync::Arc;

    #[derive(Default)]
    struct Cache {
        entities: Vec<Entity>,
        relationships: Vec<Relationship>,
    }

    impl ReferenceCopyStore for Cache {
        fn save_entity(&mut self, entity: Entity) -> metadata::Result<()> {
            self.entities.push(entity);
            Ok(())
        }

        fn save_relationship(&mut self, relationship: Relationship) -> metadata::Result<()> {
            self.relationships.push(relationship);
            Ok(())
        }
    }

    struct Open;

    impl PlatformGate for Open {
        fn check_platform(&self, _: &Principal, _: PlatformAction) -> policy::Decision {
            Ok(())
        }
    }

    impl ServerGate for Open {
        fn check_server(&self, _: &Principal, _: &str, _: ServerAction) -> policy::Decision {
            Ok(())
        }
    }

    impl ServiceGate for Open {
        fn check_service(&self, _: &Principal, _: &str) -> policy::Decision {
            Ok(())
        }
    }

    /// Accepts everything from remote-7.
    struct FromRemote7;

    impl ReferenceCopyGate for FromRemote7 {
        fn check_entity_reference_copy_save(&self, _: &Principal, entity: &Entity) -> bool {
            entity.home_collection() == "remote-7"
        }

        fn check_relationship_reference_copy_save(&self, _: &Principal, r: &Relationship) -> bool {
            r.home_collection() == "remote-7"
        }
    }

    fn engine(open: bool) -> PolicyEngine {
        let snapshots = Arc::new(InMemorySnapshots::new());
        let builder = PolicyEngine::builder(ServerConfig::default(), snapshots)
            .reference_copies(Arc::new(FromRemote7));
        if open {
            builder
                .platform(Arc::new(Open))
                .servers(Arc::new(Open))
                .services(Arc::new(Open))
                .build()
        } else {
            builder.build()
        }
    }

    #[test]
    fn admitted_copies_are_saved() {
        let engine = engine(true);
        let mut cache = Cache::default();
        let copy = Entity::new("E3", "GlossaryTerm", "remote-7");

        let outcome = engine.replica_intake().receive_entity(copy.clone(), &mut cache).unwrap();
        assert_eq!(outcome, Intake::Saved);
        assert_eq!(cache.entities, vec![copy]);
    }

    #[test]
    fn rejected_copies_never_reach_the_store() {
        let engine = engine(true);
        let mut cache = Cache::default();
        let intake = engine.replica_intake();

        let foreign = Entity::new("E2", "GlossaryTerm", "remote-8");
        let local = Entity::new("E4", "GlossaryTerm", "local");
        assert_eq!(
            intake.receive_entity(foreign, &mut cache).unwrap(),
            Intake::Discarded(DiscardReason::NotAdmitted)
        );
        assert_eq!(
            intake.receive_entity(local, &mut cache).unwrap(),
            Intake::Discarded(DiscardReason::LocallyHomed)
        );
        assert!(cache.entities.is_empty());
    }

    #[test]
    fn coarse_denial_is_a_discard() {
        let engine = engine(false);
        let mut cache = Cache::default();
        let a = Entity::new("A1", "DataSet", "remote-7");
        let b = Entity::new("A2", "DataSet", "remote-7");
        let link = Relationship::new("R1", "ConnectionToAsset", "remote-7", a.proxy(), b.proxy());

        assert_eq!(
            engine.replica_intake().receive_relationship(link, &mut cache).unwrap(),
            Intake::Discarded(DiscardReason::NotAuthorized)
        );
        assert!(cache.relationships.is_empty());
    }

    #[test]
    fn blank_server_user_is_surfaced() {
        let server = ServerConfig {
            user_id: String::new(),
            ..ServerConfig::default()
        };
        let engine = PolicyEngine::builder(server, Arc::new(InMemorySnapshots::new())).build();
        let mut cache = Cache::default();

        let err = engine
            .replica_intake()
            .receive_entity(Entity::new("E2", "GlossaryTerm", "remote-7"), &mut cache)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
