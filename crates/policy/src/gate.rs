//! The decision surface, split into independently implementable capability
//! sets.
//!
//! Every method has a default that denies, so a deployment implements only
//! the subsets it cares about and everything else fails closed. [`DenyAll`]
//! is the empty implementation of every set.
//!
//! Reads return the value to hand back to the caller, which an implementation
//! may narrow (strip properties) rather than deny outright.

use crate::{
    Decision, NotAuthorized, Operation, PlatformAction, Principal, ResourceId, ServerAction,
};
use metadata::{
    Connection, ElementRef, Entity, EntityProxy, Guid, InstanceProperties, InstanceStatus,
    NewEntity, Relationship, SchemaType, TypeDef, TypeDefPatch,
};

fn deny<T>(principal: &Principal, operation: Operation, resource: ResourceId) -> Decision<T> {
    Err(NotAuthorized::unsupported(principal, operation, resource))
}

fn proposed(type_def: &TypeDef) -> ResourceId {
    ResourceId::Entity {
        type_name: type_def.name.clone(),
        guid: Guid(String::new()),
    }
}

/// Platform-wide reject-fast filter.
pub trait PlatformGate: Send + Sync {
    fn check_platform(&self, principal: &Principal, action: PlatformAction) -> Decision {
        deny(principal, action.operation(), ResourceId::Platform)
    }
}

/// Per-server reject-fast filter.
pub trait ServerGate: Send + Sync {
    fn check_server(&self, principal: &Principal, server: &str, action: ServerAction) -> Decision {
        deny(principal, action.operation(), ResourceId::Server(server.to_string()))
    }
}

/// Per-service reject-fast filter.
pub trait ServiceGate: Send + Sync {
    fn check_service(&self, principal: &Principal, service: &str) -> Decision {
        deny(
            principal,
            Operation::ServiceAccess,
            ResourceId::Service {
                service: service.to_string(),
                operation: None,
            },
        )
    }

    /// Defaults to the service-wide decision.
    fn check_service_operation(
        &self,
        principal: &Principal,
        service: &str,
        operation: &str,
    ) -> Decision {
        let _ = operation;
        self.check_service(principal, service)
    }
}

/// Governance of the schema itself.
pub trait TypeGate: Send + Sync {
    fn check_type_create(
        &self,
        principal: &Principal,
        collection: &str,
        def: &SchemaType,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::TypeCreate, ResourceId::schema(def))
    }

    fn check_type_read(
        &self,
        principal: &Principal,
        collection: &str,
        def: &SchemaType,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::TypeRead, ResourceId::schema(def))
    }

    fn check_type_update(
        &self,
        principal: &Principal,
        collection: &str,
        def: &SchemaType,
        patch: &TypeDefPatch,
    ) -> Decision {
        let _ = (collection, patch);
        deny(principal, Operation::TypeUpdate, ResourceId::schema(def))
    }

    fn check_type_delete(
        &self,
        principal: &Principal,
        collection: &str,
        def: &SchemaType,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::TypeDelete, ResourceId::schema(def))
    }

    fn check_type_reidentify(
        &self,
        principal: &Principal,
        collection: &str,
        def: &SchemaType,
        new_guid: &Guid,
        new_name: &str,
    ) -> Decision {
        let _ = (collection, new_guid, new_name);
        deny(principal, Operation::TypeReIdentify, ResourceId::schema(def))
    }
}

/// Direct decisions on entities and relationships.
pub trait ElementGate: Send + Sync {
    /// Covers the proposed classifications too; they get no separate check.
    fn check_entity_create(
        &self,
        principal: &Principal,
        collection: &str,
        type_def: &TypeDef,
        proposed_entity: &NewEntity,
    ) -> Decision {
        let _ = (collection, proposed_entity);
        deny(principal, Operation::EntityCreate, proposed(type_def))
    }

    fn check_entity_read(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision<Entity> {
        let _ = collection;
        deny(principal, Operation::EntityRead, ResourceId::entity(entity))
    }

    fn check_entity_summary_read(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::EntitySummaryRead, ResourceId::entity(entity))
    }

    fn check_entity_proxy_read(
        &self,
        principal: &Principal,
        collection: &str,
        proxy: &EntityProxy,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::EntityProxyRead, ResourceId::proxy(proxy))
    }

    fn check_entity_detail_update(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = (collection, properties);
        deny(principal, Operation::EntityDetailUpdate, ResourceId::entity(entity))
    }

    fn check_entity_status_update(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_status: InstanceStatus,
    ) -> Decision {
        let _ = (collection, new_status);
        deny(principal, Operation::EntityStatusUpdate, ResourceId::entity(entity))
    }

    fn check_classification_add(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = (collection, properties);
        deny(
            principal,
            Operation::ClassificationAdd,
            ResourceId::classification(classification, entity),
        )
    }

    fn check_classification_update(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = (collection, properties);
        deny(
            principal,
            Operation::ClassificationUpdate,
            ResourceId::classification(classification, entity),
        )
    }

    fn check_classification_delete(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        classification: &str,
    ) -> Decision {
        let _ = collection;
        deny(
            principal,
            Operation::ClassificationDelete,
            ResourceId::classification(classification, entity),
        )
    }

    fn check_entity_delete(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::EntityDelete, ResourceId::entity(entity))
    }

    fn check_entity_restore(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::EntityRestore, ResourceId::entity(entity))
    }

    fn check_entity_reidentify(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_guid: &Guid,
    ) -> Decision {
        let _ = (collection, new_guid);
        deny(principal, Operation::EntityReIdentify, ResourceId::entity(entity))
    }

    fn check_entity_retype(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_type: &TypeDef,
    ) -> Decision {
        let _ = (collection, new_type);
        deny(principal, Operation::EntityReType, ResourceId::entity(entity))
    }

    fn check_entity_rehome(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_home: &str,
    ) -> Decision {
        let _ = (collection, new_home);
        deny(principal, Operation::EntityReHome, ResourceId::entity(entity))
    }

    /// Either end may be the reason for a denial.
    #[allow(clippy::too_many_arguments)]
    fn check_relationship_create(
        &self,
        principal: &Principal,
        collection: &str,
        type_def: &TypeDef,
        properties: &InstanceProperties,
        status: InstanceStatus,
        end1: &Entity,
        end2: &Entity,
    ) -> Decision {
        let _ = (collection, properties, status, end1, end2);
        deny(
            principal,
            Operation::RelationshipCreate,
            ResourceId::Relationship {
                type_name: type_def.name.clone(),
                guid: Guid(String::new()),
            },
        )
    }

    fn check_relationship_read(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
    ) -> Decision<Relationship> {
        let _ = collection;
        deny(principal, Operation::RelationshipRead, ResourceId::relationship(relationship))
    }

    fn check_relationship_detail_update(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = (collection, properties);
        deny(
            principal,
            Operation::RelationshipDetailUpdate,
            ResourceId::relationship(relationship),
        )
    }

    fn check_relationship_status_update(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_status: InstanceStatus,
    ) -> Decision {
        let _ = (collection, new_status);
        deny(
            principal,
            Operation::RelationshipStatusUpdate,
            ResourceId::relationship(relationship),
        )
    }

    fn check_relationship_delete(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::RelationshipDelete, ResourceId::relationship(relationship))
    }

    fn check_relationship_restore(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
    ) -> Decision {
        let _ = collection;
        deny(principal, Operation::RelationshipRestore, ResourceId::relationship(relationship))
    }

    fn check_relationship_reidentify(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_guid: &Guid,
    ) -> Decision {
        let _ = (collection, new_guid);
        deny(
            principal,
            Operation::RelationshipReIdentify,
            ResourceId::relationship(relationship),
        )
    }

    fn check_relationship_retype(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_type: &TypeDef,
    ) -> Decision {
        let _ = (collection, new_type);
        deny(principal, Operation::RelationshipReType, ResourceId::relationship(relationship))
    }

    fn check_relationship_rehome(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_home: &str,
    ) -> Decision {
        let _ = (collection, new_home);
        deny(principal, Operation::RelationshipReHome, ResourceId::relationship(relationship))
    }

    /// Link `element` to `linked` through a new relationship of the given type.
    fn check_attach(
        &self,
        principal: &Principal,
        element: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let _ = (relationship_type, linked);
        deny(principal, Operation::Attach, ResourceId::entity(element))
    }

    fn check_detach(
        &self,
        principal: &Principal,
        element: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let _ = (relationship_type, linked);
        deny(principal, Operation::Detach, ResourceId::entity(element))
    }

    fn check_add_feedback(
        &self,
        principal: &Principal,
        element: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let _ = feedback;
        deny(principal, Operation::AddFeedback, ResourceId::entity(element))
    }

    fn check_delete_feedback(
        &self,
        principal: &Principal,
        element: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let _ = feedback;
        deny(principal, Operation::DeleteFeedback, ResourceId::entity(element))
    }
}

/// Decisions on anchored members, evaluated against the anchor.
///
/// The anchor is the authorization subject; the member is the target.
pub trait AnchorGate: Send + Sync {
    /// Returns the member as the caller may see it.
    fn check_anchor_member_read(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
    ) -> Decision<Entity> {
        let _ = member;
        deny(principal, Operation::AnchorMemberRead, ResourceId::entity(anchor))
    }

    fn check_anchor_relationship_read(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Relationship,
    ) -> Decision<Relationship> {
        let _ = member;
        deny(principal, Operation::AnchorMemberRead, ResourceId::entity(anchor))
    }

    fn check_anchor_member_update(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: ElementRef<'_>,
    ) -> Decision {
        let _ = member;
        deny(principal, Operation::AnchorMemberUpdate, ResourceId::entity(anchor))
    }

    fn check_anchor_member_status_update(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: ElementRef<'_>,
        new_status: InstanceStatus,
    ) -> Decision {
        let _ = (member, new_status);
        deny(principal, Operation::AnchorMemberStatusUpdate, ResourceId::entity(anchor))
    }

    fn check_anchor_member_attach(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let _ = (member, relationship_type, linked);
        deny(principal, Operation::AnchorMemberAttach, ResourceId::entity(anchor))
    }

    fn check_anchor_member_detach(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let _ = (member, relationship_type, linked);
        deny(principal, Operation::AnchorMemberDetach, ResourceId::entity(anchor))
    }

    fn check_anchor_member_add_feedback(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let _ = (member, feedback);
        deny(principal, Operation::AnchorMemberAddFeedback, ResourceId::entity(anchor))
    }

    fn check_anchor_member_delete_feedback(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let _ = (member, feedback);
        deny(principal, Operation::AnchorMemberDeleteFeedback, ResourceId::entity(anchor))
    }

    fn check_anchor_member_classify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = (member, classification, properties);
        deny(principal, Operation::AnchorMemberClassify, ResourceId::entity(anchor))
    }

    fn check_anchor_member_reclassify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = (member, classification, properties);
        deny(principal, Operation::AnchorMemberReclassify, ResourceId::entity(anchor))
    }

    fn check_anchor_member_declassify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
    ) -> Decision {
        let _ = (member, classification);
        deny(principal, Operation::AnchorMemberDeclassify, ResourceId::entity(anchor))
    }

    fn check_anchor_member_delete(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: ElementRef<'_>,
    ) -> Decision {
        let _ = member;
        deny(principal, Operation::AnchorMemberDelete, ResourceId::entity(anchor))
    }
}

/// Rules for glossaries and, through anchoring, their terms and categories.
pub trait GlossaryGate: Send + Sync {
    fn check_glossary_create(
        &self,
        principal: &Principal,
        type_def: &TypeDef,
        proposed_glossary: &NewEntity,
    ) -> Decision {
        let _ = proposed_glossary;
        deny(principal, Operation::GlossaryCreate, proposed(type_def))
    }

    fn check_glossary_read(&self, principal: &Principal, glossary: &Entity) -> Decision<Entity> {
        deny(principal, Operation::GlossaryRead, ResourceId::entity(glossary))
    }

    /// A term or category read through its glossary. Defaults to the
    /// glossary read with the member handed back unchanged.
    fn check_glossary_member_read(
        &self,
        principal: &Principal,
        glossary: &Entity,
        member: &Entity,
    ) -> Decision<Entity> {
        self.check_glossary_read(principal, glossary)?;
        Ok(member.clone())
    }

    fn check_glossary_relationship_read(
        &self,
        principal: &Principal,
        glossary: &Entity,
        member: &Relationship,
    ) -> Decision<Relationship> {
        self.check_glossary_read(principal, glossary)?;
        Ok(member.clone())
    }

    fn check_glossary_detail_update(
        &self,
        principal: &Principal,
        glossary: &Entity,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = properties;
        deny(principal, Operation::GlossaryDetailUpdate, ResourceId::entity(glossary))
    }

    /// Changes to anchored terms and categories, including term-to-term
    /// relationships across glossaries and valid-value attachment.
    fn check_glossary_member_update(&self, principal: &Principal, glossary: &Entity) -> Decision {
        deny(principal, Operation::GlossaryMemberUpdate, ResourceId::entity(glossary))
    }

    fn check_glossary_member_status_update(
        &self,
        principal: &Principal,
        glossary: &Entity,
        new_status: InstanceStatus,
    ) -> Decision {
        let _ = new_status;
        deny(principal, Operation::GlossaryMemberStatusUpdate, ResourceId::entity(glossary))
    }

    fn check_glossary_feedback_update(&self, principal: &Principal, glossary: &Entity) -> Decision {
        deny(principal, Operation::GlossaryFeedbackUpdate, ResourceId::entity(glossary))
    }

    fn check_glossary_delete(&self, principal: &Principal, glossary: &Entity) -> Decision {
        deny(principal, Operation::GlossaryDelete, ResourceId::entity(glossary))
    }
}

/// Rules for assets and the schema/connection elements attached to them.
pub trait AssetGate: Send + Sync {
    fn check_asset_create(
        &self,
        principal: &Principal,
        type_def: &TypeDef,
        proposed_asset: &NewEntity,
    ) -> Decision {
        let _ = proposed_asset;
        deny(principal, Operation::AssetCreate, proposed(type_def))
    }

    fn check_asset_read(&self, principal: &Principal, asset: &Entity) -> Decision<Entity> {
        deny(principal, Operation::AssetRead, ResourceId::entity(asset))
    }

    /// A schema element or other anchored member read through its asset.
    fn check_asset_member_read(
        &self,
        principal: &Principal,
        asset: &Entity,
        member: &Entity,
    ) -> Decision<Entity> {
        self.check_asset_read(principal, asset)?;
        Ok(member.clone())
    }

    fn check_asset_relationship_read(
        &self,
        principal: &Principal,
        asset: &Entity,
        member: &Relationship,
    ) -> Decision<Relationship> {
        self.check_asset_read(principal, asset)?;
        Ok(member.clone())
    }

    fn check_asset_detail_update(
        &self,
        principal: &Principal,
        asset: &Entity,
        properties: &InstanceProperties,
    ) -> Decision {
        let _ = properties;
        deny(principal, Operation::AssetDetailUpdate, ResourceId::entity(asset))
    }

    fn check_asset_attachment_update(&self, principal: &Principal, asset: &Entity) -> Decision {
        deny(principal, Operation::AssetAttachmentUpdate, ResourceId::entity(asset))
    }

    fn check_asset_feedback(&self, principal: &Principal, asset: &Entity) -> Decision {
        deny(principal, Operation::AssetFeedback, ResourceId::entity(asset))
    }

    fn check_asset_delete(&self, principal: &Principal, asset: &Entity) -> Decision {
        deny(principal, Operation::AssetDelete, ResourceId::entity(asset))
    }
}

/// Decisions on an asset's connections.
pub trait ConnectionGate: Send + Sync {
    fn check_connection_read(
        &self,
        principal: &Principal,
        asset: &Entity,
        connection: &Connection,
    ) -> Decision {
        let _ = asset;
        deny(principal, Operation::ConnectionRead, ResourceId::connection(connection))
    }

    /// Pick at most one of `candidates` for the caller.
    ///
    /// `None` means "behave as if the asset had no connections". The choice
    /// must depend only on the principal, policy state and candidate order.
    fn select_connection(
        &self,
        principal: &Principal,
        asset: &Entity,
        candidates: &[Connection],
    ) -> Option<Connection> {
        let _ = (principal, asset, candidates);
        None
    }
}

/// Admission of reference copies arriving from other cohort members.
///
/// `false` means the copy is silently discarded. These decisions are
/// independent of local authoring rights.
pub trait ReferenceCopyGate: Send + Sync {
    fn check_entity_reference_copy_save(&self, principal: &Principal, entity: &Entity) -> bool {
        let _ = (principal, entity);
        false
    }

    fn check_relationship_reference_copy_save(
        &self,
        principal: &Principal,
        relationship: &Relationship,
    ) -> bool {
        let _ = (principal, relationship);
        false
    }
}

/// A gate that denies everything it is asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl PlatformGate for DenyAll {}
impl ServerGate for DenyAll {}
impl ServiceGate for DenyAll {}
impl TypeGate for DenyAll {}
impl ElementGate for DenyAll {}
impl AnchorGate for DenyAll {}
impl GlossaryGate for DenyAll {}
impl AssetGate for DenyAll {}
impl ConnectionGate for DenyAll {}
impl ReferenceCopyGate for DenyAll {}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    impl ElementGate for ReadOnly {
        fn check_entity_read(
            &self,
            _principal: &Principal,
            _collection: &str,
            entity: &Entity,
        ) -> Decision<Entity> {
            Ok(entity.clone())
        }
    }

    #[test]
    fn unimplemented_methods_deny() {
        let p = Principal::from("alice");
        let entity = Entity::new("E1", "Asset", "local");

        assert!(ReadOnly.check_entity_read(&p, "local", &entity).is_ok());

        let err = ReadOnly.check_entity_delete(&p, "local", &entity).unwrap_err();
        assert_eq!(err.operation, Operation::EntityDelete);
        assert_eq!(err.resource, ResourceId::entity(&entity));
    }

    #[test]
    fn deny_all_rejects_every_set() {
        let p = Principal::from("alice");
        let entity = Entity::new("A1", "DataSet", "remote-7");

        assert!(DenyAll.check_platform(&p, PlatformAction::Access).is_err());
        assert!(DenyAll.check_server(&p, "cocoMDS1", ServerAction::Access).is_err());
        assert!(DenyAll.check_service_operation(&p, "asset-owner", "getAsset").is_err());
        assert!(DenyAll.check_asset_read(&p, &entity).is_err());
        assert!(
            DenyAll
                .select_connection(&p, &entity, &[Connection::new("C1", "c1")])
                .is_none()
        );
        assert!(!DenyAll.check_entity_reference_copy_save(&p, &entity));
    }

    #[test]
    fn gates_are_object_safe() {
        let gates: Vec<Box<dyn ElementGate>> = vec![Box::new(DenyAll), Box::new(ReadOnly)];
        let p = Principal::from("alice");
        let entity = Entity::new("E1", "Asset", "local");

        let permitted = gates
            .iter()
            .filter(|g| g.check_entity_read(&p, "local", &entity).is_ok())
            .count();
        assert_eq!(permitted, 1);
    }
}
