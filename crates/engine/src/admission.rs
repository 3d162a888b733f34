//! Instance-level dispatch for an admitted request.
//!
//! Every entry point resolves the anchor of its target first. Anchored
//! members are judged through [`AnchorGate`](policy::AnchorGate) with the
//! anchor as subject; the member's own element rule is never consulted.
//! Repository administration (restore, re-identify, re-type, re-home) always
//! goes to the element gate directly.

use crate::anchor::AnchorResolver;
use crate::engine::PolicyEngine;
use crate::redact::{narrow_entity, narrow_relationship};
use crate::{Error, Result};
use metadata::{
    Connection, ElementRef, Entity, EntityProxy, Guid, InstanceHeader, InstanceProperties,
    InstanceStatus, NewEntity, Relationship, SchemaType, TypeDef, TypeDefPatch,
};
use policy::{NotAuthorized, Operation, Principal, ResourceId};

/// Proof that the coarse gates passed for one principal.
///
/// Only [`PolicyEngine::admit`] creates one.
pub struct Admission<'e> {
    engine: &'e PolicyEngine,
    principal: Principal,
}

impl<'e> Admission<'e> {
    pub(crate) fn new(engine: &'e PolicyEngine, principal: Principal) -> Self {
        Self { engine, principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    fn collection(&self) -> &str {
        &self.engine.server.metadata_collection_name
    }

    /// Anchor of `member`, failing closed when it cannot be fetched.
    fn anchor_of(&self, operation: Operation, member: ElementRef<'_>) -> Result<Option<Entity>> {
        AnchorResolver::new(self.engine.snapshots.as_ref())
            .resolve(member)
            .map_err(|e| {
                tracing::warn!(
                    principal = %self.principal,
                    operation = %operation,
                    guid = %member.guid(),
                    error = %e,
                    "anchor unavailable"
                );
                NotAuthorized::new(
                    &self.principal,
                    operation,
                    ResourceId::element(member),
                    "anchor unavailable",
                )
                .into()
            })
    }

    fn require_type_read(&self, type_def: &TypeDef) -> Result<()> {
        let def = SchemaType::from(type_def.clone());
        self.engine
            .types
            .check_type_read(&self.principal, self.collection(), &def)?;
        Ok(())
    }

    fn deny(&self, operation: Operation, resource: ResourceId, reason: &str) -> Error {
        tracing::warn!(
            principal = %self.principal,
            operation = %operation,
            resource = %resource,
            reason,
            "denied"
        );
        NotAuthorized::new(&self.principal, operation, resource, reason).into()
    }

    // Types

    pub fn create_type(&self, def: &SchemaType) -> Result<()> {
        self.engine
            .types
            .check_type_create(&self.principal, self.collection(), def)?;
        Ok(())
    }

    /// The definition if the principal may see it.
    pub fn read_type(&self, def: &SchemaType) -> Option<SchemaType> {
        self.engine
            .types
            .check_type_read(&self.principal, self.collection(), def)
            .ok()
            .map(|()| def.clone())
    }

    pub fn update_type(&self, def: &SchemaType, patch: &TypeDefPatch) -> Result<()> {
        if patch.type_name != def.name() {
            return Err(Error::InvalidRequest(format!(
                "patch for {} applied to {}",
                patch.type_name,
                def.name()
            )));
        }
        self.engine
            .types
            .check_type_update(&self.principal, self.collection(), def, patch)?;
        Ok(())
    }

    pub fn delete_type(&self, def: &SchemaType) -> Result<()> {
        self.engine
            .types
            .check_type_delete(&self.principal, self.collection(), def)?;
        Ok(())
    }

    pub fn reidentify_type(&self, def: &SchemaType, new_guid: &Guid, new_name: &str) -> Result<()> {
        if new_name.trim().is_empty() {
            return Err(Error::InvalidRequest("new type name must not be blank".into()));
        }
        self.engine
            .types
            .check_type_reidentify(&self.principal, self.collection(), def, new_guid, new_name)?;
        Ok(())
    }

    // Entities

    /// One decision covers the entity and its initial classifications.
    pub fn create_entity(&self, type_def: &TypeDef, proposed: &NewEntity) -> Result<()> {
        self.require_type_read(type_def)?;
        self.engine
            .elements
            .check_entity_create(&self.principal, self.collection(), type_def, proposed)?;
        Ok(())
    }

    /// The entity as the principal may see it. Denial and absence look the
    /// same.
    pub fn read_entity(&self, entity: &Entity) -> Option<Entity> {
        let returned = match self.anchor_of(Operation::AnchorMemberRead, entity.into()).ok()? {
            Some(anchor) => self
                .engine
                .anchors
                .check_anchor_member_read(&self.principal, &anchor, entity),
            None => self
                .engine
                .elements
                .check_entity_read(&self.principal, self.collection(), entity),
        };
        narrow_entity(entity, returned.ok()?)
    }

    /// Header-only read; permits or hides, never redacts.
    pub fn read_entity_summary(&self, entity: &Entity) -> Option<InstanceHeader> {
        let permitted = match self.anchor_of(Operation::AnchorMemberRead, entity.into()).ok()? {
            Some(anchor) => self
                .engine
                .anchors
                .check_anchor_member_read(&self.principal, &anchor, entity)
                .map(|_| ()),
            None => self
                .engine
                .elements
                .check_entity_summary_read(&self.principal, self.collection(), entity),
        };
        permitted.ok().map(|()| entity.header.clone())
    }

    pub fn read_entity_proxy(&self, proxy: &EntityProxy) -> Option<EntityProxy> {
        self.engine
            .elements
            .check_entity_proxy_read(&self.principal, self.collection(), proxy)
            .ok()
            .map(|()| proxy.clone())
    }

    pub fn update_entity(&self, entity: &Entity, properties: &InstanceProperties) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberUpdate, entity.into())? {
            Some(anchor) => {
                self.engine
                    .anchors
                    .check_anchor_member_update(&self.principal, &anchor, entity.into())?
            }
            None => self.engine.elements.check_entity_detail_update(
                &self.principal,
                self.collection(),
                entity,
                properties,
            )?,
        }
        Ok(())
    }

    pub fn update_entity_status(&self, entity: &Entity, new_status: InstanceStatus) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberStatusUpdate, entity.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_status_update(
                &self.principal,
                &anchor,
                entity.into(),
                new_status,
            )?,
            None => self.engine.elements.check_entity_status_update(
                &self.principal,
                self.collection(),
                entity,
                new_status,
            )?,
        }
        Ok(())
    }

    fn require_classification_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidRequest("classification name must not be blank".into()));
        }
        Ok(())
    }

    /// Adding a classification the entity already carries is denied.
    pub fn classify_entity(
        &self,
        entity: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Result<()> {
        Self::require_classification_name(classification)?;
        if entity.classification(classification).is_some() {
            return Err(self.deny(
                Operation::ClassificationAdd,
                ResourceId::classification(classification, entity),
                "classification already present",
            ));
        }
        match self.anchor_of(Operation::AnchorMemberClassify, entity.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_classify(
                &self.principal,
                &anchor,
                entity,
                classification,
                properties,
            )?,
            None => self.engine.elements.check_classification_add(
                &self.principal,
                self.collection(),
                entity,
                classification,
                properties,
            )?,
        }
        Ok(())
    }

    pub fn reclassify_entity(
        &self,
        entity: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Result<()> {
        Self::require_classification_name(classification)?;
        if entity.classification(classification).is_none() {
            return Err(self.deny(
                Operation::ClassificationUpdate,
                ResourceId::classification(classification, entity),
                "classification not present",
            ));
        }
        match self.anchor_of(Operation::AnchorMemberReclassify, entity.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_reclassify(
                &self.principal,
                &anchor,
                entity,
                classification,
                properties,
            )?,
            None => self.engine.elements.check_classification_update(
                &self.principal,
                self.collection(),
                entity,
                classification,
                properties,
            )?,
        }
        Ok(())
    }

    pub fn declassify_entity(&self, entity: &Entity, classification: &str) -> Result<()> {
        Self::require_classification_name(classification)?;
        if entity.classification(classification).is_none() {
            return Err(self.deny(
                Operation::ClassificationDelete,
                ResourceId::classification(classification, entity),
                "classification not present",
            ));
        }
        match self.anchor_of(Operation::AnchorMemberDeclassify, entity.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_declassify(
                &self.principal,
                &anchor,
                entity,
                classification,
            )?,
            None => self.engine.elements.check_classification_delete(
                &self.principal,
                self.collection(),
                entity,
                classification,
            )?,
        }
        Ok(())
    }

    pub fn delete_entity(&self, entity: &Entity) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberDelete, entity.into())? {
            Some(anchor) => {
                self.engine
                    .anchors
                    .check_anchor_member_delete(&self.principal, &anchor, entity.into())?
            }
            None => self
                .engine
                .elements
                .check_entity_delete(&self.principal, self.collection(), entity)?,
        }
        Ok(())
    }

    pub fn restore_entity(&self, entity: &Entity) -> Result<()> {
        self.engine
            .elements
            .check_entity_restore(&self.principal, self.collection(), entity)?;
        Ok(())
    }

    pub fn reidentify_entity(&self, entity: &Entity, new_guid: &Guid) -> Result<()> {
        if new_guid.as_str().trim().is_empty() {
            return Err(Error::InvalidRequest("new guid must not be blank".into()));
        }
        self.engine
            .elements
            .check_entity_reidentify(&self.principal, self.collection(), entity, new_guid)?;
        Ok(())
    }

    pub fn retype_entity(&self, entity: &Entity, new_type: &TypeDef) -> Result<()> {
        self.require_type_read(new_type)?;
        self.engine
            .elements
            .check_entity_retype(&self.principal, self.collection(), entity, new_type)?;
        Ok(())
    }

    pub fn rehome_entity(&self, entity: &Entity, new_home: &str) -> Result<()> {
        if new_home.trim().is_empty() {
            return Err(Error::InvalidRequest("new home collection must not be blank".into()));
        }
        self.engine
            .elements
            .check_entity_rehome(&self.principal, self.collection(), entity, new_home)?;
        Ok(())
    }

    // Links and feedback

    fn link_side(
        &self,
        attach: bool,
        member: &Entity,
        relationship_type: &str,
        other: &Entity,
    ) -> Result<()> {
        let operation = if attach {
            Operation::AnchorMemberAttach
        } else {
            Operation::AnchorMemberDetach
        };
        let anchors = &self.engine.anchors;
        let elements = &self.engine.elements;
        let p = &self.principal;
        match (self.anchor_of(operation, member.into())?, attach) {
            (Some(anchor), true) => {
                anchors.check_anchor_member_attach(p, &anchor, member, relationship_type, other)?
            }
            (Some(anchor), false) => {
                anchors.check_anchor_member_detach(p, &anchor, member, relationship_type, other)?
            }
            (None, true) => elements.check_attach(p, member, relationship_type, other)?,
            (None, false) => elements.check_detach(p, member, relationship_type, other)?,
        }
        Ok(())
    }

    /// Link `start` to `linked`. Both sides are judged, starting side first.
    pub fn attach(&self, start: &Entity, relationship_type: &str, linked: &Entity) -> Result<()> {
        self.link_side(true, start, relationship_type, linked)?;
        self.link_side(true, linked, relationship_type, start)
    }

    pub fn detach(&self, start: &Entity, relationship_type: &str, linked: &Entity) -> Result<()> {
        self.link_side(false, start, relationship_type, linked)?;
        self.link_side(false, linked, relationship_type, start)
    }

    pub fn add_feedback(&self, element: &Entity, feedback: &Entity) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberAddFeedback, element.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_add_feedback(
                &self.principal,
                &anchor,
                element,
                feedback,
            )?,
            None => self
                .engine
                .elements
                .check_add_feedback(&self.principal, element, feedback)?,
        }
        Ok(())
    }

    pub fn remove_feedback(&self, element: &Entity, feedback: &Entity) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberDeleteFeedback, element.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_delete_feedback(
                &self.principal,
                &anchor,
                element,
                feedback,
            )?,
            None => self
                .engine
                .elements
                .check_delete_feedback(&self.principal, element, feedback)?,
        }
        Ok(())
    }

    // Relationships

    /// Either end may be the reason for a denial.
    pub fn create_relationship(
        &self,
        type_def: &TypeDef,
        properties: &InstanceProperties,
        status: InstanceStatus,
        end1: &Entity,
        end2: &Entity,
    ) -> Result<()> {
        self.require_type_read(type_def)?;
        self.engine.elements.check_relationship_create(
            &self.principal,
            self.collection(),
            type_def,
            properties,
            status,
            end1,
            end2,
        )?;
        Ok(())
    }

    pub fn read_relationship(&self, relationship: &Relationship) -> Option<Relationship> {
        let anchor = self
            .anchor_of(Operation::AnchorMemberRead, relationship.into())
            .ok()?;
        let returned = match anchor {
            Some(anchor) => self
                .engine
                .anchors
                .check_anchor_relationship_read(&self.principal, &anchor, relationship),
            None => self
                .engine
                .elements
                .check_relationship_read(&self.principal, self.collection(), relationship),
        };
        narrow_relationship(relationship, returned.ok()?)
    }

    pub fn update_relationship(
        &self,
        relationship: &Relationship,
        properties: &InstanceProperties,
    ) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberUpdate, relationship.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_update(
                &self.principal,
                &anchor,
                relationship.into(),
            )?,
            None => self.engine.elements.check_relationship_detail_update(
                &self.principal,
                self.collection(),
                relationship,
                properties,
            )?,
        }
        Ok(())
    }

    pub fn update_relationship_status(
        &self,
        relationship: &Relationship,
        new_status: InstanceStatus,
    ) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberStatusUpdate, relationship.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_status_update(
                &self.principal,
                &anchor,
                relationship.into(),
                new_status,
            )?,
            None => self.engine.elements.check_relationship_status_update(
                &self.principal,
                self.collection(),
                relationship,
                new_status,
            )?,
        }
        Ok(())
    }

    pub fn delete_relationship(&self, relationship: &Relationship) -> Result<()> {
        match self.anchor_of(Operation::AnchorMemberDelete, relationship.into())? {
            Some(anchor) => self.engine.anchors.check_anchor_member_delete(
                &self.principal,
                &anchor,
                relationship.into(),
            )?,
            None => self
                .engine
                .elements
                .check_relationship_delete(&self.principal, self.collection(), relationship)?,
        }
        Ok(())
    }

    pub fn restore_relationship(&self, relationship: &Relationship) -> Result<()> {
        self.engine
            .elements
            .check_relationship_restore(&self.principal, self.collection(), relationship)?;
        Ok(())
    }

    pub fn reidentify_relationship(
        &self,
        relationship: &Relationship,
        new_guid: &Guid,
    ) -> Result<()> {
        if new_guid.as_str().trim().is_empty() {
            return Err(Error::InvalidRequest("new guid must not be blank".into()));
        }
        self.engine.elements.check_relationship_reidentify(
            &self.principal,
            self.collection(),
            relationship,
            new_guid,
        )?;
        Ok(())
    }

    pub fn retype_relationship(
        &self,
        relationship: &Relationship,
        new_type: &TypeDef,
    ) -> Result<()> {
        self.require_type_read(new_type)?;
        self.engine.elements.check_relationship_retype(
            &self.principal,
            self.collection(),
            relationship,
            new_type,
        )?;
        Ok(())
    }

    pub fn rehome_relationship(&self, relationship: &Relationship, new_home: &str) -> Result<()> {
        if new_home.trim().is_empty() {
            return Err(Error::InvalidRequest("new home collection must not be blank".into()));
        }
        self.engine.elements.check_relationship_rehome(
            &self.principal,
            self.collection(),
            relationship,
            new_home,
        )?;
        Ok(())
    }

    // Connections

    /// A single connection of `asset`. The asset must be readable first.
    pub fn check_connection(&self, asset: &Entity, connection: &Connection) -> Result<()> {
        if self.read_entity(asset).is_none() {
            return Err(self.deny(
                Operation::ConnectionRead,
                ResourceId::connection(connection),
                "asset not visible",
            ));
        }
        self.engine
            .connections
            .check_connection_read(&self.principal, asset, connection)?;
        Ok(())
    }

    /// At most one of `candidates`; `None` when the asset is hidden or no
    /// candidate suits the principal.
    pub fn select_connection(
        &self,
        asset: &Entity,
        candidates: &[Connection],
    ) -> Option<Connection> {
        self.read_entity(asset)?;
        let chosen = self
            .engine
            .connections
            .select_connection(&self.principal, asset, candidates)?;
        if !candidates.contains(&chosen) {
            tracing::warn!(
                principal = %self.principal,
                connection = %chosen.guid,
                "selected connection is not a candidate"
            );
            return None;
        }
        Some(chosen)
    }

    /// Fetch the asset's connections and select among them.
    pub fn connection_for_asset(&self, asset: &Entity) -> Result<Option<Connection>> {
        if self.read_entity(asset).is_none() {
            return Ok(None);
        }
        let candidates = self.engine.snapshots.connections(asset.guid())?;
        Ok(self.select_connection(asset, &candidates))
    }

    // Reference copies

    fn is_local(&self, home: &str) -> bool {
        home == self.engine.server.metadata_collection_id
    }

    /// Whether a copy of a remotely homed entity may be cached here.
    /// Locally homed instances are never reference copies.
    pub fn save_entity_reference_copy(&self, entity: &Entity) -> bool {
        !self.is_local(entity.home_collection())
            && self
                .engine
                .reference_copies
                .check_entity_reference_copy_save(&self.principal, entity)
    }

    pub fn save_relationship_reference_copy(&self, relationship: &Relationship) -> bool {
        !self.is_local(relationship.home_collection())
            && self
                .engine
                .reference_copies
                .check_relationship_reference_copy_save(&self.principal, relationship)
    }
}
