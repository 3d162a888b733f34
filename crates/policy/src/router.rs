//! Routing of element and anchor decisions to glossary and asset rules.
//!
//! Glossaries own their terms and categories; assets own their schemas,
//! connections and feedback. [`CatalogRouter`] looks at the type of the
//! element (or its anchor) and sends the decision to [`GlossaryGate`] or
//! [`AssetGate`], falling back to the plain element and anchor gates for
//! everything else.
//!
//! An element whose type is both a glossary and an asset must satisfy both
//! gates.

use crate::gate::{AnchorGate, AssetGate, DenyAll, ElementGate, GlossaryGate};
use crate::{Decision, Principal};
use metadata::{
    ElementRef, Entity, EntityProxy, Guid, InstanceProperties, InstanceStatus, NewEntity,
    Relationship, TypeDef, TypeOracle,
};
use std::sync::Arc;

pub const GLOSSARY_TYPE: &str = "Glossary";
pub const ASSET_TYPE: &str = "Asset";
pub const SEMANTIC_ASSIGNMENT: &str = "SemanticAssignment";

/// Types that live inside a glossary.
const GLOSSARY_CONTENT: [&str; 3] = ["Glossary", "GlossaryTerm", "GlossaryCategory"];

#[derive(Debug, Clone, Copy, Default)]
struct Kind {
    glossary: bool,
    asset: bool,
}

impl Kind {
    fn routed(self) -> bool {
        self.glossary || self.asset
    }
}

/// Routes decisions by the catalog kind of the governing element.
pub struct CatalogRouter {
    types: Arc<dyn TypeOracle>,
    elements: Arc<dyn ElementGate>,
    anchors: Arc<dyn AnchorGate>,
    glossaries: Arc<dyn GlossaryGate>,
    assets: Arc<dyn AssetGate>,
}

impl CatalogRouter {
    /// A router whose every target denies until configured.
    pub fn new(types: Arc<dyn TypeOracle>) -> Self {
        Self {
            types,
            elements: Arc::new(DenyAll),
            anchors: Arc::new(DenyAll),
            glossaries: Arc::new(DenyAll),
            assets: Arc::new(DenyAll),
        }
    }

    pub fn elements(mut self, gate: Arc<dyn ElementGate>) -> Self {
        self.elements = gate;
        self
    }

    pub fn anchors(mut self, gate: Arc<dyn AnchorGate>) -> Self {
        self.anchors = gate;
        self
    }

    pub fn glossaries(mut self, gate: Arc<dyn GlossaryGate>) -> Self {
        self.glossaries = gate;
        self
    }

    pub fn assets(mut self, gate: Arc<dyn AssetGate>) -> Self {
        self.assets = gate;
        self
    }

    fn kind(&self, type_name: &str) -> Kind {
        Kind {
            glossary: self.types.is_subtype(type_name, GLOSSARY_TYPE),
            asset: self.types.is_subtype(type_name, ASSET_TYPE),
        }
    }

    fn is_glossary_content(&self, type_name: &str) -> bool {
        GLOSSARY_CONTENT
            .iter()
            .any(|t| self.types.is_subtype(type_name, t))
    }

    /// Run the glossary and/or asset decision for `kind`; both must permit.
    fn both(
        &self,
        kind: Kind,
        glossary: impl FnOnce(&dyn GlossaryGate) -> Decision,
        asset: impl FnOnce(&dyn AssetGate) -> Decision,
    ) -> Decision {
        if kind.glossary {
            glossary(self.glossaries.as_ref())?;
        }
        if kind.asset {
            asset(self.assets.as_ref())?;
        }
        Ok(())
    }

    /// Glossary side of an attach or detach from a glossary member.
    fn glossary_link(
        &self,
        principal: &Principal,
        glossary: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let semantic = self.types.is_subtype(relationship_type, SEMANTIC_ASSIGNMENT);
        if semantic && !self.is_glossary_content(linked.type_name()) {
            // The linked element's own rules gate the assignment.
            self.glossaries.check_glossary_read(principal, glossary).map(|_| ())
        } else {
            self.glossaries.check_glossary_member_update(principal, glossary)
        }
    }
}

impl ElementGate for CatalogRouter {
    fn check_entity_create(
        &self,
        principal: &Principal,
        collection: &str,
        type_def: &TypeDef,
        proposed_entity: &NewEntity,
    ) -> Decision {
        let kind = self.kind(&type_def.name);
        if !kind.routed() {
            return self
                .elements
                .check_entity_create(principal, collection, type_def, proposed_entity);
        }
        self.both(
            kind,
            |g| g.check_glossary_create(principal, type_def, proposed_entity),
            |a| a.check_asset_create(principal, type_def, proposed_entity),
        )
    }

    fn check_entity_read(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision<Entity> {
        let kind = self.kind(entity.type_name());
        if !kind.routed() {
            return self.elements.check_entity_read(principal, collection, entity);
        }
        // Each side narrows what the previous one let through.
        let mut visible = entity.clone();
        if kind.glossary {
            visible = self.glossaries.check_glossary_read(principal, &visible)?;
        }
        if kind.asset {
            visible = self.assets.check_asset_read(principal, &visible)?;
        }
        Ok(visible)
    }

    fn check_entity_summary_read(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision {
        self.elements
            .check_entity_summary_read(principal, collection, entity)
    }

    fn check_entity_proxy_read(
        &self,
        principal: &Principal,
        collection: &str,
        proxy: &EntityProxy,
    ) -> Decision {
        self.elements.check_entity_proxy_read(principal, collection, proxy)
    }

    fn check_entity_detail_update(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        properties: &InstanceProperties,
    ) -> Decision {
        let kind = self.kind(entity.type_name());
        if !kind.routed() {
            return self
                .elements
                .check_entity_detail_update(principal, collection, entity, properties);
        }
        self.both(
            kind,
            |g| g.check_glossary_detail_update(principal, entity, properties),
            |a| a.check_asset_detail_update(principal, entity, properties),
        )
    }

    fn check_entity_status_update(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_status: InstanceStatus,
    ) -> Decision {
        self.elements
            .check_entity_status_update(principal, collection, entity, new_status)
    }

    // Status changes and classifications keep their own decision even on
    // assets and glossaries.

    fn check_classification_add(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        self.elements
            .check_classification_add(principal, collection, entity, classification, properties)
    }

    fn check_classification_update(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        self.elements
            .check_classification_update(principal, collection, entity, classification, properties)
    }

    fn check_classification_delete(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        classification: &str,
    ) -> Decision {
        self.elements
            .check_classification_delete(principal, collection, entity, classification)
    }

    fn check_entity_delete(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision {
        let kind = self.kind(entity.type_name());
        if !kind.routed() {
            return self.elements.check_entity_delete(principal, collection, entity);
        }
        self.both(
            kind,
            |g| g.check_glossary_delete(principal, entity),
            |a| a.check_asset_delete(principal, entity),
        )
    }

    fn check_entity_restore(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
    ) -> Decision {
        self.elements.check_entity_restore(principal, collection, entity)
    }

    fn check_entity_reidentify(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_guid: &Guid,
    ) -> Decision {
        self.elements
            .check_entity_reidentify(principal, collection, entity, new_guid)
    }

    fn check_entity_retype(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_type: &TypeDef,
    ) -> Decision {
        self.elements
            .check_entity_retype(principal, collection, entity, new_type)
    }

    fn check_entity_rehome(
        &self,
        principal: &Principal,
        collection: &str,
        entity: &Entity,
        new_home: &str,
    ) -> Decision {
        self.elements
            .check_entity_rehome(principal, collection, entity, new_home)
    }

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
        self.elements.check_relationship_create(
            principal, collection, type_def, properties, status, end1, end2,
        )
    }

    fn check_relationship_read(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
    ) -> Decision<Relationship> {
        self.elements
            .check_relationship_read(principal, collection, relationship)
    }

    fn check_relationship_detail_update(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        properties: &InstanceProperties,
    ) -> Decision {
        self.elements
            .check_relationship_detail_update(principal, collection, relationship, properties)
    }

    fn check_relationship_status_update(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_status: InstanceStatus,
    ) -> Decision {
        self.elements
            .check_relationship_status_update(principal, collection, relationship, new_status)
    }

    fn check_relationship_delete(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
    ) -> Decision {
        self.elements
            .check_relationship_delete(principal, collection, relationship)
    }

    fn check_relationship_restore(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
    ) -> Decision {
        self.elements
            .check_relationship_restore(principal, collection, relationship)
    }

    fn check_relationship_reidentify(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_guid: &Guid,
    ) -> Decision {
        self.elements
            .check_relationship_reidentify(principal, collection, relationship, new_guid)
    }

    fn check_relationship_retype(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_type: &TypeDef,
    ) -> Decision {
        self.elements
            .check_relationship_retype(principal, collection, relationship, new_type)
    }

    fn check_relationship_rehome(
        &self,
        principal: &Principal,
        collection: &str,
        relationship: &Relationship,
        new_home: &str,
    ) -> Decision {
        self.elements
            .check_relationship_rehome(principal, collection, relationship, new_home)
    }

    fn check_attach(
        &self,
        principal: &Principal,
        element: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let kind = self.kind(element.type_name());
        if !kind.routed() {
            return self
                .elements
                .check_attach(principal, element, relationship_type, linked);
        }
        self.both(
            kind,
            |_| self.glossary_link(principal, element, relationship_type, linked),
            |a| a.check_asset_attachment_update(principal, element),
        )
    }

    fn check_detach(
        &self,
        principal: &Principal,
        element: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let kind = self.kind(element.type_name());
        if !kind.routed() {
            return self
                .elements
                .check_detach(principal, element, relationship_type, linked);
        }
        self.both(
            kind,
            |_| self.glossary_link(principal, element, relationship_type, linked),
            |a| a.check_asset_attachment_update(principal, element),
        )
    }

    fn check_add_feedback(
        &self,
        principal: &Principal,
        element: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let kind = self.kind(element.type_name());
        if !kind.routed() {
            return self.elements.check_add_feedback(principal, element, feedback);
        }
        self.both(
            kind,
            |g| g.check_glossary_feedback_update(principal, element),
            |a| a.check_asset_feedback(principal, element),
        )
    }

    fn check_delete_feedback(
        &self,
        principal: &Principal,
        element: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let kind = self.kind(element.type_name());
        if !kind.routed() {
            return self.elements.check_delete_feedback(principal, element, feedback);
        }
        self.both(
            kind,
            |g| g.check_glossary_feedback_update(principal, element),
            |a| a.check_asset_feedback(principal, element),
        )
    }
}

impl AnchorGate for CatalogRouter {
    fn check_anchor_member_read(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
    ) -> Decision<Entity> {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self.anchors.check_anchor_member_read(principal, anchor, member);
        }
        let mut visible = member.clone();
        if kind.glossary {
            visible = self
                .glossaries
                .check_glossary_member_read(principal, anchor, &visible)?;
        }
        if kind.asset {
            visible = self.assets.check_asset_member_read(principal, anchor, &visible)?;
        }
        Ok(visible)
    }

    fn check_anchor_relationship_read(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Relationship,
    ) -> Decision<Relationship> {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self
                .anchors
                .check_anchor_relationship_read(principal, anchor, member);
        }
        let mut visible = member.clone();
        if kind.glossary {
            visible = self
                .glossaries
                .check_glossary_relationship_read(principal, anchor, &visible)?;
        }
        if kind.asset {
            visible = self
                .assets
                .check_asset_relationship_read(principal, anchor, &visible)?;
        }
        Ok(visible)
    }

    fn check_anchor_member_update(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: ElementRef<'_>,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self.anchors.check_anchor_member_update(principal, anchor, member);
        }
        self.both(
            kind,
            |g| g.check_glossary_member_update(principal, anchor),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }

    fn check_anchor_member_status_update(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: ElementRef<'_>,
        new_status: InstanceStatus,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self
                .anchors
                .check_anchor_member_status_update(principal, anchor, member, new_status);
        }
        self.both(
            kind,
            |g| g.check_glossary_member_status_update(principal, anchor, new_status),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }

    fn check_anchor_member_attach(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self
                .anchors
                .check_anchor_member_attach(principal, anchor, member, relationship_type, linked);
        }
        self.both(
            kind,
            |_| self.glossary_link(principal, anchor, relationship_type, linked),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }

    fn check_anchor_member_detach(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        relationship_type: &str,
        linked: &Entity,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self
                .anchors
                .check_anchor_member_detach(principal, anchor, member, relationship_type, linked);
        }
        self.both(
            kind,
            |_| self.glossary_link(principal, anchor, relationship_type, linked),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }

    fn check_anchor_member_add_feedback(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self
                .anchors
                .check_anchor_member_add_feedback(principal, anchor, member, feedback);
        }
        self.both(
            kind,
            |g| g.check_glossary_feedback_update(principal, anchor),
            |a| a.check_asset_feedback(principal, anchor),
        )
    }

    fn check_anchor_member_delete_feedback(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        feedback: &Entity,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self
                .anchors
                .check_anchor_member_delete_feedback(principal, anchor, member, feedback);
        }
        self.both(
            kind,
            |g| g.check_glossary_feedback_update(principal, anchor),
            |a| a.check_asset_feedback(principal, anchor),
        )
    }

    fn check_anchor_member_classify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self.anchors.check_anchor_member_classify(
                principal,
                anchor,
                member,
                classification,
                properties,
            );
        }
        self.both(
            kind,
            |g| g.check_glossary_member_update(principal, anchor),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }

    fn check_anchor_member_reclassify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
        properties: &InstanceProperties,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self.anchors.check_anchor_member_reclassify(
                principal,
                anchor,
                member,
                classification,
                properties,
            );
        }
        self.both(
            kind,
            |g| g.check_glossary_member_update(principal, anchor),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }

    fn check_anchor_member_declassify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self
                .anchors
                .check_anchor_member_declassify(principal, anchor, member, classification);
        }
        self.both(
            kind,
            |g| g.check_glossary_member_update(principal, anchor),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }

    fn check_anchor_member_delete(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: ElementRef<'_>,
    ) -> Decision {
        let kind = self.kind(anchor.type_name());
        if !kind.routed() {
            return self.anchors.check_anchor_member_delete(principal, anchor, member);
        }
        self.both(
            kind,
            |g| g.check_glossary_member_update(principal, anchor),
            |a| a.check_asset_attachment_update(principal, anchor),
        )
    }
}
