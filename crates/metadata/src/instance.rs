//! Immutable instance snapshots: entities, relationships, classifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Name of the classification that carries an asset's governance zones.
pub const ZONE_MEMBERSHIP_CLASSIFICATION: &str = "AssetZoneMembership";

/// Property of [`ZONE_MEMBERSHIP_CLASSIFICATION`] listing the zone names.
pub const ZONE_MEMBERSHIP_PROPERTY: &str = "zoneMembership";

/// Globally unique identifier of a metadata instance or type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(pub String);

impl Guid {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Unknown,
    Draft,
    Prepared,
    Proposed,
    Approved,
    Rejected,
    #[default]
    Active,
    Deprecated,
    Other,
    Deleted,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Draft => "draft",
            Self::Prepared => "prepared",
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Other => "other",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Property bag of an instance. Ordered so that snapshots compare and
/// serialize deterministically.
pub type InstanceProperties = BTreeMap<String, Value>;

/// Identity and provenance shared by entities and relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceHeader {
    pub guid: Guid,
    pub type_name: String,
    #[serde(default)]
    pub status: InstanceStatus,
    /// Identifier of the metadata collection that homes this instance.
    pub metadata_collection_id: String,
    #[serde(default)]
    pub metadata_collection_name: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl InstanceHeader {
    pub fn new(
        guid: impl Into<Guid>,
        type_name: impl Into<String>,
        metadata_collection_id: impl Into<String>,
    ) -> Self {
        Self {
            guid: guid.into(),
            type_name: type_name.into(),
            status: InstanceStatus::Active,
            metadata_collection_id: metadata_collection_id.into(),
            metadata_collection_name: None,
            created_by: None,
            create_time: Some(Utc::now()),
            update_time: None,
            version: 1,
        }
    }
}

/// A named property bag attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    #[serde(default)]
    pub properties: InstanceProperties,
    /// GUID of the entity this classification is attached to.
    pub entity_guid: Guid,
}

impl Classification {
    pub fn new(name: impl Into<String>, entity_guid: impl Into<Guid>) -> Self {
        Self {
            name: name.into(),
            properties: InstanceProperties::new(),
            entity_guid: entity_guid.into(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// A node of the metadata graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(flatten)]
    pub header: InstanceHeader,
    #[serde(default)]
    pub properties: InstanceProperties,
    #[serde(default)]
    pub classifications: Vec<Classification>,
    /// The element that owns this one for authorization purposes.
    #[serde(default)]
    pub anchor_guid: Option<Guid>,
}

impl Entity {
    pub fn new(
        guid: impl Into<Guid>,
        type_name: impl Into<String>,
        metadata_collection_id: impl Into<String>,
    ) -> Self {
        Self {
            header: InstanceHeader::new(guid, type_name, metadata_collection_id),
            properties: InstanceProperties::new(),
            classifications: Vec::new(),
            anchor_guid: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_classification(
        mut self,
        name: impl Into<String>,
        properties: InstanceProperties,
    ) -> Self {
        self.classifications.push(Classification {
            name: name.into(),
            properties,
            entity_guid: self.header.guid.clone(),
        });
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<Guid>) -> Self {
        self.anchor_guid = Some(anchor.into());
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.header.status = status;
        self
    }

    pub fn guid(&self) -> &Guid {
        &self.header.guid
    }

    pub fn type_name(&self) -> &str {
        &self.header.type_name
    }

    pub fn status(&self) -> InstanceStatus {
        self.header.status
    }

    pub fn home_collection(&self) -> &str {
        &self.header.metadata_collection_id
    }

    pub fn classification(&self, name: &str) -> Option<&Classification> {
        self.classifications.iter().find(|c| c.name == name)
    }

    /// Anchor GUID, ignoring an anchor that points back at the entity itself.
    pub fn foreign_anchor(&self) -> Option<&Guid> {
        self.anchor_guid.as_ref().filter(|a| *a != self.guid())
    }

    /// Governance zones listed by the zone membership classification.
    pub fn zones(&self) -> Vec<String> {
        self.classification(ZONE_MEMBERSHIP_CLASSIFICATION)
            .and_then(|c| c.properties.get(ZONE_MEMBERSHIP_PROPERTY))
            .and_then(Value::as_array)
            .map(|zones| {
                zones
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A proxy naming this entity as a relationship end.
    pub fn proxy(&self) -> EntityProxy {
        EntityProxy {
            guid: self.header.guid.clone(),
            type_name: self.header.type_name.clone(),
            metadata_collection_id: self.header.metadata_collection_id.clone(),
        }
    }
}

/// Identity-only view of an entity at the end of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProxy {
    pub guid: Guid,
    pub type_name: String,
    pub metadata_collection_id: String,
}

/// An edge of the metadata graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(flatten)]
    pub header: InstanceHeader,
    #[serde(default)]
    pub properties: InstanceProperties,
    pub end1: EntityProxy,
    pub end2: EntityProxy,
    #[serde(default)]
    pub anchor_guid: Option<Guid>,
}

impl Relationship {
    pub fn new(
        guid: impl Into<Guid>,
        type_name: impl Into<String>,
        metadata_collection_id: impl Into<String>,
        end1: EntityProxy,
        end2: EntityProxy,
    ) -> Self {
        Self {
            header: InstanceHeader::new(guid, type_name, metadata_collection_id),
            properties: InstanceProperties::new(),
            end1,
            end2,
            anchor_guid: None,
        }
    }

    pub fn with_anchor(mut self, anchor: impl Into<Guid>) -> Self {
        self.anchor_guid = Some(anchor.into());
        self
    }

    pub fn guid(&self) -> &Guid {
        &self.header.guid
    }

    pub fn type_name(&self) -> &str {
        &self.header.type_name
    }

    pub fn status(&self) -> InstanceStatus {
        self.header.status
    }

    pub fn home_collection(&self) -> &str {
        &self.header.metadata_collection_id
    }

    pub fn foreign_anchor(&self) -> Option<&Guid> {
        self.anchor_guid.as_ref().filter(|a| *a != self.guid())
    }
}

/// Properties, classifications and status proposed for a new entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    #[serde(default)]
    pub properties: InstanceProperties,
    #[serde(default)]
    pub classifications: Vec<Classification>,
    #[serde(default)]
    pub status: InstanceStatus,
}

/// Borrowed view of either kind of graph element.
#[derive(Debug, Clone, Copy)]
pub enum ElementRef<'a> {
    Entity(&'a Entity),
    Relationship(&'a Relationship),
}

impl<'a> ElementRef<'a> {
    pub fn guid(&self) -> &'a Guid {
        match self {
            Self::Entity(e) => e.guid(),
            Self::Relationship(r) => r.guid(),
        }
    }

    pub fn type_name(&self) -> &'a str {
        match self {
            Self::Entity(e) => e.type_name(),
            Self::Relationship(r) => r.type_name(),
        }
    }

    pub fn anchor_guid(&self) -> Option<&'a Guid> {
        match self {
            Self::Entity(e) => e.foreign_anchor(),
            Self::Relationship(r) => r.foreign_anchor(),
        }
    }

    pub fn properties(&self) -> &'a InstanceProperties {
        match self {
            Self::Entity(e) => &e.properties,
            Self::Relationship(r) => &r.properties,
        }
    }
}

impl<'a> From<&'a Entity> for ElementRef<'a> {
    fn from(entity: &'a Entity) -> Self {
        Self::Entity(entity)
    }
}

impl<'a> From<&'a Relationship> for ElementRef<'a> {
    fn from(relationship: &'a Relationship) -> Self {
        Self::Relationship(relationship)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn self_anchor_is_not_foreign() {
        let asset = Entity::new("A1", "DataSet", "local").with_anchor("A1");
        assert!(asset.foreign_anchor().is_none());

        let schema = Entity::new("S1", "SchemaType", "local").with_anchor("A1");
        assert_eq!(schema.foreign_anchor(), Some(&Guid::from("A1")));
    }

    #[test]
    fn zones_read_from_membership_classification() {
        let mut props = InstanceProperties::new();
        props.insert(ZONE_MEMBERSHIP_PROPERTY.into(), json!(["quarantine", "data-lake"]));
        let asset = Entity::new("A1", "DataSet", "local")
            .with_classification(ZONE_MEMBERSHIP_CLASSIFICATION, props);

        assert_eq!(asset.zones(), vec!["quarantine", "data-lake"]);
        assert!(Entity::new("A2", "DataSet", "local").zones().is_empty());
    }

    #[test]
    fn entity_deserializes_with_flattened_header() {
        let entity: Entity = serde_json::from_value(json!({
            "guid": "E1",
            "type_name": "GlossaryTerm",
            "metadata_collection_id": "local",
            "anchor_guid": "G1",
            "properties": { "displayName": "Customer" }
        }))
        .unwrap();

        assert_eq!(entity.type_name(), "GlossaryTerm");
        assert_eq!(entity.status(), InstanceStatus::Active);
        assert_eq!(entity.foreign_anchor(), Some(&Guid::from("G1")));
        assert_eq!(entity.properties["displayName"], json!("Customer"));
    }
}
