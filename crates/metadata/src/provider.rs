//! Snapshot provider boundary.

use crate::{Connection, Entity, Error, Guid, Relationship, Result};
use std::collections::HashMap;

/// Supplies immutable snapshots for the decision engine.
///
/// The engine never queries storage directly; everything it decides over
/// either arrives from the caller or is fetched through this trait.
pub trait SnapshotProvider: Send + Sync {
    /// Fetch an entity by GUID.
    fn entity(&self, guid: &Guid) -> Result<Entity>;

    /// Fetch a relationship by GUID.
    fn relationship(&self, guid: &Guid) -> Result<Relationship>;

    /// Connections attached to an asset, in a stable order.
    fn connections(&self, asset: &Guid) -> Result<Vec<Connection>>;
}

/// In-memory snapshot provider.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshots {
    entities: HashMap<Guid, Entity>,
    relationships: HashMap<Guid, Relationship>,
    connections: HashMap<Guid, Vec<Connection>>,
}

impl InMemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.guid().clone(), entity);
    }

    pub fn insert_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .insert(relationship.guid().clone(), relationship);
    }

    /// Attach a connection to an asset. Insertion order is preserved.
    pub fn attach_connection(&mut self, asset: impl Into<Guid>, connection: Connection) {
        self.connections
            .entry(asset.into())
            .or_default()
            .push(connection);
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.insert_entity(entity);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.insert_relationship(relationship);
        self
    }

    pub fn with_connection(mut self, asset: impl Into<Guid>, connection: Connection) -> Self {
        self.attach_connection(asset, connection);
        self
    }
}

impl SnapshotProvider for InMemorySnapshots {
    fn entity(&self, guid: &Guid) -> Result<Entity> {
        self.entities
            .get(guid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("entity {guid}")))
    }

    fn relationship(&self, guid: &Guid) -> Result<Relationship> {
        self.relationships
            .get(guid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("relationship {guid}")))
    }

    fn connections(&self, asset: &Guid) -> Result<Vec<Connection>> {
        Ok(self.connections.get(asset).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entity_is_not_found() {
        let snapshots = InMemorySnapshots::new();
        let err = snapshots.entity(&Guid::from("nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn connections_keep_attachment_order() {
        let snapshots = InMemorySnapshots::new()
            .with_connection("A1", Connection::new("C1", "first"))
            .with_connection("A1", Connection::new("C2", "second"));

        let guids: Vec<_> = snapshots
            .connections(&Guid::from("A1"))
            .unwrap()
            .into_iter()
            .map(|c| c.guid.0)
            .collect();
        assert_eq!(guids, ["C1", "C2"]);
        assert!(snapshots.connections(&Guid::from("A2")).unwrap().is_empty());
    }
}
