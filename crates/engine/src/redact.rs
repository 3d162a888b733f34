//! Enforcement of read narrowing.
//!
//! Gates may strip properties or classifications from what they return, but
//! never add any or substitute a different instance. Anything a gate returns
//! is cut back to the keys of the original snapshot.

use metadata::{Entity, Relationship};

pub(crate) fn narrow_entity(original: &Entity, mut returned: Entity) -> Option<Entity> {
    if returned.header.guid != original.header.guid
        || returned.header.type_name != original.header.type_name
    {
        tracing::warn!(guid = %original.guid(), "read gate returned a different instance");
        return None;
    }
    returned
        .properties
        .retain(|key, _| original.properties.contains_key(key));
    returned
        .classifications
        .retain(|c| original.classification(&c.name).is_some());
    Some(returned)
}

pub(crate) fn narrow_relationship(
    original: &Relationship,
    mut returned: Relationship,
) -> Option<Relationship> {
    if returned.header.guid != original.header.guid
        || returned.header.type_name != original.header.type_name
        || returned.end1 != original.end1
        || returned.end2 != original.end2
    {
        tracing::warn!(guid = %original.guid(), "read gate returned a different instance");
        return None;
    }
    returned
        .properties
        .retain(|key, _| original.properties.contains_key(key));
    Some(returned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metadata::InstanceProperties;
    use serde_json::json;

    #[test]
    fn added_properties_are_dropped() {
        let original = Entity::new("E1", "DataSet", "local").with_property("name", json!("sales"));
        let inflated = original
            .clone()
            .with_property("injected", json!(true))
            .with_classification("Confidentiality", InstanceProperties::new());

        let narrowed = narrow_entity(&original, inflated).unwrap();
        assert_eq!(narrowed.properties, original.properties);
        assert!(narrowed.classifications.is_empty());
    }

    #[test]
    fn masked_values_survive() {
        let original =
            Entity::new("E1", "DataSet", "local").with_property("owner", json!("finance"));
        let masked = Entity::new("E1", "DataSet", "local").with_property("owner", json!("****"));

        let narrowed = narrow_entity(&original, masked).unwrap();
        assert_eq!(narrowed.properties["owner"], json!("****"));
    }

    #[test]
    fn substituted_instance_is_rejected() {
        let original = Entity::new("E1", "DataSet", "local");
        let other = Entity::new("E2", "DataSet", "local");
        assert!(narrow_entity(&original, other).is_none());

        let a = Entity::new("A", "DataSet", "local");
        let b = Entity::new("B", "DataSet", "local");
        let rel = Relationship::new("R1", "ConnectionToAsset", "local", a.proxy(), b.proxy());
        let mut swapped = rel.clone();
        swapped.end2 = a.proxy();
        assert!(narrow_relationship(&rel, swapped).is_none());
        assert!(narrow_relationship(&rel, rel.clone()).is_some());
    }
}
