//! Type definitions and the type hierarchy oracle.

use crate::{Error, Guid, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of instance a [`TypeDef`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDefCategory {
    Entity,
    Relationship,
    Classification,
}

/// Kind of value an [`AttributeTypeDef`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeTypeDefCategory {
    Primitive,
    Collection,
    Enum,
}

/// Definition of an entity, relationship or classification type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub guid: Guid,
    pub name: String,
    pub category: TypeDefCategory,
    #[serde(default)]
    pub super_type: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, category: TypeDefCategory) -> Self {
        let name = name.into();
        Self {
            guid: Guid(format!("typedef:{name}")),
            name,
            category,
            super_type: None,
            version: 1,
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::new(name, TypeDefCategory::Entity)
    }

    pub fn relationship(name: impl Into<String>) -> Self {
        Self::new(name, TypeDefCategory::Relationship)
    }

    pub fn classification(name: impl Into<String>) -> Self {
        Self::new(name, TypeDefCategory::Classification)
    }

    pub fn extends(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }
}

/// Definition of an attribute value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeTypeDef {
    pub guid: Guid,
    pub name: String,
    pub category: AttributeTypeDefCategory,
}

/// Either kind of schema definition governed by type operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaType {
    Type(TypeDef),
    Attribute(AttributeTypeDef),
}

impl SchemaType {
    pub fn name(&self) -> &str {
        match self {
            Self::Type(def) => &def.name,
            Self::Attribute(def) => &def.name,
        }
    }

    pub fn guid(&self) -> &Guid {
        match self {
            Self::Type(def) => &def.guid,
            Self::Attribute(def) => &def.guid,
        }
    }
}

impl From<TypeDef> for SchemaType {
    fn from(def: TypeDef) -> Self {
        Self::Type(def)
    }
}

impl From<AttributeTypeDef> for SchemaType {
    fn from(def: AttributeTypeDef) -> Self {
        Self::Attribute(def)
    }
}

/// A proposed change to an existing type definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefPatch {
    pub type_name: String,
    pub applies_to_version: u64,
    pub update_to_version: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub new_attributes: Vec<String>,
}

/// Answers type hierarchy questions.
///
/// Implementations must be cheap and non-blocking: the oracle is consulted on
/// the hot path of every type-based decision.
pub trait TypeOracle: Send + Sync {
    /// Whether `candidate` is `ancestor` or inherits from it.
    fn is_subtype(&self, candidate: &str, ancestor: &str) -> bool;

    /// Look up a type definition by name.
    fn type_def(&self, name: &str) -> Option<TypeDef>;
}

/// In-memory type hierarchy.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the core open metadata types the policy layer
    /// reasons about (assets, glossaries, feedback, connections, schemas).
    pub fn open_metadata() -> Self {
        let mut registry = Self::new();
        let entities = [
            ("Referenceable", None),
            ("Asset", Some("Referenceable")),
            ("DataSet", Some("Asset")),
            ("DataStore", Some("Asset")),
            ("Database", Some("DataStore")),
            ("DataFile", Some("DataStore")),
            ("Process", Some("Asset")),
            ("Glossary", Some("Referenceable")),
            ("GlossaryTerm", Some("Referenceable")),
            ("GlossaryCategory", Some("Referenceable")),
            ("Connection", Some("Referenceable")),
            ("Endpoint", Some("Referenceable")),
            ("SchemaElement", Some("Referenceable")),
            ("SchemaType", Some("SchemaElement")),
            ("SchemaAttribute", Some("SchemaElement")),
            ("ValidValueDefinition", Some("Referenceable")),
            ("Comment", Some("Referenceable")),
            ("Like", None),
            ("Rating", None),
            ("InformalTag", None),
        ];
        for (name, parent) in entities {
            let def = TypeDef::entity(name);
            registry.insert(match parent {
                Some(parent) => def.extends(parent),
                None => def,
            });
        }
        for name in [
            "SemanticAssignment",
            "TermAnchor",
            "CategoryAnchor",
            "RelatedTerm",
            "ValidValue",
            "ConnectionToAsset",
            "AssetSchemaType",
            "AttachedComment",
            "AttachedLike",
            "AttachedRating",
            "AttachedTag",
        ] {
            registry.insert(TypeDef::relationship(name));
        }
        for name in ["Anchors", "AssetZoneMembership", "Confidentiality", "Ownership"] {
            registry.insert(TypeDef::classification(name));
        }
        registry
    }

    pub fn insert(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn with(mut self, def: TypeDef) -> Self {
        self.insert(def);
        self
    }

    /// Supertype chain of `name`, starting with `name` itself.
    pub fn lineage(&self, name: &str) -> Result<Vec<String>> {
        let mut chain = vec![name.to_string()];
        let mut current = self.types.get(name);
        while let Some(parent) = current.and_then(|def| def.super_type.as_deref()) {
            if chain.iter().any(|seen| seen == parent) {
                return Err(Error::TypeCycle(parent.to_string()));
            }
            chain.push(parent.to_string());
            current = self.types.get(parent);
        }
        Ok(chain)
    }
}

impl TypeOracle for TypeRegistry {
    fn is_subtype(&self, candidate: &str, ancestor: &str) -> bool {
        // A cyclic hierarchy answers "no" rather than looping.
        self.lineage(candidate)
            .map(|chain| chain.iter().any(|name| name == ancestor))
            .unwrap_or(false)
    }

    fn type_def(&self, name: &str) -> Option<TypeDef> {
        self.types.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtypes_follow_the_chain() {
        let types = TypeRegistry::open_metadata();
        assert!(types.is_subtype("Database", "Asset"));
        assert!(types.is_subtype("Database", "Referenceable"));
        assert!(types.is_subtype("Asset", "Asset"));
        assert!(!types.is_subtype("GlossaryTerm", "Asset"));
        assert!(!types.is_subtype("Unknown", "Asset"));
    }

    #[test]
    fn unknown_type_is_only_its_own_subtype() {
        let types = TypeRegistry::new();
        assert!(types.is_subtype("Custom", "Custom"));
        assert!(!types.is_subtype("Custom", "Referenceable"));
    }

    #[test]
    fn cycles_are_detected() {
        let types = TypeRegistry::new()
            .with(TypeDef::entity("A").extends("B"))
            .with(TypeDef::entity("B").extends("A"));

        assert!(matches!(types.lineage("A"), Err(Error::TypeCycle(_))));
        assert!(!types.is_subtype("A", "Referenceable"));
    }
}
