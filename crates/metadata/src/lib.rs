//! Metadata snapshots and the storage boundary consumed by the policy engine.
//!
//! This crate holds the immutable views the decision engine reasons about and
//! the two traits through which it reaches the metadata repository. It owns
//! no storage of its own.
//!
//! # Core Concepts
//!
//! ## Snapshots
//!
//! An [`Entity`] or [`Relationship`] is a typed, immutable copy of one graph
//! element: its [`InstanceHeader`] (GUID, type, status, home collection), its
//! property bag and, for entities, its [`Classification`]s. Either may carry an
//! `anchor_guid` naming the element that owns it for authorization purposes.
//!
//! ## Boundary traits
//!
//! - [`TypeOracle`] answers "is type T a subtype of S".
//! - [`SnapshotProvider`] fetches entities, relationships and an asset's
//!   [`Connection`]s by GUID.
//!
//! [`TypeRegistry`] and [`InMemorySnapshots`] are in-memory implementations of
//! both, used by tests and by embedders without a repository behind them.
//!
//! # Example
//!
//! ```
//! use metadata::{Entity, SnapshotProvider, InMemorySnapshots, TypeOracle, TypeRegistry};
//!
//! let types = TypeRegistry::open_metadata();
//! assert!(types.is_subtype("DataSet", "Asset"));
//!
//! let snapshots = InMemorySnapshots::new()
//!     .with_entity(Entity::new("G1", "Glossary", "local"))
//!     .with_entity(Entity::new("E1", "GlossaryTerm", "local").with_anchor("G1"));
//!
//! let term = snapshots.entity(&"E1".into())?;
//! assert_eq!(term.foreign_anchor().map(|g| g.as_str()), Some("G1"));
//! # Ok::<(), metadata::Error>(())
//! ```

mod connection;
mod error;
mod instance;
mod provider;
mod typedef;

pub use connection::Connection;
pub use error::{Error, Result};
pub use instance::{
    Classification, ElementRef, Entity, EntityProxy, Guid, InstanceHeader, InstanceProperties,
    InstanceStatus, NewEntity, Relationship, ZONE_MEMBERSHIP_CLASSIFICATION,
    ZONE_MEMBERSHIP_PROPERTY,
};
pub use provider::{InMemorySnapshots, SnapshotProvider};
pub use typedef::{
    AttributeTypeDef, AttributeTypeDefCategory, SchemaType, TypeDef, TypeDefCategory,
    TypeDefPatch, TypeOracle, TypeRegistry,
};
