//! The authorization surface of the metadata repository.
//!
//! Core principle: **every create, read, update, classify, delete and
//! replicate action is decided before it happens, and undecided means no.**
//!
//! # Capability sets
//!
//! The decision surface is split into independently implementable traits so a
//! deployment supplies only what it needs. Every unimplemented method denies.
//!
//! | Trait | Decides |
//! |-------|---------|
//! | [`PlatformGate`], [`ServerGate`], [`ServiceGate`] | Cheap reject-fast filters run before any snapshot is fetched |
//! | [`TypeGate`] | Changes to (and visibility of) type definitions |
//! | [`ElementGate`] | Direct entity and relationship operations |
//! | [`AnchorGate`] | Operations on anchored members, judged by their anchor |
//! | [`GlossaryGate`], [`AssetGate`] | Specialized anchor rules, reached through [`CatalogRouter`] |
//! | [`ConnectionGate`] | Connection visibility and selection |
//! | [`ReferenceCopyGate`] | Admission of replicas homed elsewhere |
//!
//! Every decision returns a [`Decision`]: `Ok` to permit (reads may return a
//! narrowed value), `Err(`[`NotAuthorized`]`)` to deny.
//!
//! [`RulePolicy`] implements every set from TOML [`RuleSet`] tables.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use metadata::{Entity, TypeRegistry};
//! use policy::{ElementGate, Principal, RulePolicy, RuleSet};
//!
//! let rules = RuleSet::parse(r#"
//! [principals]
//! alice = ["reader"]
//!
//! [[grant]]
//! roles = ["reader"]
//! operations = ["entity_read"]
//! types = ["Asset"]
//! "#)?;
//! let policy = RulePolicy::new(rules, Arc::new(TypeRegistry::open_metadata()));
//!
//! let dataset = Entity::new("A1", "DataSet", "local");
//! let term = Entity::new("E1", "GlossaryTerm", "local");
//! let alice = Principal::from("alice");
//!
//! assert!(policy.check_entity_read(&alice, "local", &dataset).is_ok());
//! assert!(policy.check_entity_read(&alice, "local", &term).is_err());
//! # Ok::<(), policy::Error>(())
//! ```

mod error;
mod gate;
mod operation;
mod principal;
mod roles;
mod router;
mod rules;

pub use error::{Decision, Error, NotAuthorized, ResourceId, Result};
pub use gate::{
    AnchorGate, AssetGate, ConnectionGate, DenyAll, ElementGate, GlossaryGate, PlatformGate,
    ReferenceCopyGate, ServerGate, ServiceGate, TypeGate,
};
pub use operation::{Operation, PlatformAction, ServerAction};
pub use principal::Principal;
pub use roles::{ANY_ROLE, RoleDirectory};
pub use router::{ASSET_TYPE, CatalogRouter, GLOSSARY_TYPE, SEMANTIC_ASSIGNMENT};
pub use rules::{
    ConnectionRules, PlatformRules, RedactRule, ReferenceCopyRules, Rule, RulePolicy, RuleSet,
    ServerRules, ServiceRules, ZoneRules,
};
