//! Engine: the per-server entry point for authorization decisions.
//!
//! This crate wires the capability sets of [`policy`] into one
//! [`PolicyEngine`] owned by a metadata server, and enforces the order in
//! which they are consulted.
//!
//! # Overview
//!
//! - **PolicyEngine**: built once per server (from TOML or a builder) and
//!   passed to request handlers. Runs the platform, server and service gates.
//! - **Admission**: returned by [`PolicyEngine::admit`] once the coarse gates
//!   pass. Every instance-level decision is a method on it, so nothing is
//!   decided over before the reject-fast filters run.
//! - **Anchor cascade**: anchored members are judged by their anchor; the
//!   member's own rule is never consulted.
//! - **ReplicaIntake**: admits or silently discards reference copies.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use engine::{Config, PolicyEngine, RequestContext};
//! use metadata::{Entity, InMemorySnapshots, TypeRegistry};
//!
//! let config = Config::parse(r#"
//! [server]
//! name = "cocoMDS1"
//!
//! [principals]
//! alice = ["steward"]
//!
//! [services]
//! "*" = { roles = ["*"] }
//!
//! [[grant]]
//! roles = ["steward"]
//! operations = ["glossary_read"]
//! "#)?;
//!
//! let glossary = Entity::new("G1", "Glossary", "local");
//! let term = Entity::new("E1", "GlossaryTerm", "local").with_anchor("G1");
//! let snapshots = InMemorySnapshots::new().with_entity(glossary);
//!
//! let engine = PolicyEngine::from_config(
//!     config,
//!     Arc::new(TypeRegistry::open_metadata()),
//!     Arc::new(snapshots),
//! )?;
//!
//! let admission = engine.admit(&RequestContext::new("alice", "glossary-manager"))?;
//! assert!(admission.read_entity(&term).is_some());
//! # Ok::<(), engine::Error>(())
//! ```

mod admission;
mod anchor;
mod config;
mod engine;
mod error;
mod redact;
mod replication;

pub use admission::Admission;
pub use anchor::AnchorResolver;
pub use config::{Config, ServerConfig};
pub use engine::{PolicyEngine, PolicyEngineBuilder, RequestContext};
pub use error::{Error, Result};
pub use replication::{
    DiscardReason, Intake, REPLICATION_SERVICE, ReferenceCopyStore, ReplicaIntake,
};
