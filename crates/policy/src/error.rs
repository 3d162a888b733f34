//! Policy error types.

use crate::{Operation, Principal};
use metadata::{Connection, Entity, EntityProxy, Guid, Relationship, SchemaType};
use thiserror::Error;

/// Identity of the thing a decision was about. Never carries its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceId {
    Platform,
    Server(String),
    Service {
        service: String,
        operation: Option<String>,
    },
    Type {
        name: String,
        guid: Guid,
    },
    Entity {
        type_name: String,
        guid: Guid,
    },
    Relationship {
        type_name: String,
        guid: Guid,
    },
    Classification {
        name: String,
        entity: Guid,
    },
    Connection(Guid),
}

impl ResourceId {
    pub fn entity(entity: &Entity) -> Self {
        Self::Entity {
            type_name: entity.type_name().to_string(),
            guid: entity.guid().clone(),
        }
    }

    pub fn proxy(proxy: &EntityProxy) -> Self {
        Self::Entity {
            type_name: proxy.type_name.clone(),
            guid: proxy.guid.clone(),
        }
    }

    pub fn relationship(relationship: &Relationship) -> Self {
        Self::Relationship {
            type_name: relationship.type_name().to_string(),
            guid: relationship.guid().clone(),
        }
    }

    pub fn element(element: metadata::ElementRef<'_>) -> Self {
        match element {
            metadata::ElementRef::Entity(e) => Self::entity(e),
            metadata::ElementRef::Relationship(r) => Self::relationship(r),
        }
    }

    pub fn schema(def: &SchemaType) -> Self {
        Self::Type {
            name: def.name().to_string(),
            guid: def.guid().clone(),
        }
    }

    pub fn classification(name: &str, entity: &Entity) -> Self {
        Self::Classification {
            name: name.to_string(),
            entity: entity.guid().clone(),
        }
    }

    pub fn connection(connection: &Connection) -> Self {
        Self::Connection(connection.guid.clone())
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Platform => write!(f, "platform"),
            Self::Server(name) => write!(f, "server {name}"),
            Self::Service {
                service,
                operation: Some(op),
            } => write!(f, "service {service}.{op}"),
            Self::Service { service, .. } => write!(f, "service {service}"),
            Self::Type { name, guid } => write!(f, "type {name} ({guid})"),
            Self::Entity { type_name, guid } => write!(f, "entity {type_name} {guid}"),
            Self::Relationship { type_name, guid } => {
                write!(f, "relationship {type_name} {guid}")
            }
            Self::Classification { name, entity } => {
                write!(f, "classification {name} on {entity}")
            }
            Self::Connection(guid) => write!(f, "connection {guid}"),
        }
    }
}

/// The single security outcome: a principal may not perform an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{principal} is not authorized to {operation} on {resource}: {reason}")]
pub struct NotAuthorized {
    pub principal: Principal,
    pub operation: Operation,
    pub resource: ResourceId,
    pub reason: String,
}

impl NotAuthorized {
    pub fn new(
        principal: &Principal,
        operation: Operation,
        resource: ResourceId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.clone(),
            operation,
            resource,
            reason: reason.into(),
        }
    }

    /// Denial issued by a gate the deployment did not supply.
    pub fn unsupported(principal: &Principal, operation: Operation, resource: ResourceId) -> Self {
        Self::new(principal, operation, resource, "no policy configured")
    }
}

/// Result of a decision primitive: `Ok` permits (optionally with a narrowed
/// value), `Err` denies.
pub type Decision<T = ()> = std::result::Result<T, NotAuthorized>;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A decision denied the request.
    #[error(transparent)]
    NotAuthorized(#[from] NotAuthorized),

    /// The caller broke the calling contract (blank principal and the like).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The policy configuration is invalid.
    #[error("invalid policy: {0}")]
    Invalid(String),

    /// Failed to parse a policy file.
    #[error("failed to parse policy: {0}")]
    Parse(String),

    /// An I/O error occurred while reading policy.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
