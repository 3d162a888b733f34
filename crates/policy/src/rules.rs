//! Rule-table policy configuration and enforcement.

use crate::gate::{
    AnchorGate, AssetGate, ConnectionGate, ElementGate, GlossaryGate, PlatformGate,
    ReferenceCopyGate, ServerGate, ServiceGate, TypeGate,
};
use crate::roles::{ANY_ROLE, RoleDirectory};
use crate::{
    Decision, Error, NotAuthorized, Operation, PlatformAction, Principal, ResourceId, Result,
    ServerAction,
};
use metadata::{
    Connection, ElementRef, Entity, EntityProxy, Guid, InstanceProperties, InstanceStatus,
    NewEntity, Relationship, SchemaType, TypeDef, TypeDefPatch, TypeOracle,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Rule tables loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Roles held by each principal.
    #[serde(default)]
    pub principals: HashMap<String, Vec<String>>,

    /// Operations granted to roles.
    #[serde(default)]
    pub grant: Vec<Rule>,

    /// Operations denied to roles (overrides grants).
    #[serde(default)]
    pub deny: Vec<Rule>,

    #[serde(default)]
    pub platform: PlatformRules,

    #[serde(default)]
    pub servers: ServerRules,

    /// Roles allowed per service name; `*` is the fallback entry.
    #[serde(default)]
    pub services: HashMap<String, ServiceRules>,

    #[serde(default)]
    pub connections: ConnectionRules,

    #[serde(default)]
    pub reference_copies: ReferenceCopyRules,

    #[serde(default)]
    pub zones: ZoneRules,

    /// Properties stripped from read results.
    #[serde(default)]
    pub redact: Vec<RedactRule>,
}

/// A grant or deny rule: roles × operations × types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    pub roles: Vec<String>,

    /// Operation names, `*`, or prefixes ending in `*`.
    pub operations: Vec<String>,

    /// Type names, matched with their subtypes. Empty matches any type.
    #[serde(default)]
    pub types: Vec<String>,
}

/// Roles allowed per platform action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRules {
    #[serde(default = "everyone")]
    pub access: Vec<String>,
    #[serde(default)]
    pub create_server: Vec<String>,
    #[serde(default)]
    pub operate: Vec<String>,
    #[serde(default)]
    pub investigate: Vec<String>,
}

impl Default for PlatformRules {
    fn default() -> Self {
        Self {
            access: everyone(),
            create_server: Vec::new(),
            operate: Vec::new(),
            investigate: Vec::new(),
        }
    }
}

/// Roles allowed per server action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRules {
    #[serde(default = "everyone")]
    pub access: Vec<String>,
    #[serde(default)]
    pub administer: Vec<String>,
    #[serde(default)]
    pub operate: Vec<String>,
    #[serde(default)]
    pub investigate: Vec<String>,
}

impl Default for ServerRules {
    fn default() -> Self {
        Self {
            access: everyone(),
            administer: Vec::new(),
            operate: Vec::new(),
            investigate: Vec::new(),
        }
    }
}

/// Roles allowed to call a service, with optional per-operation overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceRules {
    pub roles: Vec<String>,
    #[serde(default)]
    pub operations: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionRules {
    /// Roles cleared to receive connections that embed credentials.
    #[serde(default)]
    pub credential_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCopyRules {
    /// Principals (by role) whose replicas may be saved.
    #[serde(default = "everyone")]
    pub roles: Vec<String>,
    /// Home collections accepted. Empty accepts any remote collection.
    #[serde(default)]
    pub accept_collections: Vec<String>,
    /// Types accepted, with subtypes. Empty accepts any type.
    #[serde(default)]
    pub accept_types: Vec<String>,
    /// Types never accepted, with subtypes.
    #[serde(default)]
    pub deny_types: Vec<String>,
}

impl Default for ReferenceCopyRules {
    fn default() -> Self {
        Self {
            roles: everyone(),
            accept_collections: Vec::new(),
            accept_types: Vec::new(),
            deny_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneRules {
    /// Zones whose assets are visible through this server. Empty disables
    /// zone filtering.
    #[serde(default)]
    pub supported: Vec<String>,
}

/// Properties of a type hidden from everyone but the exempt roles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactRule {
    pub types: Vec<String>,
    pub properties: Vec<String>,
    #[serde(default)]
    pub exempt_roles: Vec<String>,
}

fn everyone() -> Vec<String> {
    vec![ANY_ROLE.to_string()]
}

impl RuleSet {
    /// Load rules from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse rules from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let rules: Self = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Reject operation patterns that name no operation.
    pub fn validate(&self) -> Result<()> {
        for rule in self.grant.iter().chain(&self.deny) {
            for pattern in &rule.operations {
                if !Operation::ALL.iter().any(|op| op.matches(pattern)) {
                    return Err(Error::Invalid(format!("unknown operation '{pattern}'")));
                }
            }
        }
        Ok(())
    }

    /// Rules that let everyone through the coarse gates and nothing further.
    pub fn restrictive() -> Self {
        Self::default()
    }
}

/// A policy driven by [`RuleSet`] tables.
///
/// Implements every gate. Type conditions are matched through the
/// [`TypeOracle`], so a rule on `Asset` also covers `DataSet`.
pub struct RulePolicy {
    rules: RuleSet,
    roles: RoleDirectory,
    types: Arc<dyn TypeOracle>,
}

impl RulePolicy {
    pub fn new(rules: RuleSet, types: Arc<dyn TypeOracle>) -> Self {
        let roles = RoleDirectory::new(rules.principals.clone());
        Self {
            rules,
            roles,
            types,
        }
    }

    /// The role cache, for refreshing assignments at runtime.
    pub fn roles(&self) -> &RoleDirectory {
        &self.roles
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn type_matches(&self, type_name: Option<&str>, patterns: &[String]) -> bool {
        if patterns.is_empty() {
            return true;
        }
        let Some(type_name) = type_name else {
            return false;
        };
        patterns
            .iter()
            .any(|p| p == "*" || self.types.is_subtype(type_name, p))
    }

    fn rule_applies(
        &self,
        rule: &Rule,
        principal: &Principal,
        op: Operation,
        type_name: Option<&str>,
    ) -> bool {
        rule.operations.iter().any(|p| op.matches(p))
            && self.type_matches(type_name, &rule.types)
            && self.roles.holds_any(principal, &rule.roles)
    }

    /// Deny rules first, then grants; no matching grant denies.
    fn decide(
        &self,
        principal: &Principal,
        op: Operation,
        type_name: Option<&str>,
        resource: impl FnOnce() -> ResourceId,
    ) -> Decision {
        let reason = if self
            .rules
            .deny
            .iter()
            .any(|r| self.rule_applies(r, principal, op, type_name))
        {
            "denied by rule"
        } else if self
            .rules
            .grant
            .iter()
            .any(|r| self.rule_applies(r, principal, op, type_name))
        {
            tracing::debug!(principal = %principal, operation = %op, "permitted");
            return Ok(());
        } else {
            "no matching grant"
        };

        let denial = NotAuthorized::new(principal, op, resource(), reason);
        tracing::warn!(
            principal = %principal,
            operation = %op,
            resource = %denial.resource,
            reason,
            "denied"
        );
        Err(denial)
    }

    fn require_roles(
        &self,
        principal: &Principal,
        op: Operation,
        roles: &[String],
        resource: impl FnOnce() -> ResourceId,
    ) -> Decision {
        if self.roles.holds_any(principal, roles) {
            tracing::debug!(principal = %principal, operation = %op, "permitted");
            Ok(())
        } else {
            let denial = NotAuthorized::new(principal, op, resource(), "role not held");
            tracing::warn!(
                principal = %principal,
                operation = %op,
                resource = %denial.resource,
                "denied"
            );
            Err(denial)
        }
    }

    fn decide_entity(&self, principal: &Principal, op: Operation, entity: &Entity) -> Decision {
        self.decide(principal, op, Some(entity.type_name()), || ResourceId::entity(entity))
    }

    fn decide_relationship(
        &self,
        principal: &Principal,
        op: Operation,
        relationship: &Relationship,
    ) -> Decision {
        self.decide(principal, op, Some(relationship.type_name()), || {
            ResourceId::relationship(relationship)
        })
    }

    fn decide_schema(&self, principal: &Principal, op: Operation, def: &SchemaType) -> Decision {
        self.decide(principal, op, Some(def.name()), || ResourceId::schema(def))
    }

    fn decide_proposed(
        &self,
        principal: &Principal,
        op: Operation,
        type_def: &TypeDef,
    ) -> Decision {
        self.decide(principal, op, Some(&type_def.name), || ResourceId::Entity {
            type_name: type_def.name.clone(),
            guid: Guid(String::new()),
        })
    }

    /// Assets outside the supported zones are invisible.
    fn zone_check(&self, principal: &Principal, op: Operation, entity: &Entity) -> Decision {
        let supported = &self.rules.zones.supported;
        if supported.is_empty() || !self.types.is_subtype(entity.type_name(), "Asset") {
            return Ok(());
        }
        let zones = entity.zones();
        if zones.is_empty() || zones.iter().any(|z| supported.contains(z)) {
            return Ok(());
        }
        tracing::warn!(
            principal = %principal,
            operation = %op,
            guid = %entity.guid(),
            "asset outside supported zones"
        );
        Err(NotAuthorized::new(
            principal,
            op,
            ResourceId::entity(entity),
            "asset not in a supported zone",
        ))
    }

    fn redact(&self, principal: &Principal, type_name: &str, properties: &mut InstanceProperties) {
        for rule in &self.rules.redact {
            if self.type_matches(Some(type_name), &rule.types)
                && !self.roles.holds_any(principal, &rule.exempt_roles)
            {
                for name in &rule.properties {
                    properties.remove(name);
                }
            }
        }
    }

    fn redacted_entity(&self, principal: &Principal, entity: &Entity) -> Entity {
        let mut visible = entity.clone();
        self.redact(principal, entity.type_name(), &mut visible.properties);
        visible
    }

    fn redacted_relationship(
        &self,
        principal: &Principal,
        relationship: &Relationship,
    ) -> Relationship {
        let mut visible = relationship.clone();
        self.redact(principal, relationship.type_name(), &mut visible.properties);
        visible
    }

    fn holds_clearance(&self, principal: &Principal) -> bool {
        self.roles
            .holds_any(principal, &self.rules.connections.credential_roles)
    }

    fn accepts_replica(&self, principal: &Principal, type_name: &str, home: &str) -> bool {
        let rules = &self.rules.reference_copies;
        let accepted = self.roles.holds_any(principal, &rules.roles)
            && (rules.accept_collections.is_empty()
                || rules.accept_collections.iter().any(|c| c == home))
            && self.type_matches(Some(type_name), &rules.accept_types)
            && !rules
                .deny_types
                .iter()
                .any(|t| self.types.is_subtype(type_name, t));
        tracing::debug!(
            principal = %principal,
            type_name,
            home,
            accepted,
            "reference copy admission"
        );
        accepted
    }
}

impl PlatformGate for RulePolicy {
    fn check_platform(&self, principal: &Principal, action: PlatformAction) -> Decision {
        let platform = &self.rules.platform;
        let roles = match action {
            PlatformAction::Access => &platform.access,
            PlatformAction::CreateServer => &platform.create_server,
            PlatformAction::Operate => &platform.operate,
            PlatformAction::Investigate => &platform.investigate,
        };
        self.require_roles(principal, action.operation(), roles, || ResourceId::Platform)
    }
}

impl ServerGate for RulePolicy {
    fn check_server(&self, principal: &Principal, server: &str, action: ServerAction) -> Decision {
        let rules = &self.rules.servers;
        let roles = match action {
            ServerAction::Access => &rules.access,
            ServerAction::Administer => &rules.administer,
            ServerAction::Operate => &rules.operate,
            ServerAction::Investigate => &rules.investigate,
        };
        self.require_roles(principal, action.operation(), roles, || {
            ResourceId::Server(server.to_string())
        })
    }
}

impl ServiceGate for RulePolicy {
    fn check_service(&self, principal: &Principal, service: &str) -> Decision {
        let roles = self
            .rules
            .services
            .get(service)
            .or_else(|| self.rules.services.get(ANY_ROLE))
            .map(|s| s.roles.as_slice())
            .unwrap_or_default();
        self.require_roles(principal, Operation::ServiceAccess, roles, || ResourceId::Service {
            service: service.to_string(),
            operation: None,
        })
    }

    fn check_service_operation(
        &self,
        principal: &Principal,
        service: &str,
        operation: &str,
    ) -> Decision {
        let rules = self
            .rules
            .services
            .get(service)
            .or_else(|| self.rules.services.get(ANY_ROLE));
        let Some(roles) = rules.and_then(|s| s.operations.get(operation)) else {
            return self.check_service(principal, service);
        };
        self.require_roles(principal, Operation::ServiceOperation, roles, || ResourceId::Service {
            service: service.to_string(),
            operation: Some(operation.to_string()),
        })
    }
}

impl TypeGate for RulePolicy {
    fn check_type_create(
        &self,
        principal: &Principal,
        _collection: &str,
        def: &SchemaType,
    ) -> Decision {
        self.decide_schema(principal, Operation::TypeCreate, def)
    }

    fn check_type_read(
        &self,
        principal: &Principal,
        _collection: &str,
        def: &SchemaType,
    ) -> Decision {
        self.decide_schema(principal, Operation::TypeRead, def)
    }

    fn check_type_update(
        &self,
        principal: &Principal,
        _collection: &str,
        def: &SchemaType,
        _patch: &TypeDefPatch,
    ) -> Decision {
        self.decide_schema(principal, Operation::TypeUpdate, def)
    }

    fn check_type_delete(
        &self,
        principal: &Principal,
        _collection: &str,
        def: &SchemaType,
    ) -> Decision {
        self.decide_schema(principal, Operation::TypeDelete, def)
    }

    fn check_type_reidentify(
        &self,
        principal: &Principal,
        _collection: &str,
        def: &SchemaType,
        _new_guid: &Guid,
        _new_name: &str,
    ) -> Decision {
        self.decide_schema(principal, Operation::TypeReIdentify, def)
    }
}

impl ElementGate for RulePolicy {
    fn check_entity_create(
        &self,
        principal: &Principal,
        _collection: &str,
        type_def: &TypeDef,
        _proposed_entity: &NewEntity,
    ) -> Decision {
        self.decide_proposed(principal, Operation::EntityCreate, type_def)
    }

    fn check_entity_read(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
    ) -> Decision<Entity> {
        self.zone_check(principal, Operation::EntityRead, entity)?;
        self.decide_entity(principal, Operation::EntityRead, entity)?;
        Ok(self.redacted_entity(principal, entity))
    }

    fn check_entity_summary_read(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
    ) -> Decision {
        self.zone_check(principal, Operation::EntitySummaryRead, entity)?;
        self.decide_entity(principal, Operation::EntitySummaryRead, entity)
    }

    fn check_entity_proxy_read(
        &self,
        principal: &Principal,
        _collection: &str,
        proxy: &EntityProxy,
    ) -> Decision {
        self.decide(principal, Operation::EntityProxyRead, Some(&proxy.type_name), || {
            ResourceId::proxy(proxy)
        })
    }

    fn check_entity_detail_update(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.zone_check(principal, Operation::EntityDetailUpdate, entity)?;
        self.decide_entity(principal, Operation::EntityDetailUpdate, entity)
    }

    fn check_entity_status_update(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        _new_status: InstanceStatus,
    ) -> Decision {
        self.decide_entity(principal, Operation::EntityStatusUpdate, entity)
    }

    fn check_classification_add(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        classification: &str,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.decide(principal, Operation::ClassificationAdd, Some(classification), || {
            ResourceId::classification(classification, entity)
        })
    }

    fn check_classification_update(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        classification: &str,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.decide(principal, Operation::ClassificationUpdate, Some(classification), || {
            ResourceId::classification(classification, entity)
        })
    }

    fn check_classification_delete(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        classification: &str,
    ) -> Decision {
        self.decide(principal, Operation::ClassificationDelete, Some(classification), || {
            ResourceId::classification(classification, entity)
        })
    }

    fn check_entity_delete(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
    ) -> Decision {
        self.decide_entity(principal, Operation::EntityDelete, entity)
    }

    fn check_entity_restore(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
    ) -> Decision {
        self.decide_entity(principal, Operation::EntityRestore, entity)
    }

    fn check_entity_reidentify(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        _new_guid: &Guid,
    ) -> Decision {
        self.decide_entity(principal, Operation::EntityReIdentify, entity)
    }

    fn check_entity_retype(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        new_type: &TypeDef,
    ) -> Decision {
        self.decide_entity(principal, Operation::EntityReType, entity)?;
        self.decide_proposed(principal, Operation::EntityReType, new_type)
    }

    fn check_entity_rehome(
        &self,
        principal: &Principal,
        _collection: &str,
        entity: &Entity,
        _new_home: &str,
    ) -> Decision {
        self.decide_entity(principal, Operation::EntityReHome, entity)
    }

    fn check_relationship_create(
        &self,
        principal: &Principal,
        _collection: &str,
        type_def: &TypeDef,
        _properties: &InstanceProperties,
        _status: InstanceStatus,
        end1: &Entity,
        end2: &Entity,
    ) -> Decision {
        self.decide(principal, Operation::RelationshipCreate, Some(&type_def.name), || {
            ResourceId::Relationship {
                type_name: type_def.name.clone(),
                guid: Guid(String::new()),
            }
        })?;
        // Hidden ends cannot be linked.
        self.zone_check(principal, Operation::RelationshipCreate, end1)?;
        self.zone_check(principal, Operation::RelationshipCreate, end2)
    }

    fn check_relationship_read(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
    ) -> Decision<Relationship> {
        self.decide_relationship(principal, Operation::RelationshipRead, relationship)?;
        Ok(self.redacted_relationship(principal, relationship))
    }

    fn check_relationship_detail_update(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.decide_relationship(principal, Operation::RelationshipDetailUpdate, relationship)
    }

    fn check_relationship_status_update(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
        _new_status: InstanceStatus,
    ) -> Decision {
        self.decide_relationship(principal, Operation::RelationshipStatusUpdate, relationship)
    }

    fn check_relationship_delete(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
    ) -> Decision {
        self.decide_relationship(principal, Operation::RelationshipDelete, relationship)
    }

    fn check_relationship_restore(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
    ) -> Decision {
        self.decide_relationship(principal, Operation::RelationshipRestore, relationship)
    }

    fn check_relationship_reidentify(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
        _new_guid: &Guid,
    ) -> Decision {
        self.decide_relationship(principal, Operation::RelationshipReIdentify, relationship)
    }

    fn check_relationship_retype(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
        new_type: &TypeDef,
    ) -> Decision {
        self.decide_relationship(principal, Operation::RelationshipReType, relationship)?;
        self.decide(principal, Operation::RelationshipReType, Some(&new_type.name), || {
            ResourceId::relationship(relationship)
        })
    }

    fn check_relationship_rehome(
        &self,
        principal: &Principal,
        _collection: &str,
        relationship: &Relationship,
        _new_home: &str,
    ) -> Decision {
        self.decide_relationship(principal, Operation::RelationshipReHome, relationship)
    }

    fn check_attach(
        &self,
        principal: &Principal,
        element: &Entity,
        relationship_type: &str,
        _linked: &Entity,
    ) -> Decision {
        self.zone_check(principal, Operation::Attach, element)?;
        self.decide_entity(principal, Operation::Attach, element)?;
        self.decide(principal, Operation::Attach, Some(relationship_type), || {
            ResourceId::entity(element)
        })
    }

    fn check_detach(
        &self,
        principal: &Principal,
        element: &Entity,
        relationship_type: &str,
        _linked: &Entity,
    ) -> Decision {
        self.zone_check(principal, Operation::Detach, element)?;
        self.decide_entity(principal, Operation::Detach, element)?;
        self.decide(principal, Operation::Detach, Some(relationship_type), || {
            ResourceId::entity(element)
        })
    }

    fn check_add_feedback(
        &self,
        principal: &Principal,
        element: &Entity,
        _feedback: &Entity,
    ) -> Decision {
        self.zone_check(principal, Operation::AddFeedback, element)?;
        self.decide_entity(principal, Operation::AddFeedback, element)
    }

    fn check_delete_feedback(
        &self,
        principal: &Principal,
        element: &Entity,
        _feedback: &Entity,
    ) -> Decision {
        self.decide_entity(principal, Operation::DeleteFeedback, element)
    }
}

impl AnchorGate for RulePolicy {
    // The anchor decides; the member's own type still picks the redactions.

    fn check_anchor_member_read(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
    ) -> Decision<Entity> {
        self.zone_check(principal, Operation::AnchorMemberRead, anchor)?;
        self.decide_entity(principal, Operation::AnchorMemberRead, anchor)?;
        Ok(self.redacted_entity(principal, member))
    }

    fn check_anchor_relationship_read(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Relationship,
    ) -> Decision<Relationship> {
        self.zone_check(principal, Operation::AnchorMemberRead, anchor)?;
        self.decide_entity(principal, Operation::AnchorMemberRead, anchor)?;
        Ok(self.redacted_relationship(principal, member))
    }

    fn check_anchor_member_update(
        &self,
        principal: &Principal,
        anchor: &Entity,
        _member: ElementRef<'_>,
    ) -> Decision {
        self.zone_check(principal, Operation::AnchorMemberUpdate, anchor)?;
        self.decide_entity(principal, Operation::AnchorMemberUpdate, anchor)
    }

    fn check_anchor_member_status_update(
        &self,
        principal: &Principal,
        anchor: &Entity,
        _member: ElementRef<'_>,
        _new_status: InstanceStatus,
    ) -> Decision {
        self.decide_entity(principal, Operation::AnchorMemberStatusUpdate, anchor)
    }

    fn check_anchor_member_attach(
        &self,
        principal: &Principal,
        anchor: &Entity,
        _member: &Entity,
        _relationship_type: &str,
        _linked: &Entity,
    ) -> Decision {
        self.zone_check(principal, Operation::AnchorMemberAttach, anchor)?;
        self.decide_entity(principal, Operation::AnchorMemberAttach, anchor)
    }

    fn check_anchor_member_detach(
        &self,
        principal: &Principal,
        anchor: &Entity,
        _member: &Entity,
        _relationship_type: &str,
        _linked: &Entity,
    ) -> Decision {
        self.zone_check(principal, Operation::AnchorMemberDetach, anchor)?;
        self.decide_entity(principal, Operation::AnchorMemberDetach, anchor)
    }

    fn check_anchor_member_add_feedback(
        &self,
        principal: &Principal,
        anchor: &Entity,
        _member: &Entity,
        _feedback: &Entity,
    ) -> Decision {
        self.zone_check(principal, Operation::AnchorMemberAddFeedback, anchor)?;
        self.decide_entity(principal, Operation::AnchorMemberAddFeedback, anchor)
    }

    fn check_anchor_member_delete_feedback(
        &self,
        principal: &Principal,
        anchor: &Entity,
        _member: &Entity,
        _feedback: &Entity,
    ) -> Decision {
        self.decide_entity(principal, Operation::AnchorMemberDeleteFeedback, anchor)
    }

    fn check_anchor_member_classify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.decide_entity(principal, Operation::AnchorMemberClassify, anchor)?;
        self.decide(principal, Operation::AnchorMemberClassify, Some(classification), || {
            ResourceId::classification(classification, member)
        })
    }

    fn check_anchor_member_reclassify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.decide_entity(principal, Operation::AnchorMemberReclassify, anchor)?;
        self.decide(principal, Operation::AnchorMemberReclassify, Some(classification), || {
            ResourceId::classification(classification, member)
        })
    }

    fn check_anchor_member_declassify(
        &self,
        principal: &Principal,
        anchor: &Entity,
        member: &Entity,
        classification: &str,
    ) -> Decision {
        self.decide_entity(principal, Operation::AnchorMemberDeclassify, anchor)?;
        self.decide(principal, Operation::AnchorMemberDeclassify, Some(classification), || {
            ResourceId::classification(classification, member)
        })
    }

    fn check_anchor_member_delete(
        &self,
        principal: &Principal,
        anchor: &Entity,
        _member: ElementRef<'_>,
    ) -> Decision {
        self.decide_entity(principal, Operation::AnchorMemberDelete, anchor)
    }
}

impl GlossaryGate for RulePolicy {
    fn check_glossary_create(
        &self,
        principal: &Principal,
        type_def: &TypeDef,
        _proposed_glossary: &NewEntity,
    ) -> Decision {
        self.decide_proposed(principal, Operation::GlossaryCreate, type_def)
    }

    fn check_glossary_read(&self, principal: &Principal, glossary: &Entity) -> Decision<Entity> {
        self.decide_entity(principal, Operation::GlossaryRead, glossary)?;
        Ok(self.redacted_entity(principal, glossary))
    }

    fn check_glossary_member_read(
        &self,
        principal: &Principal,
        glossary: &Entity,
        member: &Entity,
    ) -> Decision<Entity> {
        self.decide_entity(principal, Operation::GlossaryRead, glossary)?;
        Ok(self.redacted_entity(principal, member))
    }

    fn check_glossary_relationship_read(
        &self,
        principal: &Principal,
        glossary: &Entity,
        member: &Relationship,
    ) -> Decision<Relationship> {
        self.decide_entity(principal, Operation::GlossaryRead, glossary)?;
        Ok(self.redacted_relationship(principal, member))
    }

    fn check_glossary_detail_update(
        &self,
        principal: &Principal,
        glossary: &Entity,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.decide_entity(principal, Operation::GlossaryDetailUpdate, glossary)
    }

    fn check_glossary_member_update(&self, principal: &Principal, glossary: &Entity) -> Decision {
        self.decide_entity(principal, Operation::GlossaryMemberUpdate, glossary)
    }

    fn check_glossary_member_status_update(
        &self,
        principal: &Principal,
        glossary: &Entity,
        _new_status: InstanceStatus,
    ) -> Decision {
        self.decide_entity(principal, Operation::GlossaryMemberStatusUpdate, glossary)
    }

    fn check_glossary_feedback_update(&self, principal: &Principal, glossary: &Entity) -> Decision {
        self.decide_entity(principal, Operation::GlossaryFeedbackUpdate, glossary)
    }

    fn check_glossary_delete(&self, principal: &Principal, glossary: &Entity) -> Decision {
        self.decide_entity(principal, Operation::GlossaryDelete, glossary)
    }
}

impl AssetGate for RulePolicy {
    fn check_asset_create(
        &self,
        principal: &Principal,
        type_def: &TypeDef,
        _proposed_asset: &NewEntity,
    ) -> Decision {
        self.decide_proposed(principal, Operation::AssetCreate, type_def)
    }

    fn check_asset_read(&self, principal: &Principal, asset: &Entity) -> Decision<Entity> {
        self.zone_check(principal, Operation::AssetRead, asset)?;
        self.decide_entity(principal, Operation::AssetRead, asset)?;
        Ok(self.redacted_entity(principal, asset))
    }

    fn check_asset_member_read(
        &self,
        principal: &Principal,
        asset: &Entity,
        member: &Entity,
    ) -> Decision<Entity> {
        self.zone_check(principal, Operation::AssetRead, asset)?;
        self.decide_entity(principal, Operation::AssetRead, asset)?;
        Ok(self.redacted_entity(principal, member))
    }

    fn check_asset_relationship_read(
        &self,
        principal: &Principal,
        asset: &Entity,
        member: &Relationship,
    ) -> Decision<Relationship> {
        self.zone_check(principal, Operation::AssetRead, asset)?;
        self.decide_entity(principal, Operation::AssetRead, asset)?;
        Ok(self.redacted_relationship(principal, member))
    }

    fn check_asset_detail_update(
        &self,
        principal: &Principal,
        asset: &Entity,
        _properties: &InstanceProperties,
    ) -> Decision {
        self.zone_check(principal, Operation::AssetDetailUpdate, asset)?;
        self.decide_entity(principal, Operation::AssetDetailUpdate, asset)
    }

    fn check_asset_attachment_update(&self, principal: &Principal, asset: &Entity) -> Decision {
        self.zone_check(principal, Operation::AssetAttachmentUpdate, asset)?;
        self.decide_entity(principal, Operation::AssetAttachmentUpdate, asset)
    }

    fn check_asset_feedback(&self, principal: &Principal, asset: &Entity) -> Decision {
        self.zone_check(principal, Operation::AssetFeedback, asset)?;
        self.decide_entity(principal, Operation::AssetFeedback, asset)
    }

    fn check_asset_delete(&self, principal: &Principal, asset: &Entity) -> Decision {
        self.zone_check(principal, Operation::AssetDelete, asset)?;
        self.decide_entity(principal, Operation::AssetDelete, asset)
    }
}

impl ConnectionGate for RulePolicy {
    fn check_connection_read(
        &self,
        principal: &Principal,
        asset: &Entity,
        connection: &Connection,
    ) -> Decision {
        if connection.has_credentials() && !self.holds_clearance(principal) {
            tracing::debug!(
                principal = %principal,
                connection = %connection.guid,
                "credentials beyond clearance"
            );
            return Err(NotAuthorized::new(
                principal,
                Operation::ConnectionRead,
                ResourceId::connection(connection),
                "credential clearance required",
            ));
        }
        self.decide(principal, Operation::ConnectionRead, Some(asset.type_name()), || {
            ResourceId::connection(connection)
        })
    }

    /// First candidate, in the order given, that the principal may read.
    fn select_connection(
        &self,
        principal: &Principal,
        asset: &Entity,
        candidates: &[Connection],
    ) -> Option<Connection> {
        candidates
            .iter()
            .find(|c| self.check_connection_read(principal, asset, c).is_ok())
            .cloned()
    }
}

impl ReferenceCopyGate for RulePolicy {
    fn check_entity_reference_copy_save(&self, principal: &Principal, entity: &Entity) -> bool {
        self.accepts_replica(principal, entity.type_name(), entity.home_collection())
    }

    fn check_relationship_reference_copy_save(
        &self,
        principal: &Principal,
        relationship: &Relationship,
    ) -> bool {
        self.accepts_replica(principal, relationship.type_name(), relationship.home_collection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metadata::{TypeRegistry, ZONE_MEMBERSHIP_CLASSIFICATION, ZONE_MEMBERSHIP_PROPERTY};
    use serde_json::json;

    const RULES: &str = r#"
[principals]
alice = ["reader"]
bob = ["reader", "author"]
carol = ["steward", "secops"]
erin = ["contractor", "author"]

[[grant]]
roles = ["reader"]
operations = ["entity_read", "asset_read", "relationship_read", "connection_read"]

[[grant]]
roles = ["author"]
operations = ["entity_create", "entity_detail_update"]
types = ["Asset"]

[[grant]]
roles = ["steward"]
operations = ["classification_*", "entity_*"]

[[deny]]
roles = ["contractor"]
operations = ["entity_*"]
types = ["Database"]

[connections]
credential_roles = ["secops"]

[reference_copies]
accept_collections = ["remote-7"]
deny_types = ["Process"]

[zones]
supported = ["data-lake"]

[[redact]]
types = ["Asset"]
properties = ["owner"]
exempt_roles = ["steward"]
"#;

    fn policy() -> RulePolicy {
        let rules = RuleSet::parse(RULES).unwrap();
        RulePolicy::new(rules, Arc::new(TypeRegistry::open_metadata()))
    }

    fn zoned(entity: Entity, zones: &[&str]) -> Entity {
        let mut props = InstanceProperties::new();
        props.insert(ZONE_MEMBERSHIP_PROPERTY.into(), json!(zones));
        entity.with_classification(ZONE_MEMBERSHIP_CLASSIFICATION, props)
    }

    #[test]
    fn grants_match_subtypes() {
        let policy = policy();
        let bob = Principal::from("bob");
        let dataset = TypeDef::entity("DataSet").extends("Asset");
        let term = TypeDef::entity("GlossaryTerm");

        assert!(policy.check_entity_create(&bob, "local", &dataset, &NewEntity::default()).is_ok());
        let err = policy
            .check_entity_create(&bob, "local", &term, &NewEntity::default())
            .unwrap_err();
        assert_eq!(err.reason, "no matching grant");
    }

    #[test]
    fn deny_overrides_grant() {
        let policy = policy();
        let erin = Principal::from("erin");
        let db = Entity::new("D1", "Database", "local");
        let file = Entity::new("F1", "DataFile", "local");
        let props = InstanceProperties::new();

        let err = policy.check_entity_detail_update(&erin, "local", &db, &props).unwrap_err();
        assert_eq!(err.reason, "denied by rule");
        assert!(policy.check_entity_detail_update(&erin, "local", &file, &props).is_ok());
    }

    #[test]
    fn update_does_not_imply_classification() {
        let policy = policy();
        let bob = Principal::from("bob");
        let asset = Entity::new("A1", "DataSet", "local");
        let props = InstanceProperties::new();

        assert!(policy.check_entity_detail_update(&bob, "local", &asset, &props).is_ok());
        assert!(
            policy
                .check_classification_add(&bob, "local", &asset, "Confidentiality", &props)
                .is_err()
        );
    }

    #[test]
    fn read_redacts_without_expanding() {
        let policy = policy();
        let asset = Entity::new("A1", "DataSet", "local")
            .with_property("name", json!("sales"))
            .with_property("owner", json!("finance"));

        let seen = policy.check_entity_read(&Principal::from("alice"), "local", &asset).unwrap();
        assert!(seen.properties.contains_key("name"));
        assert!(!seen.properties.contains_key("owner"));
        assert!(seen.properties.keys().all(|k| asset.properties.contains_key(k)));

        let steward_view = policy
            .check_entity_read(&Principal::from("carol"), "local", &asset)
            .unwrap();
        assert_eq!(steward_view.properties, asset.properties);
    }

    #[test]
    fn assets_outside_supported_zones_are_hidden() {
        let policy = policy();
        let alice = Principal::from("alice");

        let lake = zoned(Entity::new("A1", "DataSet", "local"), &["data-lake"]);
        let quarantine = zoned(Entity::new("A2", "DataSet", "local"), &["quarantine"]);
        let unzoned = Entity::new("A3", "DataSet", "local");

        assert!(policy.check_asset_read(&alice, &lake).is_ok());
        assert!(policy.check_asset_read(&alice, &quarantine).is_err());
        assert!(policy.check_asset_read(&alice, &unzoned).is_ok());
    }

    #[test]
    fn members_read_through_their_asset_keep_their_own_redactions() {
        let policy = policy();
        let alice = Principal::from("alice");
        let lake = zoned(Entity::new("A1", "DataSet", "local"), &["data-lake"]);
        let quarantine = zoned(Entity::new("A2", "DataSet", "local"), &["quarantine"]);
        let member = Entity::new("F1", "DataFile", "local")
            .with_anchor("A1")
            .with_property("owner", json!("finance"));

        let seen = policy.check_asset_member_read(&alice, &lake, &member).unwrap();
        assert!(!seen.properties.contains_key("owner"));
        assert!(policy.check_asset_member_read(&alice, &quarantine, &member).is_err());
    }

    #[test]
    fn select_connection_respects_clearance_and_order() {
        let policy = policy();
        let asset = Entity::new("A1", "DataSet", "local");
        let candidates = [
            Connection::new("C1", "secured").with_credentials("etl", "hunter2"),
            Connection::new("C2", "plain"),
        ];

        let bob = Principal::from("bob");
        let picked = policy.select_connection(&bob, &asset, &candidates);
        assert_eq!(picked.map(|c| c.guid), Some(Guid::from("C2")));

        // carol is cleared but holds no read grant
        assert!(policy.select_connection(&Principal::from("carol"), &asset, &candidates).is_none());
    }

    #[test]
    fn reference_copies_are_independent_of_authoring() {
        let policy = policy();
        let alice = Principal::from("alice");
        let remote_term = Entity::new("E2", "GlossaryTerm", "remote-7");

        let term = TypeDef::entity("GlossaryTerm");
        assert!(
            policy
                .check_entity_create(&alice, "local", &term, &NewEntity::default())
                .is_err()
        );
        assert!(policy.check_entity_reference_copy_save(&alice, &remote_term));

        let other_home = Entity::new("E3", "GlossaryTerm", "remote-9");
        assert!(!policy.check_entity_reference_copy_save(&alice, &other_home));

        let process = Entity::new("P1", "Process", "remote-7");
        assert!(!policy.check_entity_reference_copy_save(&alice, &process));
    }

    #[test]
    fn coarse_gates_default_to_access_only() {
        let policy = policy();
        let alice = Principal::from("alice");

        assert!(policy.check_platform(&alice, PlatformAction::Access).is_ok());
        assert!(policy.check_platform(&alice, PlatformAction::CreateServer).is_err());
        assert!(policy.check_server(&alice, "cocoMDS1", ServerAction::Access).is_ok());
        assert!(policy.check_server(&alice, "cocoMDS1", ServerAction::Administer).is_err());
        // no services table: fail closed
        assert!(policy.check_service(&alice, "asset-owner").is_err());
    }

    #[test]
    fn service_operation_overrides() {
        let rules = RuleSet::parse(
            r#"
[principals]
alice = ["reader"]
carol = ["steward"]

[services."asset-owner"]
roles = ["*"]
operations = { deleteAsset = ["steward"] }
"#,
        )
        .unwrap();
        let policy = RulePolicy::new(rules, Arc::new(TypeRegistry::open_metadata()));
        let alice = Principal::from("alice");

        assert!(policy.check_service_operation(&alice, "asset-owner", "getAsset").is_ok());
        assert!(policy.check_service_operation(&alice, "asset-owner", "deleteAsset").is_err());
        assert!(
            policy
                .check_service_operation(&Principal::from("carol"), "asset-owner", "deleteAsset")
                .is_ok()
        );
    }

    #[test]
    fn unknown_operation_pattern_is_rejected() {
        let err = RuleSet::parse(
            r#"
[[grant]]
roles = ["*"]
operations = ["entity_raed"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn role_refresh_takes_effect_immediately() {
        let policy = policy();
        let dave = Principal::from("dave");
        let asset = Entity::new("A1", "DataSet", "local");

        assert!(policy.check_entity_read(&dave, "local", &asset).is_err());
        policy.roles().grant(&dave, "reader");
        assert!(policy.check_entity_read(&dave, "local", &asset).is_ok());
    }
}
