//! The policy engine owned by one server.

use crate::admission::Admission;
use crate::config::{Config, ServerConfig};
use crate::replication::ReplicaIntake;
use crate::{Error, Result};
use metadata::{SnapshotProvider, TypeOracle};
use policy::{
    AnchorGate, CatalogRouter, ConnectionGate, DenyAll, ElementGate, PlatformAction, PlatformGate,
    Principal, ReferenceCopyGate, RulePolicy, ServerAction, ServerGate, ServiceGate, TypeGate,
};
use std::sync::Arc;

/// Who is asking, through which service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub principal: Principal,
    pub service: String,
    /// The service operation, when it has its own rules.
    pub operation: Option<String>,
}

impl RequestContext {
    pub fn new(principal: impl Into<Principal>, service: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            service: service.into(),
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

/// Decision engine for one server.
///
/// Constructed once per server and passed to each request handler; it holds
/// no per-request state. Gates not supplied to the builder deny.
pub struct PolicyEngine {
    pub(crate) server: ServerConfig,
    pub(crate) snapshots: Arc<dyn SnapshotProvider>,
    pub(crate) platform: Arc<dyn PlatformGate>,
    pub(crate) servers: Arc<dyn ServerGate>,
    pub(crate) services: Arc<dyn ServiceGate>,
    pub(crate) types: Arc<dyn TypeGate>,
    pub(crate) elements: Arc<dyn ElementGate>,
    pub(crate) anchors: Arc<dyn AnchorGate>,
    pub(crate) connections: Arc<dyn ConnectionGate>,
    pub(crate) reference_copies: Arc<dyn ReferenceCopyGate>,
}

impl PolicyEngine {
    pub fn builder(
        server: ServerConfig,
        snapshots: Arc<dyn SnapshotProvider>,
    ) -> PolicyEngineBuilder {
        let deny = Arc::new(DenyAll);
        PolicyEngineBuilder {
            engine: Self {
                server,
                snapshots,
                platform: deny.clone(),
                servers: deny.clone(),
                services: deny.clone(),
                types: deny.clone(),
                elements: deny.clone(),
                anchors: deny.clone(),
                connections: deny.clone(),
                reference_copies: deny,
            },
        }
    }

    /// An engine enforcing `config`'s rule tables.
    ///
    /// Glossary and asset decisions are routed through a [`CatalogRouter`]
    /// backed by the same rules.
    pub fn from_config(
        config: Config,
        oracle: Arc<dyn TypeOracle>,
        snapshots: Arc<dyn SnapshotProvider>,
    ) -> Result<Self> {
        config.server.validate()?;
        let rules = Arc::new(RulePolicy::new(config.rules, oracle.clone()));
        let router = Arc::new(
            CatalogRouter::new(oracle)
                .elements(rules.clone())
                .anchors(rules.clone())
                .glossaries(rules.clone())
                .assets(rules.clone()),
        );

        Ok(Self::builder(config.server, snapshots)
            .platform(rules.clone())
            .servers(rules.clone())
            .services(rules.clone())
            .types(rules.clone())
            .elements(router.clone())
            .anchors(router)
            .connections(rules.clone())
            .reference_copies(rules)
            .build())
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    fn validate_principal(principal: &Principal) -> Result<()> {
        if principal.is_blank() {
            tracing::error!("request without a principal");
            return Err(Error::InvalidRequest("principal must not be blank".into()));
        }
        Ok(())
    }

    /// Run the platform, server and service gates, in that order.
    ///
    /// The returned [`Admission`] is the only way to reach instance-level
    /// decisions, so nothing is decided over (or fetched) before the coarse
    /// gates pass.
    pub fn admit(&self, ctx: &RequestContext) -> Result<Admission<'_>> {
        Self::validate_principal(&ctx.principal)?;
        if ctx.service.trim().is_empty() {
            tracing::error!(principal = %ctx.principal, "request without a service");
            return Err(Error::InvalidRequest("service must not be blank".into()));
        }

        let principal = &ctx.principal;
        self.platform.check_platform(principal, PlatformAction::Access)?;
        self.servers
            .check_server(principal, &self.server.name, ServerAction::Access)?;
        match &ctx.operation {
            Some(operation) => self
                .services
                .check_service_operation(principal, &ctx.service, operation)?,
            None => self.services.check_service(principal, &ctx.service)?,
        }

        tracing::debug!(principal = %principal, service = %ctx.service, "admitted");
        Ok(Admission::new(self, principal.clone()))
    }

    /// Platform-level administrative action (create server, operate, ...).
    pub fn check_platform(&self, principal: &Principal, action: PlatformAction) -> Result<()> {
        Self::validate_principal(principal)?;
        self.platform.check_platform(principal, action)?;
        Ok(())
    }

    /// Server-level administrative action. Platform access is checked first.
    pub fn check_server(&self, principal: &Principal, action: ServerAction) -> Result<()> {
        Self::validate_principal(principal)?;
        self.platform.check_platform(principal, PlatformAction::Access)?;
        self.servers.check_server(principal, &self.server.name, action)?;
        Ok(())
    }

    /// Intake for reference copies arriving from cohort members, acting as
    /// the server's own user.
    pub fn replica_intake(&self) -> ReplicaIntake<'_> {
        ReplicaIntake::new(self, Principal::new(self.server.user_id.clone()))
    }
}

/// Builder for [`PolicyEngine`].
pub struct PolicyEngineBuilder {
    engine: PolicyEngine,
}

impl PolicyEngineBuilder {
    pub fn platform(mut self, gate: Arc<dyn PlatformGate>) -> Self {
        self.engine.platform = gate;
        self
    }

    pub fn servers(mut self, gate: Arc<dyn ServerGate>) -> Self {
        self.engine.servers = gate;
        self
    }

    pub fn services(mut self, gate: Arc<dyn ServiceGate>) -> Self {
        self.engine.services = gate;
        self
    }

    pub fn types(mut self, gate: Arc<dyn TypeGate>) -> Self {
        self.engine.types = gate;
        self
    }

    pub fn elements(mut self, gate: Arc<dyn ElementGate>) -> Self {
        self.engine.elements = gate;
        self
    }

    pub fn anchors(mut self, gate: Arc<dyn AnchorGate>) -> Self {
        self.engine.anchors = gate;
        self
    }

    pub fn connections(mut self, gate: Arc<dyn ConnectionGate>) -> Self {
        self.engine.connections = gate;
        self
    }

    pub fn reference_copies(mut self, gate: Arc<dyn ReferenceCopyGate>) -> Self {
        self.engine.reference_copies = gate;
        self
    }

    pub fn build(self) -> PolicyEngine {
        self.engine
    }
}
