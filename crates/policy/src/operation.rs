//! Names of every decision the engine can be asked to make.

use serde::{Deserialize, Serialize};

macro_rules! operations {
    ($($variant:ident => $name:literal,)*) => {
        /// A decision point of the authorization surface.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Operation {
            $(#[serde(rename = $name)] $variant,)*
        }

        impl Operation {
            /// Every operation, in declaration order.
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)*];

            /// The snake_case name used in rule files and logs.
            pub fn name(self) -> &'static str {
                match self {
                    $(Operation::$variant => $name,)*
                }
            }
        }
    };
}

operations! {
    PlatformAccess => "platform_access",
    PlatformCreateServer => "platform_create_server",
    PlatformOperate => "platform_operate",
    PlatformInvestigate => "platform_investigate",
    ServerAccess => "server_access",
    ServerAdminister => "server_administer",
    ServerOperate => "server_operate",
    ServerInvestigate => "server_investigate",
    ServiceAccess => "service_access",
    ServiceOperation => "service_operation",
    TypeCreate => "type_create",
    TypeRead => "type_read",
    TypeUpdate => "type_update",
    TypeDelete => "type_delete",
    TypeReIdentify => "type_reidentify",
    EntityCreate => "entity_create",
    EntityRead => "entity_read",
    EntitySummaryRead => "entity_summary_read",
    EntityProxyRead => "entity_proxy_read",
    EntityDetailUpdate => "entity_detail_update",
    EntityStatusUpdate => "entity_status_update",
    ClassificationAdd => "classification_add",
    ClassificationUpdate => "classification_update",
    ClassificationDelete => "classification_delete",
    EntityDelete => "entity_delete",
    EntityRestore => "entity_restore",
    EntityReIdentify => "entity_reidentify",
    EntityReType => "entity_retype",
    EntityReHome => "entity_rehome",
    RelationshipCreate => "relationship_create",
    RelationshipRead => "relationship_read",
    RelationshipDetailUpdate => "relationship_detail_update",
    RelationshipStatusUpdate => "relationship_status_update",
    RelationshipDelete => "relationship_delete",
    RelationshipRestore => "relationship_restore",
    RelationshipReIdentify => "relationship_reidentify",
    RelationshipReType => "relationship_retype",
    RelationshipReHome => "relationship_rehome",
    Attach => "attach",
    Detach => "detach",
    AddFeedback => "add_feedback",
    DeleteFeedback => "delete_feedback",
    AnchorMemberRead => "anchor_member_read",
    AnchorMemberUpdate => "anchor_member_update",
    AnchorMemberStatusUpdate => "anchor_member_status_update",
    AnchorMemberAttach => "anchor_member_attach",
    AnchorMemberDetach => "anchor_member_detach",
    AnchorMemberAddFeedback => "anchor_member_add_feedback",
    AnchorMemberDeleteFeedback => "anchor_member_delete_feedback",
    AnchorMemberClassify => "anchor_member_classify",
    AnchorMemberReclassify => "anchor_member_reclassify",
    AnchorMemberDeclassify => "anchor_member_declassify",
    AnchorMemberDelete => "anchor_member_delete",
    GlossaryCreate => "glossary_create",
    GlossaryRead => "glossary_read",
    GlossaryDetailUpdate => "glossary_detail_update",
    GlossaryMemberUpdate => "glossary_member_update",
    GlossaryMemberStatusUpdate => "glossary_member_status_update",
    GlossaryFeedbackUpdate => "glossary_feedback_update",
    GlossaryDelete => "glossary_delete",
    AssetCreate => "asset_create",
    AssetRead => "asset_read",
    AssetDetailUpdate => "asset_detail_update",
    AssetAttachmentUpdate => "asset_attachment_update",
    AssetFeedback => "asset_feedback",
    AssetDelete => "asset_delete",
    ConnectionRead => "connection_read",
    ConnectionSelect => "connection_select",
    EntityReferenceCopySave => "entity_reference_copy_save",
    RelationshipReferenceCopySave => "relationship_reference_copy_save",
}

impl Operation {
    /// Whether a rule pattern names this operation.
    ///
    /// Patterns are an exact name, `*`, or a prefix ending in `*`
    /// (`entity_*` covers every entity operation).
    pub fn matches(self, pattern: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => self.name().starts_with(prefix),
            None => self.name() == pattern,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Actions gated at the platform level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformAction {
    /// Any request routed through the platform.
    Access,
    CreateServer,
    Operate,
    Investigate,
}

impl PlatformAction {
    pub fn operation(self) -> Operation {
        match self {
            Self::Access => Operation::PlatformAccess,
            Self::CreateServer => Operation::PlatformCreateServer,
            Self::Operate => Operation::PlatformOperate,
            Self::Investigate => Operation::PlatformInvestigate,
        }
    }
}

/// Actions gated at the server level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAction {
    /// Any request handled by the server.
    Access,
    Administer,
    Operate,
    Investigate,
}

impl ServerAction {
    pub fn operation(self) -> Operation {
        match self {
            Self::Access => Operation::ServerAccess,
            Self::Administer => Operation::ServerAdminister,
            Self::Operate => Operation::ServerOperate,
            Self::Investigate => Operation::ServerInvestigate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_rule_names() {
        for op in Operation::ALL {
            let json = serde_json::to_string(op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.name()));
        }
    }

    #[test]
    fn prefix_patterns() {
        assert!(Operation::EntityRead.matches("entity_*"));
        assert!(Operation::EntityRead.matches("*"));
        assert!(Operation::EntityRead.matches("entity_read"));
        assert!(!Operation::EntityRead.matches("entity_reads"));
        assert!(!Operation::RelationshipRead.matches("entity_*"));
    }
}
