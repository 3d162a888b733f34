//! Connection snapshots.

use crate::Guid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes how to reach the resource behind an asset.
///
/// A connection may embed credentials; it is only ever handed out through an
/// asset the caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub guid: Guid,
    pub qualified_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub endpoint_address: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub clear_password: Option<String>,
    #[serde(default)]
    pub encrypted_password: Option<String>,
    #[serde(default)]
    pub secured_properties: BTreeMap<String, String>,
}

impl Connection {
    pub fn new(guid: impl Into<Guid>, qualified_name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            qualified_name: qualified_name.into(),
            display_name: None,
            endpoint_address: None,
            user_id: None,
            clear_password: None,
            encrypted_password: None,
            secured_properties: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, address: impl Into<String>) -> Self {
        self.endpoint_address = Some(address.into());
        self
    }

    pub fn with_credentials(
        mut self,
        user_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user_id = Some(user_id.into());
        self.clear_password = Some(password.into());
        self
    }

    /// Whether the connection carries anything that grants access by itself.
    pub fn has_credentials(&self) -> bool {
        self.clear_password.is_some()
            || self.encrypted_password.is_some()
            || !self.secured_properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_detected() {
        let plain = Connection::new("C2", "jdbc:postgres:sales");
        assert!(!plain.has_credentials());

        let secured = plain.clone().with_credentials("etl", "hunter2");
        assert!(secured.has_credentials());

        let mut vaulted = plain;
        vaulted
            .secured_properties
            .insert("token".into(), "vault:sales".into());
        assert!(vaulted.has_credentials());
    }
}
