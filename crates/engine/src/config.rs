//! Configuration loading from TOML.

use crate::{Error, Result};
use policy::RuleSet;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The server the engine decides for.
    #[serde(default)]
    pub server: ServerConfig,

    /// Rule tables (principals, grants, denies, ...).
    #[serde(flatten)]
    pub rules: RuleSet,
}

/// Identity of the owning server and its local metadata collection.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Instances homed here are never reference copies.
    #[serde(default = "default_collection_id")]
    pub metadata_collection_id: String,

    #[serde(default = "default_collection_name")]
    pub metadata_collection_name: String,

    /// Principal used for work the server does on its own behalf, such as
    /// saving replicas.
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            metadata_collection_id: default_collection_id(),
            metadata_collection_name: default_collection_name(),
            user_id: default_user_id(),
        }
    }
}

fn default_server_name() -> String {
    "metadata-server".to_string()
}

fn default_collection_id() -> String {
    "local".to_string()
}

fn default_collection_name() -> String {
    "local".to_string()
}

fn default_user_id() -> String {
    "server-npa".to_string()
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("server.name", &self.name),
            ("server.metadata_collection_id", &self.metadata_collection_id),
            ("server.metadata_collection_name", &self.metadata_collection_name),
            ("server.user_id", &self.user_id),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml).map_err(|e| Error::Config(e.to_string()))?;
        config.server.validate()?;
        config.rules.validate()?;
        Ok(config)
    }

    /// Create a default configuration.
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            rules: RuleSet::restrictive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_server_and_rules() {
        let config = Config::parse(
            r#"
[server]
name = "cocoMDS1"
metadata_collection_id = "f2f5a1e0"
metadata_collection_name = "cocoMDS1-catalog"

[principals]
alice = ["reader"]

[[grant]]
roles = ["reader"]
operations = ["entity_read"]
"#,
        )
        .unwrap();

        assert_eq!(config.server.name, "cocoMDS1");
        assert_eq!(config.server.user_id, "server-npa");
        assert_eq!(config.rules.principals["alice"], ["reader"]);
        assert_eq!(config.rules.grant.len(), 1);
    }

    #[test]
    fn server_identity_and_server_rules_coexist() {
        let config = Config::parse(
            r#"
[server]
name = "cocoMDS1"

[servers]
administer = ["admin"]
"#,
        )
        .unwrap();

        assert_eq!(config.server.name, "cocoMDS1");
        assert_eq!(config.rules.servers.administer, ["admin"]);
        assert_eq!(config.rules.servers.access, ["*"]);
    }

    #[test]
    fn defaults_apply_without_server_table() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.metadata_collection_id, "local");
        assert!(config.rules.grant.is_empty());
    }

    #[test]
    fn blank_server_fields_are_rejected() {
        let err = Config::parse(
            r#"
[server]
user_id = " "
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("server.user_id")));
    }

    #[test]
    fn invalid_rules_surface_as_policy_errors() {
        let err = Config::parse(
            r#"
[[deny]]
roles = ["*"]
operations = ["nonsense"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Policy(policy::Error::Invalid(_))));
    }
}
