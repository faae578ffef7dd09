use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Which virtual tree the filesystem exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TreeType {
    /// Read-only `/model/record/attachment` tree.
    #[default]
    #[serde(rename = "model")]
    Model,
    /// Write-only root; closed files are imported as CSV.
    #[serde(rename = "csvimport")]
    CsvImport,
}

impl TreeType {
    /// Option-string spelling of the tree type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeType::Model => "model",
            TreeType::CsvImport => "csvimport",
        }
    }
}

impl fmt::Display for TreeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(TreeType::Model),
            "csvimport" => Ok(TreeType::CsvImport),
            other => Err(ConfigError::InvalidValue {
                key: "treetype".to_string(),
                value: other.to_string(),
                reason: "expected 'model' or 'csvimport'".to_string(),
            }),
        }
    }
}

/// A credential that never shows up in logs or `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// The clear-text value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8069
}

fn default_dbname() -> String {
    "demo".to_string()
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_password() -> Secret {
    Secret::new("admin")
}

/// Everything resolved once at mount time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    #[serde(default, alias = "treetype")]
    pub tree_type: TreeType,
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_dbname")]
    pub dbname: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: Secret,
}

impl Default for MountConfig {
    fn default() -> Self {
        MountConfig {
            tree_type: TreeType::default(),
            server: default_server(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: default_password(),
        }
    }
}

impl MountConfig {
    /// Base URL of the remote store, e.g. `http://localhost:8069`.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.server, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_type_from_str() {
        assert_eq!("model".parse::<TreeType>().unwrap(), TreeType::Model);
        assert_eq!("csvimport".parse::<TreeType>().unwrap(), TreeType::CsvImport);
        assert_eq!(" CsvImport ".parse::<TreeType>().unwrap(), TreeType::CsvImport);
        assert!("flat".parse::<TreeType>().is_err());
    }

    #[test]
    fn test_tree_type_display_round_trips() {
        for tree in [TreeType::Model, TreeType::CsvImport] {
            assert_eq!(tree.to_string().parse::<TreeType>().unwrap(), tree);
        }
    }

    #[test]
    fn test_defaults_match_classic_mount_options() {
        let config = MountConfig::default();
        assert_eq!(config.tree_type, TreeType::Model);
        assert_eq!(config.server, "localhost");
        assert_eq!(config.port, 8069);
        assert_eq!(config.dbname, "demo");
        assert_eq!(config.user, "admin");
        assert_eq!(config.password.expose(), "admin");
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "hunter2");

        let config = MountConfig {
            password: secret,
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_endpoint() {
        let config = MountConfig {
            server: "erp.internal".to_string(),
            port: 8070,
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "http://erp.internal:8070");
    }
}
