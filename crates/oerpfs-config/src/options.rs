//! FUSE-style `-o key=value,key=value` mount option strings.

use crate::types::{MountConfig, Secret};
use crate::ConfigError;

/// Option keys understood by [`MountConfig::apply_options`].
pub const OPTION_KEYS: &[&str] = &[
    "treetype",
    "oerp_server",
    "oerp_port",
    "oerp_dbname",
    "oerp_user",
    "oerp_passwd",
];

impl MountConfig {
    /// Apply a comma-separated option string on top of this config.
    ///
    /// Empty items are skipped. Every item must be `key=value` with a key
    /// from [`OPTION_KEYS`].
    pub fn apply_options(&mut self, options: &str) -> Result<(), ConfigError> {
        for item in options.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidOption(item.to_string()))?;
            self.apply_option(key.trim(), value.trim())?;
        }
        Ok(())
    }

    fn apply_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "treetype" => self.tree_type = value.parse()?,
            "oerp_server" => self.server = value.to_string(),
            "oerp_port" => {
                self.port = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "expected a TCP port number".to_string(),
                })?
            }
            "oerp_dbname" => self.dbname = value.to_string(),
            "oerp_user" => self.user = value.to_string(),
            "oerp_passwd" => self.password = Secret::new(value),
            _ => return Err(ConfigError::InvalidOption(key.to_string())),
        }
        Ok(())
    }
}
