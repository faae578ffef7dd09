use crate::types::MountConfig;
use crate::ConfigError;

impl MountConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.trim().is_empty() {
            errors.push(ConfigError::InvalidConfig(
                "server must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            errors.push(ConfigError::InvalidConfig(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        if self.dbname.trim().is_empty() {
            errors.push(ConfigError::InvalidConfig(
                "dbname must not be empty".to_string(),
            ));
        }

        if self.user.trim().is_empty() {
            errors.push(ConfigError::InvalidConfig(
                "user must not be empty".to_string(),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
