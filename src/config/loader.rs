//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GateConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[events]\nbase_host = \"example.com\"\n[audit]\nlog_dir = \"/var/log/keys\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.events.base_host, "example.com");
        assert_eq!(config.audit.log_dir, "/var/log/keys");
    }

    #[test]
    fn test_load_reports_each_stage() {
        assert!(matches!(
            load_config(Path::new("/definitely/not/here.toml")),
            Err(ConfigError::Io(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[events\nbase_host =").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeouts]\nrequest_secs = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: timeouts.request_secs must be greater than zero"
        );
    }
}
