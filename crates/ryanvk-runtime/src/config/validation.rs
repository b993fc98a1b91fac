//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ProtocolConfig, RyanvkConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RyanvkConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_protocols(&config.protocols)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if let Some(target) = logging.filters.keys().find(|t| t.is_empty() || t.contains('=')) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter target: '{target}'"
        )));
    }
    Ok(())
}

fn validate_protocols(protocols: &[ProtocolConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for protocol in protocols {
        if protocol.name.is_empty() {
            return Err(ConfigError::missing_field("protocols.name"));
        }
        if !seen.insert(protocol.name.as_str()) {
            return Err(ConfigError::DuplicateProtocol(protocol.name.clone()));
        }
        if protocol.collectors.is_empty() {
            return Err(ConfigError::validation(format!(
                "Protocol '{}' lists no collectors",
                protocol.name
            )));
        }
        if protocol.collectors.iter().any(|c| c.namespace.is_empty()) {
            return Err(ConfigError::missing_field(format!(
                "protocols.{}.collectors.namespace",
                protocol.name
            )));
        }
    }

    Ok(())
}
