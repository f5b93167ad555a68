//! Configuration validation utilities.

use std::collections::HashSet;

use skein_transport::TextDecoder;

use super::error::{ConfigError, ConfigResult};
use super::schema::{ConnectionConfig, LogOutput, ReconnectConfig, SkeinConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SkeinConfig) -> ConfigResult<()> {
    validate_logging(config)?;
    validate_connections(&config.connections)?;

    if config.plugins.scan_interval_secs == 0 {
        return Err(ConfigError::validation(
            "plugins.scan_interval_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging(config: &SkeinConfig) -> ConfigResult<()> {
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if let Some(module) = config.logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module: {module:?}"
        )));
    }
    Ok(())
}

fn validate_reconnect(name: &str, reconnect: &ReconnectConfig) -> ConfigResult<()> {
    if reconnect.initial_delay_ms == 0 {
        return Err(ConfigError::validation(format!(
            "{name}: initial reconnect delay must be greater than 0"
        )));
    }
    if reconnect.max_delay_ms < reconnect.initial_delay_ms {
        return Err(ConfigError::validation(format!(
            "{name}: max reconnect delay must be greater than or equal to initial delay"
        )));
    }
    if reconnect.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(format!(
            "{name}: backoff multiplier must be at least 1.0"
        )));
    }
    Ok(())
}

fn validate_connections(connections: &[ConnectionConfig]) -> ConfigResult<()> {
    if connections.is_empty() {
        return Err(ConfigError::validation("At least one connection is required"));
    }

    let mut seen = HashSet::new();
    for conn in connections {
        if !seen.insert(conn.name.to_lowercase()) {
            return Err(ConfigError::DuplicateConnection(conn.name.clone()));
        }
        validate_connection(conn)?;
    }
    Ok(())
}

fn validate_connection(conn: &ConnectionConfig) -> ConfigResult<()> {
    if conn.name.trim().is_empty() {
        return Err(ConfigError::missing_field("connections.name"));
    }
    let name = conn.name.as_str();

    if conn.server.trim().is_empty() {
        return Err(ConfigError::missing_field(format!("{name}.server")));
    }
    if conn.port == 0 {
        return Err(ConfigError::InvalidPort {
            connection: name.to_owned(),
            port: conn.port,
        });
    }
    if conn.nick.is_empty() {
        return Err(ConfigError::missing_field(format!("{name}.nick")));
    }
    if conn.nick.contains(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "{name}: nick cannot contain spaces"
        )));
    }
    if conn.command_prefix.is_empty() {
        return Err(ConfigError::validation(format!(
            "{name}: command_prefix cannot be empty"
        )));
    }
    if conn.timeout_secs == 0 {
        return Err(ConfigError::validation(format!(
            "{name}: timeout_secs must be greater than 0"
        )));
    }
    if let Some(label) = conn.encodings.iter().find(|l| !TextDecoder::is_known_label(l)) {
        return Err(ConfigError::validation(format!(
            "{name}: unknown encoding {label:?}"
        )));
    }
    validate_reconnect(name, &conn.reconnect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SkeinConfig {
        SkeinConfig {
            connections: vec![ConnectionConfig::new("libera", "irc.libera.chat", "skein")],
            ..SkeinConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_requires_a_connection() {
        assert!(validate_config(&SkeinConfig::default()).is_err());
    }

    #[test]
    fn test_duplicate_connection_name() {
        let mut config = config();
        let dup = ConnectionConfig::new("Libera", "irc.libera.chat", "other");
        config.connections.push(dup);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateConnection(name)) if name == "Libera"
        ));
    }

    #[test]
    fn test_rejects_bad_connection_fields() {
        let cases: Vec<fn(&mut ConnectionConfig)> = vec![
            |c| c.server.clear(),
            |c| c.port = 0,
            |c| c.nick = "two words".into(),
            |c| c.command_prefix.clear(),
            |c| c.timeout_secs = 0,
            |c| c.encodings.push("klingon".into()),
            |c| c.reconnect.backoff_multiplier = 0.5,
            |c| c.reconnect.max_delay_ms = 1,
        ];
        for mutate in cases {
            let mut config = config();
            mutate(&mut config.connections[0]);
            assert!(validate_config(&config).is_err());
        }
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = config();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
