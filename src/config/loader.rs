//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::SocketConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
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
pub fn load_config(path: &Path) -> Result<SocketConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<SocketConfig, ConfigError> {
    let config: SocketConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:7000");
        assert!(config.listener.tls.is_none());
        assert!(config.cipher.is_none());
        assert_eq!(config.idle_timeout(), Duration::ZERO);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn full_file_parses() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = ":9000"

            [listener.tls]
            cert_path = "cert.pem"
            key_path = "key.pem"

            [client]
            address = "localhost:9000"
            ca_path = "ca.pem"
            server_name = "localhost"

            [timeouts]
            idle_ms = 250

            [cipher]
            key = "example key 1234"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, ":9000");
        assert_eq!(config.listener.tls.as_ref().unwrap().key_path, "key.pem");
        assert_eq!(config.client.server_name.as_deref(), Some("localhost"));
        assert_eq!(config.idle_timeout(), Duration::from_millis(250));
        assert_eq!(config.cipher.as_ref().unwrap().key.len(), 16);
    }

    #[test]
    fn runtime_config_carries_cipher_and_timeout() {
        let config = parse_config(
            r#"
            [timeouts]
            idle_ms = 100
            [cipher]
            key = "0123456789abcdef0123456789abcdef"
            "#,
        )
        .unwrap();

        let runtime = config.server_config().unwrap();
        assert!(runtime.cipher.is_some());
        assert!(runtime.tls.is_none());
        assert_eq!(runtime.idle_timeout, Duration::from_millis(100));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = parse_config("[listener\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_errors_are_collected() {
        let err = parse_config(
            r#"
            [listener]
            bind_address = ""
            [cipher]
            key = "short"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/socketkit.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
