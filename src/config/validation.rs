//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (cipher key length, non-empty addresses and paths)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SocketConfig → Result<(), Vec<ValidationError>>

use crate::config::schema::SocketConfig;

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} {value:?} is not a host:port address")]
    BadAddress { field: &'static str, value: String },
    #[error("cipher.key must be 16, 24 or 32 bytes, got {0}")]
    CipherKeyLength(usize),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &SocketConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "client.address", &config.client.address);

    if let Some(tls) = &config.listener.tls {
        check_non_empty(&mut errors, "listener.tls.cert_path", &tls.cert_path);
        check_non_empty(&mut errors, "listener.tls.key_path", &tls.key_path);
    }
    if let Some(ca_path) = &config.client.ca_path {
        check_non_empty(&mut errors, "client.ca_path", ca_path);
    }

    if let Some(cipher) = &config.cipher {
        let len = cipher.key.len();
        if !matches!(len, 16 | 24 | 32) {
            errors.push(ValidationError::CipherKeyLength(len));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_non_empty(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Empty { field });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Empty { field });
        return;
    }
    let valid_port = value
        .rsplit_once(':')
        .map(|(_, port)| port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !valid_port {
        errors.push(ValidationError::BadAddress {
            field,
            value: value.to_string(),
        });
    }
}
