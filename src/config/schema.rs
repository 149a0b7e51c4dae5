//! Configuration file schema.
//!
//! All types derive Serde traits for deserialization from TOML files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cipher::AesPool;
use crate::config::Config;
use crate::error::Result;
use crate::net::tls::{self, TlsSettings};

/// Root of a configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SocketConfig {
    /// Server side: bind address and TLS termination.
    pub listener: ListenerConfig,

    /// Client side: dial target and TLS trust.
    pub client: ClientConfig,

    pub timeouts: TimeoutConfig,

    /// In-house stream cipher. Absent means TLS (if any) is the only
    /// protection.
    pub cipher: Option<CipherConfig>,

    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7000" or ":7000").
    pub bind_address: String,

    /// Optional TLS termination.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7000".to_string(),
            tls: None,
        }
    }
}

/// Server certificate for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain (PEM).
    pub cert_path: String,

    /// Path to private key (PEM).
    pub key_path: String,
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address to dial (e.g., "127.0.0.1:7000").
    pub address: String,

    /// Dial with TLS, trusting the certificates in this PEM file.
    pub ca_path: Option<String>,

    /// Name to verify the server certificate against; defaults to the host
    /// part of `address`.
    pub server_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7000".to_string(),
            ca_path: None,
            server_name: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle timeout in milliseconds; 0 disables it.
    pub idle_ms: u64,
}

/// Stream cipher configuration.
#[derive(Clone, Deserialize, Serialize)]
pub struct CipherConfig {
    /// AES key: 16, 24 or 32 bytes of UTF-8 text.
    pub key: String,
}

impl std::fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherConfig")
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset (e.g. "info", "socketkit=debug").
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl SocketConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.idle_ms)
    }

    /// Runtime config for a server, loading the listener certificate if set.
    pub fn server_config(&self) -> Result<Config> {
        let mut config = self.base_config()?;
        if let Some(tls_config) = &self.listener.tls {
            let server = tls::server_config_from_pem(
                Path::new(&tls_config.cert_path),
                Path::new(&tls_config.key_path),
            )?;
            config = config.with_tls(TlsSettings::server(server));
        }
        Ok(config)
    }

    /// Runtime config for a client, loading the trusted CA file if set.
    pub fn client_config(&self) -> Result<Config> {
        let mut config = self.base_config()?;
        if let Some(ca_path) = &self.client.ca_path {
            let mut settings = TlsSettings::client(tls::client_config_from_pem(Path::new(ca_path))?);
            settings.server_name = self.client.server_name.clone();
            config = config.with_tls(settings);
        }
        Ok(config)
    }

    fn base_config(&self) -> Result<Config> {
        let mut config = Config::default().with_idle_timeout(self.idle_timeout());
        if let Some(cipher) = &self.cipher {
            config = config.with_cipher(AesPool::new(cipher.key.as_bytes())?);
        }
        Ok(config)
    }
}
