//! Connection settings layers
//!
//! A [`StorageSettings`] value is one *layer* of connection configuration in
//! which every option may be left unset. The credential resolver stacks
//! three layers (built-in defaults, the iRODS environment file, explicit
//! parameters) and merges them field by field.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default catalog port
pub const DEFAULT_PORT: u16 = 1247;

/// Default authentication scheme
pub const DEFAULT_AUTHENTICATION_SCHEME: &str = "native";

/// Default client/server negotiation policy (no TLS)
pub const DEFAULT_CLIENT_SERVER_POLICY: &str = "CS_NEG_REFUSE";

/// Default parallel transfer encryption parameters
pub const DEFAULT_ENCRYPTION_ALGORITHM: &str = "AES-256-CBC";
pub const DEFAULT_ENCRYPTION_KEY_SIZE: u32 = 32;
pub const DEFAULT_ENCRYPTION_NUM_HASH_ROUNDS: u32 = 16;
pub const DEFAULT_ENCRYPTION_SALT_SIZE: u32 = 8;

/// Default transport timeouts in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30000;

/// Default HTTP API port and base path
pub const DEFAULT_API_PORT: u16 = 9000;
pub const DEFAULT_API_BASE_PATH: &str = "/irods-http-api/0.3.0";

/// Server certificate verification mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslVerify {
    /// Accept any certificate
    None,
    /// Verify the certificate chain but not the host name
    Cert,
    /// Verify the certificate chain and the host name
    #[default]
    Hostname,
}

impl FromStr for SslVerify {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "false" | "off" => Ok(SslVerify::None),
            "cert" => Ok(SslVerify::Cert),
            "hostname" | "true" | "on" => Ok(SslVerify::Hostname),
            other => Err(Error::Config(format!(
                "Invalid ssl_verify value '{other}': expected none, cert or hostname"
            ))),
        }
    }
}

impl std::fmt::Display for SslVerify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SslVerify::None => "none",
            SslVerify::Cert => "cert",
            SslVerify::Hostname => "hostname",
        };
        f.write_str(s)
    }
}

/// A secret string that is never printed by `Debug`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// One layer of connection settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Catalog host name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Catalog port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// User name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,

    /// Pre-issued authentication token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<Secret>,

    /// Zone name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Home collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    /// Target resource for uploads and capacity queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Authentication scheme, e.g. `native` or `pam_password`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_scheme: Option<String>,

    /// Use TLS for the connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_enabled: Option<bool>,

    /// Certificate verification mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_verify: Option<SslVerify>,

    /// PEM file with additional trusted CA certificates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_ca_file: Option<PathBuf>,

    /// Location of `irods_environment.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_file_path: Option<PathBuf>,

    /// `request_server_negotiation` to negotiate TLS with the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_server_negotiation: Option<String>,

    /// `CS_NEG_REFUSE`, `CS_NEG_REQUIRE` or `CS_NEG_DONT_CARE`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_server_policy: Option<String>,

    /// Parallel transfer encryption algorithm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_algorithm: Option<String>,

    /// Parallel transfer encryption key size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key_size: Option<u32>,

    /// Parallel transfer encryption hash rounds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_num_hash_rounds: Option<u32>,

    /// Parallel transfer encryption salt size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_salt_size: Option<u32>,

    /// Connection timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,

    /// Read timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,

    /// Port of the HTTP API front end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_port: Option<u16>,

    /// Base path of the HTTP API front end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_path: Option<String>,
}

impl StorageSettings {
    /// The built-in defaults layer
    pub fn defaults() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            authentication_scheme: Some(DEFAULT_AUTHENTICATION_SCHEME.to_string()),
            ssl_enabled: Some(false),
            ssl_verify: Some(SslVerify::default()),
            client_server_policy: Some(DEFAULT_CLIENT_SERVER_POLICY.to_string()),
            encryption_algorithm: Some(DEFAULT_ENCRYPTION_ALGORITHM.to_string()),
            encryption_key_size: Some(DEFAULT_ENCRYPTION_KEY_SIZE),
            encryption_num_hash_rounds: Some(DEFAULT_ENCRYPTION_NUM_HASH_ROUNDS),
            encryption_salt_size: Some(DEFAULT_ENCRYPTION_SALT_SIZE),
            connect_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout_ms: Some(DEFAULT_READ_TIMEOUT_MS),
            api_port: Some(DEFAULT_API_PORT),
            api_base_path: Some(DEFAULT_API_BASE_PATH.to_string()),
            ..Default::default()
        }
    }

    /// Stack `higher` on top of `self`
    ///
    /// Every field set in `higher` wins; unset fields fall through to `self`.
    pub fn overlay(self, higher: StorageSettings) -> StorageSettings {
        StorageSettings {
            host: higher.host.or(self.host),
            port: higher.port.or(self.port),
            user: higher.user.or(self.user),
            password: higher.password.or(self.password),
            auth_token: higher.auth_token.or(self.auth_token),
            zone: higher.zone.or(self.zone),
            home: higher.home.or(self.home),
            resource: higher.resource.or(self.resource),
            authentication_scheme: higher.authentication_scheme.or(self.authentication_scheme),
            ssl_enabled: higher.ssl_enabled.or(self.ssl_enabled),
            ssl_verify: higher.ssl_verify.or(self.ssl_verify),
            ssl_ca_file: higher.ssl_ca_file.or(self.ssl_ca_file),
            environment_file_path: higher.environment_file_path.or(self.environment_file_path),
            client_server_negotiation: higher
                .client_server_negotiation
                .or(self.client_server_negotiation),
            client_server_policy: higher.client_server_policy.or(self.client_server_policy),
            encryption_algorithm: higher.encryption_algorithm.or(self.encryption_algorithm),
            encryption_key_size: higher.encryption_key_size.or(self.encryption_key_size),
            encryption_num_hash_rounds: higher
                .encryption_num_hash_rounds
                .or(self.encryption_num_hash_rounds),
            encryption_salt_size: higher.encryption_salt_size.or(self.encryption_salt_size),
            connect_timeout_ms: higher.connect_timeout_ms.or(self.connect_timeout_ms),
            read_timeout_ms: higher.read_timeout_ms.or(self.read_timeout_ms),
            api_port: higher.api_port.or(self.api_port),
            api_base_path: higher.api_base_path.or(self.api_base_path),
        }
    }

    /// Password, if set and non-empty
    pub fn usable_password(&self) -> Option<&Secret> {
        self.password.as_ref().filter(|p| !p.is_empty())
    }

    /// Token, if set and non-empty
    pub fn usable_token(&self) -> Option<&Secret> {
        self.auth_token.as_ref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_layer() {
        let defaults = StorageSettings::defaults();
        assert_eq!(defaults.port, Some(1247));
        assert_eq!(defaults.authentication_scheme.as_deref(), Some("native"));
        assert_eq!(defaults.ssl_enabled, Some(false));
        assert_eq!(defaults.ssl_verify, Some(SslVerify::Hostname));
        assert!(defaults.host.is_none());
        assert!(defaults.password.is_none());
    }

    #[test]
    fn test_overlay_higher_wins_per_field() {
        let lower = StorageSettings {
            host: Some("lower.example.org".into()),
            zone: Some("lowerZone".into()),
            port: Some(1247),
            ..Default::default()
        };
        let higher = StorageSettings {
            host: Some("higher.example.org".into()),
            password: Some(Secret::new("pw")),
            ..Default::default()
        };

        let merged = lower.overlay(higher);
        assert_eq!(merged.host.as_deref(), Some("higher.example.org"));
        assert_eq!(merged.zone.as_deref(), Some("lowerZone"));
        assert_eq!(merged.port, Some(1247));
        assert_eq!(merged.password.as_ref().map(Secret::expose), Some("pw"));
    }

    #[test]
    fn test_ssl_verify_from_str() {
        assert_eq!("none".parse::<SslVerify>().unwrap(), SslVerify::None);
        assert_eq!("false".parse::<SslVerify>().unwrap(), SslVerify::None);
        assert_eq!("cert".parse::<SslVerify>().unwrap(), SslVerify::Cert);
        assert_eq!("Hostname".parse::<SslVerify>().unwrap(), SslVerify::Hostname);
        assert_eq!("true".parse::<SslVerify>().unwrap(), SslVerify::Hostname);
        assert!("sometimes".parse::<SslVerify>().is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let settings = StorageSettings {
            password: Some(Secret::new("hunter2")),
            ..Default::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_empty_secrets_are_not_usable() {
        let settings = StorageSettings {
            password: Some(Secret::new("")),
            auth_token: Some(Secret::new("")),
            ..Default::default()
        };
        assert!(settings.usable_password().is_none());
        assert!(settings.usable_token().is_none());
    }

    #[test]
    fn test_toml_layer_roundtrip_skips_unset() {
        let settings = StorageSettings {
            host: Some("irods.example.org".into()),
            ssl_verify: Some(SslVerify::Cert),
            ..Default::default()
        };
        let text = toml::to_string(&settings).unwrap();
        assert!(text.contains("host = \"irods.example.org\""));
        assert!(text.contains("ssl_verify = \"cert\""));
        assert!(!text.contains("port"));
    }
}
