//! iRODS environment file support
//!
//! Reads the `irods_environment.json` file maintained by the iRODS client
//! tools and turns it into a settings layer. The file is never written.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::settings::{Secret, SslVerify, StorageSettings};

/// Environment variable overriding the environment file location
pub const ENVIRONMENT_FILE_VAR: &str = "IRODS_ENVIRONMENT_FILE";

/// Environment variable overriding the cached authentication file location
pub const AUTHENTICATION_FILE_VAR: &str = "IRODS_AUTHENTICATION_FILE";

/// Negotiation value requesting TLS negotiation with the server
pub const REQUEST_SERVER_NEGOTIATION: &str = "request_server_negotiation";

/// Policy value that makes TLS mandatory
pub const CS_NEG_REQUIRE: &str = "CS_NEG_REQUIRE";

/// Contents of `irods_environment.json`
///
/// Only the keys the adapter understands are read; anything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IrodsEnvironment {
    #[serde(rename = "irods_host")]
    pub host: Option<String>,

    #[serde(rename = "irods_port")]
    pub port: Option<u16>,

    #[serde(rename = "irods_user_name")]
    pub user_name: Option<String>,

    #[serde(rename = "irods_password")]
    pub password: Option<String>,

    #[serde(rename = "irods_zone_name")]
    pub zone_name: Option<String>,

    #[serde(rename = "irods_home")]
    pub home: Option<String>,

    #[serde(rename = "irods_default_resource")]
    pub default_resource: Option<String>,

    #[serde(rename = "irods_authentication_scheme")]
    pub authentication_scheme: Option<String>,

    #[serde(rename = "irods_encryption_algorithm")]
    pub encryption_algorithm: Option<String>,

    #[serde(rename = "irods_encryption_key_size")]
    pub encryption_key_size: Option<u32>,

    #[serde(rename = "irods_encryption_num_hash_rounds")]
    pub encryption_num_hash_rounds: Option<u32>,

    #[serde(rename = "irods_encryption_salt_size")]
    pub encryption_salt_size: Option<u32>,

    #[serde(rename = "irods_client_server_negotiation")]
    pub client_server_negotiation: Option<String>,

    #[serde(rename = "irods_client_server_policy")]
    pub client_server_policy: Option<String>,

    #[serde(rename = "irods_ssl_verify_server")]
    pub ssl_verify_server: Option<String>,

    #[serde(rename = "irods_ssl_ca_certificate_file")]
    pub ssl_ca_certificate_file: Option<PathBuf>,
}

impl IrodsEnvironment {
    /// Parse the JSON content of an environment file
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid iRODS environment file: {e}")))
    }

    /// Load an environment file
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Cannot read iRODS environment file {}: {e}",
                    path.display()
                )));
            }
        };

        tracing::debug!(path = %path.display(), "Loaded iRODS environment file");
        Self::from_json(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
    }

    /// Whether the file asks for a mandatory TLS connection
    pub fn requires_tls(&self) -> bool {
        self.client_server_negotiation.as_deref() == Some(REQUEST_SERVER_NEGOTIATION)
            && self.client_server_policy.as_deref() == Some(CS_NEG_REQUIRE)
    }

    /// Convert into a settings layer
    pub fn into_settings(self) -> Result<StorageSettings> {
        let ssl_enabled = self.requires_tls().then_some(true);
        let ssl_verify = self
            .ssl_verify_server
            .as_deref()
            .map(str::parse::<SslVerify>)
            .transpose()?;

        Ok(StorageSettings {
            host: self.host,
            port: self.port,
            user: self.user_name,
            password: self.password.map(Secret::new),
            zone: self.zone_name,
            home: self.home,
            resource: self.default_resource,
            authentication_scheme: self.authentication_scheme,
            ssl_enabled,
            ssl_verify,
            ssl_ca_file: self.ssl_ca_certificate_file,
            client_server_negotiation: self.client_server_negotiation,
            client_server_policy: self.client_server_policy,
            encryption_algorithm: self.encryption_algorithm,
            encryption_key_size: self.encryption_key_size,
            encryption_num_hash_rounds: self.encryption_num_hash_rounds,
            encryption_salt_size: self.encryption_salt_size,
            ..Default::default()
        })
    }
}

/// Default location of the environment file
pub fn default_environment_file() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(ENVIRONMENT_FILE_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".irods").join("irods_environment.json"))
}

/// Default location of the cached authentication file (`.irodsA`)
pub fn default_authentication_file() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(AUTHENTICATION_FILE_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".irods").join(".irodsA"))
}
