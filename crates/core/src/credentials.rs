//! Credential resolution
//!
//! Produces the single [`ConnectionDescriptor`] a process connects with.
//! Layers are merged field by field in a fixed order:
//!
//! 1. built-in defaults
//! 2. the iRODS environment file
//! 3. explicit parameters for this invocation
//!
//! A later layer only replaces the fields it actually sets, so a user can
//! pass just a password while host, zone and user come from the
//! environment file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::environment::{self, IrodsEnvironment};
use crate::error::{Error, Result};
use crate::path::LogicalPath;
use crate::settings::{
    DEFAULT_API_BASE_PATH, DEFAULT_API_PORT, DEFAULT_AUTHENTICATION_SCHEME,
    DEFAULT_CLIENT_SERVER_POLICY, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_ENCRYPTION_ALGORITHM,
    DEFAULT_ENCRYPTION_KEY_SIZE, DEFAULT_ENCRYPTION_NUM_HASH_ROUNDS,
    DEFAULT_ENCRYPTION_SALT_SIZE, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS, Secret, SslVerify,
    StorageSettings,
};

/// The one authentication mechanism a descriptor uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Password for the configured scheme
    Password(Secret),
    /// Pre-issued token, used as-is
    Token(Secret),
    /// Obfuscated password cached by the client tools (`.irodsA`)
    CachedAuthFile(PathBuf),
}

impl AuthMethod {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::Token(_) => "token",
            AuthMethod::CachedAuthFile(_) => "cached-auth-file",
        }
    }
}

/// Parallel transfer encryption parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParams {
    pub algorithm: String,
    pub key_size: u32,
    pub num_hash_rounds: u32,
    pub salt_size: u32,
}

/// Transport security policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    /// Connect over TLS
    pub enabled: bool,
    /// Certificate verification mode
    pub verify: SslVerify,
    /// Extra trusted CA certificates (PEM)
    pub ca_file: Option<PathBuf>,
    /// Negotiation request sent to the server
    pub client_server_negotiation: Option<String>,
    /// Client side negotiation policy
    pub client_server_policy: String,
    /// Parallel transfer encryption
    pub encryption: EncryptionParams,
}

/// Fully resolved connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub zone: String,
    /// Absent only for token authentication
    pub user: Option<String>,
    pub home: Option<String>,
    pub resource: Option<String>,
    pub authentication_scheme: String,
    pub auth: AuthMethod,
    pub tls: TlsPolicy,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub api_port: u16,
    pub api_base_path: String,
}

impl ConnectionDescriptor {
    /// The home collection: configured, else `/<zone>/home/<user>`, else `/<zone>`
    pub fn home_collection(&self) -> Result<LogicalPath> {
        match (&self.home, &self.user) {
            (Some(home), _) => LogicalPath::new(home),
            (None, Some(user)) => LogicalPath::new(format!("/{}/home/{user}", self.zone)),
            (None, None) => LogicalPath::new(format!("/{}", self.zone)),
        }
    }
}

/// Merges explicit settings with the environment file and defaults
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    environment_file: Option<PathBuf>,
    authentication_file: Option<PathBuf>,
}

impl CredentialResolver {
    /// Create a resolver using the standard file locations
    pub fn new() -> Self {
        Self {
            environment_file: environment::default_environment_file(),
            authentication_file: environment::default_authentication_file(),
        }
    }

    /// Create a resolver with custom file locations (useful for testing)
    pub fn with_paths(
        environment_file: Option<PathBuf>,
        authentication_file: Option<PathBuf>,
    ) -> Self {
        Self {
            environment_file,
            authentication_file,
        }
    }

    /// Resolve explicit settings into a descriptor
    pub fn resolve(&self, explicit: &StorageSettings) -> Result<ConnectionDescriptor> {
        let environment = self.load_environment(explicit)?;
        resolve_layers(
            explicit,
            &environment,
            self.authentication_file.as_deref(),
        )
    }

    fn load_environment(&self, explicit: &StorageSettings) -> Result<StorageSettings> {
        // An explicitly named file must exist; the default location may not.
        if let Some(path) = &explicit.environment_file_path {
            return match IrodsEnvironment::load(path)? {
                Some(env) => env.into_settings(),
                None => Err(Error::Config(format!(
                    "iRODS environment file not found: {}",
                    path.display()
                ))),
            };
        }

        match &self.environment_file {
            Some(path) => IrodsEnvironment::load(path)?
                .map(IrodsEnvironment::into_settings)
                .transpose()
                .map(Option::unwrap_or_default),
            None => Ok(StorageSettings::default()),
        }
    }
}

/// Merge the three layers and validate the result
///
/// Kept free of file loading so the precedence rules can be tested directly.
pub fn resolve_layers(
    explicit: &StorageSettings,
    environment: &StorageSettings,
    authentication_file: Option<&Path>,
) -> Result<ConnectionDescriptor> {
    let merged = StorageSettings::defaults()
        .overlay(environment.clone())
        .overlay(explicit.clone());

    let host = required(merged.host.clone(), "host")?;
    let zone = required(merged.zone.clone(), "zone")?;
    let (auth, authentication_scheme) =
        select_auth(explicit, environment, &merged, authentication_file)?;

    let user = merged.user.clone().filter(|u| !u.is_empty());
    if user.is_none() && !matches!(auth, AuthMethod::Token(_)) {
        return Err(Error::Config(
            "No user name configured: set 'user' or irods_user_name".into(),
        ));
    }

    let tls = TlsPolicy {
        enabled: merged.ssl_enabled.unwrap_or(false),
        verify: merged.ssl_verify.unwrap_or_default(),
        ca_file: merged.ssl_ca_file.clone(),
        client_server_negotiation: merged.client_server_negotiation.clone(),
        client_server_policy: merged
            .client_server_policy
            .clone()
            .unwrap_or_else(|| DEFAULT_CLIENT_SERVER_POLICY.to_string()),
        encryption: EncryptionParams {
            algorithm: merged
                .encryption_algorithm
                .clone()
                .unwrap_or_else(|| DEFAULT_ENCRYPTION_ALGORITHM.to_string()),
            key_size: merged
                .encryption_key_size
                .unwrap_or(DEFAULT_ENCRYPTION_KEY_SIZE),
            num_hash_rounds: merged
                .encryption_num_hash_rounds
                .unwrap_or(DEFAULT_ENCRYPTION_NUM_HASH_ROUNDS),
            salt_size: merged
                .encryption_salt_size
                .unwrap_or(DEFAULT_ENCRYPTION_SALT_SIZE),
        },
    };

    let descriptor = ConnectionDescriptor {
        host,
        port: merged.port.unwrap_or(DEFAULT_PORT),
        zone,
        user,
        home: merged.home.clone(),
        resource: merged.resource.clone(),
        authentication_scheme,
        auth,
        tls,
        connect_timeout: Duration::from_millis(
            merged.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        ),
        read_timeout: Duration::from_millis(
            merged.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
        ),
        api_port: merged.api_port.unwrap_or(DEFAULT_API_PORT),
        api_base_path: merged
            .api_base_path
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_PATH.to_string()),
    };

    tracing::debug!(
        host = %descriptor.host,
        zone = %descriptor.zone,
        auth = descriptor.auth.kind(),
        tls = descriptor.tls.enabled,
        "Resolved connection descriptor"
    );

    Ok(descriptor)
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        Error::Config(format!(
            "Required setting '{field}' is not set explicitly or in the iRODS environment file"
        ))
    })
}

// The highest layer that carries a password or token decides the mechanism;
// within one layer a password wins over a token. The cached file is only a
// fallback and always implies native authentication.
fn select_auth(
    explicit: &StorageSettings,
    environment: &StorageSettings,
    merged: &StorageSettings,
    authentication_file: Option<&Path>,
) -> Result<(AuthMethod, String)> {
    let scheme = merged
        .authentication_scheme
        .clone()
        .unwrap_or_else(|| DEFAULT_AUTHENTICATION_SCHEME.to_string());

    for layer in [explicit, environment] {
        if let Some(password) = layer.usable_password() {
            return Ok((AuthMethod::Password(password.clone()), scheme));
        }
        if let Some(token) = layer.usable_token() {
            return Ok((AuthMethod::Token(token.clone()), scheme));
        }
    }

    let cached = authentication_file.filter(|path| path.is_file());
    match cached {
        Some(path) => {
            let requested = explicit
                .authentication_scheme
                .as_deref()
                .filter(|s| !s.eq_ignore_ascii_case(DEFAULT_AUTHENTICATION_SCHEME));
            if let Some(requested) = requested {
                return Err(Error::Config(format!(
                    "Authentication scheme '{requested}' needs a password; the cached authentication file {} only supports native authentication",
                    path.display()
                )));
            }
            Ok((
                AuthMethod::CachedAuthFile(path.to_path_buf()),
                DEFAULT_AUTHENTICATION_SCHEME.to_string(),
            ))
        }
        None => Err(Error::Config(
            "No usable authentication: no password or token in the settings or environment file, and no cached authentication file (~/.irods/.irodsA)".into(),
        )),
    }
}

/// Rotation sequences of the client tools' password scrambler
const SCRAMBLE_SEQUENCES: [u32; 6] = [
    0xd768_b678,
    0xedfd_af56,
    0x2420_231b,
    0x2a04_b3a2,
    0xe19f_b54f,
    0x13cc_57be,
];

/// Characters the scrambler rotates; anything else is stored as-is
const SCRAMBLE_WHEEL: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!\"#$%&'()*+,-./";

/// Read and unscramble the password cached by `iinit`
///
/// The scramble is salted with the uid of the user who wrote it, taken here
/// from the file owner.
pub fn read_cached_password(path: &Path) -> Result<Secret> {
    let unreadable = |e: std::io::Error| {
        Error::Config(format!(
            "Cannot read cached authentication file {}: {e}",
            path.display()
        ))
    };
    let scrambled = std::fs::read_to_string(path).map_err(unreadable)?;
    let uid = owner_uid(&std::fs::metadata(path).map_err(unreadable)?);

    decode_obfuscated_password(scrambled.trim_end_matches(['\r', '\n']), uid)
        .map(Secret::new)
        .map_err(|_| {
            Error::Config(format!(
                "Malformed cached authentication file {}",
                path.display()
            ))
        })
}

/// Unscramble a password in the `.irodsA` format for `uid`
///
/// Characters 0-5 carry a timestamp that is not needed here, character 6
/// selects the rotation sequence, the password follows.
pub fn decode_obfuscated_password(scrambled: &str, uid: u32) -> Result<String> {
    let invalid = || Error::Config("Malformed cached authentication file".to_string());

    let selector = scrambled.chars().nth(6).ok_or_else(invalid)?;
    let sequence = u32::from(selector)
        .checked_sub(u32::from('e'))
        .and_then(|index| SCRAMBLE_SEQUENCES.get(index as usize))
        .copied()
        .ok_or_else(invalid)?;

    let wheel_len = SCRAMBLE_WHEEL.len() as u32;
    let salt = uid & 0xf5f;
    let mut shift = 15;
    let mut password = String::new();

    for c in scrambled.chars().skip(7).take_while(|&c| c != '\0') {
        let offset = ((sequence >> shift) & 0x1f) + salt;
        shift += 3;
        if shift > 28 {
            shift = 0;
        }

        let position = u8::try_from(c)
            .ok()
            .and_then(|b| SCRAMBLE_WHEEL.iter().position(|&w| w == b));
        match position {
            Some(position) => {
                let index = (position as u32 + wheel_len - offset % wheel_len) % wheel_len;
                password.push(char::from(SCRAMBLE_WHEEL[index as usize]));
            }
            None => password.push(c),
        }
    }

    Ok(password)
}

#[cfg(unix)]
fn owner_uid(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.uid()
}

#[cfg(not(unix))]
fn owner_uid(_metadata: &std::fs::Metadata) -> u32 {
    0
}
