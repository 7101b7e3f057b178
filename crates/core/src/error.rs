//! Error types for irs-core
//!
//! Provides a unified error type that the orchestration layer can classify
//! and that the CLI converts to exit codes.

use thiserror::Error;

/// Result type alias for irs-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for irs-core operations
///
/// Variants that refer to a remote object carry its logical path and the
/// server's error text verbatim.
#[derive(Error, Debug)]
pub enum Error {
    /// Unresolvable credentials or required connection fields
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials rejected by the catalog
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network or TLS failure, including transport loss mid-session
    #[error("Connection error for {path}: {message}")]
    Connection { path: String, message: String },

    /// Data object or collection does not exist
    #[error("Not found: {path}: {message}")]
    NotFound { path: String, message: String },

    /// Local file system failure during a transfer
    #[error("IO error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The resource rejected a write because it is out of capacity
    #[error("Quota exceeded for {path}: {message}")]
    QuotaExceeded { path: String, message: String },

    /// The authenticated user may not access the path
    #[error("Permission denied for {path}: {message}")]
    PermissionDenied { path: String, message: String },

    /// Invalid logical path or query
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Build a connection error for a path
    pub fn connection(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Connection {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build a not-found error for a path
    pub fn not_found(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NotFound {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build a local IO error for a path
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether this error denotes an absent object or collection
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether the orchestration layer may retry the failed call
    ///
    /// Only transport failures qualify. Nothing in this crate retries.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::Config(_) => 2,  // UsageError
            Error::Connection { .. } => 3,                  // NetworkError
            Error::Auth(_) | Error::PermissionDenied { .. } => 4, // AuthError
            Error::NotFound { .. } => 5,                    // NotFound
            Error::QuotaExceeded { .. } => 6,               // QuotaExceeded
            _ => 1,                                         // GeneralError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidPath("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::connection("/z/a", "reset").exit_code(), 3);
        assert_eq!(Error::Auth("test".into()).exit_code(), 4);
        assert_eq!(
            Error::PermissionDenied {
                path: "/z".into(),
                message: "CAT_NO_ACCESS_PERMISSION".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::not_found("/z/a", "absent").exit_code(), 5);
        assert_eq!(
            Error::QuotaExceeded {
                path: "/z/a".into(),
                message: "full".into()
            }
            .exit_code(),
            6
        );
        assert_eq!(Error::General("test".into()).exit_code(), 1);
    }

    #[test]
    fn test_error_display_carries_path_and_server_text() {
        let err = Error::not_found("/tempZone/home/alice/x.txt", "CAT_NO_ROWS_FOUND");
        assert_eq!(
            err.to_string(),
            "Not found: /tempZone/home/alice/x.txt: CAT_NO_ROWS_FOUND"
        );

        let err = Error::connection("/tempZone/a", "connection refused");
        assert_eq!(
            err.to_string(),
            "Connection error for /tempZone/a: connection refused"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::not_found("/z/a", "").is_not_found());
        assert!(!Error::Auth("bad".into()).is_not_found());
        assert!(Error::connection("/z/a", "timeout").is_retryable());
        assert!(!Error::Auth("bad".into()).is_retryable());
        assert!(!Error::Config("missing host".into()).is_retryable());
    }

    #[test]
    fn test_io_error_keeps_local_path() {
        let err = Error::io(
            "/tmp/out/file.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/out/file.txt"));
        assert_eq!(err.exit_code(), 1);
    }
}
