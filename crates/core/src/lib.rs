//! irs-core: iRODS storage adapter for workflow engines
//!
//! This crate provides the transport-independent parts of the adapter:
//! - Connection settings, the iRODS environment file and credential resolution
//! - The shared session manager
//! - Remote object operations (exists, size, mtime, checksum, transfers)
//! - Catalog timestamp normalization
//! - Resource capacity reporting
//!
//! The catalog itself is reached through the [`Connector`] and [`Catalog`]
//! traits; `irs-http` implements them for the iRODS HTTP API.

pub mod config;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod object;
pub mod path;
pub mod provider;
pub mod quota;
pub mod session;
pub mod settings;
pub mod timestamp;
pub mod traits;

pub use config::{Config, ConfigManager};
pub use credentials::{
    AuthMethod, ConnectionDescriptor, CredentialResolver, EncryptionParams, TlsPolicy,
};
pub use environment::IrodsEnvironment;
pub use error::{Error, Result};
pub use object::{Checksum, RemoteObject, TransferSummary};
pub use path::{LogicalPath, is_valid_query, parse_query};
pub use provider::{ExampleQuery, QueryType, StorageProvider};
pub use quota::QuotaReporter;
pub use session::{Session, SessionManager};
pub use settings::{Secret, SslVerify, StorageSettings};
pub use timestamp::CatalogTime;
pub use traits::{Catalog, CatalogEntry, Connector, EntryKind};
