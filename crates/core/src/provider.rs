//! Storage provider entry point
//!
//! The provider is what the orchestration layer holds on to: it resolves the
//! settings once, owns the [`SessionManager`] and maps queries to objects.

use std::sync::Arc;

use serde::Serialize;

use crate::credentials::{ConnectionDescriptor, CredentialResolver};
use crate::error::Result;
use crate::object::RemoteObject;
use crate::path::{self, QUERY_SCHEME};
use crate::session::SessionManager;
use crate::settings::StorageSettings;
use crate::traits::Connector;

/// Default request rate per rate limiter key
pub const DEFAULT_MAX_REQUESTS_PER_SECOND: f64 = 10.0;

/// What an example query addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Input,
    Output,
    Any,
}

/// A documented query form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleQuery {
    pub query: String,
    pub description: String,
    pub query_type: QueryType,
}

/// iRODS storage provider
pub struct StorageProvider {
    sessions: SessionManager,
}

impl StorageProvider {
    /// Resolve `settings` with the standard file locations
    ///
    /// Configuration errors surface here, before any connection is attempted.
    pub fn new(settings: &StorageSettings, connector: Arc<dyn Connector>) -> Result<Self> {
        Self::with_resolver(&CredentialResolver::new(), settings, connector)
    }

    /// Resolve `settings` with a custom resolver
    pub fn with_resolver(
        resolver: &CredentialResolver,
        settings: &StorageSettings,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let descriptor = resolver.resolve(settings)?;
        tracing::debug!(
            host = %descriptor.host,
            zone = %descriptor.zone,
            auth = descriptor.auth.kind(),
            "Resolved iRODS connection settings"
        );
        Ok(Self {
            sessions: SessionManager::new(descriptor, connector),
        })
    }

    /// The shared session manager
    pub fn session_manager(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        self.sessions.descriptor()
    }

    /// Object addressed by an `irods://zone/path` query
    pub async fn object(&self, query: &str) -> Result<RemoteObject<'_>> {
        let path = path::parse_query(query)?;
        let session = self.sessions.get_session().await?;
        Ok(session.object(path))
    }

    /// Close the shared session
    pub async fn shutdown(&self) -> Result<()> {
        self.sessions.shutdown().await
    }

    /// Key grouping requests for rate limiting: one limiter per server
    pub fn rate_limiter_key(&self) -> &str {
        &self.sessions.descriptor().host
    }

    pub fn default_max_requests_per_second(&self) -> f64 {
        DEFAULT_MAX_REQUESTS_PER_SECOND
    }

    pub fn use_rate_limiter(&self) -> bool {
        true
    }

    /// Query forms understood by this provider
    pub fn example_queries() -> Vec<ExampleQuery> {
        vec![ExampleQuery {
            query: format!("{QUERY_SCHEME}://tempZone/home/alice/myfile.txt"),
            description: "A data object in the home collection of user alice in zone tempZone"
                .to_string(),
            query_type: QueryType::Any,
        }]
    }

    /// Check whether a query addresses this storage
    pub fn is_valid_query(query: &str) -> std::result::Result<(), String> {
        path::is_valid_query(query)
    }
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProvider")
            .field("host", &self.descriptor().host)
            .field("connected", &self.sessions.is_connected())
            .finish()
    }
}
