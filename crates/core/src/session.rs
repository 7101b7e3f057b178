//! Session management
//!
//! A [`SessionManager`] is built once at startup and shared by every
//! component that needs the catalog. It creates the authenticated
//! [`Session`] on first use and hands out borrowed references afterwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::OnceCell;

use crate::credentials::ConnectionDescriptor;
use crate::error::{Error, Result};
use crate::object::RemoteObject;
use crate::path::LogicalPath;
use crate::quota::QuotaReporter;
use crate::traits::{Catalog, Connector};

/// An authenticated catalog connection bound to its descriptor
pub struct Session {
    descriptor: Arc<ConnectionDescriptor>,
    catalog: Arc<dyn Catalog>,
}

impl Session {
    /// Wrap an already authenticated catalog
    pub fn new(descriptor: Arc<ConnectionDescriptor>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            descriptor,
            catalog,
        }
    }

    /// The descriptor this session was created from
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// The underlying catalog connection
    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// Reference a remote object through this session
    pub fn object(&self, path: LogicalPath) -> RemoteObject<'_> {
        RemoteObject::new(self, path)
    }

    /// Capacity queries through this session
    pub fn quota(&self) -> QuotaReporter<'_> {
        QuotaReporter::new(self)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.descriptor.host)
            .field("zone", &self.descriptor.zone)
            .finish_non_exhaustive()
    }
}

/// Owner of the process-wide session
pub struct SessionManager {
    descriptor: Arc<ConnectionDescriptor>,
    connector: Arc<dyn Connector>,
    session: OnceCell<Session>,
    closed: AtomicBool,
}

impl SessionManager {
    /// Create a manager; no connection is made until the first `get_session`
    pub fn new(descriptor: ConnectionDescriptor, connector: Arc<dyn Connector>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            connector,
            session: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// The resolved descriptor
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Whether the session has been established
    pub fn is_connected(&self) -> bool {
        self.session.initialized() && !self.closed.load(Ordering::Acquire)
    }

    /// Get the session, connecting and authenticating on first call
    ///
    /// Concurrent first callers wait for the same handshake. A failed
    /// handshake leaves the manager empty and the error goes to the caller;
    /// there is no retry here.
    pub async fn get_session(&self) -> Result<&Session> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::connection(
                format!("/{}", self.descriptor.zone),
                "session has been shut down",
            ));
        }

        self.session
            .get_or_try_init(|| async {
                tracing::info!(
                    host = %self.descriptor.host,
                    zone = %self.descriptor.zone,
                    auth = self.descriptor.auth.kind(),
                    tls = self.descriptor.tls.enabled,
                    "Connecting to iRODS catalog"
                );
                let catalog = self.connector.connect(&self.descriptor).await?;
                Ok::<_, Error>(Session::new(Arc::clone(&self.descriptor), catalog))
            })
            .await
    }

    /// Close the session if one was established
    ///
    /// Safe to call more than once. Later `get_session` calls fail.
    pub async fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(session) = self.session.get() {
            tracing::debug!(host = %self.descriptor.host, "Closing iRODS session");
            session.catalog.disconnect().await?;
        }
        Ok(())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // The catalog's transport is released with the last Arc; this only
        // reports sessions that skipped the orderly shutdown.
        if self.session.initialized() && !self.closed.load(Ordering::Acquire) {
            tracing::debug!(
                host = %self.descriptor.host,
                "Session manager dropped without shutdown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{AuthMethod, EncryptionParams, TlsPolicy};
    use crate::settings::{Secret, SslVerify};
    use crate::traits::CatalogEntry;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    mock! {
        pub Conn {}

        #[async_trait]
        impl Connector for Conn {
            async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Catalog>>;
        }
    }

    /// Catalog stub that reports every path as absent and counts disconnects
    #[derive(Default)]
    struct EmptyCatalog {
        disconnects: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for EmptyCatalog {
        async fn stat(&self, _path: &LogicalPath) -> Result<Option<CatalogEntry>> {
            Ok(None)
        }

        async fn list_data_objects(&self, _collection: &LogicalPath) -> Result<Vec<CatalogEntry>> {
            Ok(Vec::new())
        }

        async fn read_chunk(
            &self,
            path: &LogicalPath,
            _offset: u64,
            _count: usize,
        ) -> Result<Vec<u8>> {
            Err(Error::not_found(path.as_str(), "absent"))
        }

        async fn write_chunk(
            &self,
            _path: &LogicalPath,
            _offset: u64,
            _data: Vec<u8>,
            _truncate: bool,
            _resource: Option<&str>,
        ) -> Result<()> {
            Ok(())
        }

        async fn create_collection(&self, _path: &LogicalPath) -> Result<()> {
            Ok(())
        }

        async fn remove(&self, path: &LogicalPath, _recursive: bool) -> Result<()> {
            Err(Error::not_found(path.as_str(), "absent"))
        }

        async fn metadata_value(
            &self,
            _path: &LogicalPath,
            _attribute: &str,
        ) -> Result<Option<String>> {
            Ok(None)
        }

        async fn resource_free_space(&self, _resource: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn disconnect(&self) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "irods.example.org".into(),
            port: 1247,
            zone: "tempZone".into(),
            user: Some("alice".into()),
            home: None,
            resource: None,
            authentication_scheme: "native".into(),
            auth: AuthMethod::Password(Secret::new("pw")),
            tls: TlsPolicy {
                enabled: false,
                verify: SslVerify::Hostname,
                ca_file: None,
                client_server_negotiation: None,
                client_server_policy: "CS_NEG_REFUSE".into(),
                encryption: EncryptionParams {
                    algorithm: "AES-256-CBC".into(),
                    key_size: 32,
                    num_hash_rounds: 16,
                    salt_size: 8,
                },
            },
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            api_port: 9000,
            api_base_path: "/irods-http-api/0.3.0".into(),
        }
    }

    fn catalog_with_stat() -> Arc<dyn Catalog> {
        Arc::new(EmptyCatalog::default())
    }

    #[tokio::test]
    async fn test_lazy_connection() {
        let mut connector = MockConn::new();
        connector.expect_connect().never();
        let manager = SessionManager::new(descriptor(), Arc::new(connector));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_single_handshake_for_sequential_operations() {
        let mut connector = MockConn::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Ok(catalog_with_stat()));
        let manager = SessionManager::new(descriptor(), Arc::new(connector));

        let path = LogicalPath::new("/tempZone/home/alice/a.txt").unwrap();
        let first = manager.get_session().await.unwrap();
        assert!(!first.object(path.clone()).exists().await.unwrap());
        let second = manager.get_session().await.unwrap();
        assert!(!second.object(path).exists().await.unwrap());

        assert!(std::ptr::eq(first, second));
        assert!(manager.is_connected());
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_first_use_connects_once() {
        let mut connector = MockConn::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Ok(catalog_with_stat()));
        let manager = SessionManager::new(descriptor(), Arc::new(connector));

        let (a, b) = tokio::join!(manager.get_session(), manager.get_session());
        assert!(std::ptr::eq(a.unwrap(), b.unwrap()));
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_authentication_failure_is_surfaced() {
        let mut connector = MockConn::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Err(Error::Auth("CAT_INVALID_AUTHENTICATION".into())));
        let manager = SessionManager::new(descriptor(), Arc::new(connector));

        let err = manager.get_session().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_final() {
        let catalog = Arc::new(EmptyCatalog::default());
        let shared = Arc::clone(&catalog);
        let mut connector = MockConn::new();
        connector
            .expect_connect()
            .times(1)
            .returning(move |_| Ok(Arc::clone(&shared) as Arc<dyn Catalog>));
        let manager = SessionManager::new(descriptor(), Arc::new(connector));

        manager.get_session().await.unwrap();
        manager.shutdown().await.unwrap();
        manager.shutdown().await.unwrap();

        assert_eq!(catalog.disconnects.load(Ordering::SeqCst), 1);
        assert!(!manager.is_connected());
        let err = manager.get_session().await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_without_session() {
        let mut connector = MockConn::new();
        connector.expect_connect().never();
        let manager = SessionManager::new(descriptor(), Arc::new(connector));
        manager.shutdown().await.unwrap();
    }
}
