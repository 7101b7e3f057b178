//! Catalog trait definitions
//!
//! These traits are the seam between the adapter and the client library that
//! speaks to the iRODS catalog. The core never depends on a concrete
//! transport, which keeps it testable with in-memory or mocked catalogs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::ConnectionDescriptor;
use crate::error::Result;
use crate::path::LogicalPath;
use crate::timestamp::CatalogTime;

/// Chunk size for catalogs that do not announce their own limit
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Kind of catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A file-like data object
    DataObject,
    /// A directory-like collection
    Collection,
}

/// Metadata for a data object or collection
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Logical path of the entry
    pub path: LogicalPath,

    /// Data object or collection
    pub kind: EntryKind,

    /// Size in bytes (0 for collections)
    pub size: u64,

    /// Last modification time as reported by the catalog
    pub modified: Option<CatalogTime>,

    /// Checksum recorded in the catalog, e.g. `sha2:...`
    pub checksum: Option<String>,
}

impl CatalogEntry {
    /// Create an entry for a data object
    pub fn data_object(path: LogicalPath, size: u64) -> Self {
        Self {
            path,
            kind: EntryKind::DataObject,
            size,
            modified: None,
            checksum: None,
        }
    }

    /// Create an entry for a collection
    pub fn collection(path: LogicalPath) -> Self {
        Self {
            path,
            kind: EntryKind::Collection,
            size: 0,
            modified: None,
            checksum: None,
        }
    }

    /// Set the modification time
    pub fn with_modified(mut self, modified: CatalogTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Set the catalog checksum
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Whether this entry is a collection
    pub fn is_collection(&self) -> bool {
        self.kind == EntryKind::Collection
    }
}

/// One authenticated connection to the catalog
///
/// Implementations must be safe for concurrent use; the session hands the
/// same instance to every object operation.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a path. Returns `None` when nothing exists there.
    async fn stat(&self, path: &LogicalPath) -> Result<Option<CatalogEntry>>;

    /// List every data object below a collection, recursively
    async fn list_data_objects(&self, collection: &LogicalPath) -> Result<Vec<CatalogEntry>>;

    /// Largest number of bytes one read or write may move
    fn max_chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }

    /// Read up to `count` bytes starting at `offset`. An empty chunk means end of data.
    async fn read_chunk(&self, path: &LogicalPath, offset: u64, count: usize) -> Result<Vec<u8>>;

    /// Write `data` at `offset`, creating the data object when missing
    ///
    /// With `truncate` set, existing content is discarded first.
    async fn write_chunk(
        &self,
        path: &LogicalPath,
        offset: u64,
        data: Vec<u8>,
        truncate: bool,
        resource: Option<&str>,
    ) -> Result<()>;

    /// Create a collection and missing intermediates. Existing collections are not an error.
    async fn create_collection(&self, path: &LogicalPath) -> Result<()>;

    /// Remove a data object, or a collection when `recursive` is set
    async fn remove(&self, path: &LogicalPath, recursive: bool) -> Result<()>;

    /// Value of a metadata attribute (AVU) attached to a data object
    async fn metadata_value(&self, path: &LogicalPath, attribute: &str) -> Result<Option<String>>;

    /// Free space recorded for a resource, verbatim
    async fn resource_free_space(&self, resource: &str) -> Result<Option<String>>;

    /// Release the connection
    async fn disconnect(&self) -> Result<()>;
}

/// Opens authenticated catalog connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform TLS setup and authentication for a resolved descriptor
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Catalog>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_object_entry() {
        let path = LogicalPath::new("/tempZone/home/alice/a.txt").unwrap();
        let entry = CatalogEntry::data_object(path.clone(), 1024)
            .with_modified(CatalogTime::Epoch(1_700_000_000))
            .with_checksum("sha2:abc");
        assert_eq!(entry.path, path);
        assert_eq!(entry.size, 1024);
        assert!(!entry.is_collection());
        assert_eq!(entry.checksum.as_deref(), Some("sha2:abc"));
    }

    #[test]
    fn test_collection_entry() {
        let path = LogicalPath::new("/tempZone/home/alice").unwrap();
        let entry = CatalogEntry::collection(path);
        assert!(entry.is_collection());
        assert_eq!(entry.size, 0);
        assert!(entry.modified.is_none());
    }
}
