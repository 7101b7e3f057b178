//! In-memory catalog shared by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use irs_core::credentials::resolve_layers;
use irs_core::{
    Catalog, CatalogEntry, CatalogTime, ConnectionDescriptor, Connector, Error, LogicalPath,
    Result, Secret, StorageSettings,
};

pub const ZONE: &str = "tempZone";
pub const HOME: &str = "/tempZone/home/alice";

/// Small enough that ordinary test payloads span several chunks
pub const CHUNK_SIZE: usize = 4;

#[derive(Debug, Clone)]
enum Node {
    Collection { modified: i64 },
    Object { data: Vec<u8>, modified: i64, resource: Option<String> },
}

/// A catalog that keeps everything in a map
///
/// Modification times come from a counter that advances one second per
/// write, so later writes are always newer.
pub struct MemoryCatalog {
    nodes: Mutex<BTreeMap<LogicalPath, Node>>,
    metadata: Mutex<HashMap<(LogicalPath, String), String>>,
    checksums: Mutex<HashMap<LogicalPath, String>>,
    free_space: Mutex<HashMap<String, String>>,
    unreadable: Mutex<HashSet<LogicalPath>>,
    read_limit: Mutex<Option<usize>>,
    next_write_error: Mutex<Option<Error>>,
    next_stat_error: Mutex<Option<Error>>,
    clock: AtomicI64,
    pub writes: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        let catalog = Self {
            nodes: Mutex::new(BTreeMap::new()),
            metadata: Mutex::new(HashMap::new()),
            checksums: Mutex::new(HashMap::new()),
            free_space: Mutex::new(HashMap::new()),
            unreadable: Mutex::new(HashSet::new()),
            read_limit: Mutex::new(None),
            next_write_error: Mutex::new(None),
            next_stat_error: Mutex::new(None),
            clock: AtomicI64::new(1_700_000_000),
            writes: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        };
        for path in ["/tempZone", "/tempZone/home", HOME] {
            catalog.insert_collection(&path_of(path));
        }
        catalog
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn insert_collection(&self, path: &LogicalPath) {
        let modified = self.tick();
        self.nodes
            .lock()
            .unwrap()
            .entry(path.clone())
            .or_insert(Node::Collection { modified });
    }

    pub fn set_metadata(&self, path: &str, attribute: &str, value: &str) {
        self.metadata
            .lock()
            .unwrap()
            .insert((path_of(path), attribute.to_string()), value.to_string());
    }

    pub fn set_checksum(&self, path: &str, checksum: &str) {
        self.checksums
            .lock()
            .unwrap()
            .insert(path_of(path), checksum.to_string());
    }

    pub fn set_free_space(&self, resource: &str, value: &str) {
        self.free_space
            .lock()
            .unwrap()
            .insert(resource.to_string(), value.to_string());
    }

    /// Make `stat` on `path` fail with permission denied
    pub fn deny(&self, path: &str) {
        self.unreadable.lock().unwrap().insert(path_of(path));
    }

    /// Serve no byte past `limit`, whatever the stored size
    pub fn cap_reads(&self, limit: usize) {
        *self.read_limit.lock().unwrap() = Some(limit);
    }

    /// Fail the next `write_chunk` with `error`
    pub fn fail_next_write(&self, error: Error) {
        *self.next_write_error.lock().unwrap() = Some(error);
    }

    /// Fail the next `stat` with `error`
    pub fn fail_next_stat(&self, error: Error) {
        *self.next_stat_error.lock().unwrap() = Some(error);
    }

    pub fn put(&self, path: &str, data: &[u8]) {
        let modified = self.tick();
        self.nodes.lock().unwrap().insert(
            path_of(path),
            Node::Object {
                data: data.to_vec(),
                modified,
                resource: None,
            },
        );
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.lock().unwrap().contains_key(&path_of(path))
    }

    pub fn is_collection(&self, path: &str) -> bool {
        matches!(
            self.nodes.lock().unwrap().get(&path_of(path)),
            Some(Node::Collection { .. })
        )
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.lock().unwrap().get(&path_of(path)) {
            Some(Node::Object { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn resource_of(&self, path: &str) -> Option<String> {
        match self.nodes.lock().unwrap().get(&path_of(path)) {
            Some(Node::Object { resource, .. }) => resource.clone(),
            _ => None,
        }
    }

    fn entry(&self, path: &LogicalPath, node: &Node) -> CatalogEntry {
        match node {
            Node::Collection { modified } => {
                CatalogEntry::collection(path.clone()).with_modified(CatalogTime::Epoch(*modified))
            }
            Node::Object { data, modified, .. } => {
                let entry = CatalogEntry::data_object(path.clone(), data.len() as u64)
                    .with_modified(CatalogTime::Epoch(*modified));
                match self.checksums.lock().unwrap().get(path) {
                    Some(checksum) => entry.with_checksum(checksum.clone()),
                    None => entry,
                }
            }
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn stat(&self, path: &LogicalPath) -> Result<Option<CatalogEntry>> {
        if let Some(error) = self.next_stat_error.lock().unwrap().take() {
            return Err(error);
        }
        if self.unreadable.lock().unwrap().contains(path) {
            return Err(Error::PermissionDenied {
                path: path.to_string(),
                message: "CAT_NO_ACCESS_PERMISSION".into(),
            });
        }
        let nodes = self.nodes.lock().unwrap();
        Ok(nodes.get(path).map(|node| self.entry(path, node)))
    }

    async fn list_data_objects(&self, collection: &LogicalPath) -> Result<Vec<CatalogEntry>> {
        let nodes = self.nodes.lock().unwrap();
        Ok(nodes
            .iter()
            .filter(|(path, node)| {
                matches!(node, Node::Object { .. }) && path.strip_prefix(collection).is_some()
            })
            .map(|(path, node)| self.entry(path, node))
            .collect())
    }

    fn max_chunk_size(&self) -> usize {
        CHUNK_SIZE
    }

    async fn read_chunk(&self, path: &LogicalPath, offset: u64, count: usize) -> Result<Vec<u8>> {
        let data = self
            .content(path.as_str())
            .ok_or_else(|| Error::not_found(path.as_str(), "OBJ_PATH_DOES_NOT_EXIST"))?;
        let end = match *self.read_limit.lock().unwrap() {
            Some(limit) => data.len().min(limit),
            None => data.len(),
        };
        let start = (offset as usize).min(end);
        Ok(data[start..end.min(start + count)].to_vec())
    }

    async fn write_chunk(
        &self,
        path: &LogicalPath,
        offset: u64,
        data: Vec<u8>,
        truncate: bool,
        resource: Option<&str>,
    ) -> Result<()> {
        if let Some(error) = self.next_write_error.lock().unwrap().take() {
            return Err(error);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let modified = self.tick();
        let mut nodes = self.nodes.lock().unwrap();
        let parent = path.parent().unwrap();
        if !matches!(nodes.get(&parent), Some(Node::Collection { .. })) {
            return Err(Error::not_found(parent.as_str(), "CAT_UNKNOWN_COLLECTION"));
        }

        let mut content = match nodes.get(path) {
            Some(Node::Object { data, .. }) if !truncate => data.clone(),
            _ => Vec::new(),
        };
        let offset = offset as usize;
        if content.len() < offset + data.len() {
            content.resize(offset + data.len(), 0);
        }
        content[offset..offset + data.len()].copy_from_slice(&data);

        nodes.insert(
            path.clone(),
            Node::Object {
                data: content,
                modified,
                resource: resource.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn create_collection(&self, path: &LogicalPath) -> Result<()> {
        for ancestor in path.ancestors() {
            self.insert_collection(&ancestor);
        }
        self.insert_collection(path);
        Ok(())
    }

    async fn remove(&self, path: &LogicalPath, recursive: bool) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let is_collection = nodes
            .get(path)
            .map(|node| matches!(node, Node::Collection { .. }));
        match is_collection {
            None => Err(Error::not_found(path.as_str(), "OBJ_PATH_DOES_NOT_EXIST")),
            Some(true) if !recursive => Err(Error::General("CAT_COLLECTION_NOT_EMPTY".into())),
            Some(_) => {
                nodes.retain(|p, _| p != path && p.strip_prefix(path).is_none());
                Ok(())
            }
        }
    }

    async fn metadata_value(&self, path: &LogicalPath, attribute: &str) -> Result<Option<String>> {
        Ok(self
            .metadata
            .lock()
            .unwrap()
            .get(&(path.clone(), attribute.to_string()))
            .cloned())
    }

    async fn resource_free_space(&self, resource: &str) -> Result<Option<String>> {
        Ok(self.free_space.lock().unwrap().get(resource).cloned())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the same catalog and counts handshakes
pub struct MemoryConnector {
    pub catalog: Arc<MemoryCatalog>,
    pub connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::new()),
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Catalog>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.catalog) as Arc<dyn Catalog>)
    }
}

pub fn path_of(path: &str) -> LogicalPath {
    LogicalPath::new(path).unwrap()
}

pub fn settings(resource: Option<&str>) -> StorageSettings {
    StorageSettings {
        host: Some("irods.example.org".into()),
        zone: Some(ZONE.into()),
        user: Some("alice".into()),
        password: Some(Secret::new("secret")),
        resource: resource.map(str::to_string),
        ..Default::default()
    }
}

pub fn descriptor(resource: Option<&str>) -> ConnectionDescriptor {
    resolve_layers(&settings(resource), &StorageSettings::default(), None).unwrap()
}
