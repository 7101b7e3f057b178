//! iRODS HTTP API catalog client
//!
//! Reads go through GenQuery so one request answers "does it exist, and what
//! is it". Writes use the data-objects and collections endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use irs_core::credentials::read_cached_password;
use irs_core::{
    AuthMethod, Catalog, CatalogEntry, CatalogTime, ConnectionDescriptor, Connector, Error,
    LogicalPath, Result, Secret,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::response::{QueryRows, StatusOnly, map_http_error, map_transport_error};
use crate::tls;

/// Bytes moved per read or write request, below the HTTP API's default limits
const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Connector for the iRODS HTTP API
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl HttpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Catalog>> {
        let catalog = HttpCatalog::connect(descriptor).await?;
        Ok(Arc::new(catalog))
    }
}

/// One authenticated HTTP API session
pub struct HttpCatalog {
    http: Client,
    base_url: String,
    token: String,
    closed: AtomicBool,
}

impl HttpCatalog {
    /// Authenticate and verify the session against the zone collection
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let http = tls::build_client(descriptor)?;
        let base_url = tls::base_url(descriptor)?;
        let zone = format!("/{}", descriptor.zone);

        let token = match &descriptor.auth {
            AuthMethod::Token(token) => token.expose().to_string(),
            AuthMethod::Password(password) => {
                password_login(&http, &base_url, descriptor, password, &zone).await?
            }
            AuthMethod::CachedAuthFile(path) => {
                let password = read_cached_password(path)?;
                tracing::debug!(file = %path.display(), "Using cached iRODS password");
                password_login(&http, &base_url, descriptor, &password, &zone).await?
            }
        };

        let catalog = Self {
            http,
            base_url,
            token,
            closed: AtomicBool::new(false),
        };

        // Tokens are opaque; a stat of the zone proves this one is accepted
        let zone_path = LogicalPath::new(&zone)?;
        catalog.collection_entry(&zone_path).await?;

        tracing::debug!(
            url = %catalog.base_url,
            scheme = %descriptor.authentication_scheme,
            "Authenticated with iRODS HTTP API"
        );
        Ok(catalog)
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    fn ensure_open(&self, path: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::connection(path, "session has been shut down"));
        }
        Ok(())
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        self.ensure_open(path)?;
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, path))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_http_error(status, &body, path))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        let response = self.send(request, path).await?;
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(&e, path))?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_form(&self, endpoint: &str, form: &[(&str, &str)], path: &str) -> Result<()> {
        tracing::debug!(endpoint, op = form.first().map(|(_, v)| *v), path, "iRODS request");
        let request = self.http.post(self.endpoint(endpoint)).form(form);
        let body: StatusOnly = self.send_json(request, path).await?;
        body.irods_response.into_result(path)
    }

    /// Run a GenQuery1 query and return every row
    async fn query(&self, query: &str, path: &str) -> Result<Vec<Vec<String>>> {
        let mut rows = Vec::new();
        loop {
            let offset = rows.len().to_string();
            tracing::debug!(query, offset = %offset, "iRODS query");
            let request = self.http.get(self.endpoint("query")).query(&[
                ("op", "execute_genquery"),
                ("parser", "genquery1"),
                ("query", query),
                ("offset", offset.as_str()),
            ]);
            let page: QueryRows = self.send_json(request, path).await?;
            let page = page.into_rows(path)?;
            if page.is_empty() {
                return Ok(rows);
            }
            rows.extend(page);
        }
    }

    async fn data_object_entry(&self, path: &LogicalPath) -> Result<Option<CatalogEntry>> {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Ok(None);
        };
        let query = format!(
            "SELECT DATA_SIZE, DATA_MODIFY_TIME, DATA_CHECKSUM WHERE COLL_NAME = '{}' AND DATA_NAME = '{}'",
            quote(parent.as_str())?,
            quote(name)?
        );
        let rows = self.query(&query, path.as_str()).await?;
        rows.into_iter()
            .next()
            .map(|row| data_object_from_row(path.clone(), &row))
            .transpose()
    }

    async fn collection_entry(&self, path: &LogicalPath) -> Result<Option<CatalogEntry>> {
        let query = format!(
            "SELECT COLL_MODIFY_TIME WHERE COLL_NAME = '{}'",
            quote(path.as_str())?
        );
        let rows = self.query(&query, path.as_str()).await?;
        rows.into_iter()
            .next()
            .map(|row| {
                let mut entry = CatalogEntry::collection(path.clone());
                if let Some(modified) = row.first().filter(|v| !v.is_empty()) {
                    entry = entry.with_modified(CatalogTime::parse(modified)?);
                }
                Ok(entry)
            })
            .transpose()
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn stat(&self, path: &LogicalPath) -> Result<Option<CatalogEntry>> {
        if let Some(entry) = self.data_object_entry(path).await? {
            return Ok(Some(entry));
        }
        self.collection_entry(path).await
    }

    async fn list_data_objects(&self, collection: &LogicalPath) -> Result<Vec<CatalogEntry>> {
        let columns = "COLL_NAME, DATA_NAME, DATA_SIZE, DATA_MODIFY_TIME, DATA_CHECKSUM";
        let name = quote(collection.as_str())?;
        let below = if collection.is_root() {
            "/%".to_string()
        } else {
            format!("{name}/%")
        };

        let mut rows = self
            .query(
                &format!("SELECT {columns} WHERE COLL_NAME = '{name}'"),
                collection.as_str(),
            )
            .await?;
        rows.extend(
            self.query(
                &format!("SELECT {columns} WHERE COLL_NAME like '{below}'"),
                collection.as_str(),
            )
            .await?,
        );

        listing_entries(collection, rows)
    }

    fn max_chunk_size(&self) -> usize {
        MAX_CHUNK_SIZE
    }

    async fn read_chunk(&self, path: &LogicalPath, offset: u64, count: usize) -> Result<Vec<u8>> {
        tracing::trace!(path = %path, offset, count, "iRODS read");
        let offset = offset.to_string();
        let count = count.to_string();
        let request = self.http.get(self.endpoint("data-objects")).query(&[
            ("op", "read"),
            ("lpath", path.as_str()),
            ("offset", offset.as_str()),
            ("count", count.as_str()),
        ]);
        let response = self.send(request, path.as_str()).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(&e, path.as_str()))?;
        Ok(bytes.to_vec())
    }

    async fn write_chunk(
        &self,
        path: &LogicalPath,
        offset: u64,
        data: Vec<u8>,
        truncate: bool,
        resource: Option<&str>,
    ) -> Result<()> {
        tracing::trace!(path = %path, offset, bytes = data.len(), truncate, resource, "iRODS write");
        let mut form = Form::new()
            .text("op", "write")
            .text("lpath", path.as_str().to_string())
            .text("offset", offset.to_string())
            .text("truncate", if truncate { "1" } else { "0" });
        if let Some(resource) = resource {
            form = form.text("resource", resource.to_string());
        }
        let file_name = path.file_name().unwrap_or("data").to_string();
        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| Error::General(e.to_string()))?;
        form = form.part("bytes", part);

        let request = self.http.post(self.endpoint("data-objects")).multipart(form);
        let body: StatusOnly = self.send_json(request, path.as_str()).await?;
        body.irods_response.into_result(path.as_str())
    }

    async fn create_collection(&self, path: &LogicalPath) -> Result<()> {
        self.post_form(
            "collections",
            &[
                ("op", "create"),
                ("lpath", path.as_str()),
                ("create-intermediates", "1"),
            ],
            path.as_str(),
        )
        .await
    }

    async fn remove(&self, path: &LogicalPath, recursive: bool) -> Result<()> {
        if recursive {
            self.post_form(
                "collections",
                &[("op", "remove"), ("lpath", path.as_str()), ("recurse", "1")],
                path.as_str(),
            )
            .await
        } else {
            self.post_form(
                "data-objects",
                &[("op", "remove"), ("lpath", path.as_str()), ("catalog-only", "0")],
                path.as_str(),
            )
            .await
        }
    }

    async fn metadata_value(&self, path: &LogicalPath, attribute: &str) -> Result<Option<String>> {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Ok(None);
        };
        let query = format!(
            "SELECT META_DATA_ATTR_VALUE WHERE COLL_NAME = '{}' AND DATA_NAME = '{}' AND META_DATA_ATTR_NAME = '{}'",
            quote(parent.as_str())?,
            quote(name)?,
            quote(attribute)?
        );
        let rows = self.query(&query, path.as_str()).await?;
        Ok(rows.into_iter().next().and_then(|row| row.into_iter().next()))
    }

    async fn resource_free_space(&self, resource: &str) -> Result<Option<String>> {
        let query = format!(
            "SELECT RESC_FREE_SPACE WHERE RESC_NAME = '{}'",
            quote(resource)?
        );
        let rows = self.query(&query, resource).await?;
        Ok(rows.into_iter().next().and_then(|row| row.into_iter().next()))
    }

    async fn disconnect(&self) -> Result<()> {
        // Bearer tokens expire on the server; dropping ours is all there is to do
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

async fn password_login(
    http: &Client,
    base_url: &str,
    descriptor: &ConnectionDescriptor,
    password: &Secret,
    zone: &str,
) -> Result<String> {
    let user = descriptor
        .user
        .as_deref()
        .ok_or_else(|| Error::Config("Password authentication needs a user".into()))?;
    authenticate(http, base_url, user, password.expose(), zone).await
}

/// Exchange user name and password for a bearer token
async fn authenticate(
    http: &Client,
    base_url: &str,
    user: &str,
    password: &str,
    zone: &str,
) -> Result<String> {
    let response = http
        .post(format!("{base_url}/authenticate"))
        .basic_auth(user, Some(password))
        .send()
        .await
        .map_err(|e| map_transport_error(&e, zone))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| map_transport_error(&e, zone))?;
    if !status.is_success() {
        return Err(map_http_error(status, &body, zone));
    }

    let token = body.trim();
    if token.is_empty() {
        return Err(Error::Auth("Server returned an empty token".into()));
    }
    Ok(token.to_string())
}

/// Turn listing rows into one entry per data object below `collection`
///
/// `LIKE` treats `_` and `%` in the collection name as wildcards, so rows
/// from sibling collections can match and are dropped here.
fn listing_entries(collection: &LogicalPath, rows: Vec<Vec<String>>) -> Result<Vec<CatalogEntry>> {
    let mut entries = BTreeMap::new();
    for row in rows {
        let [coll, data, rest @ ..] = row.as_slice() else {
            continue;
        };
        let path = LogicalPath::new(format!("{coll}/{data}"))?;
        if path.strip_prefix(collection).is_none() {
            tracing::debug!(path = %path, collection = %collection, "Skipping wildcard match");
            continue;
        }
        // One row per replica; keep the first
        if entries.contains_key(&path) {
            continue;
        }
        let entry = data_object_from_row(path.clone(), rest)?;
        entries.insert(path, entry);
    }
    Ok(entries.into_values().collect())
}

/// Quote a value for a GenQuery1 condition
///
/// GenQuery1 has no escape for single quotes, so such names are refused.
fn quote(value: &str) -> Result<&str> {
    if value.contains('\'') {
        return Err(Error::InvalidPath(format!(
            "'{value}' contains a single quote, which catalog queries cannot express"
        )));
    }
    Ok(value)
}

/// Build a data object entry from `[size, modify_time, checksum]`
fn data_object_from_row(path: LogicalPath, row: &[String]) -> Result<CatalogEntry> {
    let size = match row.first() {
        Some(size) if !size.is_empty() => size.parse::<u64>().map_err(|e| {
            Error::General(format!("Catalog reported invalid size '{size}' for {path}: {e}"))
        })?,
        _ => 0,
    };

    let mut entry = CatalogEntry::data_object(path, size);
    if let Some(modified) = row.get(1).filter(|v| !v.is_empty()) {
        entry = entry.with_modified(CatalogTime::parse(modified)?);
    }
    if let Some(checksum) = row.get(2).filter(|v| !v.is_empty()) {
        entry = entry.with_checksum(checksum.clone());
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_data_object_from_row() {
        let path = LogicalPath::new("/tempZone/home/alice/a.txt").unwrap();
        let entry = data_object_from_row(
            path.clone(),
            &row(&["1024", "01700000000", "sha2:abc"]),
        )
        .unwrap();
        assert_eq!(entry.path, path);
        assert_eq!(entry.size, 1024);
        assert_eq!(entry.modified, Some(CatalogTime::Epoch(1_700_000_000)));
        assert_eq!(entry.checksum.as_deref(), Some("sha2:abc"));
        assert!(!entry.is_collection());
    }

    #[test]
    fn test_data_object_without_checksum() {
        let path = LogicalPath::new("/tempZone/a").unwrap();
        let entry = data_object_from_row(path, &row(&["0", "01700000000", ""])).unwrap();
        assert!(entry.checksum.is_none());
    }

    #[test]
    fn test_invalid_size() {
        let path = LogicalPath::new("/tempZone/a").unwrap();
        assert!(data_object_from_row(path, &row(&["big", "0", ""])).is_err());
    }

    #[test]
    fn test_listing_drops_wildcard_siblings() {
        let collection = LogicalPath::new("/tempZone/home/a_b").unwrap();
        let rows = vec![
            row(&["/tempZone/home/a_b", "x.txt", "10", "01700000000", ""]),
            row(&["/tempZone/home/aXb/sub", "big.bin", "1000000", "01700000100", ""]),
            row(&["/tempZone/home/a_b2", "y.txt", "5", "01700000200", ""]),
        ];

        let entries = listing_entries(&collection, rows).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path.as_str(), "/tempZone/home/a_b/x.txt");
        assert_eq!(entries.iter().map(|e| e.size).sum::<u64>(), 10);
    }

    #[test]
    fn test_listing_keeps_first_replica() {
        let collection = LogicalPath::new("/tempZone/home/alice").unwrap();
        let rows = vec![
            row(&["/tempZone/home/alice/run_1", "out.csv", "7", "01700000000", "sha2:one"]),
            row(&["/tempZone/home/alice/run_1", "out.csv", "7", "01700000000", "sha2:two"]),
        ];

        let entries = listing_entries(&collection, rows).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].checksum.as_deref(), Some("sha2:one"));
    }

    #[test]
    fn test_quote_rejects_single_quote() {
        assert_eq!(quote("/tempZone/home/alice").unwrap(), "/tempZone/home/alice");
        assert!(matches!(
            quote("/tempZone/it's"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_cached_auth_file() {
        use irs_core::credentials::resolve_layers;
        use irs_core::StorageSettings;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let auth_file = temp_dir.path().join(".irodsA");
        std::fs::write(&auth_file, "scrambled").unwrap();

        let settings = StorageSettings {
            host: Some("127.0.0.1".into()),
            zone: Some("tempZone".into()),
            user: Some("alice".into()),
            ..Default::default()
        };
        let descriptor =
            resolve_layers(&settings, &StorageSettings::default(), Some(&auth_file)).unwrap();
        assert!(matches!(descriptor.auth, AuthMethod::CachedAuthFile(_)));

        let err = HttpConnector::new().connect(&descriptor).await.err().unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains(".irodsA")));
    }
}
