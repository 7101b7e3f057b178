//! Remote object operations
//!
//! A [`RemoteObject`] pairs a logical path with a borrowed [`Session`]. It
//! holds no other state: every call asks the catalog again.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::path::LogicalPath;
use crate::session::Session;
use crate::timestamp::parse_epoch_seconds;
use crate::traits::{CatalogEntry, EntryKind};

/// Metadata attribute that overrides the catalog modification time
pub const MTIME_ATTRIBUTE: &str = "mtime";

/// Number of files moved in parallel for collection transfers
const TRANSFER_CONCURRENCY: usize = 4;

/// Checksum reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum Checksum {
    /// Digest recorded in the catalog, verbatim (e.g. `sha2:...`)
    Reported(String),
    /// The catalog has no checksum; callers must not treat this as a mismatch
    Unavailable,
}

impl Checksum {
    /// The digest, if any
    pub fn value(&self) -> Option<&str> {
        match self {
            Checksum::Reported(value) => Some(value),
            Checksum::Unavailable => None,
        }
    }

    /// Compare with a locally computed digest
    ///
    /// Returns `None` when nothing can be said.
    pub fn matches(&self, other: &str) -> Option<bool> {
        self.value().map(|value| value == other)
    }
}

/// Outcome of a download or upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    /// Files transferred
    pub files: usize,
    /// Bytes transferred
    pub bytes: u64,
}

impl TransferSummary {
    fn add(mut self, other: TransferSummary) -> Self {
        self.files += other.files;
        self.bytes += other.bytes;
        self
    }

    fn single(bytes: u64) -> Self {
        Self { files: 1, bytes }
    }
}

/// A data object or collection addressed through a session
#[derive(Debug, Clone)]
pub struct RemoteObject<'a> {
    session: &'a Session,
    path: LogicalPath,
}

impl<'a> RemoteObject<'a> {
    /// Create a reference; nothing is looked up yet
    pub fn new(session: &'a Session, path: LogicalPath) -> Self {
        Self { session, path }
    }

    /// The logical path
    pub fn path(&self) -> &LogicalPath {
        &self.path
    }

    /// Suffix for the local mirror of this object
    pub fn local_suffix(&self) -> &str {
        self.path.local_suffix()
    }

    /// Whether a data object or collection exists at the path
    pub async fn exists(&self) -> Result<bool> {
        match self.session.catalog().stat(&self.path).await {
            Ok(entry) => Ok(entry.is_some()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Size in bytes; for a collection, the total of everything below it
    pub async fn size(&self) -> Result<u64> {
        let entry = self.entry().await?;
        match entry.kind {
            EntryKind::DataObject => Ok(entry.size),
            EntryKind::Collection => {
                let objects = self.session.catalog().list_data_objects(&self.path).await?;
                Ok(objects.iter().map(|o| o.size).sum())
            }
        }
    }

    /// Modification time in epoch seconds
    ///
    /// A numeric `mtime` metadata attribute takes precedence over the
    /// catalog time. For a collection this is the newest time below it, or
    /// the collection's own time when it is empty.
    pub async fn mtime(&self) -> Result<f64> {
        let entry = self.entry().await?;
        match entry.kind {
            EntryKind::DataObject => self.data_object_mtime(&entry).await,
            EntryKind::Collection => {
                let objects = self.session.catalog().list_data_objects(&self.path).await?;
                if objects.is_empty() {
                    return catalog_mtime(&entry);
                }
                let mut newest = f64::MIN;
                for object in &objects {
                    newest = newest.max(self.data_object_mtime(object).await?);
                }
                Ok(newest)
            }
        }
    }

    /// Checksum recorded in the catalog
    pub async fn checksum(&self) -> Result<Checksum> {
        let entry = self.entry().await?;
        let checksum = match entry.kind {
            EntryKind::DataObject => entry.checksum.filter(|c| !c.is_empty()),
            EntryKind::Collection => None,
        };
        Ok(checksum.map_or(Checksum::Unavailable, Checksum::Reported))
    }

    /// Copy the remote content to `local_path`
    ///
    /// Missing local parent directories are created and existing files are
    /// overwritten. A collection is mirrored below `local_path`.
    pub async fn download(&self, local_path: &Path) -> Result<TransferSummary> {
        let entry = self.entry().await?;
        match entry.kind {
            EntryKind::DataObject => self.download_file(&entry, local_path).await,
            EntryKind::Collection => self.download_collection(local_path).await,
        }
    }

    /// Copy `local_path` to the remote path
    ///
    /// Missing collections along the path are created first and an existing
    /// data object is overwritten. A local directory is mirrored recursively.
    pub async fn upload(&self, local_path: &Path) -> Result<TransferSummary> {
        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| Error::io(local_path, e))?;

        self.ensure_parent_collections(&self.path).await?;

        if metadata.is_dir() {
            self.upload_directory(local_path).await
        } else {
            self.upload_file(local_path, &self.path).await
        }
    }

    /// Remove the data object, or the collection and everything below it
    pub async fn remove(&self) -> Result<()> {
        let entry = self.entry().await?;
        let recursive = entry.is_collection();
        tracing::debug!(path = %self.path, recursive, "Removing");
        self.session.catalog().remove(&self.path, recursive).await
    }

    async fn entry(&self) -> Result<CatalogEntry> {
        self.session
            .catalog()
            .stat(&self.path)
            .await?
            .ok_or_else(|| Error::not_found(self.path.as_str(), "no such data object or collection"))
    }

    async fn data_object_mtime(&self, entry: &CatalogEntry) -> Result<f64> {
        let avu = self
            .session
            .catalog()
            .metadata_value(&entry.path, MTIME_ATTRIBUTE)
            .await?;

        if let Some(value) = avu {
            match parse_epoch_seconds(&value) {
                Some(secs) => return Ok(secs),
                None => tracing::warn!(
                    path = %entry.path,
                    value = %value,
                    "Ignoring non-numeric mtime metadata"
                ),
            }
        }

        catalog_mtime(entry)
    }

    /// Stream a data object into `local`
    ///
    /// Content lands in a `.part` sibling first and replaces `local` only once
    /// the byte count matches the catalog size.
    async fn download_file(&self, entry: &CatalogEntry, local: &Path) -> Result<TransferSummary> {
        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let partial = partial_path(local);
        let received = match self.fetch_into(entry, &partial).await {
            Ok(received) => received,
            Err(e) => {
                discard_partial(&partial).await;
                return Err(e);
            }
        };
        if received != entry.size {
            discard_partial(&partial).await;
            return Err(Error::connection(
                entry.path.as_str(),
                format!("received {received} of {} bytes", entry.size),
            ));
        }

        tokio::fs::rename(&partial, local)
            .await
            .map_err(|e| Error::io(local, e))?;

        tracing::debug!(remote = %entry.path, local = %local.display(), bytes = received, "Downloaded");
        Ok(TransferSummary::single(received))
    }

    async fn fetch_into(&self, entry: &CatalogEntry, partial: &Path) -> Result<u64> {
        let catalog = self.session.catalog();
        let chunk_size = catalog.max_chunk_size().max(1);
        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| Error::io(partial, e))?;

        let mut offset = 0u64;
        while offset < entry.size {
            let remaining = usize::try_from(entry.size - offset).unwrap_or(usize::MAX);
            let data = catalog
                .read_chunk(&entry.path, offset, remaining.min(chunk_size))
                .await?;
            if data.is_empty() {
                break;
            }
            file.write_all(&data)
                .await
                .map_err(|e| Error::io(partial, e))?;
            offset += data.len() as u64;
        }

        file.flush().await.map_err(|e| Error::io(partial, e))?;
        Ok(offset)
    }

    async fn download_collection(&self, local_root: &Path) -> Result<TransferSummary> {
        tokio::fs::create_dir_all(local_root)
            .await
            .map_err(|e| Error::io(local_root, e))?;

        let objects = self.session.catalog().list_data_objects(&self.path).await?;
        let mut targets = Vec::with_capacity(objects.len());
        for object in objects {
            let relative = object.path.strip_prefix(&self.path).ok_or_else(|| {
                Error::General(format!(
                    "Listed object {} is outside collection {}",
                    object.path, self.path
                ))
            })?;
            let local = local_root.join(relative_to_local(relative));
            targets.push((object, local));
        }

        stream::iter(targets)
            .map(|(object, local)| async move { self.download_file(&object, &local).await })
            .buffer_unordered(TRANSFER_CONCURRENCY)
            .try_fold(TransferSummary::default(), |total, one| async move {
                Ok(total.add(one))
            })
            .await
    }

    async fn upload_file(&self, local: &Path, remote: &LogicalPath) -> Result<TransferSummary> {
        let catalog = self.session.catalog();
        let chunk_size = catalog.max_chunk_size().max(1);
        let resource = self.session.descriptor().resource.as_deref();
        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|e| Error::io(local, e))?;

        // The first write truncates, so an empty file still replaces the object
        let mut sent = 0u64;
        let mut first = true;
        loop {
            let mut data = Vec::with_capacity(chunk_size);
            (&mut file)
                .take(chunk_size as u64)
                .read_to_end(&mut data)
                .await
                .map_err(|e| Error::io(local, e))?;
            if data.is_empty() && !first {
                break;
            }

            let len = data.len();
            catalog
                .write_chunk(remote, sent, data, first, resource)
                .await?;
            sent += len as u64;
            first = false;
            if len < chunk_size {
                break;
            }
        }

        match catalog.stat(remote).await? {
            Some(stored) if !stored.is_collection() && stored.size == sent => {}
            Some(stored) => {
                return Err(Error::connection(
                    remote.as_str(),
                    format!("stored {} of {sent} bytes", stored.size),
                ));
            }
            None => {
                return Err(Error::connection(
                    remote.as_str(),
                    "data object missing after upload",
                ));
            }
        }

        tracing::debug!(local = %local.display(), remote = %remote, bytes = sent, "Uploaded");
        Ok(TransferSummary::single(sent))
    }

    async fn upload_directory(&self, local_root: &Path) -> Result<TransferSummary> {
        self.ensure_collection(&self.path).await?;

        let mut collections = Vec::new();
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(local_root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(local_root).to_path_buf();
                Error::io(&path, e.into())
            })?;
            let relative = entry
                .path()
                .strip_prefix(local_root)
                .map_err(|e| Error::General(e.to_string()))?;
            let remote = self.path.join(&local_to_relative(relative))?;

            if entry.file_type().is_dir() {
                collections.push(remote);
            } else {
                files.push((entry.into_path(), remote));
            }
        }

        // Parents sort before their children, so each create finds its parent in place
        for collection in &collections {
            self.ensure_collection(collection).await?;
        }

        stream::iter(files)
            .map(|(local, remote)| async move { self.upload_file(&local, &remote).await })
            .buffer_unordered(TRANSFER_CONCURRENCY)
            .try_fold(TransferSummary::default(), |total, one| async move {
                Ok(total.add(one))
            })
            .await
    }

    // Root and zone collections are never created; an ancestor we may not
    // read is assumed to exist.
    async fn ensure_parent_collections(&self, path: &LogicalPath) -> Result<()> {
        for ancestor in path.ancestors().into_iter().skip(1) {
            match self.session.catalog().stat(&ancestor).await {
                Ok(Some(entry)) if entry.is_collection() => {}
                Ok(Some(_)) => {
                    return Err(Error::General(format!(
                        "Cannot create collection {ancestor}: a data object exists at that path"
                    )));
                }
                Ok(None) => match self.ensure_collection(&ancestor).await {
                    Err(Error::PermissionDenied { message, .. }) => {
                        tracing::debug!(path = %ancestor, %message, "Skipping parent collection we may not create");
                    }
                    other => other?,
                },
                Err(Error::PermissionDenied { message, .. }) => {
                    tracing::debug!(path = %ancestor, %message, "Skipping unreadable parent collection");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn ensure_collection(&self, path: &LogicalPath) -> Result<()> {
        self.session.catalog().create_collection(path).await
    }
}

fn partial_path(local: &Path) -> PathBuf {
    let mut name = local.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn discard_partial(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        tracing::debug!(path = %partial.display(), error = %e, "Could not remove partial download");
    }
}

fn catalog_mtime(entry: &CatalogEntry) -> Result<f64> {
    entry
        .modified
        .as_ref()
        .ok_or_else(|| {
            Error::General(format!(
                "Catalog reported no modification time for {}",
                entry.path
            ))
        })?
        .to_epoch_seconds()
}

fn relative_to_local(relative: &str) -> PathBuf {
    relative.split('/').collect()
}

fn local_to_relative(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
