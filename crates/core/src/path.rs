//! Logical path parsing and resolution
//!
//! iRODS addresses everything by absolute logical paths of the form
//! `/zone/home/user/collection/object`. Storage queries use the URL form
//! `irods://zone/home/user/object`, where the URL host is the zone.

use url::Url;

use crate::error::{Error, Result};

/// Query scheme accepted by the adapter
pub const QUERY_SCHEME: &str = "irods";

/// An absolute, normalized logical path in the data grid
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalPath {
    inner: String,
}

impl LogicalPath {
    /// Create a logical path from an absolute path string
    ///
    /// Repeated slashes and a trailing slash are removed. `.` and `..`
    /// components are rejected.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref();
        if !path.starts_with('/') {
            return Err(Error::InvalidPath(format!(
                "Logical path '{path}' must be absolute"
            )));
        }

        let mut inner = String::with_capacity(path.len());
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if component == "." || component == ".." {
                return Err(Error::InvalidPath(format!(
                    "Logical path '{path}' must not contain '.' or '..'"
                )));
            }
            inner.push('/');
            inner.push_str(component);
        }

        if inner.is_empty() {
            inner.push('/');
        }

        Ok(Self { inner })
    }

    /// Resolve a path that may be relative to a home collection
    pub fn resolve(path: &str, home: Option<&LogicalPath>) -> Result<Self> {
        if path.starts_with('/') {
            return Self::new(path);
        }
        match home {
            Some(home) => Self::new(format!("{}/{path}", home.as_str())),
            None => Err(Error::InvalidPath(format!(
                "Relative path '{path}' needs a home collection"
            ))),
        }
    }

    /// The path as a string
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Whether this is the root `/`
    pub fn is_root(&self) -> bool {
        self.inner == "/"
    }

    /// Path components, root excluded
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|c| !c.is_empty())
    }

    /// The zone, i.e. the first component
    pub fn zone(&self) -> Option<&str> {
        self.components().next()
    }

    /// The last component
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.inner.rsplit('/').next()
        }
    }

    /// Get the parent path (one level up)
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let pos = self.inner.rfind('/')?;
        let parent = if pos == 0 { "/" } else { &self.inner[..pos] };
        Some(Self {
            inner: parent.to_string(),
        })
    }

    /// Ancestors from the outermost down, excluding `self` and the root
    pub fn ancestors(&self) -> Vec<Self> {
        let mut chain = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            chain.push(path);
        }
        chain.reverse();
        chain
    }

    /// Join a relative child path (may contain several components)
    pub fn join(&self, child: &str) -> Result<Self> {
        let base = self.inner.trim_end_matches('/');
        Self::new(format!("{base}/{child}"))
    }

    /// The path relative to `base`, when `base` is an ancestor
    pub fn strip_prefix(&self, base: &LogicalPath) -> Option<&str> {
        if base.is_root() {
            return Some(self.inner.trim_start_matches('/'));
        }
        let rest = self.inner.strip_prefix(base.as_str())?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Suffix used for the local mirror of this path
    pub fn local_suffix(&self) -> &str {
        self.inner.trim_start_matches('/')
    }
}

impl std::fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<str> for LogicalPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

/// Parse a storage query `irods://zone/path` into a logical path
pub fn parse_query(query: &str) -> Result<LogicalPath> {
    let url = Url::parse(query)
        .map_err(|e| Error::InvalidPath(format!("Invalid query '{query}': {e}")))?;

    if url.scheme() != QUERY_SCHEME {
        return Err(Error::InvalidPath(format!(
            "Query '{query}' does not start with {QUERY_SCHEME}://"
        )));
    }

    // Take zone and path from the raw query so names are not percent-encoded
    let raw = query.split_once("://").map_or("", |(_, rest)| rest);
    let (zone, rest) = raw.split_once('/').unwrap_or((raw, ""));
    let rest = rest.trim_start_matches('/');
    if url.host_str().is_none() || zone.is_empty() || rest.is_empty() {
        return Err(Error::InvalidPath(format!(
            "Query '{query}' does not contain a path to a file or directory"
        )));
    }

    LogicalPath::new(format!("/{zone}/{rest}"))
}

/// Check whether a query addresses this storage
///
/// Wildcards such as `{sample}` are accepted; they are resolved by the
/// caller before an object is used.
pub fn is_valid_query(query: &str) -> std::result::Result<(), String> {
    match query.split_once("://") {
        Some((QUERY_SCHEME, rest)) if !rest.trim_matches('/').is_empty() => Ok(()),
        Some((QUERY_SCHEME, _)) => Err(
            "Query does not contain a path to a file or directory.".to_string(),
        ),
        _ => Err(format!("Query does not start with {QUERY_SCHEME}://.")),
    }
}
