//! Storage resource capacity

use crate::error::Result;
use crate::session::Session;

/// Reports free space on storage resources
#[derive(Debug, Clone, Copy)]
pub struct QuotaReporter<'a> {
    session: &'a Session,
}

impl<'a> QuotaReporter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Free bytes on `resource`
    ///
    /// `Ok(None)` means the catalog does not track free space for the
    /// resource. That is "unknown", not zero.
    pub async fn available_space(&self, resource: &str) -> Result<Option<u64>> {
        let raw = self.session.catalog().resource_free_space(resource).await?;
        Ok(raw.as_deref().and_then(|value| parse_free_space(resource, value)))
    }

    /// Free bytes on the configured default resource
    ///
    /// `Ok(None)` when no default resource is configured.
    pub async fn available_space_default(&self) -> Result<Option<u64>> {
        match self.session.descriptor().resource.as_deref() {
            Some(resource) => self.available_space(resource).await,
            None => Ok(None),
        }
    }
}

fn parse_free_space(resource: &str, value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<u64>() {
        Ok(bytes) => Some(bytes),
        Err(_) => {
            tracing::warn!(resource, value, "Ignoring unparsable free space value");
            None
        }
    }
}
