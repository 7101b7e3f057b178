//! HTTP client construction
//!
//! Translates the descriptor's TLS policy and timeouts into a `reqwest`
//! client, and derives the API base URL.

use irs_core::{ConnectionDescriptor, Error, Result, SslVerify, TlsPolicy};
use reqwest::{Certificate, Client, ClientBuilder};
use url::Url;

const USER_AGENT: &str = concat!("irods-storage/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client for a descriptor
pub fn build_client(descriptor: &ConnectionDescriptor) -> Result<Client> {
    let builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(descriptor.connect_timeout)
        .read_timeout(descriptor.read_timeout);

    apply_tls(builder, &descriptor.tls)?
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))
}

/// Apply the verification mode and CA file
///
/// With TLS disabled nothing is applied and plain HTTP is used.
pub fn apply_tls(builder: ClientBuilder, tls: &TlsPolicy) -> Result<ClientBuilder> {
    if !tls.enabled {
        return Ok(builder);
    }

    let mut builder = match tls.verify {
        SslVerify::None => builder.danger_accept_invalid_certs(true),
        SslVerify::Cert => builder.danger_accept_invalid_hostnames(true),
        SslVerify::Hostname => builder,
    };

    if let Some(ca_file) = &tls.ca_file {
        let pem = std::fs::read(ca_file).map_err(|e| {
            Error::Config(format!(
                "Cannot read CA certificate file {}: {e}",
                ca_file.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem).map_err(|e| {
            Error::Config(format!(
                "Invalid CA certificate file {}: {e}",
                ca_file.display()
            ))
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    Ok(builder.https_only(true))
}

/// Base URL of the HTTP API, without a trailing slash
pub fn base_url(descriptor: &ConnectionDescriptor) -> Result<String> {
    let scheme = if descriptor.tls.enabled { "https" } else { "http" };
    let path = descriptor.api_base_path.trim_matches('/');
    let raw = if path.is_empty() {
        format!("{scheme}://{}:{}", descriptor.host, descriptor.api_port)
    } else {
        format!("{scheme}://{}:{}/{path}", descriptor.host, descriptor.api_port)
    };

    let url = Url::parse(&raw)
        .map_err(|e| Error::Config(format!("Invalid iRODS HTTP API address '{raw}': {e}")))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use irs_core::credentials::resolve_layers;
    use irs_core::{Secret, StorageSettings};
    use tempfile::TempDir;

    fn descriptor(tls: Option<SslVerify>) -> ConnectionDescriptor {
        let settings = StorageSettings {
            host: Some("data.example.org".into()),
            zone: Some("tempZone".into()),
            user: Some("alice".into()),
            password: Some(Secret::new("pw")),
            ssl_enabled: Some(tls.is_some()),
            ssl_verify: tls,
            ..Default::default()
        };
        resolve_layers(&settings, &StorageSettings::default(), None).unwrap()
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            base_url(&descriptor(None)).unwrap(),
            "http://data.example.org:9000/irods-http-api/0.3.0"
        );
        assert_eq!(
            base_url(&descriptor(Some(SslVerify::Hostname))).unwrap(),
            "https://data.example.org:9000/irods-http-api/0.3.0"
        );
    }

    #[test]
    fn test_base_url_custom_path() {
        let mut d = descriptor(None);
        d.api_port = 8080;
        d.api_base_path = "/".into();
        assert_eq!(base_url(&d).unwrap(), "http://data.example.org:8080");

        d.api_base_path = "gateway/irods/".into();
        assert_eq!(
            base_url(&d).unwrap(),
            "http://data.example.org:8080/gateway/irods"
        );
    }

    #[test]
    fn test_invalid_host() {
        let mut d = descriptor(None);
        d.host = "bad host".into();
        assert!(matches!(base_url(&d), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_client_for_each_verify_mode() {
        for verify in [SslVerify::None, SslVerify::Cert, SslVerify::Hostname] {
            assert!(build_client(&descriptor(Some(verify))).is_ok());
        }
        assert!(build_client(&descriptor(None)).is_ok());
    }

    #[test]
    fn test_missing_ca_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut d = descriptor(Some(SslVerify::Hostname));
        d.tls.ca_file = Some(temp_dir.path().join("absent.pem"));
        assert!(matches!(build_client(&d), Err(Error::Config(_))));
    }

    #[test]
    fn test_ca_file_ignored_without_tls() {
        let temp_dir = TempDir::new().unwrap();
        let mut d = descriptor(None);
        d.tls.ca_file = Some(temp_dir.path().join("absent.pem"));
        assert!(build_client(&d).is_ok());
    }
}
