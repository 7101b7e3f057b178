//! irs-http: iRODS HTTP API client for irods-storage
//!
//! Implements the `Connector` and `Catalog` traits from irs-core on top of
//! the iRODS HTTP API. It is the only crate that depends on `reqwest`.

pub mod client;
pub mod response;
pub mod tls;

pub use client::{HttpCatalog, HttpConnector};
