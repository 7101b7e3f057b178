//! Response decoding and error mapping
//!
//! Every JSON body from the HTTP API carries an `irods_response` object with
//! the iRODS status code. Codes are mapped to `irs_core::Error` kinds here;
//! the server's message is passed through unchanged.

use irs_core::Error;
use reqwest::StatusCode;
use serde::Deserialize;

pub const CAT_NO_ROWS_FOUND: i64 = -808000;
pub const CAT_UNKNOWN_COLLECTION: i64 = -814000;
pub const CAT_UNKNOWN_FILE: i64 = -817000;
pub const CAT_NO_ACCESS_PERMISSION: i64 = -818000;
pub const CAT_INVALID_AUTHENTICATION: i64 = -826000;
pub const CAT_INVALID_USER: i64 = -827000;
pub const OBJ_PATH_DOES_NOT_EXIST: i64 = -358000;
pub const SYS_RESC_QUOTA_EXCEEDED: i64 = -186000;

/// Status block present in every JSON response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IrodsStatus {
    pub status_code: i64,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl IrodsStatus {
    pub fn is_ok(&self) -> bool {
        self.status_code == 0
    }

    /// Convert a failed status into an error for `path`
    pub fn into_result(self, path: &str) -> irs_core::Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        Err(map_status_code(
            self.status_code,
            self.status_message.as_deref(),
            path,
        ))
    }
}

/// Body that only reports a status
#[derive(Debug, Deserialize)]
pub struct StatusOnly {
    pub irods_response: IrodsStatus,
}

/// GenQuery result
#[derive(Debug, Deserialize)]
pub struct QueryRows {
    pub irods_response: IrodsStatus,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl QueryRows {
    /// Rows of this page; `CAT_NO_ROWS_FOUND` is an empty page, not an error
    pub fn into_rows(self, path: &str) -> irs_core::Result<Vec<Vec<String>>> {
        if self.irods_response.status_code / 1000 * 1000 == CAT_NO_ROWS_FOUND {
            return Ok(Vec::new());
        }
        self.irods_response.into_result(path)?;
        Ok(self.rows)
    }
}

/// Map an iRODS status code to an error kind
///
/// iRODS folds errno into the low three digits (`-358002`), so the code is
/// rounded to its base value first.
pub fn map_status_code(code: i64, message: Option<&str>, path: &str) -> Error {
    let base = code / 1000 * 1000;
    let message = match message.filter(|m| !m.is_empty()) {
        Some(message) => message.to_string(),
        None => format!("{} ({code})", code_name(base)),
    };

    match base {
        CAT_NO_ROWS_FOUND | CAT_UNKNOWN_COLLECTION | CAT_UNKNOWN_FILE | OBJ_PATH_DOES_NOT_EXIST => {
            Error::not_found(path, message)
        }
        CAT_NO_ACCESS_PERMISSION => Error::PermissionDenied {
            path: path.to_string(),
            message,
        },
        CAT_INVALID_AUTHENTICATION | CAT_INVALID_USER => Error::Auth(message),
        SYS_RESC_QUOTA_EXCEEDED => Error::QuotaExceeded {
            path: path.to_string(),
            message,
        },
        _ => Error::General(format!("{path}: {message}")),
    }
}

/// Map a non-success HTTP response
///
/// A JSON body with an iRODS status wins over the HTTP status.
pub fn map_http_error(status: StatusCode, body: &str, path: &str) -> Error {
    let irods = serde_json::from_str::<StatusOnly>(body)
        .ok()
        .map(|decoded| decoded.irods_response)
        .filter(|irods| !irods.is_ok());
    if let Some(irods) = irods {
        return map_status_code(irods.status_code, irods.status_message.as_deref(), path);
    }

    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        body.trim().to_string()
    };

    match status {
        StatusCode::UNAUTHORIZED => Error::Auth(message),
        StatusCode::FORBIDDEN => Error::PermissionDenied {
            path: path.to_string(),
            message,
        },
        StatusCode::NOT_FOUND => Error::not_found(path, message),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Error::connection(path, message)
        }
        _ => Error::General(format!("HTTP {}: {path}: {message}", status.as_u16())),
    }
}

/// Map a transport failure
pub fn map_transport_error(error: &reqwest::Error, path: &str) -> Error {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    Error::connection(path, message)
}

fn code_name(base: i64) -> &'static str {
    match base {
        CAT_NO_ROWS_FOUND => "CAT_NO_ROWS_FOUND",
        CAT_UNKNOWN_COLLECTION => "CAT_UNKNOWN_COLLECTION",
        CAT_UNKNOWN_FILE => "CAT_UNKNOWN_FILE",
        CAT_NO_ACCESS_PERMISSION => "CAT_NO_ACCESS_PERMISSION",
        CAT_INVALID_AUTHENTICATION => "CAT_INVALID_AUTHENTICATION",
        CAT_INVALID_USER => "CAT_INVALID_USER",
        OBJ_PATH_DOES_NOT_EXIST => "OBJ_PATH_DOES_NOT_EXIST",
        SYS_RESC_QUOTA_EXCEEDED => "SYS_RESC_QUOTA_EXCEEDED",
        _ => "iRODS error",
    }
}
