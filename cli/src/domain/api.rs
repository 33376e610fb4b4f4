//! Wire conventions of the `StoredProcedure` API: URLs, headers, password
//! hashing, error derivation and request-token rotation lookup.
//!
//! Pure functions only. No I/O, no async.

use rediacc_common::{ApiResponse, ResultTable};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::error::ClientError;

pub const HEADER_USER_EMAIL: &str = "Rediacc-UserEmail";
pub const HEADER_USER_HASH: &str = "Rediacc-UserHash";
pub const HEADER_REQUEST_TOKEN: &str = "Rediacc-RequestToken";

/// Row field carrying a rotated credential. The PascalCase spelling is also
/// accepted.
pub const ROTATION_FIELD: &str = "nextRequestToken";
const ROTATION_FIELD_PASCAL: &str = "NextRequestToken";

/// Fixed salt appended to passwords before hashing. Shared with the server.
pub const STATIC_SALT: &str = "Rd!@cc111$ecur3P@$$w0rd$@lt#H@$h";

/// Endpoints that must not trigger the company-vault prefetch.
pub const BOOTSTRAP_ENDPOINTS: &[&str] = &[
    "CreateAuthenticationRequest",
    "ActivateUserAccount",
    "CreateNewCompany",
    "DeleteUserRequest",
    "GetCompanyVault",
    "GetRequestAuthenticationStatus",
    "PrivilegeAuthenticationRequest",
];

#[must_use]
pub fn is_bootstrap_endpoint(endpoint: &str) -> bool {
    BOOTSTRAP_ENDPOINTS.contains(&endpoint)
}

/// Builds the URL for `endpoint`.
///
/// A base that already ends in `/api` gets `/StoredProcedure/<endpoint>`;
/// anything else gets `/api/StoredProcedure/<endpoint>`.
#[must_use]
pub fn endpoint_url(base: &str, endpoint: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/api") {
        format!("{base}/StoredProcedure/{endpoint}")
    } else {
        format!("{base}/api/StoredProcedure/{endpoint}")
    }
}

/// `0x` + lowercase hex of `SHA256(password + STATIC_SALT)`.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(STATIC_SALT.as_bytes());
    format!("0x{}", hex_encode(&hasher.finalize()))
}

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}

/// Derives a human message from an error body.
///
/// Preference: `errors[]` joined with `"; "`, then `message`, then `error`,
/// then `"API Error: <status>"`.
#[must_use]
pub fn error_message(body: &Value, status: u16) -> String {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        let parts: Vec<String> = errors
            .iter()
            .filter_map(|e| match e {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Null => None,
                Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .collect();
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }
    for key in ["message", "error"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str)
            && !msg.is_empty()
        {
            return msg.to_string();
        }
    }
    format!("API Error: {status}")
}

/// Normalizes an HTTP status and body into a parsed response.
///
/// # Errors
///
/// Any non-200 status becomes [`ClientError::Http`] with a derived message;
/// a 200 body that is not the expected shape becomes
/// [`ClientError::MalformedResponse`].
pub fn parse_response(status: u16, body: &str) -> Result<ApiResponse, ClientError> {
    if status != 200 {
        let value = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
        return Err(ClientError::Http {
            status,
            message: error_message(&value, status),
        });
    }
    serde_json::from_str(body).map_err(|e| ClientError::MalformedResponse(e.to_string()))
}

/// Application-level failure check for an HTTP 200 body.
///
/// # Errors
///
/// Returns [`ClientError::Http`] with status 400 when `failure` is set.
pub fn check_application_failure(response: &ApiResponse) -> Result<(), ClientError> {
    if !response.has_failure() {
        return Ok(());
    }
    let body = serde_json::json!({
        "errors": response.errors,
        "message": response.message,
    });
    Err(ClientError::Http {
        status: 400,
        message: error_message(&body, 400),
    })
}

/// Finds the first rotated request token in `tables`.
///
/// Visits tables in order, rows in order, and descends into nested objects
/// and arrays depth-first. Stops at the first string-valued
/// `nextRequestToken`/`NextRequestToken`.
#[must_use]
pub fn find_rotation_token(tables: &[ResultTable]) -> Option<&str> {
    tables
        .iter()
        .flat_map(|t| t.data.iter())
        .find_map(visit_map)
}

fn visit_map(map: &serde_json::Map<String, Value>) -> Option<&str> {
    for key in [ROTATION_FIELD, ROTATION_FIELD_PASCAL] {
        if let Some(Value::String(token)) = map.get(key)
            && !token.is_empty()
        {
            return Some(token);
        }
    }
    map.values().find_map(visit_value)
}

fn visit_value(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => visit_map(map),
        Value::Array(items) => items.iter().find_map(visit_value),
        _ => None,
    }
}
