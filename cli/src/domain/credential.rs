//! Session credential and identity metadata.
//!
//! Pure types and validation; persistence lives behind the
//! `CredentialStore` port.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ClientError;

/// Environment variable that injects a credential, overriding the stored one.
pub const TOKEN_ENV: &str = "REDIACC_TOKEN";

/// Canonical hyphenated hex token, anchored at both ends. Surrounding
/// whitespace makes a value invalid.
pub static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid regex")
});

/// Returns `true` if `value` matches [`TOKEN_RE`].
#[must_use]
pub fn is_valid_token(value: &str) -> bool {
    TOKEN_RE.is_match(value)
}

/// An opaque bearer token, format-validated on construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validates and wraps `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidFormat`] if `value` is not a canonical
    /// hyphenated hex token.
    pub fn parse(value: &str) -> Result<Self, ClientError> {
        if is_valid_token(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ClientError::InvalidFormat(mask(value.trim())))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters followed by an ellipsis, for logs.
    #[must_use]
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

fn mask(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}...")
}

/// Where the active credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Supplied explicitly by the caller for this operation.
    Override,
    /// Injected through [`TOKEN_ENV`].
    Environment,
    /// Read from the persisted credential file.
    File,
}

/// Identity metadata stored alongside the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Company vault blob; ciphertext when the company uses a master password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_company: Option<String>,
}
