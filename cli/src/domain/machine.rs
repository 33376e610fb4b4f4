//! Connection details read out of a machine vault.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::ClientError;

pub const DEFAULT_DATASTORE: &str = "/mnt/rediacc";
pub const DEFAULT_UNIVERSAL_USER: &str = "rediacc";
pub const DEFAULT_UNIVERSAL_USER_ID: &str = "7111";

/// Account that remote commands run under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniversalUser {
    pub name: String,
    pub id: String,
}

impl UniversalUser {
    /// Reads `UNIVERSAL_USER_NAME`/`UNIVERSAL_USER_ID` from a decrypted
    /// company vault, falling back per field to `fallback`.
    #[must_use]
    pub fn from_company_vault(vault: Option<&str>, fallback: &UniversalUser) -> Self {
        let parsed = vault
            .and_then(|v| serde_json::from_str::<Value>(v).ok())
            .unwrap_or(Value::Null);
        let field = |key: &str| {
            match parsed.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        };
        Self {
            name: field("UNIVERSAL_USER_NAME").unwrap_or_else(|| fallback.name.clone()),
            id: field("UNIVERSAL_USER_ID").unwrap_or_else(|| fallback.id.clone()),
        }
    }
}

impl Default for UniversalUser {
    fn default() -> Self {
        Self {
            name: DEFAULT_UNIVERSAL_USER.to_string(),
            id: DEFAULT_UNIVERSAL_USER_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineConnectionInfo {
    pub name: String,
    pub ip: String,
    pub user: String,
    pub datastore: String,
    /// Pinned `known_hosts` line, if the machine has one.
    pub host_entry: Option<String>,
    pub universal_user: UniversalUser,
}

impl MachineConnectionInfo {
    /// Reads connection details from a decrypted machine vault.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedResponse`] when the vault is not an
    /// object or lacks an ip or user.
    pub fn from_vault(
        name: &str,
        vault: &Value,
        universal_user: &UniversalUser,
    ) -> Result<Self, ClientError> {
        let Value::Object(map) = vault else {
            return Err(ClientError::MalformedResponse(format!(
                "vault of machine '{name}' is not an object"
            )));
        };
        let field = |lower: &str, upper: &str| {
            map.get(lower)
                .or_else(|| map.get(upper))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let missing =
            |what: &str| ClientError::MalformedResponse(format!("machine '{name}' has no {what}"));

        Ok(Self {
            name: name.to_string(),
            ip: field("ip", "IP").ok_or_else(|| missing("ip"))?,
            user: field("user", "USER").ok_or_else(|| missing("ssh user"))?,
            datastore: field("datastore", "DATASTORE")
                .unwrap_or_else(|| DEFAULT_DATASTORE.to_string()),
            host_entry: field("host_entry", "HOST_ENTRY"),
            universal_user: universal_user.clone(),
        })
    }

    /// `user@ip` destination for `ssh`.
    #[must_use]
    pub fn ssh_target(&self) -> String {
        format!("{}@{}", self.user, self.ip)
    }
}
