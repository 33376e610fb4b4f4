//! Application service: resolve a machine's connection details and its
//! team's SSH key through the API.

use rediacc_common::{Row, row_field, row_str};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::application::ports::ApiCaller;
use crate::domain::error::ClientError;
use crate::domain::machine::{MachineConnectionInfo, UniversalUser};
use crate::domain::vault;

/// A machine plus the bridge that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMachine {
    pub info: MachineConnectionInfo,
    pub bridge: Option<String>,
}

/// Looks up `machine` in `team` and reads its connection vault.
///
/// # Errors
///
/// Gateway failures; [`ClientError::Http`] 404 when the machine is unknown;
/// [`ClientError::DecryptionFailed`] when the vault is still ciphertext;
/// [`ClientError::MalformedResponse`] when the vault lacks connection data.
pub async fn resolve_machine(
    api: &impl ApiCaller,
    team: &str,
    machine: &str,
    universal_user: &UniversalUser,
) -> Result<ResolvedMachine, ClientError> {
    let response = api.call("GetTeamMachines", team_params(team)).await?;
    let row = response
        .rows(1)
        .iter()
        .find(|row| row_str(row, "machineName") == Some(machine))
        .ok_or_else(|| not_found(format!("Machine '{machine}' not found in team '{team}'")))?;

    let vault = row_vault(row, &format!("machine '{machine}'"))?;
    let info = MachineConnectionInfo::from_vault(machine, &vault, universal_user)?;
    Ok(ResolvedMachine {
        info,
        bridge: row_str(row, "bridgeName").map(str::to_string),
    })
}

/// Reads the team's SSH private key from its vault.
///
/// # Errors
///
/// Gateway failures; [`ClientError::Http`] 404 for an unknown team;
/// [`ClientError::SshSetupFailed`] when the team has no key.
pub async fn team_ssh_key(api: &impl ApiCaller, team: &str) -> Result<String, ClientError> {
    let response = api.call("GetCompanyTeams", Map::new()).await?;
    let row = response
        .rows(1)
        .iter()
        .find(|row| row_str(row, "teamName") == Some(team))
        .ok_or_else(|| not_found(format!("Team '{team}' not found")))?;

    let vault = row_vault(row, &format!("team '{team}'"))?;
    vault
        .get("SSH_PRIVATE_KEY")
        .and_then(Value::as_str)
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClientError::SshSetupFailed(format!("team '{team}' has no SSH key")))
}

/// Universal user from the cached company vault, decrypting it when needed.
#[must_use]
pub fn universal_user(
    company_vault: Option<&str>,
    master_password: Option<&str>,
    fallback: &UniversalUser,
) -> UniversalUser {
    let plain = match (company_vault, master_password) {
        (Some(v), Some(pw)) if vault::is_encrypted(v) => match vault::decrypt(v, pw) {
            Ok(plain) => Some(plain),
            Err(e) => {
                debug!("company vault unreadable: {e}");
                None
            }
        },
        (Some(v), _) => Some(v.to_string()),
        (None, _) => None,
    };
    UniversalUser::from_company_vault(plain.as_deref(), fallback)
}

fn team_params(team: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("teamName".into(), json!(team));
    params
}

fn not_found(message: String) -> ClientError {
    ClientError::Http {
        status: 404,
        message,
    }
}

/// Parses the `vaultContent` column, which is JSON text or an inline object.
fn row_vault(row: &Row, what: &str) -> Result<Value, ClientError> {
    match row_field(row, "vaultContent") {
        Some(Value::String(text)) if vault::is_encrypted(text) => {
            Err(ClientError::DecryptionFailed)
        }
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|e| ClientError::MalformedResponse(format!("vault of {what}: {e}"))),
        Some(obj @ Value::Object(_)) => Ok(obj.clone()),
        _ => Err(ClientError::MalformedResponse(format!("{what} has no vault"))),
    }
}
