//! Application service: login, logout and session status.

use rediacc_common::row_str;
use serde::Serialize;
use serde_json::{Map, json};
use tracing::debug;

use crate::application::ports::{
    ApiCaller, CredentialStore, HttpTransport, SingleFlightLock, TelemetrySink,
};
use crate::application::services::gateway::Gateway;
use crate::domain::api::{find_rotation_token, hash_password};
use crate::domain::credential::{CredentialSource, Identity};
use crate::domain::error::ClientError;

pub const SESSION_NAME: &str = "rediacc-cli";

/// Exchanges email and password for a session credential and stores it.
///
/// # Errors
///
/// Any gateway failure, [`ClientError::MalformedResponse`] when the server
/// returns no credential, or a storage error.
pub async fn login<S, L, T, M>(
    gateway: &Gateway<'_, S, L, T, M>,
    email: &str,
    password: &str,
) -> Result<Identity, ClientError>
where
    S: CredentialStore,
    L: SingleFlightLock,
    T: HttpTransport,
    M: TelemetrySink,
{
    let mut params = Map::new();
    params.insert("name".into(), json!(SESSION_NAME));
    let response = gateway
        .auth_request(
            "CreateAuthenticationRequest",
            email,
            &hash_password(password),
            params,
        )
        .await?;

    let token = find_rotation_token(&response.result_sets)
        .ok_or_else(|| ClientError::MalformedResponse("login returned no credential".into()))?;

    let row = response.first_row(1);
    let field = |name: &str| row.and_then(|r| row_str(r, name)).map(str::to_string);
    let identity = Identity {
        email: Some(email.to_string()),
        company: field("companyName"),
        vault_company: field("vaultCompany"),
    };

    gateway.store().set_credential(token, Some(&identity))?;
    Ok(identity)
}

/// Result of [`logout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogoutOutcome {
    /// The server acknowledged the session end.
    pub server_confirmed: bool,
}

/// Ends the server session (best effort) and clears local credentials.
///
/// # Errors
///
/// Only a failure to clear local storage is returned.
pub async fn logout<S, L, T, M>(
    gateway: &Gateway<'_, S, L, T, M>,
) -> Result<LogoutOutcome, ClientError>
where
    S: CredentialStore,
    L: SingleFlightLock,
    T: HttpTransport,
    M: TelemetrySink,
{
    let server_confirmed = match gateway.call("DeleteUserRequest", Map::new()).await {
        Ok(_) => true,
        Err(e) => {
            debug!("server logout failed: {e}");
            false
        }
    };
    gateway.store().clear()?;
    Ok(LogoutOutcome { server_confirmed })
}

/// Snapshot of the local session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub source: Option<CredentialSource>,
    /// Masked credential.
    pub credential: Option<String>,
    #[serde(flatten)]
    pub identity: Identity,
}

/// Reports the active credential and identity without calling the server.
#[must_use]
pub fn status(store: &impl CredentialStore, override_token: Option<&str>) -> SessionStatus {
    let resolved = store.resolve_credential(override_token);
    let identity = store.identity().unwrap_or_else(|e| {
        debug!("identity unavailable: {e}");
        Identity::default()
    });
    SessionStatus {
        authenticated: resolved.is_some(),
        source: resolved.as_ref().map(|(_, s)| *s),
        credential: resolved.map(|(c, _)| c.masked()),
        identity,
    }
}
