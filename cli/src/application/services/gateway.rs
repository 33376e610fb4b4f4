//! Application service: the authenticated request gateway.
//!
//! Every credential-bearing call runs under the cross-process single-flight
//! lock, so at most one request per credential is in flight. Responses may
//! rotate the credential; the rotated value is persisted only when doing so
//! cannot clobber a newer credential written by someone else.

use std::time::{Duration, Instant};

use rediacc_common::{ApiResponse, row_str};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::application::ports::{
    ApiCaller, CredentialStore, HttpRequest, HttpResponse, HttpTransport, SingleFlightLock,
    TelemetryEvent, TelemetrySink,
};
use crate::domain::api::{
    HEADER_REQUEST_TOKEN, HEADER_USER_EMAIL, HEADER_USER_HASH, check_application_failure,
    endpoint_url, find_rotation_token, is_bootstrap_endpoint, parse_response,
};
use crate::domain::credential::{Credential, CredentialSource};
use crate::domain::error::ClientError;
use crate::domain::vault::{self, FieldDecryption, VAULT_FIELDS};

/// Retries after a 401 when the stored credential changed underneath us.
pub const MAX_AUTH_RETRIES: u32 = 2;
const AUTH_RETRY_STEP: Duration = Duration::from_millis(100);

const COMPANY_VAULT_ENDPOINT: &str = "GetCompanyVault";
/// Columns that may carry the company vault blob, in preference order.
const COMPANY_VAULT_COLUMNS: [&str; 3] = ["vaultCompany", "companyVault", "vaultContent"];
const EMPTY_VAULT: &str = "{}";

pub struct GatewayConfig {
    pub base_url: String,
    pub lock_timeout: Duration,
    /// Enables field-level vault encryption when set.
    pub master_password: Option<Zeroizing<String>>,
}

/// Per-call options for [`Gateway::token_request`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions<'a> {
    /// Use this credential instead of the environment or stored one.
    pub credential: Option<&'a str>,
    /// Never persist a rotated credential for this call.
    pub pin_credential: bool,
}

pub struct Gateway<'a, S, L, T, M> {
    store: &'a S,
    lock: &'a L,
    transport: &'a T,
    telemetry: &'a M,
    config: GatewayConfig,
}

impl<'a, S, L, T, M> Gateway<'a, S, L, T, M>
where
    S: CredentialStore,
    L: SingleFlightLock,
    T: HttpTransport,
    M: TelemetrySink,
{
    pub fn new(
        store: &'a S,
        lock: &'a L,
        transport: &'a T,
        telemetry: &'a M,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            lock,
            transport,
            telemetry,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        self.store
    }

    /// Authenticated call to `endpoint`.
    ///
    /// # Errors
    ///
    /// [`ClientError::LockTimeout`] if the single-flight lock is not acquired
    /// in time, [`ClientError::Unauthenticated`] without a credential, and
    /// any transport, HTTP or application failure of the call itself.
    pub async fn token_request(
        &self,
        endpoint: &str,
        params: Map<String, Value>,
        opts: &RequestOptions<'_>,
    ) -> Result<ApiResponse, ClientError> {
        let started = Instant::now();
        let result = self.token_request_locked(endpoint, params, opts).await;
        self.telemetry
            .record(&TelemetryEvent::from_result(endpoint, started.elapsed(), &result));
        result
    }

    /// Unauthenticated call carrying email and password hash headers.
    ///
    /// # Errors
    ///
    /// Transport, HTTP or application failures.
    pub async fn auth_request(
        &self,
        endpoint: &str,
        email: &str,
        password_hash: &str,
        params: Map<String, Value>,
    ) -> Result<ApiResponse, ClientError> {
        let started = Instant::now();
        let result = async {
            let request = HttpRequest {
                url: endpoint_url(&self.config.base_url, endpoint),
                headers: vec![
                    (HEADER_USER_EMAIL.to_string(), email.to_string()),
                    (HEADER_USER_HASH.to_string(), password_hash.to_string()),
                ],
                body: Value::Object(params),
            };
            let http = self.transport.post_json(&request).await?;
            let response = parse_response(http.status, &http.body)?;
            check_application_failure(&response)?;
            Ok(response)
        }
        .await;
        self.telemetry
            .record(&TelemetryEvent::from_result(endpoint, started.elapsed(), &result));
        result
    }

    async fn token_request_locked(
        &self,
        endpoint: &str,
        mut params: Map<String, Value>,
        opts: &RequestOptions<'_>,
    ) -> Result<ApiResponse, ClientError> {
        let _guard = self.lock.acquire(self.config.lock_timeout).await?;

        let (mut credential, source) = self
            .store
            .resolve_credential(opts.credential)
            .ok_or(ClientError::Unauthenticated)?;

        if !is_bootstrap_endpoint(endpoint) {
            credential = self.ensure_vault_company(credential, source, opts).await;
        }

        if let Some(password) = &self.config.master_password {
            let n = vault::encrypt_fields(&mut params, password.as_str(), VAULT_FIELDS)?;
            if n > 0 {
                debug!(endpoint, fields = n, "encrypted outgoing vault fields");
            }
        }

        let (mut response, _) = self
            .exchange(endpoint, &Value::Object(params), credential, source, opts)
            .await?;
        check_application_failure(&response)?;
        self.decrypt_response(endpoint, &mut response);
        Ok(response)
    }

    /// POST with 401 retry, then rotation. Returns the response and the
    /// credential that is current afterwards.
    async fn exchange(
        &self,
        endpoint: &str,
        body: &Value,
        mut credential: Credential,
        source: CredentialSource,
        opts: &RequestOptions<'_>,
    ) -> Result<(ApiResponse, Credential), ClientError> {
        let url = endpoint_url(&self.config.base_url, endpoint);
        let mut attempt = 0;
        let http = loop {
            let http = self.post_with_token(&url, body, &credential).await?;
            if http.status != 401 || attempt >= MAX_AUTH_RETRIES {
                break http;
            }
            attempt += 1;
            tokio::time::sleep(AUTH_RETRY_STEP * attempt).await;
            match self.store.get_credential(opts.credential) {
                Some(fresh) if fresh != credential => {
                    debug!(endpoint, attempt, "credential changed; retrying after 401");
                    credential = fresh;
                }
                _ => break http,
            }
        };

        let response = parse_response(http.status, &http.body)?;
        let current = self
            .apply_rotation(&response, &credential, source, opts)
            .unwrap_or(credential);
        Ok((response, current))
    }

    async fn post_with_token(
        &self,
        url: &str,
        body: &Value,
        credential: &Credential,
    ) -> Result<HttpResponse, ClientError> {
        let request = HttpRequest {
            url: url.to_string(),
            headers: vec![(HEADER_REQUEST_TOKEN.to_string(), credential.as_str().to_string())],
            body: body.clone(),
        };
        self.transport.post_json(&request).await
    }

    /// Persists a rotated credential when safe. Returns the rotated
    /// credential whether or not it was persisted.
    fn apply_rotation(
        &self,
        response: &ApiResponse,
        used: &Credential,
        source: CredentialSource,
        opts: &RequestOptions<'_>,
    ) -> Option<Credential> {
        let raw = find_rotation_token(&response.result_sets)?;
        let next = match Credential::parse(raw) {
            Ok(c) => c,
            Err(e) => {
                debug!("ignoring rotated credential: {e}");
                return None;
            }
        };
        if next == *used {
            return None;
        }

        if opts.pin_credential {
            debug!("credential pinned by caller; rotation not persisted");
        } else if source == CredentialSource::Environment || self.store.env_override_active() {
            debug!("environment credential active; rotation not persisted");
        } else if self.store.stored_credential().as_ref() != Some(used) {
            debug!("stored credential changed concurrently; rotation not persisted");
        } else {
            match self.store.save(&next, None) {
                Ok(()) => info!(credential = %next.masked(), "credential rotated"),
                Err(e) => warn!("could not persist rotated credential: {e}"),
            }
        }
        Some(next)
    }

    /// Caches the company vault blob in the identity metadata, once.
    ///
    /// Best effort: every failure is logged and the call proceeds.
    async fn ensure_vault_company(
        &self,
        credential: Credential,
        source: CredentialSource,
        opts: &RequestOptions<'_>,
    ) -> Credential {
        match self.store.identity() {
            Ok(identity) if identity.vault_company.is_some() => return credential,
            Ok(_) => {}
            Err(e) => {
                debug!("skipping company vault prefetch: {e}");
                return credential;
            }
        }

        let body = Value::Object(Map::new());
        let (response, current) = match self
            .exchange(COMPANY_VAULT_ENDPOINT, &body, credential.clone(), source, opts)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                debug!("company vault prefetch failed: {e}");
                return credential;
            }
        };
        let blob = if response.has_failure() {
            debug!("company vault prefetch rejected by server");
            None
        } else {
            response.rows(1).iter().find_map(|row| {
                COMPANY_VAULT_COLUMNS
                    .iter()
                    .find_map(|column| row_str(row, column))
            })
        };
        // An answered prefetch is never repeated; an empty object marks it.
        let blob = blob.unwrap_or(EMPTY_VAULT);
        if let Err(e) = self.store.set_vault_company(blob) {
            debug!("could not cache company vault: {e}");
        }
        current
    }

    fn decrypt_response(&self, endpoint: &str, response: &mut ApiResponse) {
        let Some(password) = &self.config.master_password else {
            return;
        };
        let mut report = FieldDecryption::default();
        for table in &mut response.result_sets {
            for row in &mut table.data {
                report.merge(vault::decrypt_fields(row, password.as_str(), VAULT_FIELDS));
            }
        }
        if !report.failed.is_empty() {
            warn!(
                endpoint,
                fields = %report.failed.join(", "),
                "some vault fields could not be decrypted; check the master password"
            );
        }
    }
}

impl<S, L, T, M> ApiCaller for Gateway<'_, S, L, T, M>
where
    S: CredentialStore,
    L: SingleFlightLock,
    T: HttpTransport,
    M: TelemetrySink,
{
    async fn call(
        &self,
        endpoint: &str,
        params: Map<String, Value>,
    ) -> Result<ApiResponse, ClientError> {
        self.token_request(endpoint, params, &RequestOptions::default())
            .await
    }
}
