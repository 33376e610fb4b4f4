//! Infrastructure implementation of the `HttpTransport` port over reqwest.

use std::time::Duration;

use crate::application::ports::{HttpRequest, HttpResponse, HttpTransport};
use crate::domain::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("rediacc-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut builder = self.http.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(describe(&e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(describe(&e)))?;
        tracing::trace!(url = %request.url, status, "api response");
        Ok(HttpResponse { status, body })
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("cannot connect: {err}")
    } else {
        err.to_string()
    }
}
