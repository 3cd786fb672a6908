//! Typed client for the rollcall attendance API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/check-in` | [`RollcallClient::check_in`] |
//! | PATCH  | `/v1/attendance` | [`RollcallClient::apply_batch`] |
//! | GET    | `/v1/attendance/ensure-day` | [`RollcallClient::ensure_day`] |
//! | POST   | `/v1/students/{id}/credential` | [`RollcallClient::issue_credential`] |

use std::time::Duration;

use rollcall_core::{SchoolDay, StudentId};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::retry::RetryPolicy;
use crate::types::{
    BatchResponse, CheckInRequest, CheckInResponse, CredentialResponse, EnsureDayResponse,
    ErrorEnvelope, OverrideEntry,
};

/// Client for the rollcall API.
#[derive(Debug, Clone)]
pub struct RollcallClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl RollcallClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            let mut value =
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                    .map_err(|_| ClientError::Config(ConfigError::InvalidToken))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Replace the resend schedule.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Mark the student behind `credential` present for the server's today.
    ///
    /// Calls `POST {base_url}/v1/check-in`.
    pub async fn check_in(&self, credential: &str) -> Result<CheckInResponse, ClientError> {
        let endpoint = "POST /v1/check-in";
        let url = self.url("v1/check-in", endpoint)?;
        let body = CheckInRequest {
            credential: credential.to_string(),
        };
        let resp = self
            .retry
            .send(endpoint, || self.http.post(url.clone()).json(&body).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        decode(endpoint, resp).await
    }

    /// Apply a batch of overrides.
    ///
    /// Calls `PATCH {base_url}/v1/attendance`. A batch with a malformed entry
    /// is rejected whole with `MALFORMED_ITEM`; otherwise per-entry failures
    /// come back in [`BatchResponse::failed`].
    pub async fn apply_batch(&self, entries: &[OverrideEntry]) -> Result<BatchResponse, ClientError> {
        let endpoint = "PATCH /v1/attendance";
        let url = self.url("v1/attendance", endpoint)?;
        let resp = self
            .retry
            .send(endpoint, || self.http.patch(url.clone()).json(entries).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        decode(endpoint, resp).await
    }

    /// Materialize the `pending` rows of `day` (server's today when `None`).
    ///
    /// Calls `GET {base_url}/v1/attendance/ensure-day`. Requires an admin token.
    pub async fn ensure_day(&self, day: Option<SchoolDay>) -> Result<EnsureDayResponse, ClientError> {
        let endpoint = "GET /v1/attendance/ensure-day";
        let mut url = self.url("v1/attendance/ensure-day", endpoint)?;
        if let Some(day) = day {
            url.query_pairs_mut().append_pair("day", &day.to_string());
        }
        let resp = self
            .retry
            .send(endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        decode(endpoint, resp).await
    }

    /// Issue a new credential, revoking the previous one.
    ///
    /// Calls `POST {base_url}/v1/students/{id}/credential`. Requires an admin
    /// token.
    pub async fn issue_credential(
        &self,
        student_id: StudentId,
    ) -> Result<CredentialResponse, ClientError> {
        let endpoint = format!("POST /v1/students/{student_id}/credential");
        let url = self.url(&format!("v1/students/{student_id}/credential"), &endpoint)?;
        let resp = self
            .retry
            .send(&endpoint, || self.http.post(url.clone()).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        decode(&endpoint, resp).await
    }

    fn url(&self, path: &str, endpoint: &str) -> Result<Url, ClientError> {
        self.base_url.join(path).map_err(|e| {
            ClientError::Config(ConfigError::InvalidUrl(endpoint.to_string(), e.to_string()))
        })
    }
}

/// Turn a response into `T`, or into [`ClientError::ApiError`] carrying the
/// machine-readable code from the error envelope.
async fn decode<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let code = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .map(|e| e.error.code);
        return Err(ClientError::ApiError {
            endpoint: endpoint.into(),
            status,
            code,
            body,
        });
    }
    // A body cut off mid-stream is a transport failure, not a bad answer.
    let body = resp.bytes().await.map_err(|e| ClientError::Interrupted {
        endpoint: endpoint.into(),
        source: e,
    })?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Deserialization {
        endpoint: endpoint.into(),
        source: e,
    })
}
