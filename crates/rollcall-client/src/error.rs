//! Client error types.

/// Errors from rollcall API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The API returned a non-2xx status.
    #[error("{endpoint} returned {status} {}: {body}", .code.as_deref().unwrap_or("-"))]
    ApiError {
        endpoint: String,
        status: u16,
        /// Machine-readable `error.code` from the body, when present.
        code: Option<String>,
        body: String,
    },
    /// The connection dropped while the response body was being read.
    #[error("response from {endpoint} was cut off: {source}")]
    Interrupted {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: serde_json::Error,
    },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// The server could not be reached or was temporarily unable to serve.
    /// Only these errors may be queued for replay.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            Self::Interrupted { .. } => true,
            Self::ApiError { status, .. } => matches!(status, 502..=504),
            Self::Deserialization { .. } | Self::Config(_) => false,
        }
    }

    /// The caller's API token was refused. Replaying anything is pointless
    /// until the token is fixed, but queued work must be kept.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::ApiError { code: Some(code), .. } if code == "UNAUTHORIZED" || code == "FORBIDDEN"
        )
    }

    /// Machine-readable code of an API error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::ApiError { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Errors from the offline queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("offline queue database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt queued intent {local_id}: {reason}")]
    Corrupt { local_id: String, reason: String },
}

/// Errors from submitting or draining through the reconciler.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: Option<&str>) -> ClientError {
        ClientError::ApiError {
            endpoint: "POST /v1/check-in".into(),
            status,
            code: code.map(str::to_string),
            body: String::new(),
        }
    }

    #[test]
    fn gateway_statuses_are_transient() {
        for status in [502, 503, 504] {
            assert!(api_error(status, None).is_transient(), "{status}");
        }
        for status in [400, 401, 404, 500] {
            assert!(!api_error(status, None).is_transient(), "{status}");
        }
    }

    #[test]
    fn malformed_body_is_not_transient() {
        let err = ClientError::Deserialization {
            endpoint: "POST /v1/check-in".into(),
            source: serde_json::from_str::<u8>("{").unwrap_err(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn invalid_credential_is_not_an_auth_failure() {
        assert!(!api_error(401, Some("INVALID_CREDENTIAL")).is_auth_failure());
        assert!(api_error(401, Some("UNAUTHORIZED")).is_auth_failure());
        assert!(api_error(403, Some("FORBIDDEN")).is_auth_failure());
    }

    #[test]
    fn display_includes_code() {
        let msg = api_error(401, Some("INVALID_CREDENTIAL")).to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("INVALID_CREDENTIAL"));
    }
}
