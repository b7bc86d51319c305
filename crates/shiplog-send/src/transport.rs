use std::time::Duration;

use shiplog_core::{SessionPayload, UploadOutcome};

use crate::error::SendError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_API_URL: &str = "https://app.shiplog.dev/api";

/// Remote analytics endpoint, seen by the orchestrator as an opaque call.
/// Per-session granularity so one rejected payload never aborts the batch.
pub trait Transport {
    fn upload_session(&self, payload: &SessionPayload) -> Result<UploadOutcome, SendError>;
}

/// HTTP transport against the shiplog service.
///
/// Base URL from `SHIPLOG_API_URL`, bearer token from `SHIPLOG_TOKEN`.
pub struct HttpTransport {
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("SHIPLOG_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("SHIPLOG_TOKEN").ok(),
        }
    }

    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self { base_url, token }
    }
}

impl Transport for HttpTransport {
    fn upload_session(&self, payload: &SessionPayload) -> Result<UploadOutcome, SendError> {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .new_agent();

        let body = serde_json::to_string(payload)
            .map_err(|e| SendError::Other(anyhow::anyhow!("payload serialization: {e}")))?;

        let url = format!("{}/sessions", self.base_url.trim_end_matches('/'));
        let mut request = agent.post(&url).header("Content-Type", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }

        let mut response = request.send(&body).map_err(classify_transport_error)?;
        let outcome: UploadOutcome = response
            .body_mut()
            .read_json()
            .map_err(|e| SendError::Network(format!("malformed service response: {e}")))?;
        Ok(outcome)
    }
}

fn classify_transport_error(err: ureq::Error) -> SendError {
    match err {
        ureq::Error::StatusCode(status) => SendError::Rejected { status },
        other => SendError::Network(other.to_string()),
    }
}
