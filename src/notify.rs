//! Operator notification at the end of a run. Best-effort: the caller logs
//! failures and never lets them alter the run's outcome.

use serde::Serialize;
use thiserror::Error;

/// Terminal status of a run. Partial success (fewer chapters than requested,
/// honestly reported) is still `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failure => "FAILURE",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Could not build notification client: {source}")]
    BuildClient {
        #[source]
        source: reqwest::Error,
    },

    #[error("Notification request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Notification endpoint {url} answered HTTP {status}")]
    Status { status: u16, url: String },
}

/// Capability to deliver the final status and a human-readable detail string.
pub trait Notifier {
    fn notify(&self, status: RunStatus, detail: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    status: &'a str,
    detail: &'a str,
}

/// Notifier that POSTs a small JSON payload to a webhook URL.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::BuildClient { source: e })?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, status: RunStatus, detail: &str) -> Result<(), NotifyError> {
        let payload = Payload {
            status: status.as_str(),
            detail,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| NotifyError::Request {
                url: self.url.clone(),
                source: e,
            })?;
        let http_status = response.status();
        if !http_status.is_success() {
            return Err(NotifyError::Status {
                status: http_status.as_u16(),
                url: self.url.clone(),
            });
        }
        log::info!("Notification delivered: {}", status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_renders_uppercase() {
        assert_eq!(RunStatus::Success.to_string(), "SUCCESS");
        assert_eq!(RunStatus::Failure.to_string(), "FAILURE");
    }

    #[test]
    fn payload_serializes_status_and_detail() {
        let payload = Payload {
            status: RunStatus::Failure.as_str(),
            detail: "no chapters scraped",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status"], "FAILURE");
        assert_eq!(json["detail"], "no chapters scraped");
    }

    #[test]
    fn unreachable_endpoint_reports_request_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/unreachable").unwrap();
        let err = notifier.notify(RunStatus::Success, "done").unwrap_err();
        assert!(matches!(err, NotifyError::Request { .. }));
    }
}
