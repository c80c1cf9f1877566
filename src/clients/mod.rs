//! Thin HTTP callers for a running instance: health checks, admin triggers
//! and message publishing with correlation headers.
//!
//! Non-2xx answers are returned as [`ClientResponse`] values so tests can
//! assert on them; only transport and decoding problems are errors.

use std::time::Duration;

pub mod admin;
pub mod health;
pub mod messaging;

pub use admin::AdminClient;
pub use health::{HealthClient, HealthResponse};
pub use messaging::{Correlation, Delivery, MessagingClient};

pub const TRANSACTION_ID_HEADER: &str = "X-Transaction-Id";
pub const OPERATION_ID_HEADER: &str = "X-Operation-Id";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("failed to read response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("{url} answered {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("failed to generate correlation ids: {0}")]
    Correlation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ClientResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json<T: for<'de> serde::Deserialize<'de>>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(|err| ClientError::Decode {
            url: self.url.clone(),
            reason: err.to_string(),
        })
    }

    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(ClientError::Status {
            url: self.url,
            status: self.status,
            body: self.body,
        })
    }
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn send(
    request: ureq::Request,
    body: Option<&serde_json::Value>,
) -> Result<ClientResponse, ClientError> {
    let url = request.url().to_string();
    let result = match body {
        Some(json) => request.send_json(json),
        None => request.call(),
    };
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(err)) => {
            return Err(ClientError::Request {
                url,
                reason: err.to_string(),
            })
        }
    };

    let status = response.status();
    let headers = response
        .headers_names()
        .into_iter()
        .filter_map(|name| {
            let value = response.header(&name)?.to_string();
            Some((name, value))
        })
        .collect();
    let body = response.into_string().map_err(|err| ClientError::Decode {
        url: url.clone(),
        reason: err.to_string(),
    })?;
    tracing::debug!(url = %url, status, "client request finished");
    Ok(ClientResponse {
        url,
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        assert_eq!(
            endpoint("http://localhost:7071/", "/admin/functions/x"),
            "http://localhost:7071/admin/functions/x"
        );
        assert_eq!(endpoint("http://h", "health"), "http://h/health");
    }

    #[test]
    fn error_for_status_keeps_body() {
        let response = ClientResponse {
            url: "http://h/health".to_string(),
            status: 401,
            headers: vec![("x-transaction-id".to_string(), "abc".to_string())],
            body: "missing key".to_string(),
        };
        assert_eq!(response.header("X-Transaction-Id"), Some("abc"));
        let err = response.error_for_status().expect_err("401 is an error");
        assert_eq!(err.to_string(), "http://h/health answered 401: missing key");
    }
}
