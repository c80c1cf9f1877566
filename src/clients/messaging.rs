use super::{endpoint, send, ClientError, ClientResponse, DEFAULT_REQUEST_TIMEOUT};
use super::{OPERATION_ID_HEADER, TRANSACTION_ID_HEADER};
use crate::shared::ids::random_token;
use serde::Serialize;
use std::time::Duration;

const CORRELATION_TOKEN_WIDTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub transaction_id: String,
    pub operation_id: String,
}

impl Correlation {
    pub fn new(transaction_id: impl Into<String>, operation_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            operation_id: operation_id.into(),
        }
    }

    pub fn generate() -> Result<Self, ClientError> {
        let transaction_id =
            random_token(CORRELATION_TOKEN_WIDTH).map_err(ClientError::Correlation)?;
        let operation_id = random_token(CORRELATION_TOKEN_WIDTH).map_err(ClientError::Correlation)?;
        Ok(Self {
            transaction_id,
            operation_id,
        })
    }
}

/// Publishes simulated messages to an instance's HTTP surface with
/// correlation headers attached.
#[derive(Debug, Clone)]
pub struct MessagingClient {
    agent: ureq::Agent,
    base_url: String,
    timeout: Duration,
}

/// Answer to a published message plus the correlation that was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub correlation: Correlation,
    pub response: ClientResponse,
}

impl Delivery {
    /// The instance echoed both correlation ids unchanged.
    pub fn correlation_echoed(&self) -> bool {
        self.response.header(TRANSACTION_ID_HEADER) == Some(self.correlation.transaction_id.as_str())
            && self.response.header(OPERATION_ID_HEADER)
                == Some(self.correlation.operation_id.as_str())
    }
}

impl MessagingClient {
    pub fn new(agent: ureq::Agent, base_url: &str) -> Self {
        Self {
            agent,
            base_url: base_url.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POSTs `message` as JSON to `path` with fresh correlation ids.
    pub fn publish<T: Serialize>(&self, path: &str, message: &T) -> Result<Delivery, ClientError> {
        self.publish_correlated(path, message, Correlation::generate()?)
    }

    pub fn publish_correlated<T: Serialize>(
        &self,
        path: &str,
        message: &T,
        correlation: Correlation,
    ) -> Result<Delivery, ClientError> {
        let url = endpoint(&self.base_url, path);
        let body = serde_json::to_value(message).map_err(|err| ClientError::Request {
            url: url.clone(),
            reason: format!("cannot encode message: {err}"),
        })?;
        let request = self
            .agent
            .post(&url)
            .timeout(self.timeout)
            .set(TRANSACTION_ID_HEADER, &correlation.transaction_id)
            .set(OPERATION_ID_HEADER, &correlation.operation_id);
        let response = send(request, Some(&body))?;
        tracing::debug!(
            url = %url,
            transaction_id = %correlation.transaction_id,
            status = response.status,
            "message published"
        );
        Ok(Delivery {
            correlation,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_correlation_ids_are_distinct() {
        let first = Correlation::generate().expect("correlation");
        let second = Correlation::generate().expect("correlation");
        assert_eq!(first.transaction_id.len(), CORRELATION_TOKEN_WIDTH);
        assert_ne!(first.transaction_id, first.operation_id);
        assert_ne!(first, second);
    }

    #[test]
    fn delivery_checks_both_echoed_headers() {
        let correlation = Correlation::new("tx-1", "op-1");
        let mut delivery = Delivery {
            correlation,
            response: ClientResponse {
                url: "http://h/orders".to_string(),
                status: 202,
                headers: vec![
                    ("x-transaction-id".to_string(), "tx-1".to_string()),
                    ("x-operation-id".to_string(), "op-1".to_string()),
                ],
                body: String::new(),
            },
        };
        assert!(delivery.correlation_echoed());
        delivery.response.headers.pop();
        assert!(!delivery.correlation_echoed());
    }
}
