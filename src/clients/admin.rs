use super::{endpoint, send, ClientError, ClientResponse, DEFAULT_REQUEST_TIMEOUT};
use std::time::Duration;

pub const FUNCTIONS_KEY_HEADER: &str = "x-functions-key";

/// Calls `POST /admin/functions/<name>` to run non-HTTP-triggered functions
/// on demand.
#[derive(Debug, Clone)]
pub struct AdminClient {
    agent: ureq::Agent,
    base_url: String,
    key: Option<String>,
    timeout: Duration,
}

impl AdminClient {
    pub fn new(agent: ureq::Agent, base_url: &str) -> Self {
        Self {
            agent,
            base_url: base_url.to_string(),
            key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_functions_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn trigger_url(&self, function_name: &str) -> String {
        endpoint(
            &self.base_url,
            &format!("admin/functions/{}", urlencoding::encode(function_name)),
        )
    }

    /// Triggers `function_name` with an empty JSON body. Any non-2xx answer
    /// is an error.
    pub fn trigger_function(&self, function_name: &str) -> Result<ClientResponse, ClientError> {
        let mut request = self
            .agent
            .post(&self.trigger_url(function_name))
            .timeout(self.timeout);
        if let Some(key) = &self.key {
            request = request.set(FUNCTIONS_KEY_HEADER, key);
        }
        let response = send(request, Some(&serde_json::json!({})))?.error_for_status()?;
        tracing::info!(function = %function_name, status = response.status, "function triggered");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_url_encodes_function_name() {
        let client = AdminClient::new(ureq::AgentBuilder::new().build(), "http://localhost:7071/");
        assert_eq!(
            client.trigger_url("order processor"),
            "http://localhost:7071/admin/functions/order%20processor"
        );
    }
}
