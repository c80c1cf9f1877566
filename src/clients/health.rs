use super::messaging::Correlation;
use super::{endpoint, send, ClientError, ClientResponse, DEFAULT_REQUEST_TIMEOUT};
use super::{OPERATION_ID_HEADER, TRANSACTION_ID_HEADER};
use crate::probe::HealthReport;
use std::time::Duration;

pub const DEFAULT_HEALTH_PATH: &str = "/api/v1/health";

#[derive(Debug, Clone)]
pub struct HealthClient {
    agent: ureq::Agent,
    base_url: String,
    path: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

/// Health endpoint answer. `report` is `None` when the body is not a
/// health report (e.g. a 401 page).
#[derive(Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: u16,
    pub report: Option<HealthReport>,
    pub transaction_id: Option<String>,
    pub operation_id: Option<String>,
    pub body: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == 200 && self.report.as_ref().is_some_and(HealthReport::is_healthy)
    }
}

impl HealthClient {
    pub fn new(agent: ureq::Agent, base_url: &str) -> Self {
        Self {
            agent,
            base_url: base_url.to_string(),
            path: DEFAULT_HEALTH_PATH.to_string(),
            headers: Vec::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> String {
        endpoint(&self.base_url, &self.path)
    }

    pub fn check(&self) -> Result<HealthResponse, ClientError> {
        self.get(None)
    }

    /// Sends correlation headers; echoes come back on the response.
    pub fn check_correlated(&self, correlation: &Correlation) -> Result<HealthResponse, ClientError> {
        self.get(Some(correlation))
    }

    fn get(&self, correlation: Option<&Correlation>) -> Result<HealthResponse, ClientError> {
        let mut request = self.agent.get(&self.url()).timeout(self.timeout);
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }
        if let Some(correlation) = correlation {
            request = request
                .set(TRANSACTION_ID_HEADER, &correlation.transaction_id)
                .set(OPERATION_ID_HEADER, &correlation.operation_id);
        }
        Ok(HealthResponse::from(send(request, None)?))
    }
}

impl From<ClientResponse> for HealthResponse {
    fn from(response: ClientResponse) -> Self {
        Self {
            status: response.status,
            report: HealthReport::parse(&response.body).ok(),
            transaction_id: response.header(TRANSACTION_ID_HEADER).map(str::to_string),
            operation_id: response.header(OPERATION_ID_HEADER).map(str::to_string),
            body: response.body,
        }
    }
}
