use super::health::HealthStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// `GET url` with the given request headers.
    Http {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Connect to `address` (`host:port`), read to end, parse a health report.
    Tcp { address: String },
}

/// What counts as a successful probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessCriteria {
    /// HTTP only.
    pub accepted_statuses: Vec<u16>,
    /// When set, the payload must be a health report with one of these
    /// statuses. TCP probes always parse the payload.
    pub health: Option<Vec<HealthStatus>>,
}

impl Default for SuccessCriteria {
    fn default() -> Self {
        Self {
            accepted_statuses: vec![200],
            health: None,
        }
    }
}

impl SuccessCriteria {
    pub fn accepts_status(&self, status: u16) -> bool {
        self.accepted_statuses.contains(&status)
    }

    pub fn accepts_health(&self, status: HealthStatus) -> bool {
        match &self.health {
            Some(allowed) => allowed.contains(&status),
            None => true,
        }
    }
}

/// Address plus success predicate for readiness probing. Built once per
/// instance and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    target: ProbeTarget,
    criteria: SuccessCriteria,
}

impl EndpointDescriptor {
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            target: ProbeTarget::Http {
                url: url.into(),
                headers: Vec::new(),
            },
            criteria: SuccessCriteria::default(),
        }
    }

    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            target: ProbeTarget::Tcp {
                address: address.into(),
            },
            criteria: SuccessCriteria::default(),
        }
    }

    pub fn local_tcp(port: u16) -> Self {
        Self::tcp(format!("127.0.0.1:{port}"))
    }

    /// Ignored for TCP targets.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let ProbeTarget::Http { headers, .. } = &mut self.target {
            headers.push((name.into(), value.into()));
        }
        self
    }

    pub fn with_accepted_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.criteria.accepted_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_required_health(mut self, statuses: impl IntoIterator<Item = HealthStatus>) -> Self {
        self.criteria.health = Some(statuses.into_iter().collect());
        self
    }

    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    pub fn criteria(&self) -> &SuccessCriteria {
        &self.criteria
    }

    pub fn address(&self) -> &str {
        match &self.target {
            ProbeTarget::Http { url, .. } => url,
            ProbeTarget::Tcp { address } => address,
        }
    }
}

impl std::fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            ProbeTarget::Http { url, .. } => write!(f, "GET {url}"),
            ProbeTarget::Tcp { address } => write!(f, "tcp://{address}"),
        }
    }
}
