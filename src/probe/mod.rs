//! Readiness probing.
//!
//! [`await_ready`] polls an [`EndpointDescriptor`] until it satisfies its
//! success criteria or the timeout elapses. Attempt errors are swallowed and
//! retried; the last one is carried on [`ProbeError::Timeout`].

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

pub mod endpoint;
pub mod health;

pub use endpoint::{EndpointDescriptor, ProbeTarget, SuccessCriteria};
pub use health::{HealthEntry, HealthReport, HealthStatus};

/// Intervals below this are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(10);
const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    Connect(String),
    Status { status: u16, body: String },
    Body(String),
    InvalidReport(String),
    UnacceptedHealth(HealthStatus),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(reason) => write!(f, "connection failed: {reason}"),
            Self::Status { status, body } if body.is_empty() => {
                write!(f, "unexpected status {status}")
            }
            Self::Status { status, body } => write!(f, "unexpected status {status}: {body}"),
            Self::Body(reason) => write!(f, "failed to read response: {reason}"),
            Self::InvalidReport(reason) => write!(f, "invalid health report: {reason}"),
            Self::UnacceptedHealth(status) => write!(f, "health status {status} not accepted"),
        }
    }
}

/// What a single successful attempt saw.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeObservation {
    /// HTTP status; `None` for TCP targets.
    pub status: Option<u16>,
    pub report: Option<HealthReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSuccess {
    /// HTTP status; `None` for TCP targets.
    pub status: Option<u16>,
    pub report: Option<HealthReport>,
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{endpoint} not ready after {elapsed:?} ({attempts} attempts){}", describe_last(.last_failure))]
    Timeout {
        endpoint: String,
        elapsed: Duration,
        attempts: u32,
        last_failure: Option<ProbeFailure>,
    },
    #[error("invalid probe settings: {0}")]
    InvalidSettings(String),
    #[error("probing {endpoint} aborted after {attempts} attempts: {reason}")]
    Aborted {
        endpoint: String,
        reason: String,
        attempts: u32,
    },
}

fn describe_last(last: &Option<ProbeFailure>) -> String {
    match last {
        Some(failure) => format!("; last failure: {failure}"),
        None => String::new(),
    }
}

/// Polls until ready or `timeout` elapses. The first attempt is immediate.
pub fn await_ready(
    endpoint: &EndpointDescriptor,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<ProbeSuccess, ProbeError> {
    await_ready_until(endpoint, timeout, poll_interval, || None)
}

/// Like [`await_ready`], but `abort` is consulted after every failed attempt;
/// returning `Some(reason)` stops polling early.
pub fn await_ready_until<F>(
    endpoint: &EndpointDescriptor,
    timeout: Duration,
    poll_interval: Duration,
    mut abort: F,
) -> Result<ProbeSuccess, ProbeError>
where
    F: FnMut() -> Option<String>,
{
    let interval = validate_timing(timeout, poll_interval)?;
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        let attempt_timeout = remaining.min(MAX_ATTEMPT_TIMEOUT).max(MIN_ATTEMPT_TIMEOUT);
        attempts += 1;
        let failure = match probe_once(endpoint, attempt_timeout) {
            Ok(ProbeObservation { status, report }) => {
                let elapsed = start.elapsed();
                tracing::info!(
                    endpoint = %endpoint,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "endpoint ready"
                );
                return Ok(ProbeSuccess {
                    status,
                    report,
                    attempts,
                    elapsed,
                });
            }
            Err(failure) => failure,
        };
        tracing::debug!(endpoint = %endpoint, attempt = attempts, %failure, "probe attempt failed");

        if let Some(reason) = abort() {
            return Err(ProbeError::Aborted {
                endpoint: endpoint.to_string(),
                reason,
                attempts,
            });
        }

        // No attempt starts at or past the deadline; the rest of the budget
        // is slept off instead.
        let remaining = timeout.saturating_sub(start.elapsed());
        if interval >= remaining {
            thread::sleep(remaining);
            let elapsed = start.elapsed();
            tracing::warn!(
                endpoint = %endpoint,
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "endpoint not ready before timeout"
            );
            return Err(ProbeError::Timeout {
                endpoint: endpoint.to_string(),
                elapsed,
                attempts,
                last_failure: Some(failure),
            });
        }
        thread::sleep(interval);
    }
}

/// Clamps the interval to [`MIN_POLL_INTERVAL`] and rejects intervals that
/// would never fit inside the timeout.
pub fn validate_timing(timeout: Duration, poll_interval: Duration) -> Result<Duration, ProbeError> {
    if timeout.is_zero() {
        return Err(ProbeError::InvalidSettings(
            "timeout must be greater than zero".to_string(),
        ));
    }
    if poll_interval >= timeout {
        return Err(ProbeError::InvalidSettings(format!(
            "poll interval {poll_interval:?} must be shorter than timeout {timeout:?}"
        )));
    }
    Ok(poll_interval.max(MIN_POLL_INTERVAL))
}

/// One attempt against `endpoint`. The report is parsed only when the
/// criteria or the target require one.
pub fn probe_once(
    endpoint: &EndpointDescriptor,
    attempt_timeout: Duration,
) -> Result<ProbeObservation, ProbeFailure> {
    let criteria = endpoint.criteria();
    match endpoint.target() {
        ProbeTarget::Http { url, headers } => {
            let (status, body) = http_get(url, headers, attempt_timeout)?;
            if !criteria.accepts_status(status) {
                return Err(ProbeFailure::Status {
                    status,
                    body: truncate(&body),
                });
            }
            let report = match criteria.health {
                Some(_) => Some(check_report(&body, criteria)?),
                None => None,
            };
            Ok(ProbeObservation {
                status: Some(status),
                report,
            })
        }
        ProbeTarget::Tcp { address } => {
            let body = tcp_read(address, attempt_timeout)?;
            let report = check_report(&body, criteria)?;
            Ok(ProbeObservation {
                status: None,
                report: Some(report),
            })
        }
    }
}

fn check_report(body: &str, criteria: &SuccessCriteria) -> Result<HealthReport, ProbeFailure> {
    let report =
        HealthReport::parse(body).map_err(|err| ProbeFailure::InvalidReport(err.to_string()))?;
    if !criteria.accepts_health(report.status) {
        return Err(ProbeFailure::UnacceptedHealth(report.status));
    }
    Ok(report)
}

fn http_get(
    url: &str,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<(u16, String), ProbeFailure> {
    let agent = ureq::AgentBuilder::new()
        .timeout(timeout)
        .redirects(0)
        .build();
    let mut request = agent.get(url);
    for (name, value) in headers {
        request = request.set(name, value);
    }
    let response = match request.call() {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(err)) => return Err(ProbeFailure::Connect(err.to_string())),
    };
    let status = response.status();
    let mut body = String::new();
    response
        .into_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .map_err(|err| ProbeFailure::Body(err.to_string()))?;
    Ok((status, body))
}

fn tcp_read(address: &str, timeout: Duration) -> Result<String, ProbeFailure> {
    let stream = connect_any(address, timeout)?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| ProbeFailure::Body(err.to_string()))?;
    let mut raw = Vec::new();
    stream
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut raw)
        .map_err(|err| ProbeFailure::Body(err.to_string()))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn connect_any(address: &str, timeout: Duration) -> Result<TcpStream, ProbeFailure> {
    connect_addrs(address, address, timeout)
}

/// Tries every resolved address in order; `localhost` may resolve to `::1`
/// ahead of an IPv4-only listener.
fn connect_addrs<A: ToSocketAddrs>(
    addrs: A,
    label: &str,
    timeout: Duration,
) -> Result<TcpStream, ProbeFailure> {
    let resolved = addrs
        .to_socket_addrs()
        .map_err(|err| ProbeFailure::Connect(format!("{label}: {err}")))?;
    let mut last_err = None;
    for candidate in resolved {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(format!("{label} ({candidate}): {err}")),
        }
    }
    Err(ProbeFailure::Connect(
        last_err.unwrap_or_else(|| format!("{label}: no addresses resolved")),
    ))
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_rejects_interval_not_shorter_than_timeout() {
        let err = validate_timing(Duration::from_secs(1), Duration::from_secs(1))
            .expect_err("interval equal to timeout");
        assert!(matches!(err, ProbeError::InvalidSettings(_)));
        assert!(validate_timing(Duration::ZERO, Duration::ZERO).is_err());
    }

    #[test]
    fn timing_clamps_short_intervals() {
        let interval = validate_timing(Duration::from_secs(1), Duration::from_millis(1))
            .expect("valid timing");
        assert_eq!(interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn timeout_message_includes_last_failure() {
        let err = ProbeError::Timeout {
            endpoint: "tcp://127.0.0.1:1".to_string(),
            elapsed: Duration::from_secs(5),
            attempts: 10,
            last_failure: Some(ProbeFailure::Connect("refused".to_string())),
        };
        let message = err.to_string();
        assert!(message.contains("10 attempts"), "{message}");
        assert!(message.contains("connection failed: refused"), "{message}");
    }

    fn closed_local_address() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        format!("127.0.0.1:{port}")
    }

    #[test]
    fn no_attempt_starts_after_the_deadline() {
        let endpoint = EndpointDescriptor::tcp(closed_local_address());
        let timeout = Duration::from_millis(350);
        let start = Instant::now();
        let mut finished_attempts = Vec::new();

        let err = await_ready_until(&endpoint, timeout, Duration::from_millis(100), || {
            finished_attempts.push(start.elapsed());
            None
        })
        .expect_err("nothing listens");

        let ProbeError::Timeout {
            elapsed, attempts, ..
        } = err
        else {
            panic!("unexpected error: {err:?}");
        };
        assert!(elapsed >= timeout, "{elapsed:?}");
        assert_eq!(attempts as usize, finished_attempts.len());
        assert!(
            finished_attempts.iter().all(|at| *at < timeout),
            "{finished_attempts:?}"
        );
    }

    #[test]
    fn tcp_connect_falls_through_to_a_listening_address() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let dead = closed_local_address();
        let dead: std::net::SocketAddr = dead.parse().expect("dead addr");
        let live: std::net::SocketAddr = format!("127.0.0.1:{port}").parse().expect("live addr");

        struct Both(std::net::SocketAddr, std::net::SocketAddr);
        impl ToSocketAddrs for Both {
            type Iter = std::vec::IntoIter<std::net::SocketAddr>;
            fn to_socket_addrs(&self) -> std::io::Result<Self::Iter> {
                Ok(vec![self.0, self.1].into_iter())
            }
        }
        let stream = connect_addrs(Both(dead, live), "dual", Duration::from_secs(1))
            .expect("second address accepts");
        assert_eq!(stream.peer_addr().expect("peer"), live);
    }

    #[test]
    fn truncate_limits_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(truncate(&body).len(), 203);
        assert_eq!(truncate(" ok "), "ok");
    }
}
