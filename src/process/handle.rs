use super::container;
use super::log_buffer::{LogBuffer, LogLine, OutputStream};
use super::signal::{signal_process_group, Signal};
use crate::shared::logging::CHILD_OUTPUT_TARGET;
use std::io::{BufRead, BufReader, Read};
use std::process::Child;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

const STOP_POLL: Duration = Duration::from_millis(50);
const KILL_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum StopError {
    #[error("failed to wait for process {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("process {pid} is still alive after TERM/KILL")]
    StillAlive { pid: u32 },
    #[error("failed to stop container {name}: {reason}")]
    Container { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    pub exit_code: Option<i32>,
    /// The process ignored TERM for the whole grace period and was killed.
    pub forced: bool,
}

#[derive(Debug)]
pub(crate) enum Target {
    Child {
        child: Child,
        pgid: Option<u32>,
    },
    Container {
        runtime: String,
        name: String,
        follower: Option<Child>,
    },
}

/// A running instance process (or container) and its captured output.
#[derive(Debug)]
pub struct ProcessHandle {
    label: String,
    target: Target,
    logs: Arc<Mutex<LogBuffer>>,
    readers: Vec<thread::JoinHandle<()>>,
    grace: Duration,
    stopped: Option<StopOutcome>,
}

impl ProcessHandle {
    pub(crate) fn new(
        label: String,
        target: Target,
        logs: Arc<Mutex<LogBuffer>>,
        readers: Vec<thread::JoinHandle<()>>,
        grace: Duration,
    ) -> Self {
        Self {
            label,
            target,
            logs,
            readers,
            grace,
            stopped: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// OS process id for direct children.
    pub fn pid(&self) -> Option<u32> {
        match &self.target {
            Target::Child { child, .. } => Some(child.id()),
            Target::Container { .. } => None,
        }
    }

    pub fn container_name(&self) -> Option<&str> {
        match &self.target {
            Target::Child { .. } => None,
            Target::Container { name, .. } => Some(name),
        }
    }

    pub fn is_alive(&mut self) -> bool {
        if self.stopped.is_some() {
            return false;
        }
        match &mut self.target {
            Target::Child { child, .. } => matches!(child.try_wait(), Ok(None)),
            Target::Container { runtime, name, .. } => container::is_running(runtime, name),
        }
    }

    /// Exit code once the process has exited on its own or been stopped.
    pub fn exit_code(&mut self) -> Option<i32> {
        if let Some(outcome) = self.stopped {
            return outcome.exit_code;
        }
        match &mut self.target {
            Target::Child { child, .. } => child.try_wait().ok().flatten().and_then(|s| s.code()),
            Target::Container { .. } => None,
        }
    }

    pub fn log_tail(&self, limit: usize) -> Vec<LogLine> {
        self.lock_logs().tail(limit)
    }

    pub fn render_log_tail(&self, limit: usize) -> String {
        self.lock_logs().render_tail(limit)
    }

    pub fn output_contains(&self, needle: &str) -> bool {
        self.lock_logs().contains(needle)
    }

    pub fn logs(&self) -> Arc<Mutex<LogBuffer>> {
        self.logs.clone()
    }

    /// Waits until the output readers reached end of stream, at most
    /// `timeout`. Returns false when some output may still be in flight.
    pub fn wait_for_output(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.readers.retain(|reader| !reader.is_finished());
            if self.readers.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(STOP_POLL);
        }
    }

    /// TERM, wait up to the grace period, then KILL. Idempotent.
    pub fn stop(&mut self) -> Result<StopOutcome, StopError> {
        if let Some(outcome) = self.stopped {
            return Ok(outcome);
        }
        let grace = self.grace;
        let outcome = match &mut self.target {
            Target::Child { child, pgid } => stop_child(child, *pgid, grace)?,
            Target::Container {
                runtime,
                name,
                follower,
            } => {
                let result = container::stop(runtime, name, grace);
                if let Some(mut follower) = follower.take() {
                    let _ = follower.kill();
                    let _ = follower.wait();
                }
                result?
            }
        };
        self.stopped = Some(outcome);
        tracing::info!(
            instance = %self.label,
            exit_code = ?outcome.exit_code,
            forced = outcome.forced,
            "process stopped"
        );
        Ok(outcome)
    }

    fn lock_logs(&self) -> MutexGuard<'_, LogBuffer> {
        self.logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.stopped.is_none() {
            if let Err(err) = self.stop() {
                tracing::warn!(instance = %self.label, error = %err, "failed to stop process on drop");
            }
        }
    }
}

fn stop_child(
    child: &mut Child,
    pgid: Option<u32>,
    grace: Duration,
) -> Result<StopOutcome, StopError> {
    let pid = child.id();
    let wait_err = |source: std::io::Error| StopError::Wait { pid, source };

    if let Some(status) = child.try_wait().map_err(wait_err)? {
        sweep_group(pgid);
        return Ok(StopOutcome {
            exit_code: status.code(),
            forced: false,
        });
    }

    let term_sent = pgid
        .map(|group| signal_process_group(group, Signal::Term))
        .unwrap_or(false);
    if term_sent {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait().map_err(wait_err)? {
                sweep_group(pgid);
                return Ok(StopOutcome {
                    exit_code: status.code(),
                    forced: false,
                });
            }
            thread::sleep(STOP_POLL);
        }
    }

    if let Some(group) = pgid {
        signal_process_group(group, Signal::Kill);
    }
    let _ = child.kill();

    let deadline = Instant::now() + KILL_WAIT;
    loop {
        if let Some(status) = child.try_wait().map_err(wait_err)? {
            return Ok(StopOutcome {
                exit_code: status.code(),
                forced: true,
            });
        }
        if Instant::now() >= deadline {
            return Err(StopError::StillAlive { pid });
        }
        thread::sleep(STOP_POLL);
    }
}

/// Grandchildren can outlive the group leader (`dotnet run` keeps the built
/// app as a separate process).
fn sweep_group(pgid: Option<u32>) {
    if let Some(group) = pgid {
        signal_process_group(group, Signal::Kill);
    }
}

/// Streams `pipe` line by line into `logs`; invalid UTF-8 is replaced.
pub(crate) fn spawn_output_reader<R>(
    pipe: R,
    stream: OutputStream,
    logs: Arc<Mutex<LogBuffer>>,
    label: String,
) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    tracing::debug!(
                        target: CHILD_OUTPUT_TARGET,
                        instance = %label,
                        stream = stream.as_str(),
                        "{line}"
                    );
                    logs.lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push_line(stream, line);
                }
            }
        }
    })
}
