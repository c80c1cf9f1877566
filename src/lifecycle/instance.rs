use super::environment::{OverlayScope, ProcessEnvGuard};
use super::state::{next_state, Action, LifecycleState};
use super::teardown::{TeardownPolicy, TeardownReport, TeardownStep};
use super::{InstanceConfig, LifecycleError};
use crate::clients::{AdminClient, HealthClient, MessagingClient};
use crate::options::ProjectOptions;
use crate::patcher;
use crate::probe::{self, EndpointDescriptor, ProbeError, ProbeSuccess};
use crate::process::{self, LaunchError, ProcessHandle, RunSpec, StopOutcome};
use crate::shared::ids::{InstanceId, TemplateId};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

const EXIT_TAIL_LINES: usize = 40;
const OUTPUT_DRAIN_WAIT: Duration = Duration::from_secs(1);

/// One generated project: its directory, the options it was generated with
/// and at most one live process.
///
/// Dropping the project tears it down.
#[derive(Debug)]
pub struct TemplateProject {
    template: TemplateId,
    id: InstanceId,
    directory: PathBuf,
    options: ProjectOptions,
    config: InstanceConfig,
    inner: Arc<Mutex<ProjectInner>>,
}

#[derive(Debug)]
pub(crate) struct ProjectInner {
    id: InstanceId,
    directory: PathBuf,
    state: LifecycleState,
    policy: TeardownPolicy,
    process: Option<ProcessHandle>,
    env_guard: Option<ProcessEnvGuard>,
    agent: Option<ureq::Agent>,
}

impl TemplateProject {
    pub(crate) fn created(
        template: TemplateId,
        id: InstanceId,
        directory: PathBuf,
        options: ProjectOptions,
        config: InstanceConfig,
    ) -> Self {
        let inner = ProjectInner {
            id: id.clone(),
            directory: directory.clone(),
            state: LifecycleState::Created,
            policy: config.teardown_policy,
            process: None,
            env_guard: None,
            agent: None,
        };
        Self {
            template,
            id,
            directory,
            options,
            config,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn template(&self) -> &TemplateId {
        &self.template
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Read once, at teardown.
    pub fn set_teardown_policy(&self, policy: TeardownPolicy) {
        self.lock().policy = policy;
    }

    pub fn teardown_policy(&self) -> TeardownPolicy {
        self.lock().policy
    }

    pub fn update_file<F>(&self, relative_path: &str, transform: F) -> Result<PathBuf, LifecycleError>
    where
        F: FnOnce(String) -> String,
    {
        self.patch_with(|dir| patcher::update_file(dir, relative_path, transform))
    }

    pub fn replace_in_file(
        &self,
        relative_path: &str,
        placeholder: &str,
        replacement: &str,
    ) -> Result<PathBuf, LifecycleError> {
        self.patch_with(|dir| patcher::replace_in_file(dir, relative_path, placeholder, replacement))
    }

    pub fn add_file_from_source(
        &self,
        source_content: &str,
        target_relative_path: &str,
    ) -> Result<PathBuf, LifecycleError> {
        self.patch_with(|dir| {
            patcher::add_file_from_source(dir, source_content, target_relative_path)
        })
    }

    /// Starts the instance process. Fails with
    /// [`LaunchError::ProcessAlreadyRunning`] while an earlier launch is live.
    pub fn launch(&self, spec: &RunSpec) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state.is_running() {
            let pid = inner.process.as_ref().and_then(ProcessHandle::pid);
            return Err(LaunchError::ProcessAlreadyRunning {
                instance: self.id.to_string(),
                pid,
            }
            .into());
        }
        let next = inner.transition(Action::Launch)?;

        let guard = match spec.overlay_scope {
            OverlayScope::Process if !spec.overlay.is_empty() => {
                Some(ProcessEnvGuard::install(&spec.overlay))
            }
            _ => None,
        };
        let handle = process::spawn(
            &self.directory,
            spec,
            self.id.as_str(),
            self.config.log_buffer_lines,
        )?;

        inner.process = Some(handle);
        inner.env_guard = guard;
        inner.state = next;
        Ok(())
    }

    /// Blocks until `endpoint` is ready, using the configured timeout and
    /// poll interval.
    pub fn await_ready(&self, endpoint: &EndpointDescriptor) -> Result<ProbeSuccess, LifecycleError> {
        self.await_ready_within(endpoint, self.config.ready_timeout, self.config.poll_interval)
    }

    /// Blocks until `endpoint` is ready. Stops early when the launched
    /// process exits. The instance lock is only held between attempts.
    pub fn await_ready_within(
        &self,
        endpoint: &EndpointDescriptor,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ProbeSuccess, LifecycleError> {
        let (from, next) = {
            let inner = self.lock();
            (inner.state, inner.transition(Action::AwaitReady)?)
        };

        let outcome = probe::await_ready_until(endpoint, timeout, poll_interval, || {
            let mut inner = self.lock();
            if inner.state != from {
                return Some(format!("instance moved to {}", inner.state));
            }
            let process = inner.process.as_mut()?;
            if process.is_alive() {
                return None;
            }
            Some(format!("process exited with {:?}", process.exit_code()))
        });

        let mut inner = self.lock();
        if inner.state != from {
            return Err(LifecycleError::InvalidTransition {
                instance: self.id.to_string(),
                from: inner.state,
                action: Action::AwaitReady,
            });
        }
        match outcome {
            Ok(success) => {
                inner.state = next;
                Ok(success)
            }
            Err(ProbeError::Aborted { .. }) => {
                let (exit_code, output_tail) = match inner.process.as_mut() {
                    Some(process) => {
                        process.wait_for_output(OUTPUT_DRAIN_WAIT);
                        (process.exit_code(), process.render_log_tail(EXIT_TAIL_LINES))
                    }
                    None => (None, String::new()),
                };
                Err(LifecycleError::ProcessExited {
                    instance: self.id.to_string(),
                    exit_code,
                    output_tail,
                })
            }
            Err(err) => {
                if let Some(process) = inner.process.as_ref() {
                    tracing::warn!(
                        instance = %self.id,
                        error = %err,
                        output = %process.render_log_tail(EXIT_TAIL_LINES),
                        "instance never became ready"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Shared HTTP agent for clients. The first call moves `Ready` to `InUse`.
    pub fn http_agent(&self) -> Result<ureq::Agent, LifecycleError> {
        let mut inner = self.lock();
        let next = inner.transition(Action::AcquireClient)?;
        let agent = inner
            .agent
            .get_or_insert_with(|| ureq::AgentBuilder::new().build())
            .clone();
        inner.state = next;
        Ok(agent)
    }

    pub fn health_client(&self, base_url: &str) -> Result<HealthClient, LifecycleError> {
        Ok(HealthClient::new(self.http_agent()?, base_url))
    }

    pub fn admin_client(&self, base_url: &str) -> Result<AdminClient, LifecycleError> {
        Ok(AdminClient::new(self.http_agent()?, base_url))
    }

    pub fn messaging_client(&self, base_url: &str) -> Result<MessagingClient, LifecycleError> {
        Ok(MessagingClient::new(self.http_agent()?, base_url))
    }

    /// Stops the process and returns to `Patched` so files can be changed
    /// before launching again.
    pub fn stop(&self) -> Result<StopOutcome, LifecycleError> {
        let mut inner = self.lock();
        let next = inner.transition(Action::Stop)?;
        let outcome = match inner.process.as_mut() {
            Some(process) => process.stop()?,
            None => StopOutcome {
                exit_code: None,
                forced: false,
            },
        };
        inner.process = None;
        if let Some(mut guard) = inner.env_guard.take() {
            guard.restore();
        }
        inner.state = next;
        Ok(outcome)
    }

    pub fn process_id(&self) -> Option<u32> {
        self.lock().process.as_ref().and_then(ProcessHandle::pid)
    }

    pub fn is_process_alive(&self) -> bool {
        self.lock()
            .process
            .as_mut()
            .map(ProcessHandle::is_alive)
            .unwrap_or(false)
    }

    pub fn process_log_tail(&self, limit: usize) -> String {
        self.lock()
            .process
            .as_ref()
            .map(|process| process.render_log_tail(limit))
            .unwrap_or_default()
    }

    pub fn process_output_contains(&self, needle: &str) -> bool {
        self.lock()
            .process
            .as_ref()
            .map(|process| process.output_contains(needle))
            .unwrap_or(false)
    }

    /// Stops the process, restores process-wide variables, deletes the
    /// directory unless kept and releases the HTTP agent. Safe to call more
    /// than once; step failures are logged, never returned as errors.
    pub fn teardown(&self) -> TeardownReport {
        self.lock().teardown()
    }

    pub(crate) fn tracker(&self) -> Weak<Mutex<ProjectInner>> {
        Arc::downgrade(&self.inner)
    }

    fn patch_with<F>(&self, apply: F) -> Result<PathBuf, LifecycleError>
    where
        F: FnOnce(&Path) -> Result<PathBuf, patcher::PatchError>,
    {
        let mut inner = self.lock();
        let next = inner.transition(Action::Patch)?;
        let path = apply(&self.directory)?;
        inner.state = next;
        Ok(path)
    }

    fn lock(&self) -> MutexGuard<'_, ProjectInner> {
        lock_inner(&self.inner)
    }
}

impl Drop for TemplateProject {
    fn drop(&mut self) {
        self.lock().teardown();
    }
}

pub(crate) fn lock_inner(inner: &Mutex<ProjectInner>) -> MutexGuard<'_, ProjectInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProjectInner {
    pub(crate) fn state(&self) -> LifecycleState {
        self.state
    }

    fn transition(&self, action: Action) -> Result<LifecycleState, LifecycleError> {
        next_state(self.state, action).ok_or_else(|| LifecycleError::InvalidTransition {
            instance: self.id.to_string(),
            from: self.state,
            action,
        })
    }

    pub(crate) fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::new(self.id.as_str());
        if self.state == LifecycleState::TornDown {
            report.repeated = true;
            return report;
        }
        let from = self.state;

        if let Some(mut process) = self.process.take() {
            match process.stop() {
                Ok(_) => report.process_stopped = true,
                Err(err) => report.record_failure(TeardownStep::StopProcess, err.to_string()),
            }
        }

        if let Some(mut guard) = self.env_guard.take() {
            report.restored_variables = guard.names().count();
            guard.restore();
        }

        match self.policy {
            TeardownPolicy::DeleteAll => match fs::remove_dir_all(&self.directory) {
                Ok(()) => report.directory_deleted = true,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => report.record_failure(
                    TeardownStep::DeleteDirectory,
                    format!("{}: {err}", self.directory.display()),
                ),
            },
            TeardownPolicy::KeepProjectDirectory => {
                tracing::info!(
                    instance = %self.id,
                    dir = %self.directory.display(),
                    "keeping project directory"
                );
            }
        }

        self.agent = None;
        self.state = LifecycleState::TornDown;

        tracing::info!(
            instance = %self.id,
            from = %from,
            process_stopped = report.process_stopped,
            directory_deleted = report.directory_deleted,
            "instance torn down"
        );
        report.log();
        report
    }
}
