//! Starting instance processes and containers.
//!
//! [`spawn`] starts exactly one process for a [`RunSpec`]. The at-most-one
//! rule per instance is enforced by [`crate::lifecycle::TemplateProject`].

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

mod container;
pub mod handle;
pub mod log_buffer;
pub mod run_spec;
pub mod signal;

pub use handle::{ProcessHandle, StopError, StopOutcome};
pub use log_buffer::{LogBuffer, LogLine, OutputStream, DEFAULT_LOG_LINES};
pub use run_spec::{ContainerSpec, PortMapping, RunSpec, DEFAULT_STOP_GRACE};

use handle::{spawn_output_reader, Target};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to launch `{command}`: {reason}")]
    ProcessLaunch { command: String, reason: String },
    #[error("instance {instance} already has a running process")]
    ProcessAlreadyRunning { instance: String, pid: Option<u32> },
}

/// Starts `spec` inside `project_dir` with stdout/stderr streamed into a
/// buffer of `log_lines` lines.
pub fn spawn(
    project_dir: &Path,
    spec: &RunSpec,
    label: &str,
    log_lines: usize,
) -> Result<ProcessHandle, LaunchError> {
    let command_form = spec.command_form();
    let launch_err = |reason: String| LaunchError::ProcessLaunch {
        command: command_form.clone(),
        reason,
    };

    let working_dir = crate::patcher::resolve_in_project(project_dir, &relative_or_dot(spec))
        .map_err(|err| launch_err(err.to_string()))?;
    if !working_dir.is_dir() {
        return Err(launch_err(format!(
            "working directory {} does not exist",
            working_dir.display()
        )));
    }

    let logs = Arc::new(Mutex::new(LogBuffer::with_capacity(log_lines)));
    let mut readers = Vec::new();

    let target = match &spec.container {
        Some(container) => {
            let args = container.run_args(&spec.overlay, &spec.args);
            container::start(&container.runtime, &args, &working_dir).map_err(&launch_err)?;
            let follower = match container::follow_logs(&container.runtime, &container.name) {
                Ok(mut follower) => {
                    readers = attach_readers(&mut follower, &logs, label);
                    Some(follower)
                }
                Err(err) => {
                    tracing::warn!(instance = %label, error = %err, "cannot follow container logs");
                    None
                }
            };
            Target::Container {
                runtime: container.runtime.clone(),
                name: container.name.clone(),
                follower,
            }
        }
        None => {
            let mut command = Command::new(&spec.program);
            command
                .args(&spec.args)
                .current_dir(&working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            for (name, value) in spec.overlay.iter() {
                command.env(name, value);
            }
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
            }

            let mut child = command.spawn().map_err(|err| launch_err(err.to_string()))?;
            readers = attach_readers(&mut child, &logs, label);
            let pgid = if cfg!(unix) { Some(child.id()) } else { None };
            Target::Child { child, pgid }
        }
    };

    tracing::info!(
        instance = %label,
        command = %command_form,
        overlay = spec.overlay.len(),
        scope = ?spec.overlay_scope,
        "process launched"
    );

    Ok(ProcessHandle::new(
        label.to_string(),
        target,
        logs,
        readers,
        spec.stop_grace,
    ))
}

fn relative_or_dot(spec: &RunSpec) -> String {
    let raw = spec.working_dir.display().to_string();
    if raw.is_empty() {
        ".".to_string()
    } else {
        raw
    }
}

fn attach_readers(
    child: &mut std::process::Child,
    logs: &Arc<Mutex<LogBuffer>>,
    label: &str,
) -> Vec<JoinHandle<()>> {
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_output_reader(
            stdout,
            OutputStream::Stdout,
            logs.clone(),
            label.to_string(),
        ));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_output_reader(
            stderr,
            OutputStream::Stderr,
            logs.clone(),
            label.to_string(),
        ));
    }
    readers
}
