use super::MaterializeError;
use crate::process::signal::{signal_process_group, Signal};
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_POLL: Duration = Duration::from_millis(25);
/// Output still held open by grandchildren after the tool exits is abandoned
/// after this long.
const READER_WAIT: Duration = Duration::from_secs(5);
const READER_WAIT_AFTER_KILL: Duration = Duration::from_secs(1);

/// The external scaffolding CLI, e.g. `dotnet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldTool {
    pub binary: String,
    pub timeout: Duration,
}

impl Default for ScaffoldTool {
    fn default() -> Self {
        Self {
            binary: "dotnet".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub command_form: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ScaffoldTool {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// `new <template> [options]* --output <dir>`
    pub fn new_project_args(template: &str, option_args: &[String], output: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(option_args.len() + 4);
        args.push("new".to_string());
        args.push(template.to_string());
        args.extend(option_args.iter().cloned());
        args.push("--output".to_string());
        args.push(output.display().to_string());
        args
    }

    /// Registers a template package source so `new <template>` can find it.
    pub fn install_template(&self, source: &Path) -> Result<ToolOutput, MaterializeError> {
        let args = vec![
            "new".to_string(),
            "install".to_string(),
            source.display().to_string(),
        ];
        self.run_checked(&source.display().to_string(), &args, None)
    }

    pub fn uninstall_template(&self, source: &Path) -> Result<ToolOutput, MaterializeError> {
        let args = vec![
            "new".to_string(),
            "uninstall".to_string(),
            source.display().to_string(),
        ];
        self.run_checked(&source.display().to_string(), &args, None)
    }

    /// Runs the tool and maps a non-zero exit to `ProjectCreation`.
    pub fn run_checked(
        &self,
        template: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<ToolOutput, MaterializeError> {
        let output = self.run(template, args, cwd)?;
        if output.exit_code != Some(0) {
            return Err(MaterializeError::ProjectCreation {
                template: template.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    pub fn run(
        &self,
        template: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<ToolOutput, MaterializeError> {
        let command_form = format!("{} {}", self.binary, args.join(" "));
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(MaterializeError::ToolMissing {
                    binary: self.binary.clone(),
                })
            }
            Err(source) => {
                return Err(MaterializeError::ToolSpawn {
                    command: command_form,
                    source,
                })
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || drain(stdout));
        let stderr_reader = thread::spawn(move || drain(stderr));

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        signal_process_group(child.id(), Signal::Kill);
                        let _ = child.kill();
                        let _ = child.wait();
                        let deadline = Instant::now() + READER_WAIT_AFTER_KILL;
                        let _ = join_before(stdout_reader, deadline);
                        let stderr = join_before(stderr_reader, deadline);
                        tracing::warn!(
                            command = %command_form,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "scaffolding tool timed out"
                        );
                        return Err(MaterializeError::Timeout {
                            template: template.to_string(),
                            timeout_ms: self.timeout.as_millis() as u64,
                            stderr,
                        });
                    }
                    thread::sleep(WAIT_POLL);
                }
                Err(source) => {
                    signal_process_group(child.id(), Signal::Kill);
                    let _ = child.kill();
                    return Err(MaterializeError::ToolSpawn {
                        command: command_form,
                        source,
                    });
                }
            }
        };

        let deadline = Instant::now() + READER_WAIT;
        let stdout = join_before(stdout_reader, deadline);
        let stderr = join_before(stderr_reader, deadline);
        Ok(ToolOutput {
            command_form,
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Joins `reader` if it finishes by `deadline`; otherwise leaves it detached
/// and returns an empty string.
fn join_before(reader: thread::JoinHandle<String>, deadline: Instant) -> String {
    while !reader.is_finished() {
        if Instant::now() >= deadline {
            return String::new();
        }
        thread::sleep(WAIT_POLL);
    }
    reader.join().unwrap_or_default()
}

fn drain<R: Read>(pipe: Option<R>) -> String {
    let mut buf = String::new();
    if let Some(pipe) = pipe {
        let mut reader = BufReader::new(pipe);
        let _ = reader.read_to_string(&mut buf);
    }
    buf
}
