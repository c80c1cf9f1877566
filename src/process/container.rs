use super::handle::StopError;
use super::handle::StopOutcome;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

/// `<runtime> run -d ...`; returns the runtime's stderr on failure.
pub(crate) fn start(runtime: &str, args: &[String], cwd: &std::path::Path) -> Result<(), String> {
    let output = Command::new(runtime)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| err.to_string())?;
    if !output.status.success() {
        return Err(stderr_text(&output));
    }
    Ok(())
}

/// `<runtime> logs -f <name>` with piped output.
pub(crate) fn follow_logs(runtime: &str, name: &str) -> std::io::Result<std::process::Child> {
    Command::new(runtime)
        .arg("logs")
        .arg("-f")
        .arg(name)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

pub(crate) fn is_running(runtime: &str, name: &str) -> bool {
    Command::new(runtime)
        .arg("inspect")
        .arg("-f")
        .arg("{{.State.Running}}")
        .arg(name)
        .stdin(Stdio::null())
        .output()
        .map(|output| {
            output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true"
        })
        .unwrap_or(false)
}

/// `stop -t <grace>` then `rm -f`; removal runs even when the stop fails.
pub(crate) fn stop(runtime: &str, name: &str, grace: Duration) -> Result<StopOutcome, StopError> {
    let stopped = Command::new(runtime)
        .arg("stop")
        .arg("-t")
        .arg(grace.as_secs().max(1).to_string())
        .arg(name)
        .stdin(Stdio::null())
        .output();
    let removed = Command::new(runtime)
        .arg("rm")
        .arg("-f")
        .arg(name)
        .stdin(Stdio::null())
        .output();

    let forced = !matches!(&stopped, Ok(output) if output.status.success());
    match removed {
        Ok(output) if output.status.success() => Ok(StopOutcome {
            exit_code: None,
            forced,
        }),
        Ok(output) => Err(StopError::Container {
            name: name.to_string(),
            reason: stderr_text(&output),
        }),
        Err(err) => Err(StopError::Container {
            name: name.to_string(),
            reason: err.to_string(),
        }),
    }
}

fn stderr_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}
