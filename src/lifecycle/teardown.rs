use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeardownPolicy {
    #[default]
    DeleteAll,
    /// Leave the generated sources on disk for inspection.
    KeepProjectDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    StopProcess,
    RestoreEnvironment,
    DeleteDirectory,
    ReleaseHttpAgent,
}

impl TeardownStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StopProcess => "stop_process",
            Self::RestoreEnvironment => "restore_environment",
            Self::DeleteDirectory => "delete_directory",
            Self::ReleaseHttpAgent => "release_http_agent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub step: TeardownStep,
    pub reason: String,
}

/// Outcome of one teardown. Failures are collected per step; a later step
/// still runs when an earlier one failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub instance: String,
    pub failures: Vec<TeardownFailure>,
    pub process_stopped: bool,
    pub restored_variables: usize,
    pub directory_deleted: bool,
    /// Teardown had already run; nothing was done.
    pub repeated: bool,
}

impl TeardownReport {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, step: TeardownStep, reason: impl Into<String>) {
        self.failures.push(TeardownFailure {
            step,
            reason: reason.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_step(&self, step: TeardownStep) -> bool {
        self.failures.iter().any(|failure| failure.step == step)
    }

    /// Emits a warning for a partial failure; quiet when clean.
    pub fn log(&self) {
        if self.is_clean() {
            return;
        }
        tracing::warn!(
            instance = %self.instance,
            failures = self.failures.len(),
            details = %self,
            "TeardownPartialFailure"
        );
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "teardown of {} completed", self.instance);
        }
        write!(f, "teardown of {} partially failed:", self.instance)?;
        for failure in &self.failures {
            write!(f, " [{}] {};", failure.step.as_str(), failure.reason)?;
        }
        Ok(())
    }
}
