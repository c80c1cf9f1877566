//! Instance lifecycle: `Created → Patched → Launched → Ready → InUse →
//! TornDown`, with teardown reachable from every state and `stop()` looping
//! a running instance back to `Patched`.

use crate::config::HarnessSettings;
use crate::patcher::PatchError;
use crate::process::{LaunchError, StopError, DEFAULT_LOG_LINES};
use crate::probe::ProbeError;
use std::time::Duration;

pub mod collection;
pub mod environment;
pub mod instance;
pub mod state;
pub mod teardown;

pub use collection::ProjectCollection;
pub use environment::{EnvironmentOverlay, OverlayError, OverlayScope, ProcessEnvGuard};
pub use instance::TemplateProject;
pub use state::{Action, LifecycleState};
pub use teardown::{TeardownFailure, TeardownPolicy, TeardownReport, TeardownStep};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("instance {instance} cannot {action} while {from}")]
    InvalidTransition {
        instance: String,
        from: LifecycleState,
        action: Action,
    },
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Stop(#[from] StopError),
    #[error("process of instance {instance} exited before becoming ready (exit code {exit_code:?})\n{output_tail}")]
    ProcessExited {
        instance: String,
        exit_code: Option<i32>,
        output_tail: String,
    },
}

/// Per-instance settings handed down by the materializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub log_buffer_lines: usize,
    pub teardown_policy: TeardownPolicy,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            log_buffer_lines: DEFAULT_LOG_LINES,
            teardown_policy: TeardownPolicy::DeleteAll,
            ready_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl InstanceConfig {
    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self {
            log_buffer_lines: settings.log_buffer_lines,
            teardown_policy: settings.teardown_policy(),
            ready_timeout: settings.ready_timeout(),
            poll_interval: settings.poll_interval(),
        }
    }
}
