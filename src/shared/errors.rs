use crate::clients::ClientError;
use crate::config::ConfigError;
use crate::lifecycle::{LifecycleError, OverlayError};
use crate::materializer::MaterializeError;
use crate::options::OptionsError;
use crate::patcher::PatchError;
use crate::probe::ProbeError;
use crate::process::LaunchError;

/// Any failure a harness operation can surface. Fixtures that chain
/// materialize, patch, launch and probe can use one `?` type.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl HarnessError {
    /// Unwraps lifecycle errors that only wrap a component error, so callers
    /// can match on the component variant directly.
    pub fn flatten(self) -> Self {
        match self {
            Self::Lifecycle(LifecycleError::Patch(err)) => Self::Patch(err),
            Self::Lifecycle(LifecycleError::Launch(err)) => Self::Launch(err),
            Self::Lifecycle(LifecycleError::Probe(err)) => Self::Probe(err),
            other => other,
        }
    }
}
