pub mod error;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use paths::{
    default_projects_root, KEEP_PROJECTS_ENV, POLL_INTERVAL_ENV, PROJECTS_ROOT_ENV,
    READY_TIMEOUT_ENV, SCAFFOLD_TOOL_ENV, SETTINGS_PATH_ENV, STOP_GRACE_ENV,
};
pub use settings::HarnessSettings;
