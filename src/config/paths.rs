use std::path::PathBuf;

pub const PROJECTS_DIR_NAME: &str = "stagehand";

pub const SETTINGS_PATH_ENV: &str = "STAGEHAND_SETTINGS";
pub const SCAFFOLD_TOOL_ENV: &str = "STAGEHAND_SCAFFOLD_TOOL";
pub const PROJECTS_ROOT_ENV: &str = "STAGEHAND_PROJECTS_ROOT";
pub const READY_TIMEOUT_ENV: &str = "STAGEHAND_READY_TIMEOUT_SECONDS";
pub const POLL_INTERVAL_ENV: &str = "STAGEHAND_POLL_INTERVAL_MILLISECONDS";
pub const STOP_GRACE_ENV: &str = "STAGEHAND_STOP_GRACE_SECONDS";
pub const KEEP_PROJECTS_ENV: &str = "STAGEHAND_KEEP_PROJECTS";

/// Shared root under which every instance gets its own directory.
pub fn default_projects_root() -> PathBuf {
    std::env::temp_dir().join(PROJECTS_DIR_NAME)
}
