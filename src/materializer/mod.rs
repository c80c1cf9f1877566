//! Generates fresh project instances by driving the scaffolding tool.

use crate::config::HarnessSettings;
use crate::lifecycle::{InstanceConfig, TeardownPolicy, TemplateProject};
use crate::options::ProjectOptions;
use crate::shared::ids::TemplateId;
use std::fs;
use std::path::Path;

pub mod directory;
pub mod tool;

pub use directory::reserve_instance_directory;
pub use tool::{ScaffoldTool, ToolOutput};

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("project creation from template `{template}` failed with exit code {}: {stderr}", describe_exit(.exit_code))]
    ProjectCreation {
        template: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("scaffolding tool not found: {binary}")]
    ToolMissing { binary: String },
    #[error("failed to run scaffolding command `{command}`: {source}")]
    ToolSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("project creation from template `{template}` timed out after {timeout_ms}ms: {stderr}")]
    Timeout {
        template: String,
        timeout_ms: u64,
        stderr: String,
    },
    #[error("failed to create project directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    InstanceId(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string())
}

#[derive(Debug, Clone)]
pub struct Materializer {
    pub tool: ScaffoldTool,
    pub instance: InstanceConfig,
}

impl Default for Materializer {
    fn default() -> Self {
        Self {
            tool: ScaffoldTool::default(),
            instance: InstanceConfig::default(),
        }
    }
}

impl Materializer {
    pub fn new(tool: ScaffoldTool) -> Self {
        Self {
            tool,
            instance: InstanceConfig::default(),
        }
    }

    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self {
            tool: ScaffoldTool::new(&settings.scaffold_tool, settings.scaffold_timeout()),
            instance: InstanceConfig::from_settings(settings),
        }
    }

    pub fn with_teardown_policy(mut self, policy: TeardownPolicy) -> Self {
        self.instance.teardown_policy = policy;
        self
    }

    /// Generates `template` into a new directory under `destination_root`.
    ///
    /// On failure the reserved directory is removed and the tool's stderr is
    /// returned verbatim.
    pub fn materialize(
        &self,
        template: &TemplateId,
        options: &ProjectOptions,
        destination_root: &Path,
    ) -> Result<TemplateProject, MaterializeError> {
        let (id, dir) = reserve_instance_directory(destination_root, template)?;
        let args = ScaffoldTool::new_project_args(template.as_str(), &options.to_args(), &dir);

        tracing::info!(
            instance = %id,
            template = %template,
            dir = %dir.display(),
            "materializing project"
        );

        let generated = self
            .tool
            .run_checked(template.as_str(), &args, Some(destination_root));
        match generated {
            Ok(output) => {
                tracing::debug!(instance = %id, command = %output.command_form, "scaffolding finished");
                Ok(TemplateProject::created(
                    template.clone(),
                    id,
                    dir,
                    options.clone(),
                    self.instance.clone(),
                ))
            }
            Err(err) => {
                tracing::warn!(instance = %id, error = %err, "scaffolding failed");
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    tracing::warn!(
                        instance = %id,
                        dir = %dir.display(),
                        error = %cleanup,
                        "failed to remove directory of failed project"
                    );
                }
                Err(err)
            }
        }
    }
}
