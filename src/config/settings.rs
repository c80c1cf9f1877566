use super::paths::{
    default_projects_root, KEEP_PROJECTS_ENV, POLL_INTERVAL_ENV, PROJECTS_ROOT_ENV,
    READY_TIMEOUT_ENV, SCAFFOLD_TOOL_ENV, SETTINGS_PATH_ENV, STOP_GRACE_ENV,
};
use super::ConfigError;
use crate::lifecycle::TeardownPolicy;
use crate::probe::MIN_POLL_INTERVAL;
use crate::process::{ContainerSpec, RunSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarnessSettings {
    pub scaffold_tool: String,
    pub projects_root: PathBuf,
    pub scaffold_timeout_seconds: u64,
    pub ready_timeout_seconds: u64,
    pub poll_interval_milliseconds: u64,
    pub stop_grace_seconds: u64,
    pub log_buffer_lines: usize,
    pub keep_project_directories: bool,
    pub container_runtime: String,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            scaffold_tool: "dotnet".to_string(),
            projects_root: default_projects_root(),
            scaffold_timeout_seconds: 300,
            ready_timeout_seconds: 60,
            poll_interval_milliseconds: 500,
            stop_grace_seconds: 5,
            log_buffer_lines: 1000,
            keep_project_directories: false,
            container_runtime: "docker".to_string(),
        }
    }
}

impl HarnessSettings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Settings file named by `STAGEHAND_SETTINGS` (or defaults), then
    /// environment overrides, then validation.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os(SETTINGS_PATH_ENV) {
            Some(path) => Self::from_path(Path::new(&path))?,
            None => Self::default(),
        };
        let settings = base.with_env_overrides(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tool) = non_empty(lookup(SCAFFOLD_TOOL_ENV)) {
            self.scaffold_tool = tool;
        }
        if let Some(root) = non_empty(lookup(PROJECTS_ROOT_ENV)) {
            self.projects_root = PathBuf::from(root);
        }
        if let Some(raw) = non_empty(lookup(READY_TIMEOUT_ENV)) {
            self.ready_timeout_seconds = parse_env_number(READY_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(POLL_INTERVAL_ENV)) {
            self.poll_interval_milliseconds = parse_env_number(POLL_INTERVAL_ENV, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(STOP_GRACE_ENV)) {
            self.stop_grace_seconds = parse_env_number(STOP_GRACE_ENV, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(KEEP_PROJECTS_ENV)) {
            self.keep_project_directories = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidEnvironmentValue {
                        name: KEEP_PROJECTS_ENV.to_string(),
                        value: raw,
                    })
                }
            };
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scaffold_tool.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`scaffold_tool` must be non-empty".to_string(),
            ));
        }
        if self.container_runtime.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`container_runtime` must be non-empty".to_string(),
            ));
        }
        if !self.projects_root.is_absolute() {
            return Err(ConfigError::Settings(
                "`projects_root` must be an absolute path".to_string(),
            ));
        }
        if self.scaffold_timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "`scaffold_timeout_seconds` must be greater than zero".to_string(),
            ));
        }
        if self.ready_timeout() <= self.poll_interval() {
            return Err(ConfigError::Settings(
                "`poll_interval_milliseconds` must be smaller than `ready_timeout_seconds`"
                    .to_string(),
            ));
        }
        if self.poll_interval() < MIN_POLL_INTERVAL {
            return Err(ConfigError::Settings(format!(
                "`poll_interval_milliseconds` must be at least {}",
                MIN_POLL_INTERVAL.as_millis()
            )));
        }
        if self.log_buffer_lines == 0 {
            return Err(ConfigError::Settings(
                "`log_buffer_lines` must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scaffold_timeout(&self) -> Duration {
        Duration::from_secs(self.scaffold_timeout_seconds)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_milliseconds)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }

    /// `program` with the configured stop grace period.
    pub fn command(&self, program: &str) -> RunSpec {
        RunSpec::command(program).stop_grace(self.stop_grace())
    }

    /// Container on the configured runtime with the configured stop grace.
    pub fn container(&self, image: &str, name: &str) -> RunSpec {
        RunSpec::container(ContainerSpec::new(image, name).with_runtime(&self.container_runtime))
            .stop_grace(self.stop_grace())
    }

    pub fn teardown_policy(&self) -> TeardownPolicy {
        if self.keep_project_directories {
            TeardownPolicy::KeepProjectDirectory
        } else {
            TeardownPolicy::DeleteAll
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|raw| !raw.trim().is_empty())
}

fn parse_env_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnvironmentValue {
            name: name.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_validate() {
        HarnessSettings::default().validate().expect("defaults valid");
    }

    #[test]
    fn env_overrides_replace_fields() {
        let settings = HarnessSettings::default()
            .with_env_overrides(lookup_from(&[
                (SCAFFOLD_TOOL_ENV, "/opt/dotnet/dotnet"),
                (READY_TIMEOUT_ENV, "90"),
                (POLL_INTERVAL_ENV, "250"),
                (KEEP_PROJECTS_ENV, "true"),
            ]))
            .expect("overrides");

        assert_eq!(settings.scaffold_tool, "/opt/dotnet/dotnet");
        assert_eq!(settings.ready_timeout(), Duration::from_secs(90));
        assert_eq!(settings.poll_interval(), Duration::from_millis(250));
        assert_eq!(
            settings.teardown_policy(),
            TeardownPolicy::KeepProjectDirectory
        );
    }

    #[test]
    fn env_override_rejects_garbage_numbers() {
        let err = HarnessSettings::default()
            .with_env_overrides(lookup_from(&[(STOP_GRACE_ENV, "soon")]))
            .expect_err("invalid number");
        assert!(err.to_string().contains(STOP_GRACE_ENV));
    }

    #[test]
    fn validation_requires_poll_interval_below_timeout() {
        let settings = HarnessSettings {
            ready_timeout_seconds: 1,
            poll_interval_milliseconds: 1000,
            ..HarnessSettings::default()
        };
        let err = settings.validate().expect_err("interval too large");
        assert!(err.to_string().contains("poll_interval_milliseconds"));
    }

    #[test]
    fn validation_rejects_relative_projects_root() {
        let settings = HarnessSettings {
            projects_root: PathBuf::from("relative/root"),
            ..HarnessSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let parsed: HarnessSettings =
            serde_yaml::from_str("scaffold_tool: dotnet8\nstop_grace_seconds: 2\n")
                .expect("yaml");
        assert_eq!(parsed.scaffold_tool, "dotnet8");
        assert_eq!(parsed.stop_grace(), Duration::from_secs(2));
        assert_eq!(parsed.log_buffer_lines, 1000);
    }
}
