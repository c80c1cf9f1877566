use crate::lifecycle::environment::{EnvironmentOverlay, OverlayScope};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// How to start one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Relative to the instance directory.
    pub working_dir: PathBuf,
    pub overlay: EnvironmentOverlay,
    pub overlay_scope: OverlayScope,
    pub stop_grace: Duration,
    pub container: Option<ContainerSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// Run the instance as a container instead of a direct child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub runtime: String,
    pub image: String,
    pub name: String,
    pub ports: Vec<PortMapping>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            runtime: "docker".to_string(),
            image: image.into(),
            name: name.into(),
            ports: Vec::new(),
        }
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn with_port(mut self, host: u16, container: u16) -> Self {
        self.ports.push(PortMapping { host, container });
        self
    }

    /// `run -d --name <name> [-e K=V]* [-p host:container]* <image> [args]*`
    pub fn run_args(&self, overlay: &EnvironmentOverlay, args: &[String]) -> Vec<String> {
        let mut out = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
        ];
        for (name, value) in overlay.iter() {
            out.push("-e".to_string());
            out.push(format!("{name}={value}"));
        }
        for port in &self.ports {
            out.push("-p".to_string());
            out.push(format!("{}:{}", port.host, port.container));
        }
        out.push(self.image.clone());
        out.extend(args.iter().cloned());
        out
    }
}

impl RunSpec {
    pub fn command(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: PathBuf::new(),
            overlay: EnvironmentOverlay::new(),
            overlay_scope: OverlayScope::ChildOnly,
            stop_grace: DEFAULT_STOP_GRACE,
            container: None,
        }
    }

    /// Build-then-run through `dotnet run`.
    pub fn dotnet_run(project_file: impl AsRef<Path>) -> Self {
        Self::command("dotnet")
            .arg("run")
            .arg("--project")
            .arg(project_file.as_ref().display().to_string())
    }

    /// Azure Functions-style host started from the project directory.
    pub fn functions_host(port: u16) -> Self {
        Self::command("func")
            .arg("start")
            .arg("--port")
            .arg(port.to_string())
    }

    /// Container launched through `container.runtime`; `args` are appended
    /// after the image name.
    pub fn container(container: ContainerSpec) -> Self {
        let mut spec = Self::command(container.runtime.clone());
        spec.container = Some(container);
        spec
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, relative: impl Into<PathBuf>) -> Self {
        self.working_dir = relative.into();
        self
    }

    pub fn overlay(mut self, overlay: EnvironmentOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn overlay_scope(mut self, scope: OverlayScope) -> Self {
        self.overlay_scope = scope;
        self
    }

    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn command_form(&self) -> String {
        match &self.container {
            Some(container) => format!(
                "{} {}",
                container.runtime,
                container.run_args(&self.overlay, &self.args).join(" ")
            ),
            None if self.args.is_empty() => self.program.clone(),
            None => format!("{} {}", self.program, self.args.join(" ")),
        }
    }
}
