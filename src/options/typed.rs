use super::{OptionsError, ProjectOptions};

/// A typed generation setting that knows how to render itself as arguments.
pub trait ProjectOption {
    fn apply(&self, options: &ProjectOptions) -> Result<ProjectOptions, OptionsError>;
}

impl ProjectOptions {
    pub fn with(&self, option: &impl ProjectOption) -> Result<Self, OptionsError> {
        option.apply(self)
    }

    pub fn with_project_name(&self, name: &str) -> Result<Self, OptionsError> {
        self.with_option("name", name)
    }

    pub fn with_excluded_correlation(&self) -> Result<Self, OptionsError> {
        self.with_flag("exclude-correlation")
    }

    pub fn with_included_app_settings(&self) -> Result<Self, OptionsError> {
        self.with_flag("include-appsettings")
    }

    pub fn with_excluded_open_api(&self) -> Result<Self, OptionsError> {
        self.with_flag("exclude-openApi")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    None,
    SharedAccessKey { header: String, secret_name: String },
    Certificate { subject: String },
    Jwt,
}

impl Authentication {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::SharedAccessKey { .. } => "SharedAccessKey",
            Self::Certificate { .. } => "Certificate",
            Self::Jwt => "JWT",
        }
    }
}

impl ProjectOption for Authentication {
    fn apply(&self, options: &ProjectOptions) -> Result<ProjectOptions, OptionsError> {
        let next = options.with_option("authentication", self.as_str())?;
        match self {
            Self::SharedAccessKey {
                header,
                secret_name,
            } => next
                .with_option("shared-access-key-header", header.as_str())?
                .with_option("shared-access-key-secret-name", secret_name.as_str()),
            Self::Certificate { subject } => {
                next.with_option("certificate-subject", subject.as_str())
            }
            Self::None | Self::Jwt => Ok(next),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingBackend {
    Console,
    Serilog,
}

impl ProjectOption for LoggingBackend {
    fn apply(&self, options: &ProjectOptions) -> Result<ProjectOptions, OptionsError> {
        match self {
            Self::Console => options.with_option("logging", "Console"),
            Self::Serilog => options.with_option("logging", "Serilog"),
        }
    }
}

/// Explicit settings for a web API template; unset fields add no arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebApiProjectOptions {
    pub project_name: Option<String>,
    pub authentication: Option<Authentication>,
    pub logging: Option<LoggingBackend>,
    pub exclude_correlation: bool,
    pub exclude_open_api: bool,
    pub include_app_settings: bool,
}

impl ProjectOption for WebApiProjectOptions {
    fn apply(&self, options: &ProjectOptions) -> Result<ProjectOptions, OptionsError> {
        let mut next = options.clone();
        if let Some(name) = &self.project_name {
            next = next.with_project_name(name)?;
        }
        if let Some(auth) = &self.authentication {
            next = next.with(auth)?;
        }
        if let Some(logging) = &self.logging {
            next = next.with(logging)?;
        }
        if self.exclude_correlation {
            next = next.with_excluded_correlation()?;
        }
        if self.exclude_open_api {
            next = next.with_excluded_open_api()?;
        }
        if self.include_app_settings {
            next = next.with_included_app_settings()?;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_access_key_renders_header_and_secret_name() {
        let auth = Authentication::SharedAccessKey {
            header: "x-shared-access-key".to_string(),
            secret_name: "key".to_string(),
        };
        let options = ProjectOptions::new().with(&auth).expect("auth");
        assert_eq!(
            options.to_args(),
            vec![
                "--authentication",
                "SharedAccessKey",
                "--shared-access-key-header",
                "x-shared-access-key",
                "--shared-access-key-secret-name",
                "key"
            ]
        );
    }

    #[test]
    fn two_authentication_mechanisms_collide() {
        let options = ProjectOptions::new().with(&Authentication::Jwt).expect("jwt");
        let err = options
            .with(&Authentication::Certificate {
                subject: "CN=test".to_string(),
            })
            .expect_err("duplicate authentication");
        assert!(matches!(err, OptionsError::DuplicateFlag { flag } if flag == "--authentication"));
    }

    #[test]
    fn web_api_options_only_render_requested_settings() {
        let config = WebApiProjectOptions {
            logging: Some(LoggingBackend::Serilog),
            exclude_correlation: true,
            ..WebApiProjectOptions::default()
        };
        let options = ProjectOptions::new().with(&config).expect("web api");
        assert_eq!(
            options.to_args(),
            vec!["--logging", "Serilog", "--exclude-correlation"]
        );
    }
}
