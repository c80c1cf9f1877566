//! Environment variables handed to one instance's process.
//!
//! By default an overlay only reaches the child's own environment block. A
//! process-wide overlay is an explicit opt-in for process models that read the
//! parent environment; it is installed through [`ProcessEnvGuard`], which puts
//! every variable back on release.
//!
//! Process-wide overlays that share a variable name must not be active in two
//! tests at once. Callers serialize such tests; nothing here does.

use std::collections::BTreeMap;
use std::ffi::OsString;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("invalid environment variable name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("environment variable `{name}` has a value containing NUL")]
    InvalidValue { name: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlayScope {
    /// Only the launched child sees the variables.
    #[default]
    ChildOnly,
    /// The variables are also installed in this process until teardown.
    Process,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvironmentOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Result<Self, OverlayError> {
        validate_name(name)?;
        let value = value.into();
        if value.contains('\0') {
            return Err(OverlayError::InvalidValue {
                name: name.to_string(),
            });
        }
        self.vars.insert(name.to_string(), value);
        Ok(self)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, OverlayError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |overlay, (name, value)| {
                overlay.with(name.as_ref(), value)
            })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

fn validate_name(name: &str) -> Result<(), OverlayError> {
    let reason = if name.is_empty() {
        Some("must be non-empty")
    } else if name.contains('=') {
        Some("must not contain '='")
    } else if name.contains('\0') {
        Some("must not contain NUL")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(OverlayError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Installs an overlay into this process and restores the previous values on
/// [`ProcessEnvGuard::restore`] or drop.
#[derive(Debug)]
pub struct ProcessEnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    restored: bool,
}

impl ProcessEnvGuard {
    pub fn install(overlay: &EnvironmentOverlay) -> Self {
        let mut previous = Vec::with_capacity(overlay.len());
        for (name, value) in overlay.iter() {
            previous.push((name.to_string(), std::env::var_os(name)));
            std::env::set_var(name, value);
        }
        Self {
            previous,
            restored: false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.previous.iter().map(|(name, _)| name.as_str())
    }

    /// Puts every variable back to its value before `install`; variables that
    /// did not exist are removed. Idempotent.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        for (name, value) in self.previous.iter().rev() {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

impl Drop for ProcessEnvGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
