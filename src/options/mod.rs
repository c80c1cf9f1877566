//! Generation arguments passed to the scaffolding tool.
//!
//! [`ProjectOptions`] is a value type: every `with_*` call returns a new value
//! and leaves the receiver untouched, so one base configuration can be shared
//! by many test cases.

use std::collections::BTreeMap;

pub mod typed;

pub use typed::{Authentication, LoggingBackend, ProjectOption, WebApiProjectOptions};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("option `{flag}` was already added")]
    DuplicateFlag { flag: String },
    #[error("invalid option name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },
}

/// A single generation argument, `--name` optionally followed by a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionArg {
    pub flag: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    args: Vec<OptionArg>,
    toggles: BTreeMap<String, bool>,
}

impl ProjectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `--name value`.
    pub fn with_option(&self, name: &str, value: impl Into<String>) -> Result<Self, OptionsError> {
        self.push_arg(name, Some(value.into()))
    }

    /// Adds a bare `--name` switch.
    pub fn with_flag(&self, name: &str) -> Result<Self, OptionsError> {
        self.push_arg(name, None)
    }

    /// Sets a named feature toggle, rendered as `--name true|false`.
    pub fn with_toggle(&self, name: &str, enabled: bool) -> Result<Self, OptionsError> {
        let flag = normalize_flag(name)?;
        self.ensure_unused(&flag)?;
        let mut next = self.clone();
        next.toggles.insert(flag, enabled);
        Ok(next)
    }

    /// Adds every argument of `other` after the arguments of `self`.
    pub fn merged(&self, other: &ProjectOptions) -> Result<Self, OptionsError> {
        let mut next = self.clone();
        for arg in &other.args {
            next = next.push_arg(&arg.flag, arg.value.clone())?;
        }
        for (name, enabled) in &other.toggles {
            next = next.with_toggle(name, *enabled)?;
        }
        Ok(next)
    }

    pub fn args(&self) -> &[OptionArg] {
        &self.args
    }

    pub fn toggles(&self) -> &BTreeMap<String, bool> {
        &self.toggles
    }

    pub fn toggle(&self, name: &str) -> Option<bool> {
        let flag = normalize_flag(name).ok()?;
        self.toggles.get(&flag).copied()
    }

    pub fn contains_flag(&self, name: &str) -> bool {
        match normalize_flag(name) {
            Ok(flag) => {
                self.args.iter().any(|arg| arg.flag == flag) || self.toggles.contains_key(&flag)
            }
            Err(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.toggles.is_empty()
    }

    /// Tool arguments: flags in insertion order, then toggles by name.
    pub fn to_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() * 2 + self.toggles.len() * 2);
        for arg in &self.args {
            out.push(arg.flag.clone());
            if let Some(value) = &arg.value {
                out.push(value.clone());
            }
        }
        for (flag, enabled) in &self.toggles {
            out.push(flag.clone());
            out.push(enabled.to_string());
        }
        out
    }

    fn push_arg(&self, name: &str, value: Option<String>) -> Result<Self, OptionsError> {
        let flag = normalize_flag(name)?;
        self.ensure_unused(&flag)?;
        let mut next = self.clone();
        next.args.push(OptionArg { flag, value });
        Ok(next)
    }

    fn ensure_unused(&self, flag: &str) -> Result<(), OptionsError> {
        if self.args.iter().any(|arg| arg.flag == flag) || self.toggles.contains_key(flag) {
            return Err(OptionsError::DuplicateFlag {
                flag: flag.to_string(),
            });
        }
        Ok(())
    }
}

fn normalize_flag(name: &str) -> Result<String, OptionsError> {
    let bare = name.trim().trim_start_matches('-');
    if bare.is_empty() {
        return Err(OptionsError::InvalidName {
            name: name.to_string(),
            reason: "must be non-empty".to_string(),
        });
    }
    if !bare
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
    {
        return Err(OptionsError::InvalidName {
            name: name.to_string(),
            reason: "must use only ASCII letters, digits, '-', '_' or '.'".to_string(),
        });
    }
    Ok(format!("--{bare}"))
}
