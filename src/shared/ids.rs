use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_WIDTH: usize = 4;
const SUFFIX_SPACE: u32 = 36 * 36 * 36 * 36;

pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-', '_' or '.'"
    ))
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                validate_identifier_value($kind, raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = String;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(TemplateId, "template id");
define_id_type!(InstanceId, "instance id");

impl TemplateId {
    /// Lowercase, filesystem-friendly form used as the instance directory prefix.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.0.len());
        for ch in self.0.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let trimmed = slug.trim_matches('-');
        if trimmed.is_empty() {
            "project".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl InstanceId {
    /// `<template-slug>-<base36 timestamp>-<4 random base36 chars>`.
    pub fn generate(template: &TemplateId, now: i64) -> Result<Self, String> {
        let timestamp = u64::try_from(now)
            .map_err(|_| "instance ids require a non-negative timestamp".to_string())?;
        let suffix = random_suffix()?;
        Ok(Self(format!(
            "{}-{}-{}",
            template.slug(),
            base36_encode_u64(timestamp),
            suffix
        )))
    }
}

/// Random lowercase base36 token, also used for correlation ids.
pub fn random_token(width: usize) -> Result<String, String> {
    let mut out = String::with_capacity(width);
    while out.len() < width {
        out.push_str(&random_suffix()?);
    }
    out.truncate(width);
    Ok(out)
}

fn random_suffix() -> Result<String, String> {
    let mut bytes = [0_u8; 4];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| format!("failed to generate instance id randomness: {err}"))?;
    let sample = u32::from_le_bytes(bytes) % SUFFIX_SPACE;
    Ok(base36_encode_fixed_u32(sample, SUFFIX_WIDTH))
}

fn base36_encode_u64(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while value > 0 {
        chars.push(BASE36_ALPHABET[(value % 36) as usize] as char);
        value /= 36;
    }
    chars.into_iter().rev().collect()
}

fn base36_encode_fixed_u32(mut value: u32, width: usize) -> String {
    let mut chars = vec!['0'; width];
    for idx in (0..width).rev() {
        chars[idx] = BASE36_ALPHABET[(value % 36) as usize] as char;
        value /= 36;
    }
    chars.into_iter().collect()
}
