//! Secret references in configuration values.
//!
//! A credential in `config.toml` is either written inline or points at where
//! the secret lives:
//!
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//!
//! Anything else is taken literally.

use std::process::Command;

use thiserror::Error;

/// Failure to resolve a secret reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("environment variable `{0}` is not set")]
    MissingEnv(String),

    #[error("failed to run `pass show {path}`: {message}")]
    PassUnavailable { path: String, message: String },

    #[error("`pass show {path}` failed: {message}")]
    PassFailed { path: String, message: String },

    #[error("`pass show {0}` produced no output")]
    PassEmpty(String),
}

/// Where a configured value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    Env(&'a str),
    Pass(&'a str),
    Plain(&'a str),
}

impl<'a> SecretRef<'a> {
    /// Classifies a raw configuration value.
    pub fn parse(value: &'a str) -> Self {
        if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else {
            Self::Plain(value)
        }
    }

    /// Produces the secret value.
    pub fn resolve(&self) -> Result<String, SecretError> {
        match *self {
            Self::Env(var) => {
                std::env::var(var).map_err(|_| SecretError::MissingEnv(var.to_string()))
            }
            Self::Pass(path) => pass_show(path),
            Self::Plain(value) => Ok(value.to_string()),
        }
    }
}

/// Resolves a raw configuration value.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    SecretRef::parse(value).resolve()
}

fn pass_show(path: &str) -> Result<String, SecretError> {
    let output = Command::new("pass")
        .args(["show", path])
        .output()
        .map_err(|e| SecretError::PassUnavailable {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SecretError::PassFailed {
            path: path.to_string(),
            message: format!(
                "{} ({})",
                String::from_utf8_lossy(&output.stderr).trim(),
                output.status
            ),
        });
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| SecretError::PassEmpty(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_values() {
        assert_eq!(SecretRef::parse("env::APP_KEY"), SecretRef::Env("APP_KEY"));
        assert_eq!(SecretRef::parse("pass::fx/backend"), SecretRef::Pass("fx/backend"));
        assert_eq!(SecretRef::parse("hunter2"), SecretRef::Plain("hunter2"));
        assert_eq!(
            SecretRef::parse("env:single-colon"),
            SecretRef::Plain("env:single-colon")
        );
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(resolve("client-42").unwrap(), "client-42");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_reference_resolves() {
        unsafe {
            std::env::set_var("_FXCAL_TEST_APP_KEY", "k3y");
        }
        assert_eq!(resolve("env::_FXCAL_TEST_APP_KEY").unwrap(), "k3y");
        unsafe {
            std::env::remove_var("_FXCAL_TEST_APP_KEY");
        }
    }

    #[test]
    fn env_reference_missing_var() {
        assert_eq!(
            resolve("env::_FXCAL_TEST_UNSET_98765"),
            Err(SecretError::MissingEnv("_FXCAL_TEST_UNSET_98765".to_string()))
        );
    }

    #[test]
    fn pass_reference_unknown_entry_fails() {
        assert!(resolve("pass::fxcal/does/not/exist/98765").is_err());
    }
}
