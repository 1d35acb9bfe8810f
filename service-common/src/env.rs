//! Environment variable lookup and parsing.
//!
//! Services read most of their configuration from the process environment.
//! The `require_*` helpers fail with a descriptive [`ServiceError`] instead of
//! aborting, so startup code can report every problem through one path.
//!
//! Lookups go through an [`EnvSource`]. The free functions read the process
//! environment; [`EnvReader`] accepts any source, which keeps configuration
//! code testable without mutating global state.

use std::collections::HashMap;
use std::ffi::OsString;
use std::str::FromStr;

use crate::{Result, ServiceError};

/// A source of environment-style key/value settings.
pub trait EnvSource {
    /// Return the raw value for `name`, or `None` when unset.
    fn get(&self, name: &str) -> Option<OsString>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<OsString> {
        std::env::var_os(name)
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<OsString> {
        HashMap::get(self, name).map(OsString::from)
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn get(&self, name: &str) -> Option<OsString> {
        HashMap::get(self, name).map(OsString::from)
    }
}

/// Typed accessors over an [`EnvSource`].
#[derive(Debug, Clone, Default)]
pub struct EnvReader<S = ProcessEnv> {
    source: S,
}

impl EnvReader<ProcessEnv> {
    /// Reader over the process environment.
    #[must_use]
    pub const fn process() -> Self {
        Self { source: ProcessEnv }
    }
}

impl<S: EnvSource> EnvReader<S> {
    /// Reader over a custom source.
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Look up a required variable.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingEnv`] if the variable is unset and
    /// [`ServiceError::InvalidEnv`] if it is not valid unicode.
    pub fn require(&self, name: &str) -> Result<String> {
        self.lookup(name)?
            .ok_or_else(|| ServiceError::missing_env(name))
    }

    /// Look up a required variable and parse it as an integer.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingEnv`] when unset and
    /// [`ServiceError::InvalidEnv`] when the value is not an integer.
    pub fn require_int(&self, name: &str) -> Result<i64> {
        self.require_parsed(name)
    }

    /// Like [`Self::require_int`] but rejects zero.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ZeroEnv`] if the parsed value is `0`.
    pub fn require_int_non_zero(&self, name: &str) -> Result<i64> {
        match self.require_int(name)? {
            0 => Err(ServiceError::ZeroEnv {
                name: name.to_string(),
            }),
            value => Ok(value),
        }
    }

    /// Look up a required variable and parse it as a float.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingEnv`] when unset and
    /// [`ServiceError::InvalidEnv`] when the value is not a number.
    pub fn require_float(&self, name: &str) -> Result<f64> {
        self.require_parsed(name)
    }

    /// Like [`Self::require_float`] but rejects zero, including `-0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ZeroEnv`] if the parsed value equals `0.0`.
    pub fn require_float_non_zero(&self, name: &str) -> Result<f64> {
        let value = self.require_float(name)?;
        if value == 0.0 {
            return Err(ServiceError::ZeroEnv {
                name: name.to_string(),
            });
        }
        Ok(value)
    }

    /// Fetch a variable, or `fallback` when it is not set.
    ///
    /// A variable set to the empty string counts as set. So does one that is
    /// not valid unicode; its invalid sequences are replaced with U+FFFD.
    #[must_use]
    pub fn or_default(&self, name: &str, fallback: &str) -> String {
        self.source.get(name).map_or_else(
            || fallback.to_string(),
            |raw| raw.to_string_lossy().into_owned(),
        )
    }

    /// Parse an optional variable, using `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidEnv`] if the variable is set but cannot
    /// be parsed as `T`.
    pub fn parse<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.lookup(name)? {
            Some(raw) => parse_value(name, &raw),
            None => Ok(default),
        }
    }

    /// Parse a comma separated list. Items are trimmed and empty items
    /// dropped; an unset variable yields an empty list.
    #[must_use]
    pub fn list(&self, name: &str) -> Vec<String> {
        self.source
            .get(name)
            .map(|raw| {
                raw.to_string_lossy()
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lookup(&self, name: &str) -> Result<Option<String>> {
        self.source
            .get(name)
            .map(|raw| {
                raw.into_string().map_err(|raw| {
                    ServiceError::invalid_env(
                        name,
                        raw.to_string_lossy(),
                        "value is not valid unicode",
                    )
                })
            })
            .transpose()
    }

    fn require_parsed<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.require(name)?;
        parse_value(name, &raw)
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ServiceError::invalid_env(name, raw, e))
}

/// Look up a required process environment variable.
///
/// # Errors
///
/// See [`EnvReader::require`].
pub fn require_env(name: &str) -> Result<String> {
    EnvReader::process().require(name)
}

/// Look up a required process environment variable as an integer.
///
/// # Errors
///
/// See [`EnvReader::require_int`].
pub fn require_env_int(name: &str) -> Result<i64> {
    EnvReader::process().require_int(name)
}

/// Look up a required, non-zero process environment variable as an integer.
///
/// # Errors
///
/// See [`EnvReader::require_int_non_zero`].
pub fn require_env_int_non_zero(name: &str) -> Result<i64> {
    EnvReader::process().require_int_non_zero(name)
}

/// Look up a required process environment variable as a float.
///
/// # Errors
///
/// See [`EnvReader::require_float`].
pub fn require_env_float(name: &str) -> Result<f64> {
    EnvReader::process().require_float(name)
}

/// Look up a required, non-zero process environment variable as a float.
///
/// # Errors
///
/// See [`EnvReader::require_float_non_zero`].
pub fn require_env_float_non_zero(name: &str) -> Result<f64> {
    EnvReader::process().require_float_non_zero(name)
}

/// Fetch a process environment variable, or `fallback` when unset.
#[must_use]
pub fn env_or_default(name: &str, fallback: &str) -> String {
    EnvReader::process().or_default(name, fallback)
}

/// Parse an optional process environment variable.
///
/// # Errors
///
/// See [`EnvReader::parse`].
pub fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    EnvReader::process().parse(name, default)
}

/// Parse a comma separated process environment variable.
#[must_use]
pub fn parse_list_env(name: &str) -> Vec<String> {
    EnvReader::process().list(name)
}
