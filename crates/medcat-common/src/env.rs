//! Typed access to environment variables
//!
//! A variable that is unset or blank falls back to the default. A variable that is
//! set but cannot be parsed is reported as [`CommonError::InvalidEnv`] instead of
//! being silently replaced by the default.

use std::str::FromStr;

use crate::error::{CommonError, Result};

/// Read a variable, treating blank values as unset.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable into `T`, or return `default` when it is not set.
pub fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| CommonError::invalid_env(name, raw)),
        None => Ok(default),
    }
}

/// Parse an optional variable into `T`.
pub fn parse_opt<T: FromStr>(name: &str) -> Result<Option<T>> {
    var(name)
        .map(|raw| raw.parse().map_err(|_| CommonError::invalid_env(name, raw)))
        .transpose()
}

/// Read a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn flag_or(name: &str, default: bool) -> Result<bool> {
    match var(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(CommonError::invalid_env(name, raw)),
        },
        None => Ok(default),
    }
}

/// Read a comma-separated list. Empty items are dropped.
pub fn list_or(name: &str, default: &[&str]) -> Vec<String> {
    match var(name) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}
