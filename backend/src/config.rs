//! Application configuration.
//!
//! Read from the environment after loading an optional `.env` file.
//! CLI flags override what is set here.

use std::env;
use std::str::FromStr;

use crate::cache::DEFAULT_CAPACITY;
use crate::error::{ConfigError, ConfigResult};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default request body limit, in MB.
///
/// Covers three spreadsheets in one multipart request.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

pub const PORT_VAR: &str = "CPFCHECK_PORT";
pub const MAX_UPLOAD_VAR: &str = "CPFCHECK_MAX_UPLOAD_MB";
pub const STORE_CAPACITY_VAR: &str = "CPFCHECK_STORE_CAPACITY";

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Jobs kept in the export store.
    pub store_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            store_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the environment.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_var(&lookup, PORT_VAR)?.unwrap_or(defaults.port);
        let max_upload_bytes = match parse_var::<usize, _>(&lookup, MAX_UPLOAD_VAR)? {
            Some(mb) => mb
                .checked_mul(1024 * 1024)
                .ok_or_else(|| ConfigError::InvalidValue {
                    var: MAX_UPLOAD_VAR,
                    value: mb.to_string(),
                    message: "too large".to_string(),
                })?,
            None => defaults.max_upload_bytes,
        };
        let store_capacity =
            parse_var(&lookup, STORE_CAPACITY_VAR)?.unwrap_or(defaults.store_capacity);

        Ok(Self {
            port,
            max_upload_bytes,
            store_capacity,
        })
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            var,
            value: raw.clone(),
            message: e.to_string(),
        })
}
