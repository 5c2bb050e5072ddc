//! Environment-style configuration for callers of the client.
//!
//! `ApiClient` never reads the process environment. Programs and tests that
//! want the usual `ARGO_*` variables read them here and pass the result to a
//! `ClientBuilder`.

use std::time::Duration;

use thiserror::Error;

use crate::config::{ClientBuilder, DEFAULT_TIMEOUT};

pub const ARGO_SERVER: &str = "ARGO_SERVER";
pub const ARGO_TOKEN: &str = "ARGO_TOKEN";
pub const ARGO_NAMESPACE: &str = "ARGO_NAMESPACE";
pub const ARGO_INSECURE_SKIP_VERIFY: &str = "ARGO_INSECURE_SKIP_VERIFY";
pub const ARGO_HTTP_DEBUG: &str = "ARGO_HTTP_DEBUG";
pub const ARGO_TIMEOUT_SECS: &str = "ARGO_TIMEOUT_SECS";

pub const DEFAULT_SERVER: &str = "https://localhost:2746";
pub const DEFAULT_NAMESPACE: &str = "argo";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{var} must be a boolean, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var} must be a positive whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: String,
    pub token: Option<String>,
    pub namespace: String,
    pub insecure_skip_verify: bool,
    pub http_debug: bool,
    pub timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get(ARGO_TOKEN).map(|raw| {
            let raw = raw.trim();
            raw.strip_prefix("Bearer ").unwrap_or(raw).to_string()
        });

        let timeout = match get(ARGO_TIMEOUT_SECS) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| SettingsError::InvalidSeconds {
                    var: ARGO_TIMEOUT_SECS,
                    value,
                })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Settings {
            server: get(ARGO_SERVER).unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            token,
            namespace: get(ARGO_NAMESPACE).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            insecure_skip_verify: parse_bool(
                ARGO_INSECURE_SKIP_VERIFY,
                get(ARGO_INSECURE_SKIP_VERIFY),
            )?,
            http_debug: parse_bool(ARGO_HTTP_DEBUG, get(ARGO_HTTP_DEBUG))?,
            timeout,
        })
    }

    pub fn client_builder(&self) -> ClientBuilder {
        let builder = ClientBuilder::new(&self.server)
            .verify_ssl(!self.insecure_skip_verify)
            .debug_logging(self.http_debug)
            .timeout(self.timeout);
        match &self.token {
            Some(token) => builder.auth_token(token.clone()),
            None => builder,
        }
    }
}

fn parse_bool(var: &'static str, value: Option<String>) -> Result<bool, SettingsError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(SettingsError::InvalidBool { var, value }),
    }
}
