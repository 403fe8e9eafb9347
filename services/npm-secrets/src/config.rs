//! Process configuration for the npm-secrets binary.
//!
//! Loaded from environment variables (and a `.env` file, if present) at
//! startup. Engine state such as the registry connection lives in storage,
//! not here.

use crate::error::BackendError;
use rust_common::{HttpConfig, TracingConfig};
use std::env;
use std::time::Duration;

/// npm-secrets process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whole-request deadline for registry calls
    pub request_timeout: Duration,
    /// Connect deadline for registry calls
    pub connect_timeout: Duration,
    /// User agent sent to the registry
    pub user_agent: Option<String>,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
    /// Log output settings
    pub tracing: TracingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, BackendError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BackendError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let request_timeout =
            Duration::from_secs(parse_env(&lookup, "NPM_SECRETS_REQUEST_TIMEOUT", 30)?);
        let connect_timeout =
            Duration::from_secs(parse_env(&lookup, "NPM_SECRETS_CONNECT_TIMEOUT", 10)?);
        if request_timeout.is_zero() || connect_timeout.is_zero() {
            return Err(BackendError::config("timeouts must be greater than zero"));
        }

        let user_agent = lookup("NPM_SECRETS_USER_AGENT").filter(|ua| !ua.is_empty());
        let accept_invalid_certs = parse_env(&lookup, "NPM_SECRETS_ACCEPT_INVALID_CERTS", false)?;

        let tracing = TracingConfig::default()
            .with_log_level(lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()))
            .with_json_output(parse_env(&lookup, "LOG_JSON", false)?);

        Ok(Self {
            request_timeout,
            connect_timeout,
            user_agent,
            accept_invalid_certs,
            tracing,
        })
    }

    /// HTTP settings for registry clients.
    #[must_use]
    pub fn http_config(&self) -> HttpConfig {
        let config = HttpConfig::default()
            .with_timeout(self.request_timeout)
            .with_connect_timeout(self.connect_timeout)
            .with_accept_invalid_certs(self.accept_invalid_certs);
        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.clone()),
            None => config,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: None,
            accept_invalid_certs: false,
            tracing: TracingConfig::default(),
        }
    }
}

/// Parse a variable with a default value.
fn parse_env<T, F>(lookup: &F, name: &str, default: T) -> Result<T, BackendError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val
            .parse()
            .map_err(|e| BackendError::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}
