// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::RelayError;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use telemetry_dispatcher::{DispatcherConfig, HeaderProvider, SessionIdMode};

const DEFAULT_PACING_MS: u64 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the relay binary
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Collector URL events are posted to
    pub endpoint: String,
    /// Delay between two consecutive deliveries, in milliseconds
    pub pacing_ms: u64,
    /// Per-request timeout, in seconds
    pub timeout_secs: u64,
    /// Sent as `Authorization: Bearer <token>` when set
    pub bearer_token: Option<String>,
    pub queue_capacity: Option<usize>,
    /// `event` or `dispatcher`
    pub session_scope: String,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            pacing_ms: DEFAULT_PACING_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            bearer_token: None,
            queue_capacity: None,
            session_scope: "event".to_string(),
            https_proxy: None,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, RelayError> {
        let endpoint = env::var("TELEMETRY_ENDPOINT").unwrap_or_default();
        let pacing_ms = parse_var("TELEMETRY_PACING_MS", env::var("TELEMETRY_PACING_MS").ok())?
            .unwrap_or(DEFAULT_PACING_MS);
        let timeout_secs =
            parse_var("TELEMETRY_TIMEOUT_SECS", env::var("TELEMETRY_TIMEOUT_SECS").ok())?
                .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let bearer_token = env::var("TELEMETRY_BEARER_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        let queue_capacity = parse_var(
            "TELEMETRY_QUEUE_CAPACITY",
            env::var("TELEMETRY_QUEUE_CAPACITY").ok(),
        )?;
        let session_scope = env::var("TELEMETRY_SESSION_SCOPE")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "event".to_string());
        let https_proxy = env::var("TELEMETRY_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();
        let log_level = env::var("TELEMETRY_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            endpoint,
            pacing_ms,
            timeout_secs,
            bearer_token,
            queue_capacity,
            session_scope,
            https_proxy,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.endpoint.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "TELEMETRY_ENDPOINT must be set".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "TELEMETRY_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == Some(0) {
            return Err(RelayError::InvalidConfig(
                "TELEMETRY_QUEUE_CAPACITY must be greater than 0".to_string(),
            ));
        }

        if self.session_id_mode().is_none() {
            return Err(RelayError::InvalidConfig(format!(
                "Invalid session scope '{}'. Must be one of: event, dispatcher",
                self.session_scope
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(RelayError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    fn session_id_mode(&self) -> Option<SessionIdMode> {
        match self.session_scope.as_str() {
            "event" => Some(SessionIdMode::PerEvent),
            "dispatcher" => Some(SessionIdMode::PerDispatcher),
            _ => None,
        }
    }

    /// Builds the dispatcher configuration this relay runs with.
    pub fn dispatcher_config(&self) -> Result<DispatcherConfig, RelayError> {
        let header_provider = match &self.bearer_token {
            Some(token) => Some(Arc::new(HeaderProvider::bearer(token.trim())?)),
            None => None,
        };

        let config = DispatcherConfig {
            pacing_delay: Duration::from_millis(self.pacing_ms),
            request_timeout: Duration::from_secs(self.timeout_secs),
            https_proxy: self.https_proxy.clone(),
            header_provider,
            queue_capacity: self.queue_capacity,
            session_id_mode: self.session_id_mode().unwrap_or_default(),
            ..DispatcherConfig::new(self.endpoint.trim())
        };
        config.validate()?;

        Ok(config)
    }
}

/// Parses an optional numeric variable. Unset or blank means `None`; anything
/// else must parse.
fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, RelayError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            RelayError::InvalidConfig(format!(
                "{name} must be a non-negative integer, got '{raw}'"
            ))
        }),
    }
}
