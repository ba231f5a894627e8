// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use crate::headers::HeaderProvider;
use crate::queue::OverflowPolicy;
use crate::serializer::WireFormat;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Scope of the identifier stamped under `sessionId`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionIdMode {
    /// A fresh identifier for every event.
    #[default]
    PerEvent,
    /// One identifier generated when the dispatcher is created and shared by
    /// all of its events.
    PerDispatcher,
}

/// Exponential delay before the sender retries on its own after a
/// connectivity failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    /// Delay after `failures` consecutive connectivity failures (1-based).
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(1u32 << exponent)
            .min(self.max)
    }
}

/// Configuration for a dispatcher instance
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Collector URL every event is posted to
    pub endpoint: String,
    /// Quiescent interval after each send
    pub pacing_delay: Duration,
    /// Timeout of a single delivery request
    pub request_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Extra headers for every request, e.g. authentication
    pub header_provider: Option<Arc<HeaderProvider>>,
    pub wire_format: WireFormat,
    /// `None` keeps the queue unbounded
    pub queue_capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub session_id_mode: SessionIdMode,
    /// `None` waits for the next logged event after a connectivity failure
    pub reconnect_backoff: Option<Backoff>,
}

impl DispatcherConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        DispatcherConfig {
            endpoint: endpoint.into(),
            pacing_delay: DEFAULT_PACING_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            https_proxy: None,
            header_provider: None,
            wire_format: WireFormat::default(),
            queue_capacity: None,
            overflow_policy: OverflowPolicy::default(),
            session_id_mode: SessionIdMode::default(),
            reconnect_backoff: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Invalid(
                "endpoint cannot be empty".to_string(),
            ));
        }

        let url = reqwest::Url::parse(endpoint).map_err(|e| {
            ConfigError::Invalid(format!("endpoint '{endpoint}' is not a valid URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "endpoint scheme must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "queue capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(backoff) = self.reconnect_backoff {
            if backoff.initial.is_zero() || backoff.max < backoff.initial {
                return Err(ConfigError::Invalid(format!(
                    "reconnect backoff must satisfy 0 < initial <= max, got {backoff:?}"
                )));
            }
        }

        Ok(())
    }
}
