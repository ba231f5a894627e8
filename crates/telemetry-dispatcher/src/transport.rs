// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::header::HeaderMap;

/// Outcome classes of a failed delivery.
///
/// Only [`TransportError::Connectivity`] puts the event back in the queue;
/// the other variants mean the request should not be repeated.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The collector could not be reached (connect, DNS, timeout, reset).
    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    /// The collector answered with a non-2xx status.
    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    /// The request could not be built or sent for a local reason.
    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TransportError::Connectivity(_))
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Delivers one encoded payload to the collector.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        payload: Vec<u8>,
        headers: &HeaderMap,
    ) -> Result<(), TransportError>;
}
