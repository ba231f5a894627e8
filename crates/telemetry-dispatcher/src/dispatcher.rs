// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public entry point for recording events.
//!
//! A [`Dispatcher`] is a cheap, cloneable handle to one [`SenderService`].
//! The application creates it once during start-up and passes clones to the
//! code that records events.

use crate::config::{DispatcherConfig, SessionIdMode};
use crate::error::{ConfigError, DispatchError};
use crate::event::{Attributes, EventRecord};
use crate::http::HttpTransport;
use crate::sender::{DispatcherStats, SenderCommand, SenderService};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<SenderCommand>,
    session_id: Option<Arc<str>>,
}

impl Dispatcher {
    /// Creates a dispatcher and the service that delivers its events.
    ///
    /// The service does nothing until it is driven, typically with
    /// `tokio::spawn(service.run())`. Cancelling `cancel` stops it at the next
    /// suspension point.
    pub fn new(
        config: &DispatcherConfig,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Result<(SenderService, Self), ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let service = SenderService::new(config, transport, rx, cancel);

        let session_id = match config.session_id_mode {
            SessionIdMode::PerEvent => None,
            SessionIdMode::PerDispatcher => Some(Arc::from(Uuid::new_v4().to_string())),
        };

        Ok((service, Dispatcher { tx, session_id }))
    }

    /// Creates a dispatcher delivering over HTTP and spawns its service on the
    /// current Tokio runtime.
    pub fn spawn(config: &DispatcherConfig) -> Result<Self, DispatchError> {
        let transport = HttpTransport::new(config.request_timeout, config.https_proxy.as_deref());
        Self::spawn_with_transport(config, Arc::new(transport))
    }

    pub fn spawn_with_transport(
        config: &DispatcherConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DispatchError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DispatchError::NoRuntime(e.to_string()))?;

        let (service, dispatcher) = Self::new(config, transport, CancellationToken::new())?;
        runtime.spawn(service.run());
        debug!("TELEMETRY | Dispatcher started for {}", config.endpoint.trim());

        Ok(dispatcher)
    }

    /// Records an event for delivery.
    ///
    /// Never blocks and never fails; problems are logged. Use
    /// [`Dispatcher::try_log_event`] to observe them.
    pub fn log_event(&self, name: impl Into<String>, attributes: Attributes) {
        if let Err(e) = self.try_log_event(name, attributes) {
            warn!("TELEMETRY | Event discarded: {}", e);
        }
    }

    /// [`Dispatcher::log_event`] without attributes.
    pub fn log(&self, name: impl Into<String>) {
        self.log_event(name, Attributes::new());
    }

    pub fn try_log_event(
        &self,
        name: impl Into<String>,
        attributes: Attributes,
    ) -> Result<(), DispatchError> {
        let record = match &self.session_id {
            Some(session_id) => EventRecord::with_session_id(name, attributes, &**session_id)?,
            None => EventRecord::new(name, attributes)?,
        };

        self.tx
            .send(SenderCommand::Enqueue(record))
            .map_err(|_| DispatchError::NotRunning)
    }

    pub async fn stats(&self) -> Result<DispatcherStats, DispatchError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(SenderCommand::Stats(response_tx))
            .map_err(|_| DispatchError::NotRunning)?;

        response_rx.await.map_err(|_| DispatchError::NotRunning)
    }

    /// Resolves once no drain is in progress. Does not start one.
    pub async fn wait_idle(&self) -> Result<DispatcherStats, DispatchError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(SenderCommand::WaitIdle(response_tx))
            .map_err(|_| DispatchError::NotRunning)?;

        response_rx.await.map_err(|_| DispatchError::NotRunning)
    }

    /// Stops the service. Events still queued are dropped.
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        self.tx
            .send(SenderCommand::Shutdown)
            .map_err(|_| DispatchError::NotRunning)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
