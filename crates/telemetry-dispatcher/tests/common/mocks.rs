// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock transports for testing

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use telemetry_dispatcher::{Attributes, Transport, TransportError, WireFormat};
use tokio::sync::{Notify, Semaphore};

/// Transport that decodes and records every payload it is given.
///
/// Outcomes are taken from a script in order; once the script is exhausted
/// every send gets `fallback`. A gated transport holds each send until the
/// test releases a permit.
pub struct RecordingTransport {
    wire_format: WireFormat,
    script: Mutex<VecDeque<Result<(), TransportError>>>,
    fallback: fn() -> Result<(), TransportError>,
    attempts: Mutex<Vec<Attributes>>,
    delivered: Mutex<Vec<Attributes>>,
    gate: Option<Semaphore>,
    send_started: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn new(script: Vec<Result<(), TransportError>>) -> Self {
        RecordingTransport {
            wire_format: WireFormat::ParallelArrays,
            script: Mutex::new(script.into()),
            fallback: || Ok(()),
            attempts: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            gate: None,
            send_started: Notify::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn accepting() -> Self {
        Self::new(vec![])
    }

    #[allow(dead_code)]
    pub fn unreachable() -> Self {
        RecordingTransport {
            fallback: || Err(TransportError::Connectivity("connection refused".to_string())),
            ..Self::new(vec![])
        }
    }

    #[allow(dead_code)]
    pub fn gated(self) -> Self {
        RecordingTransport {
            gate: Some(Semaphore::new(0)),
            ..self
        }
    }

    #[allow(dead_code)]
    pub fn with_wire_format(self, wire_format: WireFormat) -> Self {
        RecordingTransport {
            wire_format,
            ..self
        }
    }

    /// Lets `count` held sends complete.
    #[allow(dead_code)]
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Waits until a send has started since the last call.
    #[allow(dead_code)]
    pub async fn wait_for_send(&self) {
        self.send_started.notified().await;
    }

    pub fn attempts(&self) -> Vec<Attributes> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<Attributes> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_names(&self) -> Vec<String> {
        self.delivered()
            .iter()
            .map(|attributes| attributes.get("eventName").unwrap_or_default().to_string())
            .collect()
    }

    #[allow(dead_code)]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        _endpoint: &str,
        payload: Vec<u8>,
        _headers: &HeaderMap,
    ) -> Result<(), TransportError> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let attributes = self
            .wire_format
            .decode(&payload)
            .expect("dispatcher sent an undecodable payload");
        self.attempts.lock().unwrap().push(attributes.clone());
        self.send_started.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(self.fallback);
        if outcome.is_ok() {
            self.delivered.lock().unwrap().push(attributes);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
