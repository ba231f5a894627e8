// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The drain loop.
//!
//! [`SenderService`] is the only owner of the [`DispatchQueue`]. Producers
//! reach it through an unbounded channel, so there is exactly one drain loop
//! per dispatcher and enqueueing never waits on the network.
//!
//! ```text
//!             Enqueue (while Idle)
//!   Idle ───────────────────────────> Draining <─────────────┐
//!    ^                                   │ dequeue            │ success or
//!    │ queue empty                       v                    │ rejection,
//!    ├──────────────────────────── AwaitingTransport ─────────┘ then pacing
//!    │ connectivity failure (requeue at front)  │
//!    └──────────────────────────────────────────┘
//! ```
//!
//! While the loop is suspended on a send or on the pacing delay it keeps
//! serving commands: new events are appended to the queue, stats and idle
//! waiters are answered, and a shutdown request interrupts the wait.

use crate::config::{Backoff, DispatcherConfig};
use crate::event::EventRecord;
use crate::headers::HeaderProvider;
use crate::queue::{DispatchQueue, Enqueued};
use crate::serializer::WireFormat;
use crate::transport::Transport;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum SenderCommand {
    Enqueue(EventRecord),
    Stats(oneshot::Sender<DispatcherStats>),
    /// Answered as soon as no drain is in progress.
    WaitIdle(oneshot::Sender<DispatcherStats>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SenderState {
    #[default]
    Idle,
    Draining,
    AwaitingTransport,
}

/// Snapshot of the sender's queue and counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub pending: usize,
    pub state: SenderState,
    /// Events acknowledged by the collector
    pub delivered: u64,
    /// Events the collector answered with an error status, or that could not be sent
    pub rejected: u64,
    /// Connectivity failures, each putting an event back at the front
    pub requeued: u64,
    /// Events discarded by the overflow policy or the encoder
    pub dropped: u64,
    pub drains_started: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainOutcome {
    Emptied,
    Paused,
    Stopped,
}

enum Wake<T> {
    Ready(T),
    Command(Option<SenderCommand>),
    Retry,
    Cancelled,
}

pub struct SenderService {
    queue: DispatchQueue,
    transport: Arc<dyn Transport>,
    endpoint: String,
    header_provider: Option<Arc<HeaderProvider>>,
    wire_format: WireFormat,
    pacing_delay: Duration,
    reconnect_backoff: Option<Backoff>,
    rx: mpsc::UnboundedReceiver<SenderCommand>,
    cancel: CancellationToken,
    state: SenderState,
    stats: DispatcherStats,
    idle_waiters: Vec<oneshot::Sender<DispatcherStats>>,
    consecutive_failures: u32,
    retry_at: Option<Instant>,
    inbox_closed: bool,
    stopping: bool,
}

impl SenderService {
    pub(crate) fn new(
        config: &DispatcherConfig,
        transport: Arc<dyn Transport>,
        rx: mpsc::UnboundedReceiver<SenderCommand>,
        cancel: CancellationToken,
    ) -> Self {
        let queue = match config.queue_capacity {
            Some(capacity) => DispatchQueue::bounded(capacity, config.overflow_policy),
            None => DispatchQueue::unbounded(),
        };

        SenderService {
            queue,
            transport,
            endpoint: config.endpoint.trim().to_string(),
            header_provider: config.header_provider.clone(),
            wire_format: config.wire_format,
            pacing_delay: config.pacing_delay,
            reconnect_backoff: config.reconnect_backoff,
            rx,
            cancel,
            state: SenderState::Idle,
            stats: DispatcherStats::default(),
            idle_waiters: Vec::new(),
            consecutive_failures: 0,
            retry_at: None,
            inbox_closed: false,
            stopping: false,
        }
    }

    pub async fn run(mut self) {
        debug!("TELEMETRY | Sender service started");

        while !self.stopping {
            let retry_at = self.retry_at;
            let wake: Wake<()> = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Wake::Cancelled,
                command = self.rx.recv() => Wake::Command(command),
                () = sleep_until(retry_at) => Wake::Retry,
            };

            match wake {
                Wake::Command(Some(command)) => {
                    if self.apply(command) && !self.stopping {
                        self.drain().await;
                    }
                }
                Wake::Retry => {
                    debug!("TELEMETRY | Reconnect backoff elapsed, resuming delivery");
                    self.retry_at = None;
                    if !self.queue.is_empty() {
                        self.drain().await;
                    }
                }
                Wake::Command(None) | Wake::Cancelled | Wake::Ready(()) => break,
            }
        }

        if !self.queue.is_empty() {
            info!(
                "TELEMETRY | Sender service stopping with {} undelivered events",
                self.queue.len()
            );
        }
        debug!("TELEMETRY | Sender service stopped");
    }

    /// Applies a command without suspending. Returns true for an enqueue,
    /// which starts a drain when the sender is idle.
    fn apply(&mut self, command: SenderCommand) -> bool {
        match command {
            SenderCommand::Enqueue(record) => {
                self.enqueue(record);
                true
            }
            SenderCommand::Stats(response_tx) => {
                if response_tx.send(self.snapshot()).is_err() {
                    error!("TELEMETRY | Failed to send stats response - receiver dropped");
                }
                false
            }
            SenderCommand::WaitIdle(response_tx) => {
                if self.state == SenderState::Idle {
                    let _ = response_tx.send(self.snapshot());
                } else {
                    self.idle_waiters.push(response_tx);
                }
                false
            }
            SenderCommand::Shutdown => {
                debug!("TELEMETRY | Sender service shutting down");
                self.stopping = true;
                false
            }
        }
    }

    fn enqueue(&mut self, record: EventRecord) {
        match self.queue.enqueue(record) {
            Enqueued::Accepted => {}
            Enqueued::Evicted(evicted) => {
                self.stats.dropped += 1;
                warn!(
                    "TELEMETRY | Queue full, dropped oldest event '{}' captured at {}",
                    evicted.name(),
                    evicted.device_time_string()
                );
            }
            Enqueued::Rejected(rejected) => {
                self.stats.dropped += 1;
                warn!(
                    "TELEMETRY | Queue full, dropped new event '{}'",
                    rejected.name()
                );
            }
        }
    }

    async fn drain(&mut self) -> DrainOutcome {
        self.retry_at = None;
        self.state = SenderState::Draining;
        self.stats.drains_started += 1;
        debug!(
            "TELEMETRY | Draining {} pending events",
            self.queue.len()
        );

        let outcome = loop {
            let Some(record) = self.queue.dequeue_front() else {
                break DrainOutcome::Emptied;
            };

            let payload = match self.wire_format.encode(&record) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(
                        "TELEMETRY | Failed to serialize event '{}'. Event dropped: {}",
                        record.name(),
                        e
                    );
                    self.stats.dropped += 1;
                    continue;
                }
            };

            let headers = request_headers(self.header_provider.clone()).await;
            let transport = Arc::clone(&self.transport);
            let endpoint = self.endpoint.clone();
            self.state = SenderState::AwaitingTransport;
            let send = async move { transport.send(&endpoint, payload, &headers).await };
            let Some(result) = self.suspend(send).await else {
                break DrainOutcome::Stopped;
            };
            self.state = SenderState::Draining;

            match result {
                Ok(()) => {
                    self.stats.delivered += 1;
                    self.consecutive_failures = 0;
                    debug!("TELEMETRY | Delivered event '{}'", record.name());
                }
                Err(e) if e.is_connectivity() => {
                    self.stats.requeued += 1;
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                    error!(
                        "TELEMETRY | Failed to deliver event '{}', keeping it for the next attempt: {}",
                        record.name(),
                        e
                    );
                    self.queue.requeue_front(record);
                    self.arm_reconnect();
                    break DrainOutcome::Paused;
                }
                Err(e) => {
                    self.stats.rejected += 1;
                    warn!(
                        "TELEMETRY | Collector did not accept event '{}'. Event dropped: {}",
                        record.name(),
                        e
                    );
                }
            }

            let pacing = tokio::time::sleep(self.pacing_delay);
            if self.suspend(pacing).await.is_none() {
                break DrainOutcome::Stopped;
            }
        };

        self.state = SenderState::Idle;
        debug!(
            "TELEMETRY | Drain finished ({:?}), {} events pending",
            outcome,
            self.queue.len()
        );
        self.notify_idle();
        outcome
    }

    /// Awaits `future` while continuing to serve commands.
    ///
    /// Returns `None` if the service is asked to stop before `future` completes.
    async fn suspend<F: Future>(&mut self, future: F) -> Option<F::Output> {
        tokio::pin!(future);

        loop {
            if self.stopping {
                return None;
            }

            let inbox_open = !self.inbox_closed;
            let wake = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Wake::Cancelled,
                output = &mut future => Wake::Ready(output),
                command = self.rx.recv(), if inbox_open => Wake::Command(command),
            };

            match wake {
                Wake::Ready(output) => return Some(output),
                Wake::Command(Some(command)) => {
                    self.apply(command);
                }
                // every handle is gone; finish the current drain before stopping
                Wake::Command(None) => self.inbox_closed = true,
                Wake::Cancelled => {
                    self.stopping = true;
                    return None;
                }
                Wake::Retry => {}
            }
        }
    }

    fn arm_reconnect(&mut self) {
        if let Some(backoff) = self.reconnect_backoff {
            let delay = backoff.delay_for(self.consecutive_failures);
            self.retry_at = Instant::now().checked_add(delay);
            match self.retry_at {
                Some(_) => info!(
                    "TELEMETRY | Retrying delivery in {} ms unless another event arrives first",
                    delay.as_millis()
                ),
                None => warn!(
                    "TELEMETRY | Reconnect delay of {:?} is out of range, waiting for the next event instead",
                    delay
                ),
            }
        }
    }

    fn notify_idle(&mut self) {
        let snapshot = self.snapshot();
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(snapshot);
        }
    }

    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            pending: self.queue.len(),
            state: self.state,
            ..self.stats
        }
    }
}

async fn request_headers(provider: Option<Arc<HeaderProvider>>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(provider) = provider {
        headers.extend(provider.get_headers().await.clone());
    }
    headers
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
