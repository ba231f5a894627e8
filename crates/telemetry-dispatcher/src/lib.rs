// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Telemetry Dispatcher
//!
//! Client-side delivery of named telemetry events to a remote HTTP collector.
//!
//! Application code records events through a [`Dispatcher`] handle. Each call
//! stamps the event, appends it to an ordered in-memory queue and returns
//! immediately. A single background service task drains the queue one event
//! per request, pacing successive sends and putting an event back at the
//! front of the queue when the collector cannot be reached.
//!
//! ```text
//!   log_event ──> EventRecord ──> mpsc ──> SenderService
//!                                             │
//!                                  DispatchQueue (FIFO, requeue at front)
//!                                             │
//!                                  WireFormat::encode ──> Transport::send
//! ```
//!
//! ## Modules
//! - [`event`]: event records and their attribute sets
//! - [`serializer`]: the JSON wire payload
//! - [`queue`]: the ordered buffer of pending events
//! - [`transport`] / [`http`]: the delivery seam and its reqwest implementation
//! - [`headers`]: per-request header injection (authentication)
//! - [`sender`]: the single-flight drain loop
//! - [`dispatcher`]: the public facade
//!
//! ## Example
//!
//! ```rust,no_run
//! use telemetry_dispatcher::{Attributes, Dispatcher, DispatcherConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DispatcherConfig::new("https://collector.example.com/events");
//! let dispatcher = Dispatcher::spawn(&config)?;
//!
//! dispatcher.log_event("login", Attributes::new().with("level", "info"));
//! dispatcher.wait_idle().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod headers;
pub mod http;
pub mod queue;
pub mod sender;
pub mod serializer;
pub mod transport;

pub use config::{Backoff, DispatcherConfig, SessionIdMode};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, DispatchError};
pub use event::{Attributes, EventRecord};
pub use headers::HeaderProvider;
pub use http::HttpTransport;
pub use queue::{DispatchQueue, OverflowPolicy};
pub use sender::{DispatcherStats, SenderService, SenderState};
pub use serializer::{Payload, WireFormat};
pub use transport::{Transport, TransportError};
