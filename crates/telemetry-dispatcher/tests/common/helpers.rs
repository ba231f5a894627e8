// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for dispatcher integration tests

use std::sync::Arc;
use std::time::Duration;
use telemetry_dispatcher::{Dispatcher, DispatcherConfig, Transport};

pub const TEST_ENDPOINT: &str = "http://collector.test/events";

/// Default config with a short pacing delay so tests run quickly
pub fn test_config() -> DispatcherConfig {
    DispatcherConfig {
        pacing_delay: Duration::from_millis(1),
        ..DispatcherConfig::new(TEST_ENDPOINT)
    }
}

pub fn start_dispatcher(config: &DispatcherConfig, transport: Arc<dyn Transport>) -> Dispatcher {
    Dispatcher::spawn_with_transport(config, transport).expect("dispatcher should start")
}

pub fn names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("event-{i}")).collect()
}
