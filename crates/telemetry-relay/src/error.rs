// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use telemetry_dispatcher::{ConfigError, DispatchError};

/// Errors that stop the relay from starting
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Dispatcher(#[from] ConfigError),

    #[error("Failed to start dispatcher: {0}")]
    Start(#[from] DispatchError),
}
