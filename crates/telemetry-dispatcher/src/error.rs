// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while building a dispatcher from its configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid value for header '{0}'")]
    InvalidHeader(String),
}

/// Errors surfaced by the fallible variants of the dispatcher API
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Event name must not be empty")]
    EmptyEventName,

    #[error("Dispatcher is not running")]
    NotRunning,

    #[error("Dispatcher must be started from within a Tokio runtime: {0}")]
    NoRuntime(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
