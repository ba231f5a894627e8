// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod config;
mod error;
mod input;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use telemetry_dispatcher::Dispatcher;

use crate::config::RelayConfig;
use crate::error::RelayError;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
pub async fn main() {
    let config = RelayConfig::from_env();
    init_logging(&log_filter(&config));

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!("TELEMETRY | {}", e);
        std::process::exit(1);
    }
}

/// Filter directives for the subscriber. Falls back to `info` when the
/// configuration could not be loaded.
fn log_filter(config: &Result<RelayConfig, RelayError>) -> String {
    let log_level = match config {
        Ok(config) => config.log_level.as_str(),
        Err(_) => "info",
    };
    format!("h2=off,hyper=off,rustls=off,{}", log_level)
}

fn init_logging(env_filter: &str) {
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    debug!("Logging subsystem enabled");
}

async fn run(config: RelayConfig) -> Result<(), RelayError> {
    let dispatcher = Dispatcher::spawn(&config.dispatcher_config()?)?;
    info!("TELEMETRY | Relaying events to {}", config.endpoint.trim());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut forwarded = 0usize;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some((name, attributes)) = input::parse_line(&line) {
                        dispatcher.log_event(name, attributes);
                        forwarded += 1;
                    }
                }
                Ok(None) => {
                    debug!("TELEMETRY | End of input");
                    break;
                }
                Err(e) => {
                    error!("TELEMETRY | Failed to read input: {}", e);
                    break;
                }
            },
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, initiating shutdown"),
                    Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
                }
                break;
            }
        }
    }

    flush(&dispatcher, forwarded).await;
    if dispatcher.shutdown().is_err() {
        debug!("TELEMETRY | Dispatcher already stopped");
    }

    Ok(())
}

/// Gives the current drain a bounded amount of time to finish.
async fn flush(dispatcher: &Dispatcher, forwarded: usize) {
    match timeout(FLUSH_TIMEOUT, dispatcher.wait_idle()).await {
        Ok(Ok(stats)) if stats.pending == 0 => {
            info!(
                "TELEMETRY | Forwarded {} events, {} delivered",
                forwarded, stats.delivered
            );
        }
        Ok(Ok(stats)) => {
            warn!(
                "TELEMETRY | {} events still pending at shutdown, {} delivered",
                stats.pending, stats.delivered
            );
        }
        Ok(Err(e)) => error!("TELEMETRY | {}", e),
        Err(_) => warn!(
            "TELEMETRY | Collector did not drain within {}s, pending events are dropped",
            FLUSH_TIMEOUT.as_secs()
        ),
    }
}
