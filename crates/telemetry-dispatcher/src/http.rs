// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! reqwest-backed [`Transport`].
//!
//! Each payload is sent as the body of an HTTP `POST`. Errors are classified
//! so the sender can tell an unreachable collector (retry later) from a
//! collector that answered and refused the event (do not retry).

use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use core::time::Duration;
use reqwest::header::HeaderMap;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client with the given request timeout and optional HTTPS proxy.
    ///
    /// An invalid proxy is logged and the client falls back to a direct
    /// connection.
    #[must_use]
    pub fn new(timeout: Duration, https_proxy: Option<&str>) -> Self {
        HttpTransport {
            client: get_client(timeout, https_proxy),
        }
    }

    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: Vec<u8>,
        headers: &HeaderMap,
    ) -> Result<(), TransportError> {
        let time = Instant::now();
        let resp = self
            .client
            .post(endpoint)
            .headers(headers.clone())
            .body(payload)
            .send()
            .await;
        let elapsed = time.elapsed();

        match resp {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    debug!(
                        "TELEMETRY | Collector accepted event with {} in {} ms",
                        status,
                        elapsed.as_millis()
                    );
                    return Ok(());
                }
                Err(TransportError::Server {
                    status: status.as_u16(),
                    body: resp.text().await.unwrap_or_default(),
                })
            }
            Err(e) => Err(classify(&e)),
        }
    }
}

fn classify(e: &reqwest::Error) -> TransportError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        TransportError::Connectivity(describe(e))
    } else {
        TransportError::Request(describe(e))
    }
}

/// reqwest's own message omits the underlying cause, which is what tells a
/// refused connection from a DNS failure.
fn describe(e: &reqwest::Error) -> String {
    match e.source() {
        Some(source) => format!("{e}: {source}"),
        None => e.to_string(),
    }
}

fn get_client(timeout: Duration, https_proxy: Option<&str>) -> reqwest::Client {
    match build_client(timeout, https_proxy) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "TELEMETRY | Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(timeout, None) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "TELEMETRY | Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(
    timeout: Duration,
    https_proxy: Option<&str>,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(270))
        .tcp_keepalive(Duration::from_secs(120));

    if let Some(proxy) = https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}
