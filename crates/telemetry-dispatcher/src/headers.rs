// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::fmt::Debug;
use std::sync::Arc;
use std::{future::Future, pin::Pin};
use tokio::sync::OnceCell;

pub type HeaderResolverFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = HeaderMap> + Send>> + Send + Sync>;

/// Supplies the extra headers (typically authentication) attached to every
/// delivery request.
#[derive(Clone)]
pub enum HeaderProvider {
    Static(HeaderMap),
    Dynamic {
        resolver_fn: HeaderResolverFn,
        headers: Arc<OnceCell<HeaderMap>>,
    },
}

impl HeaderProvider {
    /// The resolver runs on the first delivery and its result is reused afterwards.
    pub fn new_from_resolver(resolver_fn: HeaderResolverFn) -> Self {
        Self::Dynamic {
            resolver_fn,
            headers: Arc::new(OnceCell::new()),
        }
    }

    pub fn new_from_static_headers(headers: HeaderMap) -> Self {
        Self::Static(headers)
    }

    /// `Authorization: Bearer <token>`
    pub fn bearer(token: &str) -> Result<Self, ConfigError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ConfigError::InvalidHeader(AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(Self::Static(headers))
    }

    pub async fn get_headers(&self) -> &HeaderMap {
        match self {
            Self::Static(headers) => headers,
            Self::Dynamic {
                resolver_fn,
                headers,
            } => {
                headers
                    .get_or_init(|| async { (resolver_fn)().await })
                    .await
            }
        }
    }
}

impl Debug for HeaderProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HeaderProvider")
    }
}
