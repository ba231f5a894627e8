// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry event records.
//!
//! An [`EventRecord`] is stamped once, when the application logs it, and is
//! never modified afterwards. A record that is retried after a connectivity
//! failure therefore carries the identifier and device time of its first
//! attempt.

use crate::error::DispatchError;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use std::fmt::Display;
use uuid::Uuid;

/// Reserved attribute key carrying the event name on the wire.
pub const EVENT_NAME_KEY: &str = "eventName";
/// Reserved attribute key carrying the event identifier on the wire.
pub const SESSION_ID_KEY: &str = "sessionId";
/// Reserved attribute key carrying the capture time on the wire.
pub const DEVICE_TIME_KEY: &str = "deviceTime";

/// Key/value payload of an event.
///
/// Values are converted to their `Display` representation on insertion.
/// Entries keep the order in which keys were first inserted; inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Attributes::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Display) -> Option<String> {
        let key = key.into();
        let value = value.to_string();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Display,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        attributes.extend(iter);
        attributes
    }
}

impl<K, V> Extend<(K, V)> for Attributes
where
    K: Into<String>,
    V: Display,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// Immutable snapshot of one telemetry event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    name: String,
    attributes: Attributes,
    session_id: String,
    device_time: DateTime<Utc>,
}

impl EventRecord {
    /// Stamps a new record with a fresh identifier and the current UTC time.
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Result<Self, DispatchError> {
        Self::with_session_id(name, attributes, Uuid::new_v4().to_string())
    }

    /// Stamps a new record with the current UTC time, truncated to
    /// microseconds, and the given identifier.
    pub fn with_session_id(
        name: impl Into<String>,
        attributes: Attributes,
        session_id: impl Into<String>,
    ) -> Result<Self, DispatchError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DispatchError::EmptyEventName);
        }
        Ok(EventRecord {
            name,
            attributes,
            session_id: session_id.into(),
            // truncated to the precision of the wire format
            device_time: Utc::now().trunc_subsecs(6),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn device_time(&self) -> DateTime<Utc> {
        self.device_time
    }

    /// Wire representation of the device time (RFC 3339, microseconds, `Z`).
    #[must_use]
    pub fn device_time_string(&self) -> String {
        format_device_time(self.device_time)
    }

    /// The caller's attributes merged with the reserved keys.
    ///
    /// Reserved keys overwrite caller-supplied values of the same name.
    #[must_use]
    pub fn merged_attributes(&self) -> Attributes {
        let mut merged = self.attributes.clone();
        merged.insert(EVENT_NAME_KEY, &self.name);
        merged.insert(SESSION_ID_KEY, &self.session_id);
        merged.insert(DEVICE_TIME_KEY, self.device_time_string());
        merged
    }
}

#[must_use]
pub fn format_device_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}
