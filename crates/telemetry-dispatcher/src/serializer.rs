// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire payload for a single event.
//!
//! The default encoding is a JSON object holding two index-aligned arrays,
//! `keys` and `values`. [`WireFormat::Object`] emits the same content as a
//! plain JSON object instead.

use crate::event::{Attributes, EventRecord};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Parallel-array encoding of an event's merged attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl Payload {
    #[must_use]
    pub fn from_record(record: &EventRecord) -> Self {
        let merged = record.merged_attributes();
        let (keys, values) = merged
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .unzip();
        Payload { keys, values }
    }

    /// Pairs `keys[i]` with `values[i]`. Trailing entries of the longer array are ignored.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    #[must_use]
    pub fn to_attributes(&self) -> Attributes {
        self.pairs().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// `{"keys": [..], "values": [..]}`
    #[default]
    ParallelArrays,
    /// `{"key": "value", ..}`
    Object,
}

impl WireFormat {
    /// Encodes `record` as a JSON request body.
    pub fn encode(self, record: &EventRecord) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            WireFormat::ParallelArrays => serde_json::to_vec(&Payload::from_record(record)),
            WireFormat::Object => serde_json::to_vec(&ObjectPayload(&record.merged_attributes())),
        }
    }

    /// Decodes a request body produced by [`WireFormat::encode`].
    pub fn decode(self, body: &[u8]) -> Result<Attributes, serde_json::Error> {
        match self {
            WireFormat::ParallelArrays => {
                serde_json::from_slice::<Payload>(body).map(|payload| payload.to_attributes())
            }
            WireFormat::Object => {
                let object: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_slice(body)?;
                Ok(object
                    .into_iter()
                    .map(|(key, value)| match value {
                        serde_json::Value::String(s) => (key, s),
                        other => (key, other.to_string()),
                    })
                    .collect())
            }
        }
    }
}

struct ObjectPayload<'a>(&'a Attributes);

impl Serialize for ObjectPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
