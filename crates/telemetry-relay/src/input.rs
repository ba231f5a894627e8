// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parsing of the line-oriented event input.
//!
//! Each line is `name key=value key=value ...`. Blank lines and lines
//! starting with `#` are skipped. A token without `=` becomes an attribute
//! with an empty value.

use telemetry_dispatcher::Attributes;

pub fn parse_line(line: &str) -> Option<(String, Attributes)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut tokens = line.split_whitespace();
    let name = tokens.next()?.to_string();
    let attributes = tokens
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (token.to_string(), String::new()),
        })
        .collect();

    Some((name, attributes))
}
