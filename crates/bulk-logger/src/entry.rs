// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Formatting of one log entry into its bulk wire pair:
//!
//! ```text
//! {"index":{}}
//! {"@timestamp":"2024-05-01T10:00:00.123456789Z","level":"INFO","message":"...","service":"...", ...}
//! ```

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::constants::ACTION_LINE;

pub const TIMESTAMP_FIELD: &str = "@timestamp";
pub const LEVEL_FIELD: &str = "level";
pub const MESSAGE_FIELD: &str = "message";
pub const SERVICE_FIELD: &str = "service";

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("failed to serialize fields: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("fields must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Builds the wire pair (action line + document line) for one entry.
///
/// `fields` may be anything serializing to a JSON object; `()` or `None`
/// mean no extra fields. Empty keys and `null` values are dropped. The
/// injected fields always win over caller fields with the same name.
pub fn encode<F: Serialize>(
    service: &str,
    level: &str,
    message: &str,
    fields: F,
) -> Result<Vec<u8>, EntryError> {
    let mut document = match serde_json::to_value(fields)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(EntryError::NotAnObject(kind(&other))),
    };
    document.retain(|key, value| !key.is_empty() && !value.is_null());

    document.insert(
        TIMESTAMP_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
    );
    document.insert(
        LEVEL_FIELD.to_string(),
        Value::String(level.to_uppercase()),
    );
    document.insert(MESSAGE_FIELD.to_string(), Value::String(message.to_string()));
    document.insert(SERVICE_FIELD.to_string(), Value::String(service.to_string()));

    let mut pair = Vec::with_capacity(ACTION_LINE.len() + 128);
    pair.extend_from_slice(ACTION_LINE);
    serde_json::to_writer(&mut pair, &document)?;
    pair.push(b'\n');
    Ok(pair)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
