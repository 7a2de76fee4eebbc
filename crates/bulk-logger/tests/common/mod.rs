// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities and mocks for integration tests

#[allow(dead_code)]
pub mod mocks;

use bulk_logger::Config;
use std::time::Duration;

/// Config with an API key and a flush interval long enough to never tick
/// during a test.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        api_key: "test-api-key".to_string(),
        service: "pixel-api".to_string(),
        flush_interval: Duration::from_secs(3_600),
        ..Default::default()
    }
}

/// Splits a bulk body into its (action, document) line pairs.
#[allow(dead_code)]
pub fn wire_pairs(payload: &[u8]) -> Vec<(String, serde_json::Value)> {
    let text = std::str::from_utf8(payload).expect("payload is not UTF-8");
    assert!(text.ends_with('\n'), "payload must end with a newline");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len() % 2, 0, "payload must hold whole pairs");
    lines
        .chunks(2)
        .map(|pair| {
            let document = serde_json::from_str(pair[1]).expect("document is not JSON");
            (pair[0].to_string(), document)
        })
        .collect()
}
