// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Inspection of successful bulk responses for per-item failures.
//!
//! A bulk request can succeed as a whole while individual documents are
//! rejected. Those rejections are reported, never turned into a flush
//! error.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BTreeMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
pub struct BulkItem {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}

/// First rejected item of a bulk response, plus how many were rejected.
#[derive(Debug, PartialEq)]
pub struct ItemFailure {
    pub operation: String,
    pub status: u16,
    pub error: Value,
    pub failed_items: usize,
}

/// Returns the first item carrying an error, in response order and, within
/// an item, in operation-name order. `None` when the body does not parse
/// or reports no errors.
#[must_use]
pub fn first_failure(body: &[u8]) -> Option<ItemFailure> {
    let response: BulkResponse = serde_json::from_slice(body).ok()?;
    if !response.errors {
        return None;
    }

    let mut failures = response.items.into_iter().flat_map(|item| {
        item.into_iter()
            .filter_map(|(operation, result)| match result.error {
                Some(error) if !error.is_null() => Some((operation, result.status, error)),
                _ => None,
            })
    });
    let (operation, status, error) = failures.next()?;
    let failed_items = 1 + failures.count();

    Some(ItemFailure {
        operation,
        status,
        error,
        failed_items,
    })
}

/// Emits one diagnostic line if the bulk response reports rejected items.
pub fn inspect(body: &[u8]) {
    if let Some(failure) = first_failure(body) {
        warn!(
            "BULK | {} item(s) rejected, first: op={} status={} error={}",
            failure.failed_items, failure.operation, failure.status, failure.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_no_errors_flag() {
        let response = body(json!({
            "errors": false,
            "items": [{"index": {"status": 400, "error": {"type": "ignored"}}}]
        }));
        assert_eq!(first_failure(&response), None);
    }

    #[test]
    fn test_unparseable_body() {
        assert_eq!(first_failure(b"<html>bad gateway</html>"), None);
        assert_eq!(first_failure(b""), None);
        assert_eq!(first_failure(b"{\"errors\": \"yes\"}"), None);
    }

    #[test]
    fn test_first_failure_in_response_order() {
        let response = body(json!({
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"status": 201}},
                {"index": {"status": 400, "error": {"type": "mapper_parsing_exception"}}},
                {"index": {"status": 429, "error": {"type": "es_rejected_execution_exception"}}}
            ]
        }));
        let failure = first_failure(&response).unwrap();
        assert_eq!(failure.operation, "index");
        assert_eq!(failure.status, 400);
        assert_eq!(failure.error, json!({"type": "mapper_parsing_exception"}));
        assert_eq!(failure.failed_items, 2);
    }

    #[test]
    fn test_operations_within_item_are_sorted() {
        let response = body(json!({
            "errors": true,
            "items": [
                {
                    "update": {"status": 409, "error": "conflict"},
                    "create": {"status": 400, "error": "bad"}
                }
            ]
        }));
        let failure = first_failure(&response).unwrap();
        assert_eq!(failure.operation, "create");
        assert_eq!(failure.status, 400);
        assert_eq!(failure.failed_items, 2);
    }

    #[test]
    fn test_errors_flag_without_error_payload() {
        let response = body(json!({
            "errors": true,
            "items": [{"index": {"status": 201, "error": null}}]
        }));
        assert_eq!(first_failure(&response), None);
    }

    #[test]
    #[traced_test]
    fn test_inspect_emits_one_line() {
        let response = body(json!({
            "errors": true,
            "items": [
                {"index": {"status": 400, "error": {"reason": "failed to parse field"}}},
                {"index": {"status": 400, "error": {"reason": "failed to parse field"}}}
            ]
        }));
        inspect(&response);
        assert!(logs_contain("2 item(s) rejected"));
        assert!(logs_contain("op=index status=400"));
        assert!(logs_contain("failed to parse field"));
    }

    #[test]
    #[traced_test]
    fn test_inspect_is_silent_on_success() {
        inspect(&body(json!({"errors": false, "items": []})));
        assert!(!logs_contain("rejected"));
    }
}
