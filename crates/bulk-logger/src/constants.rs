// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Endpoint used when no URL is configured.
pub const DEFAULT_URL: &str = "http://127.0.0.1:9200";

/// Index (collection) receiving the documents when none is configured.
pub const DEFAULT_INDEX: &str = "app-logs";

/// Value of the `service` field injected into every document.
pub const DEFAULT_SERVICE: &str = "app";

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(60_000);

/// Buffered entry count that triggers an immediate flush.
pub const DEFAULT_MAX_BUFFER: usize = 2_000;

/// Buffered byte size that triggers an immediate flush.
pub const DEFAULT_MAX_BYTES: usize = 5 * 1_024 * 1_024;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before the first retry. Doubles for every further retry.
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound for a single backoff sleep.
pub const BACKOFF_MAX: Duration = Duration::from_millis(15_000);

/// Longest response body excerpt carried in a status error.
pub const MAX_ERROR_BODY_BYTES: usize = 512;

/// The requeue stops once the buffer holds this many times either threshold.
pub const REQUEUE_FACTOR: usize = 2;

/// Action line preceding every document in a bulk body.
pub const ACTION_LINE: &[u8] = b"{\"index\":{}}\n";

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

pub const BULK_PATH_SEGMENT: &str = "_bulk";
