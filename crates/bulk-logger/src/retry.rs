// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use bytes::Bytes;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::constants::{BACKOFF_BASE, BACKOFF_MAX, MAX_ERROR_BODY_BYTES};
use crate::errors::ShipError;
use crate::response;
use crate::transport::{Transport, TransportResponse};

/// Attempt budget and backoff schedule of one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            base: BACKOFF_BASE,
            max: BACKOFF_MAX,
        }
    }

    /// Sleep before `attempt` (0 is the first send, which never waits).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(crate::constants::DEFAULT_MAX_RETRIES)
    }
}

/// Delivers `payload` with up to `max_retries + 1` attempts.
///
/// Returns as soon as an attempt succeeds, a non-retryable status is seen,
/// or `cancel` fires. Otherwise the error of the last attempt is returned.
pub async fn send_with_retry(
    transport: &dyn Transport,
    payload: Bytes,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<(), ShipError> {
    let attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        let delay = policy.backoff(attempt);
        if !delay.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ShipError::Cancelled),
                () = sleep(delay) => {}
            }
        }

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ShipError::Cancelled),
            result = transport.send(payload.clone()) => result,
        };

        let err = match classify(result) {
            Ok(body) => {
                debug!(
                    "BULK | Delivered {} bytes in {} ms (attempt {})",
                    payload.len(),
                    start.elapsed().as_millis(),
                    attempt + 1
                );
                response::inspect(&body);
                return Ok(());
            }
            Err(err) => err,
        };

        attempt += 1;
        if !err.is_retryable() {
            error!("BULK | Delivery rejected, not retrying: {err}");
            return Err(err);
        }
        if attempt >= attempts {
            error!("BULK | Delivery failed after {attempts} attempt(s): {err}");
            return Err(err);
        }
        warn!("BULK | Attempt {attempt}/{attempts} failed: {err}");
    }
}

fn classify(
    result: Result<TransportResponse, crate::errors::BoxError>,
) -> Result<Bytes, ShipError> {
    let response = result.map_err(ShipError::Transport)?;
    if (200..300).contains(&response.status) {
        return Ok(response.body);
    }
    Err(ShipError::Status {
        status: response.status,
        body: truncate_body(&response.body),
    })
}

/// Lossy UTF-8 view of at most [`MAX_ERROR_BODY_BYTES`] bytes of `body`.
fn truncate_body(body: &[u8]) -> String {
    let excerpt = &body[..body.len().min(MAX_ERROR_BODY_BYTES)];
    let mut text = String::from_utf8_lossy(excerpt).into_owned();
    // A cut inside a multi-byte character shows up as a trailing U+FFFD.
    if excerpt.len() < body.len() && text.ends_with(char::REPLACEMENT_CHARACTER) {
        text.pop();
    }
    text
}
