// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::buffer::{BatchBuffer, BufferStats};
use crate::constants::REQUEUE_FACTOR;
use crate::errors::ShipError;
use crate::retry::{send_with_retry, RetryPolicy};
use crate::transport::Transport;

/// Owns the pending entries and serializes their delivery.
///
/// Two locks are involved: `buffer` is held only to append, snapshot or
/// requeue, `flush_lock` is held for a whole flush including network I/O.
/// At most one bulk request is in flight per flusher.
pub struct Flusher {
    buffer: Mutex<BatchBuffer>,
    flush_lock: tokio::sync::Mutex<()>,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    max_buffer: usize,
    max_bytes: usize,
    flush_scheduled: AtomicBool,
}

impl Flusher {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        max_buffer: usize,
        max_bytes: usize,
    ) -> Self {
        Flusher {
            buffer: Mutex::new(BatchBuffer::new()),
            flush_lock: tokio::sync::Mutex::new(()),
            transport,
            policy,
            max_buffer,
            max_bytes,
            flush_scheduled: AtomicBool::new(false),
        }
    }

    #[allow(clippy::expect_used)]
    fn buffer(&self) -> MutexGuard<'_, BatchBuffer> {
        self.buffer.lock().expect("lock poisoned")
    }

    /// Appends one wire pair. Returns true when a threshold was crossed and
    /// no threshold flush is pending yet, in which case the caller should
    /// schedule one.
    pub fn enqueue(&self, pair: &[u8]) -> bool {
        let reached = {
            let mut buffer = self.buffer();
            buffer.push(pair);
            buffer.reached(self.max_buffer, self.max_bytes)
        };
        reached
            && self
                .flush_scheduled
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        self.buffer().stats()
    }

    /// Delivers everything buffered at the time the flush lock is acquired.
    ///
    /// On failure the batch goes back into the buffer, bounded by
    /// `REQUEUE_FACTOR` times either threshold, and the error is returned.
    pub async fn flush(&self, cancel: &CancellationToken) -> Result<(), ShipError> {
        let _guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ShipError::Cancelled),
            guard = self.flush_lock.lock() => guard,
        };

        let batch = self.buffer().take();
        // Entries arriving from now on may schedule a new threshold flush.
        self.flush_scheduled.store(false, Ordering::Release);

        if batch.is_empty() {
            return Ok(());
        }
        debug!(
            "BULK | Flushing {} entries ({} bytes)",
            batch.entries,
            batch.data.len()
        );

        // The payload is copied once so the original bytes remain available
        // for a requeue.
        let payload = Bytes::copy_from_slice(&batch.data);
        match send_with_retry(self.transport.as_ref(), payload, &self.policy, cancel).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let dropped = self.buffer().requeue(
                    &batch,
                    self.max_buffer.saturating_mul(REQUEUE_FACTOR),
                    self.max_bytes.saturating_mul(REQUEUE_FACTOR),
                );
                if dropped > 0 {
                    warn!(
                        "BULK | Buffer full after failed flush, dropped {dropped} of {} entries",
                        batch.entries
                    );
                } else {
                    debug!("BULK | Requeued {} entries after failed flush", batch.entries);
                }
                Err(err)
            }
        }
    }
}
