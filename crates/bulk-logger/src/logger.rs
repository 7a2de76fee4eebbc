// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of the pipeline: construction, the periodic flush task,
//! producer-facing `log`, explicit `flush` and the final `close`.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::buffer::BufferStats;
use crate::config::Config;
use crate::entry;
use crate::errors::{BuildError, ShipError};
use crate::flusher::Flusher;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Transport};

/// Handle to a running pipeline. Cheap to clone; all clones share one
/// buffer and one periodic flush task.
#[derive(Clone)]
pub struct BulkLogger {
    inner: Arc<Inner>,
}

struct Inner {
    flusher: Arc<Flusher>,
    runtime: Handle,
    service: String,
    shutdown: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Last handle gone without close: stop ticking, skip the drain.
        self.shutdown.cancel();
    }
}

impl BulkLogger {
    /// Builds the HTTP transport from `config` and starts the periodic
    /// flush task. No network call is made. Must be called from within a
    /// tokio runtime.
    pub fn new(config: Config) -> Result<Self, BuildError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Same as [`BulkLogger::new`] over any [`Transport`].
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, BuildError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let flusher = Arc::new(Flusher::new(
            transport,
            RetryPolicy::new(config.max_retries),
            config.max_buffer,
            config.max_bytes,
        ));
        let shutdown = CancellationToken::new();
        let ticker = runtime.spawn(
            run_periodic_flush(
                Arc::clone(&flusher),
                config.flush_interval,
                shutdown.clone(),
            )
            .in_current_span(),
        );
        debug!(
            "BULK | Started, flushing every {} ms or at {} entries / {} bytes",
            config.flush_interval.as_millis(),
            config.max_buffer,
            config.max_bytes
        );

        Ok(BulkLogger {
            inner: Arc::new(Inner {
                flusher,
                runtime,
                service: config.service,
                shutdown,
                ticker: Mutex::new(Some(ticker)),
            }),
        })
    }

    /// Buffers one entry. Never waits on the network: crossing a threshold
    /// schedules a detached flush. An entry whose fields cannot be encoded
    /// is dropped with a warning.
    pub fn log<F: Serialize>(&self, level: &str, message: &str, fields: F) {
        let pair = match entry::encode(&self.inner.service, level, message, fields) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("BULK | Dropping {level} entry: {e}");
                return;
            }
        };

        if self.inner.flusher.enqueue(&pair) {
            let flusher = Arc::clone(&self.inner.flusher);
            self.inner.runtime.spawn(
                async move {
                    if let Err(e) = flusher.flush(&CancellationToken::new()).await {
                        warn!("BULK | Threshold flush failed: {e}");
                    }
                }
                .in_current_span(),
            );
        }
    }

    /// Delivers everything currently buffered.
    pub async fn flush(&self, cancel: &CancellationToken) -> Result<(), ShipError> {
        self.inner.flusher.flush(cancel).await
    }

    /// Stops the periodic task, waits for it to exit and performs one last
    /// flush. Later calls return `Ok(())` without flushing.
    pub async fn close(&self, cancel: &CancellationToken) -> Result<(), ShipError> {
        let Some(ticker) = self.inner.take_ticker() else {
            debug!("BULK | Already closed");
            return Ok(());
        };

        self.inner.shutdown.cancel();
        if let Err(e) = ticker.await {
            warn!("BULK | Periodic flush task ended abnormally: {e}");
        }

        debug!("BULK | Final flush");
        self.inner.flusher.flush(cancel).await
    }

    #[must_use]
    pub fn buffered(&self) -> BufferStats {
        self.inner.flusher.stats()
    }
}

impl Inner {
    #[allow(clippy::expect_used)]
    fn take_ticker(&self) -> Option<JoinHandle<()>> {
        self.ticker.lock().expect("lock poisoned").take()
    }
}

impl fmt::Debug for BulkLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkLogger")
            .field("service", &self.inner.service)
            .field("buffered", &self.buffered())
            .field("closed", &self.inner.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Flushes on every tick until `shutdown` fires. A tick flush in progress
/// is cancelled too, its batch lands back in the buffer for the final drain.
async fn run_periodic_flush(
    flusher: Arc<Flusher>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // discard first tick, which is instantaneous

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = flusher.flush(&shutdown.child_token()).await {
                    warn!("BULK | Periodic flush failed: {e}");
                }
            }
        }
    }
    debug!("BULK | Periodic flush stopped");
}
