// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Byte-sink adapter: every non-blank line written becomes an `info` entry
//! without extra fields.
//!
//! Each `write` call is handled on its own, a line is never carried over to
//! the next call. This fits sinks that emit whole records per write, such
//! as `tracing_subscriber::fmt`:
//!
//! ```no_run
//! # async fn setup(logger: bulk_logger::BulkLogger) {
//! use tracing_subscriber::filter::filter_fn;
//! use tracing_subscriber::prelude::*;
//!
//! let ship = tracing_subscriber::fmt::layer()
//!     .with_ansi(false)
//!     .with_writer(logger)
//!     .with_filter(filter_fn(|meta| !meta.target().starts_with("bulk_logger")));
//! tracing_subscriber::registry().with(ship).init();
//! # }
//! ```

use std::io;

use tracing_subscriber::fmt::MakeWriter;

use crate::logger::BulkLogger;

const LINE_LEVEL: &str = "info";

impl BulkLogger {
    /// Logs each non-blank line of `bytes`. Invalid UTF-8 is replaced.
    pub fn log_lines(&self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                self.log(LINE_LEVEL, line, ());
            }
        }
    }
}

impl io::Write for BulkLogger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log_lines(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Delivery is asynchronous; see `BulkLogger::flush`.
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BulkLogger {
    type Writer = BulkLogger;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
