// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffered log shipping to NDJSON bulk-indexing endpoints.
//!
//! Producers call [`BulkLogger::log`] (or write lines through the
//! [`std::io::Write`] adapter). Entries accumulate in memory and are
//! delivered as one bulk request when a size/count threshold is crossed,
//! when the periodic flush fires, or when [`BulkLogger::flush`] /
//! [`BulkLogger::close`] is called.
//!
//! ```text
//!   log() ──> BatchBuffer ──(threshold | tick | flush)──> Flusher
//!                 ^                                          │
//!                 └──────── bounded requeue on failure ──────┤
//!                                                            v
//!                                         send_with_retry ──> Transport
//!                                                            │
//!                                                            v
//!                                                 response::inspect
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod config;
pub mod constants;
pub mod entry;
pub mod errors;
pub mod flusher;
pub mod logger;
pub mod response;
pub mod retry;
pub mod transport;
pub mod writer;

pub use buffer::BufferStats;
pub use config::Config;
pub use errors::{BuildError, ConfigError, ShipError};
pub use logger::BulkLogger;
pub use transport::{HttpTransport, Transport, TransportResponse};
