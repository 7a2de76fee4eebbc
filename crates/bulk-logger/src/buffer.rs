// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory accumulator of wire pairs waiting for the next bulk request.
//!
//! The buffer is plain bookkeeping: it does no I/O and no locking of its
//! own. The flusher wraps it in a short-lived mutex.

use std::mem;

/// Buffered entry count and byte size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub entries: usize,
    pub bytes: usize,
}

/// Contents taken out of the buffer by a flush.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub data: Vec<u8>,
    pub entries: usize,
}

impl Batch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Iterates the wire pairs in enqueue order.
    pub fn pairs(&self) -> WirePairs<'_> {
        WirePairs {
            remaining: &self.data,
        }
    }
}

/// Splits a bulk body into `action\ndocument\n` pairs.
pub struct WirePairs<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for WirePairs<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let mut newlines = self
            .remaining
            .iter()
            .enumerate()
            .filter(|(_, byte)| **byte == b'\n')
            .map(|(position, _)| position);
        let end = match (newlines.next(), newlines.next()) {
            (Some(_), Some(second)) => second + 1,
            // A truncated pair is returned whole rather than silently lost.
            _ => self.remaining.len(),
        };
        let (pair, rest) = self.remaining.split_at(end);
        self.remaining = rest;
        Some(pair)
    }
}

/// Byte accumulator of wire pairs.
///
/// `bytes` always equals `data.len()` and `entries` the number of pairs
/// held.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    data: Vec<u8>,
    entries: usize,
}

impl BatchBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one wire pair.
    pub fn push(&mut self, pair: &[u8]) {
        self.data.extend_from_slice(pair);
        self.entries += 1;
    }

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            entries: self.entries,
            bytes: self.data.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Returns true once either threshold is reached.
    #[must_use]
    pub fn reached(&self, max_entries: usize, max_bytes: usize) -> bool {
        self.entries >= max_entries || self.data.len() >= max_bytes
    }

    /// Swaps the contents out, leaving the buffer empty.
    pub fn take(&mut self) -> Batch {
        Batch {
            data: mem::take(&mut self.data),
            entries: mem::replace(&mut self.entries, 0),
        }
    }

    /// Re-appends the pairs of a failed batch in their original order,
    /// stopping as soon as the buffer holds `max_entries` entries or
    /// `max_bytes` bytes. Returns the number of pairs dropped.
    pub fn requeue(&mut self, batch: &Batch, max_entries: usize, max_bytes: usize) -> usize {
        let mut restored = 0;
        for pair in batch.pairs() {
            if self.reached(max_entries, max_bytes) {
                break;
            }
            self.push(pair);
            restored += 1;
        }
        batch.entries.saturating_sub(restored)
    }
}
