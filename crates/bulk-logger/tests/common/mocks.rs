// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stub transports replaying scripted outcomes

use async_trait::async_trait;
use bulk_logger::errors::BoxError;
use bulk_logger::{Transport, TransportResponse};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum Outcome {
    /// The endpoint answers with this status and body.
    Status(u16, &'static str),
    /// No response at all, like a refused connection.
    Unreachable,
}

/// Transport stub that replays `script` in order, then answers every
/// further request with `fallback`. Each call is recorded.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    delay: Duration,
    payloads: Mutex<Vec<Bytes>>,
}

impl ScriptedTransport {
    pub fn new(fallback: Outcome) -> Self {
        ScriptedTransport {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Always answers 200 with a clean bulk response.
    pub fn accepting() -> Self {
        Self::new(Outcome::Status(200, r#"{"errors":false,"items":[]}"#))
    }

    /// Never gets a response through.
    pub fn unreachable() -> Self {
        Self::new(Outcome::Unreachable)
    }

    pub fn with_script(mut self, script: Vec<Outcome>) -> Self {
        self.script = Mutex::new(script.into());
        self
    }

    /// Every call waits this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<Bytes> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, payload: Bytes) -> Result<TransportResponse, BoxError> {
        self.payloads.lock().unwrap().push(payload);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match outcome {
            Outcome::Status(status, body) => Ok(TransportResponse {
                status,
                body: Bytes::from_static(body.as_bytes()),
            }),
            Outcome::Unreachable => Err("connection refused".into()),
        }
    }
}
