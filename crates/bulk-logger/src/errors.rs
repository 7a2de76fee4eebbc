// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A configuration value was rejected while loading or validating [`crate::Config`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key}: {value:?} is not a valid boolean")]
    InvalidBool { key: String, value: String },
    #[error("{key}: {value:?} is not a valid non-negative integer")]
    InvalidInteger { key: String, value: String },
    #[error("invalid endpoint url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported url scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// The logger could not be constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to read CA file {path:?}: {source}")]
    CaFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CA file {path:?} does not contain a usable certificate: {reason}")]
    CaFileInvalid { path: PathBuf, reason: String },
    #[error("api key cannot be used as a header value")]
    InvalidApiKeyHeader,
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("a tokio runtime is required to start the periodic flush task")]
    NoRuntime,
}

/// A batch could not be delivered.
#[derive(Debug, Error)]
pub enum ShipError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// The endpoint answered with a non-2xx status.
    #[error("status={status} body={body}")]
    Status { status: u16, body: String },
    #[error("delivery cancelled")]
    Cancelled,
}

impl ShipError {
    /// Transport failures, 429 and 5xx are worth another attempt. Other
    /// 4xx responses will not change on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ShipError::Transport(_) => true,
            ShipError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            ShipError::Cancelled => false,
        }
    }
}
