// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Execution of a single bulk request.
//!
//! The [`Transport`] trait is the seam between the pipeline and the network:
//! [`HttpTransport`] is the production implementation, tests plug in stubs.
//! A transport performs exactly one attempt; retries live in
//! [`crate::retry`].

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Certificate, Client, Url};
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::{BULK_PATH_SEGMENT, NDJSON_CONTENT_TYPE};
use crate::errors::{BoxError, BuildError, ConfigError};

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one bulk body. `Err` means no response was received.
    async fn send(&self, payload: Bytes) -> Result<TransportResponse, BoxError>;
}

/// Bulk transport over `reqwest`.
///
/// The client, TLS settings and headers are fixed at construction and
/// shared by every request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, BuildError> {
        let base = config.validate()?;
        let endpoint = bulk_endpoint(&base, config.index.trim())?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(NDJSON_CONTENT_TYPE));
        let mut authorization = HeaderValue::from_str(&format!("ApiKey {}", config.api_key.trim()))
            .map_err(|_| BuildError::InvalidApiKeyHeader)?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let client = build_client(config, base.scheme() == "https")?;
        debug!("BULK | Transport ready for {endpoint}");

        Ok(HttpTransport {
            client,
            endpoint,
            headers,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: Bytes) -> Result<TransportResponse, BoxError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .body(payload)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransportResponse { status, body })
    }
}

/// `{scheme}://{host}{base path without trailing slash}/{index}/_bulk`,
/// with the index percent-encoded as a single path segment. Credentials,
/// query and fragment of the base URL are dropped.
pub fn bulk_endpoint(base: &Url, index: &str) -> Result<Url, ConfigError> {
    let mut endpoint = base.clone();
    let cannot_be_base = |endpoint: &Url| ConfigError::InvalidUrl {
        url: endpoint.to_string(),
        reason: "url cannot be a base".to_string(),
    };
    if endpoint.set_username("").is_err() || endpoint.set_password(None).is_err() {
        return Err(cannot_be_base(&endpoint));
    }
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    let trimmed = base.path().trim_end_matches('/').to_string();
    endpoint.set_path(&trimmed);

    let stripped = endpoint.clone();
    {
        let mut segments = endpoint
            .path_segments_mut()
            .map_err(|()| cannot_be_base(&stripped))?;
        segments.pop_if_empty();
        segments.push(index);
        segments.push(BULK_PATH_SEGMENT);
    }
    Ok(endpoint)
}

fn build_client(config: &Config, tls: bool) -> Result<Client, BuildError> {
    let mut builder = Client::builder().timeout(config.request_timeout);

    if tls {
        if !config.verify_certs {
            warn!("BULK | TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &config.ca_file {
            let certificates = load_ca_file(path)?;
            debug!(
                "BULK | Trusting {} certificate(s) from {}",
                certificates.len(),
                path.display()
            );
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
    }

    builder.build().map_err(BuildError::Client)
}

/// Reads a PEM bundle. A file without any certificate is an error.
pub fn load_ca_file(path: &Path) -> Result<Vec<Certificate>, BuildError> {
    let pem = fs::read(path).map_err(|source| BuildError::CaFileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let certificates =
        Certificate::from_pem_bundle(&pem).map_err(|e| BuildError::CaFileInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if certificates.is_empty() {
        return Err(BuildError::CaFileInvalid {
            path: path.to_path_buf(),
            reason: "no PEM certificate found".to_string(),
        });
    }
    Ok(certificates)
}
