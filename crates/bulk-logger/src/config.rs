// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logger configuration and its environment loader.
//!
//! Every variable is optional except `BULK_LOGS_API_KEY`: without it the
//! loader returns `Ok(None)` and the application is expected to fall back
//! to a plain diagnostic sink.
//!
//! | variable                       | default                 |
//! |--------------------------------|-------------------------|
//! | `BULK_LOGS_URL`                | `http://127.0.0.1:9200` |
//! | `BULK_LOGS_INDEX`              | `app-logs`              |
//! | `BULK_LOGS_API_KEY`            | (required)              |
//! | `BULK_LOGS_SERVICE`            | `app`                   |
//! | `BULK_LOGS_VERIFY_CERTS`       | `false`                 |
//! | `BULK_LOGS_CA_FILE`            | unset                   |
//! | `BULK_LOGS_FLUSH_INTERVAL_MS`  | `60000`                 |
//! | `BULK_LOGS_MAX_BUFFER`         | `2000`                  |
//! | `BULK_LOGS_MAX_BYTES`          | `5242880`               |
//! | `BULK_LOGS_MAX_RETRIES`        | `3`                     |
//! | `BULK_LOGS_REQUEST_TIMEOUT_MS` | `30000`                 |

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::constants;
use crate::errors::ConfigError;

pub const ENV_URL: &str = "BULK_LOGS_URL";
pub const ENV_INDEX: &str = "BULK_LOGS_INDEX";
pub const ENV_API_KEY: &str = "BULK_LOGS_API_KEY";
pub const ENV_SERVICE: &str = "BULK_LOGS_SERVICE";
pub const ENV_VERIFY_CERTS: &str = "BULK_LOGS_VERIFY_CERTS";
pub const ENV_CA_FILE: &str = "BULK_LOGS_CA_FILE";
pub const ENV_FLUSH_INTERVAL_MS: &str = "BULK_LOGS_FLUSH_INTERVAL_MS";
pub const ENV_MAX_BUFFER: &str = "BULK_LOGS_MAX_BUFFER";
pub const ENV_MAX_BYTES: &str = "BULK_LOGS_MAX_BYTES";
pub const ENV_MAX_RETRIES: &str = "BULK_LOGS_MAX_RETRIES";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "BULK_LOGS_REQUEST_TIMEOUT_MS";

#[derive(Clone, PartialEq)]
pub struct Config {
    /// Base URL of the cluster. Path is kept, query and fragment are ignored.
    pub url: String,
    pub index: String,
    /// Sent as `Authorization: ApiKey <api_key>`.
    pub api_key: String,
    /// Value of the `service` field of every document.
    pub service: String,
    /// Off by default. Leaving it off accepts any server certificate, which
    /// is only meant for clusters using self-signed certificates.
    pub verify_certs: bool,
    /// PEM bundle replacing the system trust store.
    pub ca_file: Option<PathBuf>,
    pub flush_interval: Duration,
    pub max_buffer: usize,
    pub max_bytes: usize,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url: constants::DEFAULT_URL.to_string(),
            index: constants::DEFAULT_INDEX.to_string(),
            api_key: String::new(),
            service: constants::DEFAULT_SERVICE.to_string(),
            verify_certs: false,
            ca_file: None,
            flush_interval: constants::DEFAULT_FLUSH_INTERVAL,
            max_buffer: constants::DEFAULT_MAX_BUFFER,
            max_bytes: constants::DEFAULT_MAX_BYTES,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("index", &self.index)
            .field("api_key", &"<redacted>")
            .field("service", &self.service)
            .field("verify_certs", &self.verify_certs)
            .field("ca_file", &self.ca_file)
            .field("flush_interval", &self.flush_interval)
            .field("max_buffer", &self.max_buffer)
            .field("max_bytes", &self.max_bytes)
            .field("max_retries", &self.max_retries)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Checks the invariants the pipeline relies on and returns the parsed
    /// endpoint URL.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.url.trim()).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: "missing host".to_string(),
            });
        }
        if self.index.trim().is_empty() {
            return Err(ConfigError::Empty("index"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Empty("api key"));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::NotPositive("flush interval"));
        }
        if self.max_buffer == 0 {
            return Err(ConfigError::NotPositive("max buffer"));
        }
        if self.max_bytes == 0 {
            return Err(ConfigError::NotPositive("max bytes"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::NotPositive("request timeout"));
        }
        Ok(url)
    }

    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Option<Config>, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration from an arbitrary key lookup, using the same
    /// variable names as [`Config::from_env`].
    ///
    /// Returns `Ok(None)` when no API key is provided. The returned config
    /// has already been validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Config>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let Some(api_key) = get(ENV_API_KEY) else {
            return Ok(None);
        };

        let defaults = Config::default();
        let config = Config {
            url: get(ENV_URL).unwrap_or(defaults.url),
            index: get(ENV_INDEX).unwrap_or(defaults.index),
            api_key,
            service: get(ENV_SERVICE).unwrap_or(defaults.service),
            verify_certs: match get(ENV_VERIFY_CERTS) {
                Some(value) => parse_bool(ENV_VERIFY_CERTS, &value)?,
                None => defaults.verify_certs,
            },
            ca_file: get(ENV_CA_FILE).map(PathBuf::from),
            flush_interval: match get(ENV_FLUSH_INTERVAL_MS) {
                Some(value) => Duration::from_millis(parse_integer(ENV_FLUSH_INTERVAL_MS, &value)?),
                None => defaults.flush_interval,
            },
            max_buffer: match get(ENV_MAX_BUFFER) {
                Some(value) => parse_integer(ENV_MAX_BUFFER, &value)?,
                None => defaults.max_buffer,
            },
            max_bytes: match get(ENV_MAX_BYTES) {
                Some(value) => parse_integer(ENV_MAX_BYTES, &value)?,
                None => defaults.max_bytes,
            },
            max_retries: match get(ENV_MAX_RETRIES) {
                Some(value) => parse_integer(ENV_MAX_RETRIES, &value)?,
                None => defaults.max_retries,
            },
            request_timeout: match get(ENV_REQUEST_TIMEOUT_MS) {
                Some(value) => {
                    Duration::from_millis(parse_integer(ENV_REQUEST_TIMEOUT_MS, &value)?)
                }
                None => defaults.request_timeout,
            },
        };

        config.validate()?;
        Ok(Some(config))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parses `value` read from variable `key`.
pub fn parse_integer<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidInteger {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn valid_config() -> Config {
        Config {
            api_key: "secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[(ENV_API_KEY, "secret")]))
            .unwrap()
            .unwrap();
        assert_eq!(config.url, "http://127.0.0.1:9200");
        assert_eq!(config.index, "app-logs");
        assert_eq!(config.service, "app");
        assert!(!config.verify_certs);
        assert_eq!(config.ca_file, None);
        assert_eq!(config.flush_interval, Duration::from_millis(60_000));
        assert_eq!(config.max_buffer, 2000);
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_api_key_disables_logger() {
        assert_eq!(Config::from_lookup(lookup_from(&[])).unwrap(), None);
        assert_eq!(
            Config::from_lookup(lookup_from(&[(ENV_API_KEY, "   ")])).unwrap(),
            None
        );
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_API_KEY, " secret "),
            (ENV_URL, "https://logs.example.com:9243/prefix/"),
            (ENV_INDEX, "pixels"),
            (ENV_SERVICE, "pixel-api"),
            (ENV_VERIFY_CERTS, "TRUE"),
            (ENV_CA_FILE, "/etc/ssl/cluster.pem"),
            (ENV_FLUSH_INTERVAL_MS, "250"),
            (ENV_MAX_BUFFER, "10"),
            (ENV_MAX_BYTES, "4096"),
            (ENV_MAX_RETRIES, "0"),
            (ENV_REQUEST_TIMEOUT_MS, "1500"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.url, "https://logs.example.com:9243/prefix/");
        assert_eq!(config.index, "pixels");
        assert_eq!(config.service, "pixel-api");
        assert!(config.verify_certs);
        assert_eq!(config.ca_file, Some(PathBuf::from("/etc/ssl/cluster.pem")));
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.max_buffer, 10);
        assert_eq!(config.max_bytes, 4096);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_INDEX, "  "),
            (ENV_MAX_BUFFER, ""),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.index, "app-logs");
        assert_eq!(config.max_buffer, 2000);
    }

    #[test]
    fn test_bool_spellings() {
        for value in ["1", "t", "true", "Yes", "ON"] {
            assert_eq!(parse_bool("k", value), Ok(true), "{value}");
        }
        for value in ["0", "f", "False", "no", "off"] {
            assert_eq!(parse_bool("k", value), Ok(false), "{value}");
        }
    }

    #[test]
    fn test_malformed_bool_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_VERIFY_CERTS, "maybe"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBool {
                key: ENV_VERIFY_CERTS.to_string(),
                value: "maybe".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_integers_are_rejected() {
        for (key, value) in [
            (ENV_FLUSH_INTERVAL_MS, "soon"),
            (ENV_MAX_BUFFER, "-1"),
            (ENV_MAX_BYTES, "5MiB"),
            (ENV_MAX_RETRIES, "-3"),
            (ENV_REQUEST_TIMEOUT_MS, "1.5"),
        ] {
            let err = Config::from_lookup(lookup_from(&[(ENV_API_KEY, "secret"), (key, value)]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidInteger { .. }),
                "{key}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_non_positive_thresholds_are_rejected() {
        for (key, name) in [
            (ENV_FLUSH_INTERVAL_MS, "flush interval"),
            (ENV_MAX_BUFFER, "max buffer"),
            (ENV_MAX_BYTES, "max bytes"),
        ] {
            let err = Config::from_lookup(lookup_from(&[(ENV_API_KEY, "secret"), (key, "0")]))
                .unwrap_err();
            assert_eq!(err, ConfigError::NotPositive(name));
        }
    }

    #[test]
    fn test_validate_accepts_defaults_with_key() {
        let url = valid_config().validate().unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = Config {
            url: "ftp://logs.example.com".to_string(),
            ..valid_config()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::UnsupportedScheme("ftp".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_unparseable_url() {
        let config = Config {
            url: "not a url".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidUrl { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let config = Config {
            index: " ".to_string(),
            ..valid_config()
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::Empty("index"));

        let config = Config::default();
        assert_eq!(config.validate().unwrap_err(), ConfigError::Empty("api key"));
    }

    #[test]
    fn test_zero_retries_is_valid() {
        let config = Config {
            max_retries: 0,
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var(ENV_API_KEY, "_not_a_real_key_");
        env::set_var(ENV_INDEX, "from-env");
        let config = Config::from_env().unwrap().unwrap();
        assert_eq!(config.api_key, "_not_a_real_key_");
        assert_eq!(config.index, "from-env");
        env::remove_var(ENV_API_KEY);
        env::remove_var(ENV_INDEX);
    }

    #[test]
    #[serial]
    fn test_from_env_without_api_key() {
        env::remove_var(ENV_API_KEY);
        assert_eq!(Config::from_env().unwrap(), None);
    }
}
