// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::process::ExitCode;

use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use bulk_logger::config::parse_integer;
use bulk_logger::{BulkLogger, Config};

const ENV_LOG_LEVEL: &str = "BULK_LOG_LEVEL";
const ENV_CLOSE_TIMEOUT_MS: &str = "BULK_CLOSE_TIMEOUT_MS";
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Where stdin lines end up.
enum Sink {
    Bulk(BulkLogger),
    /// No API key configured: plain diagnostic output.
    Stderr,
}

impl Sink {
    fn write_line(&self, line: &str) {
        match self {
            Sink::Bulk(logger) => logger.log_lines(line.as_bytes()),
            Sink::Stderr => eprintln!("{line}"),
        }
    }

    async fn close(self, timeout: Duration) -> ExitCode {
        let Sink::Bulk(logger) = self else {
            return ExitCode::SUCCESS;
        };

        let deadline = CancellationToken::new();
        let timer = {
            let deadline = deadline.clone();
            tokio::spawn(async move {
                sleep(timeout).await;
                deadline.cancel();
            })
        };
        let result = logger.close(&deadline).await;
        timer.abort();

        match result {
            Ok(()) => {
                debug!("Final flush complete");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(
                    "Final flush failed, {} buffered entries lost: {e}",
                    logger.buffered().entries
                );
                ExitCode::FAILURE
            }
        }
    }
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var(ENV_LOG_LEVEL)
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let close_timeout = match env::var(ENV_CLOSE_TIMEOUT_MS) {
        Ok(val) if !val.trim().is_empty() => {
            match parse_integer::<u64>(ENV_CLOSE_TIMEOUT_MS, val.trim()) {
                Ok(ms) => Duration::from_millis(ms),
                Err(e) => {
                    error!("Invalid configuration: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        _ => DEFAULT_CLOSE_TIMEOUT,
    };

    let sink = match Config::from_env() {
        Ok(Some(config)) => {
            let index = config.index.clone();
            match BulkLogger::new(config) {
                Ok(logger) => {
                    info!("Forwarding stdin to index {index}");
                    Sink::Bulk(logger)
                }
                Err(e) => {
                    error!("Unable to start bulk logger: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        Ok(None) => {
            info!("No API key configured, echoing stdin to stderr");
            Sink::Stderr
        }
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut lines = BufReader::new(stdin()).lines();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => sink.write_line(&line),
                Ok(None) => {
                    debug!("End of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {e}");
                    break;
                }
            },
            _ = &mut interrupted => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    sink.close(close_timeout).await
}
