// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Retry with exponential backoff for transient I/O failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{FeedError, StoreError, ThumbnailError};

/// Classifies errors as transient (worth retrying) or permanent
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for reqwest::Error {
    fn is_retryable(&self) -> bool {
        if self.is_timeout() || self.is_connect() {
            return true;
        }

        // Server-side trouble and throttling usually clear up
        self.status()
            .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
    }
}

impl IsRetryable for FeedError {
    fn is_retryable(&self) -> bool {
        match self {
            FeedError::FetchFailed { source, .. } => source.is_retryable(),
            FeedError::UnrecognizedFormat { .. } | FeedError::InvalidUrl(_) => false,
        }
    }
}

impl IsRetryable for ThumbnailError {
    fn is_retryable(&self) -> bool {
        match self {
            ThumbnailError::FetchFailed { source, .. } => source.is_retryable(),
            ThumbnailError::DecodeFailed(_)
            | ThumbnailError::EncodeFailed(_)
            | ThumbnailError::WorkerFailed(_) => false,
        }
    }
}

impl IsRetryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            StoreError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            StoreError::Backend { transient, .. } => *transient,
            StoreError::Serialize(_)
            | StoreError::Deserialize { .. }
            | StoreError::InvalidKey(_)
            | StoreError::BatchTooLarge { .. } => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// The delay starts at `initial_delay`, grows by `backoff_multiplier` after
/// every failure and is capped at `max_delay`.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                let next = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = attempt + 1, "Retries exhausted");
                }
                return Err(e);
            }
        }
    }
}

/// Stretch `delay` by a random factor between 1 and 2
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}
