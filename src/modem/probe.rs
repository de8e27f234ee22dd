//! Ordered endpoint probing.
//!
//! Modem firmware across models and revisions exposes inconsistent
//! control-plane APIs, so every hardware operation probes a fixed list of
//! candidate endpoints. The policy lives here once: try each in order,
//! stop at the first success, swallow individual failures.

use std::future::Future;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("empty response body")]
    EmptyBody,
    #[error("all {attempts} endpoints failed (last: {last})")]
    Exhausted { attempts: usize, last: String },
}

/// Run each attempt strictly in order and return the first success.
///
/// Attempts are lazy futures: nothing past the first success is ever
/// started, which matters because the probed endpoints have hardware side
/// effects. If every attempt fails, the result aggregates the attempt
/// count and the last failure.
pub async fn try_in_order<T, F>(attempts: impl IntoIterator<Item = F>) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    let mut count = 0usize;
    let mut last: Option<ProbeError> = None;

    for attempt in attempts {
        count += 1;
        match attempt.await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!("probe attempt {} failed: {}", count, e);
                last = Some(e);
            }
        }
    }

    Err(ProbeError::Exhausted {
        attempts: count,
        last: last
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no endpoints".to_string()),
    })
}
