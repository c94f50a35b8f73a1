use std::time::Duration;

use octograph_domain::domain::{Reading, SeriesKind};

use crate::{
    pipeline::{ConsumptionApi, PipelineError},
    window::Window,
};

/// Failed requests tolerated per run, across all series.
pub const MAX_ERROR_COUNT: u32 = 10;

/// Wait between a failed request and its retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Retry budget of one run.
///
/// Created once per run and passed to every fetch, so series share the
/// budget while separate runs (and tests) never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts_used: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts_used: 0,
            max_attempts,
        }
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Claims one retry. Returns `false` once the budget is spent.
    pub fn try_consume(&mut self) -> bool {
        if self.attempts_used >= self.max_attempts {
            return false;
        }
        self.attempts_used += 1;
        true
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(MAX_ERROR_COUNT)
    }
}

/// Walks the cursor pagination of one consumption endpoint.
pub struct PaginatedFetcher<A> {
    api: A,
    backoff: Duration,
}

impl<A> PaginatedFetcher<A> {
    pub fn new(api: A, backoff: Duration) -> Self {
        Self { api, backoff }
    }

    #[cfg(test)]
    pub(crate) fn api(&self) -> &A {
        &self.api
    }
}

impl<A> PaginatedFetcher<A>
where
    A: ConsumptionApi,
{
    /// Returns every reading in `window`, pages concatenated in the order the
    /// API served them.
    ///
    /// A failed request is retried as-is (same cursor, same window) after the
    /// backoff, as long as `retry` has budget left. Once it does not, the
    /// readings gathered so far are dropped and `UpstreamExhausted` is
    /// returned.
    pub async fn fetch(
        &self,
        series: SeriesKind,
        endpoint: &str,
        window: &Window,
        retry: &mut RetryState,
    ) -> Result<Vec<Reading>, PipelineError> {
        let mut readings: Vec<Reading> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            metrics::counter!("octopus_requests_total").increment(1);

            match self.api.get_page(endpoint, window, cursor.as_deref()).await {
                Ok(page) => {
                    tracing::debug!(
                        series = %series,
                        page = cursor.as_deref().unwrap_or("1"),
                        readings = page.results.len(),
                        "fetched consumption page"
                    );
                    readings.extend(page.results);

                    match page.next_page {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                Err(e) => {
                    metrics::counter!("octopus_request_failures_total", "kind" => e.kind())
                        .increment(1);

                    if !retry.try_consume() {
                        tracing::error!(
                            series = %series,
                            error = %e,
                            attempts = retry.attempts_used(),
                            "consumption API retry budget exhausted"
                        );
                        return Err(PipelineError::UpstreamExhausted {
                            attempts: retry.attempts_used(),
                            last: e,
                        });
                    }

                    tracing::warn!(
                        series = %series,
                        error = %e,
                        attempt = retry.attempts_used(),
                        max = retry.max_attempts(),
                        backoff_secs = self.backoff.as_secs(),
                        "consumption API request failed, retrying the same page after backoff"
                    );
                    metrics::counter!("octopus_retry_total").increment(1);
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }

        metrics::counter!("octopus_readings_fetched_total", "series" => series.as_str())
            .increment(readings.len() as u64);

        Ok(readings)
    }
}
