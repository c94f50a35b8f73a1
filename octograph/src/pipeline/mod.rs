use octograph_domain::domain::{Point, Reading, SeriesKind, TariffRate};

use crate::{
    sources::paginated::{PaginatedFetcher, RetryState},
    transform,
    window::Window,
};

/// Half-hour intervals in one day; fewer readings than this means upstream
/// has not caught up yet.
pub const READINGS_PER_DAY: usize = 48;

/// Recoverable failure of a single page request. Never escapes the fetcher
/// except as the last error of `PipelineError::UpstreamExhausted`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Connection error, timeout or non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),
    /// The body was not a consumption page.
    #[error("payload error: {0}")]
    Payload(String),
}

impl UpstreamError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Payload(_) => "payload",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(
        "persistent error contacting the consumption API after {attempts} retries ({last}); review the log for earlier errors"
    )]
    UpstreamExhausted { attempts: u32, last: UpstreamError },
    #[error("sink rejected {series} batch: {message}")]
    SinkWrite { series: SeriesKind, message: String },
    #[error("run state error: {0}")]
    State(String),
    #[error("metrics export error: {0}")]
    Metrics(String),
}

/// One parsed page of the consumption API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsumptionPage {
    pub results: Vec<Reading>,
    /// `page` value of the next request, if there is one.
    pub next_page: Option<String>,
}

/// Seam over the metering API: one request for one page.
#[async_trait::async_trait]
pub trait ConsumptionApi: Send + Sync {
    async fn get_page(
        &self,
        endpoint: &str,
        window: &Window,
        page: Option<&str>,
    ) -> Result<ConsumptionPage, UpstreamError>;
}

/// Time-series store. A batch is either written in full or rejected.
#[async_trait::async_trait]
pub trait PointSink: Send + Sync {
    async fn store(&self, series: SeriesKind, points: &[Point]) -> Result<(), PipelineError>;
}

/// Everything needed to ingest one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesJob {
    pub kind: SeriesKind,
    pub endpoint: String,
    pub rate: TariffRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesOutcome {
    pub kind: SeriesKind,
    pub readings: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub series: Vec<SeriesOutcome>,
    pub retries_used: u32,
}

impl RunOutcome {
    /// True when any series returned less than a day's worth of readings.
    pub fn below_expectation(&self) -> bool {
        self.series.iter().any(|s| s.readings < READINGS_PER_DAY)
    }
}

pub struct Pipeline<A, K> {
    pub fetcher: PaginatedFetcher<A>,
    pub sink: K,
}

impl<A, K> Pipeline<A, K>
where
    A: ConsumptionApi,
    K: PointSink,
{
    /// Fetches, prices and stores each series in turn.
    ///
    /// A series is only handed to the sink once its fetch has completed, so a
    /// failure never leaves a partially written series behind. `retry` is
    /// shared by every series of the run.
    pub async fn run(
        &self,
        jobs: &[SeriesJob],
        window: &Window,
        retry: &mut RetryState,
    ) -> Result<RunOutcome, PipelineError> {
        let mut outcome = RunOutcome::default();

        for job in jobs {
            tracing::info!(
                series = %job.kind,
                from = %window.from_iso(),
                to = %window.to_iso(),
                "retrieving consumption"
            );

            let readings = self
                .fetcher
                .fetch(job.kind, &job.endpoint, window, retry)
                .await?;

            let corrected = readings
                .iter()
                .filter(|r| transform::is_meter_error(r.consumption))
                .count();
            if corrected > 0 {
                tracing::warn!(
                    series = %job.kind,
                    readings = corrected,
                    "meter reported overflow sentinel, storing zero consumption"
                );
            }

            let points = transform::transform(job.kind, &readings, &job.rate);
            self.sink.store(job.kind, &points).await?;

            tracing::info!(series = %job.kind, readings = readings.len(), "stored consumption points");
            outcome.series.push(SeriesOutcome {
                kind: job.kind,
                readings: readings.len(),
            });
        }

        outcome.retries_used = retry.attempts_used();
        Ok(outcome)
    }
}
