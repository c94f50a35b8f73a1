use chrono::{DateTime, Utc};
use time::OffsetDateTime;

use crate::{
    config::AppConfig,
    metrics_export::TextfileExporter,
    pipeline::{ConsumptionApi, Pipeline, PipelineError, PointSink, RunOutcome, READINGS_PER_DAY},
    sinks::ConfiguredSink,
    sources::{OctopusApi, PaginatedFetcher, RetryState},
    state::RunState,
    window::{Lookback, Window, BACKFILL_WEEKS},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Backfill on the first run, recent lookback afterwards.
    Scheduled,
    /// Backfill regardless of the recorded run state.
    ForcedBackfill,
}

/// One complete run against the configured API and sink.
pub async fn run(cfg: &AppConfig, mode: RunMode) -> Result<RunOutcome, PipelineError> {
    cfg.validate()?;

    let exporter = cfg
        .metrics
        .as_ref()
        .map(|m| TextfileExporter::install(m.textfile_path.clone()))
        .transpose()?;

    let api = OctopusApi::new(
        cfg.octopus.api_key.clone(),
        cfg.request_timeout(),
        cfg.octopus.page_size,
    )?;
    let pipeline = Pipeline {
        fetcher: PaginatedFetcher::new(api, cfg.retry_backoff()),
        sink: ConfiguredSink::from_config(cfg)?,
    };

    let result = run_pipeline(cfg, &pipeline, mode, Utc::now()).await;

    if let Some(exporter) = &exporter {
        if let Err(e) = exporter.write().await {
            if result.is_ok() {
                return Err(e);
            }
            // the run's own error is the one reported
            tracing::error!(error = %e, path = %exporter.path().display(), "failed to export metrics");
        }
    }

    result
}

/// Selects the window from the run state, runs every series and records the
/// outcome. The state file is only rewritten after a fully successful run.
pub async fn run_pipeline<A, K>(
    cfg: &AppConfig,
    pipeline: &Pipeline<A, K>,
    mode: RunMode,
    now: DateTime<Utc>,
) -> Result<RunOutcome, PipelineError>
where
    A: ConsumptionApi,
    K: PointSink,
{
    let jobs = cfg.series_jobs()?;
    let tz = cfg.timezone()?;
    let state_path = &cfg.general.state_file;
    let mut state = RunState::load(state_path).await?;

    let backfill = mode == RunMode::ForcedBackfill || state.needs_backfill();
    let lookback = if backfill {
        tracing::info!(weeks = BACKFILL_WEEKS, "backfilling consumption history");
        Lookback::Backfill
    } else {
        Lookback::Hours(cfg.general.lookback_hours)
    };
    let window = Window::select(now, tz, lookback)?;

    let mut retry = RetryState::new(cfg.octopus.max_error_count);
    let outcome = pipeline.run(&jobs, &window, &mut retry).await?;

    let finished_at = OffsetDateTime::from_unix_timestamp(now.timestamp())
        .map_err(|e| PipelineError::State(format!("unrepresentable run time {now}: {e}")))?;
    state.record_success(backfill, &outcome, finished_at);
    state.save(state_path).await?;

    if state.catch_up_hourly {
        tracing::warn!(
            expected = READINGS_PER_DAY,
            "fewer readings than a full day, scheduling hourly catch-up"
        );
    }
    tracing::info!(retries = outcome.retries_used, "run complete");

    Ok(outcome)
}
