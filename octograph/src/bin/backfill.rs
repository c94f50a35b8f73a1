use anyhow::{bail, Result};
use octograph::{
    app::{self, RunMode},
    config::AppConfig,
    observability,
};
use std::env;

/// Re-imports the full backfill window regardless of the recorded run state.
/// Safe to repeat: the sinks overwrite points with the same series key.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing();

    if env::args().len() > 1 {
        bail!("usage: octograph-backfill (configure with OCTOGRAPH_CONFIG)");
    }

    // Load configuration (can point OCTOGRAPH_CONFIG to a backfill-specific file).
    let cfg = AppConfig::load()?;

    let outcome = app::run(&cfg, RunMode::ForcedBackfill).await.map_err(|e| {
        tracing::error!(error = %e, "backfill failed");
        e
    })?;

    let total: usize = outcome.series.iter().map(|s| s.readings).sum();
    tracing::info!(readings = total, retries = outcome.retries_used, "backfill complete");

    Ok(())
}
