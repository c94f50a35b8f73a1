use anyhow::Result;
use octograph::{
    app::{self, RunMode},
    config::AppConfig,
    observability,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    match app::run(&cfg, RunMode::Scheduled).await {
        Ok(outcome) => {
            for s in &outcome.series {
                tracing::info!(series = %s.kind, readings = s.readings, "series ingested");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            Err(e.into())
        }
    }
}
