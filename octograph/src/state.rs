use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::pipeline::{PipelineError, RunOutcome};

/// Flags carried between runs.
///
/// The scheduler reads `catch_up_hourly` to decide whether the next run comes
/// an hour from now or at the normal cadence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub initial_backfill_complete: bool,
    #[serde(default)]
    pub catch_up_hourly: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_success: Option<OffsetDateTime>,
}

impl RunState {
    /// A missing file means no run has completed yet.
    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PipelineError::State(format!("corrupt run state {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(PipelineError::State(format!(
                "cannot read run state {}: {e}",
                path.display()
            ))),
        }
    }

    /// Replaces the file via a sibling temp file so a crash never leaves it
    /// half written.
    pub async fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| PipelineError::State(format!("cannot encode run state: {e}")))?;
        let tmp = path.with_extension("json.tmp");

        tokio::fs::write(&tmp, json).await.map_err(|e| {
            PipelineError::State(format!("cannot write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            PipelineError::State(format!("cannot replace {}: {e}", path.display()))
        })
    }

    pub fn needs_backfill(&self) -> bool {
        !self.initial_backfill_complete
    }

    pub fn record_success(&mut self, backfilled: bool, outcome: &RunOutcome, at: OffsetDateTime) {
        if backfilled {
            self.initial_backfill_complete = true;
        }
        self.catch_up_hourly = outcome.below_expectation();
        self.last_success = Some(at);
    }
}
