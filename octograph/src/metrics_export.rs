use std::path::{Path, PathBuf};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::pipeline::PipelineError;

/// Renders the run's metrics to a Prometheus text file for node-exporter's
/// textfile collector. A one-shot process has nothing to serve `/metrics`
/// from once it exits.
pub struct TextfileExporter {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl TextfileExporter {
    /// Installs the global recorder. Call once, before the run starts.
    pub fn install(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| PipelineError::Metrics(format!("failed to install Prometheus metrics recorder: {e}")))?;

        Ok(Self {
            handle,
            path: path.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self) -> Result<(), PipelineError> {
        write_rendered(&self.path, &self.handle.render()).await
    }
}

async fn write_rendered(path: &Path, rendered: &str) -> Result<(), PipelineError> {
    // The collector may read at any moment, so never expose a partial file.
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, rendered)
        .await
        .map_err(|e| PipelineError::Metrics(format!("cannot write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PipelineError::Metrics(format!("cannot replace {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rendered_metrics_replace_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("octograph.prom");
        tokio::fs::write(&path, "stale").await.unwrap();

        write_rendered(&path, "octopus_requests_total 3\n").await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "octopus_requests_total 3\n");
        assert!(!dir.path().join("octograph.prom.tmp").exists());
    }
}
