use std::time::Duration;

use octograph_domain::domain::{Point, SeriesKind};
use reqwest::Client;

use crate::{
    config::InfluxDbConfig,
    pipeline::{PipelineError, PointSink},
};

use super::line_protocol::encode_batch;

/// Writes a batch to InfluxDB's `/write` endpoint in one request.
///
/// InfluxDB applies a line-protocol request atomically per shard and upserts
/// on series key plus timestamp, so replaying a window overwrites.
pub struct InfluxDbSink {
    client: Client,
    write_url: String,
    database: String,
    credentials: Option<(String, String)>,
}

impl InfluxDbSink {
    pub fn new(cfg: &InfluxDbConfig, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("failed to build InfluxDB client: {e}")))?;

        let credentials = (!cfg.user.is_empty()).then(|| (cfg.user.clone(), cfg.password.clone()));

        Ok(Self {
            client,
            write_url: format!("http://{}:{}/write", cfg.host, cfg.port),
            database: cfg.database.clone(),
            credentials,
        })
    }
}

#[async_trait::async_trait]
impl PointSink for InfluxDbSink {
    async fn store(&self, series: SeriesKind, points: &[Point]) -> Result<(), PipelineError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = encode_batch(points);
        let bytes = body.len();

        let mut request = self
            .client
            .post(&self.write_url)
            .query(&[("db", self.database.as_str()), ("precision", "ns")])
            .body(body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let fail = |message: String| {
            tracing::error!(series = %series, error = %message, "InfluxDB write failed");
            metrics::counter!("sink_errors_total", "series" => series.as_str()).increment(1);
            PipelineError::SinkWrite { series, message }
        };

        let response = request.send().await.map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {status}: {}", text.trim())));
        }

        metrics::counter!("sink_points_written_total", "series" => series.as_str())
            .increment(points.len() as u64);
        tracing::debug!(series = %series, points = points.len(), bytes, "wrote batch to InfluxDB");

        Ok(())
    }
}
