use std::net::SocketAddr;

use octograph_domain::domain::{Point, SeriesKind};
use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::pipeline::{PipelineError, PointSink};

use super::line_protocol::encode_batch;

/// Writes a batch over QuestDB's ILP TCP endpoint.
///
/// One connection per batch, closed once the whole payload is written. ILP
/// over TCP has no acknowledgement, so a failed connect, write or close is
/// the only rejection that can be observed.
pub struct QuestDbIlpSink {
    addr: SocketAddr,
}

impl QuestDbIlpSink {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    async fn write_batch(&self, payload: &[u8]) -> std::io::Result<()> {
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        stream.write_all(payload).await?;
        stream.flush().await?;
        stream.shutdown().await
    }
}

#[async_trait::async_trait]
impl PointSink for QuestDbIlpSink {
    async fn store(&self, series: SeriesKind, points: &[Point]) -> Result<(), PipelineError> {
        if points.is_empty() {
            return Ok(());
        }

        let payload = encode_batch(points).into_bytes();

        match self.write_batch(&payload).await {
            Ok(()) => {
                metrics::counter!("sink_points_written_total", "series" => series.as_str())
                    .increment(points.len() as u64);
                metrics::counter!("questdb_ilp_bytes_total").increment(payload.len() as u64);
                tracing::debug!(series = %series, points = points.len(), "wrote batch to QuestDB ILP");
                Ok(())
            }
            Err(e) => {
                tracing::error!(series = %series, error = %e, "QuestDB ILP write failed");
                metrics::counter!("sink_errors_total", "series" => series.as_str()).increment(1);
                Err(PipelineError::SinkWrite {
                    series,
                    message: format!("ilp write to {} failed: {e}", self.addr),
                })
            }
        }
    }
}
