pub mod influxdb;
pub mod line_protocol;
pub mod questdb_ilp;

pub use influxdb::InfluxDbSink;
pub use questdb_ilp::QuestDbIlpSink;

use octograph_domain::domain::{Point, SeriesKind};

use crate::{
    config::{AppConfig, SinkKind},
    pipeline::{PipelineError, PointSink},
};

/// Sink selected by `sink.kind`.
pub enum ConfiguredSink {
    InfluxDb(InfluxDbSink),
    QuestDbIlp(QuestDbIlpSink),
}

impl ConfiguredSink {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, PipelineError> {
        match cfg.sink.kind {
            SinkKind::Influxdb => Ok(Self::InfluxDb(InfluxDbSink::new(
                &cfg.influxdb,
                cfg.request_timeout(),
            )?)),
            SinkKind::QuestdbIlp => Ok(Self::QuestDbIlp(QuestDbIlpSink::new(cfg.questdb_addr()?))),
        }
    }
}

#[async_trait::async_trait]
impl PointSink for ConfiguredSink {
    async fn store(&self, series: SeriesKind, points: &[Point]) -> Result<(), PipelineError> {
        match self {
            Self::InfluxDb(s) => s.store(series, points).await,
            Self::QuestDbIlp(s) => s.store(series, points).await,
        }
    }
}
