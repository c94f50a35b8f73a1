//! Fakes shared by the unit tests.

use std::{collections::VecDeque, net::SocketAddr, sync::Mutex};

use octograph_domain::domain::{Point, PointFields, PointTags, Reading, SeriesKind};
use time::{macros::datetime, Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::{
    pipeline::{ConsumptionApi, ConsumptionPage, PipelineError, PointSink, UpstreamError},
    window::Window,
};

/// Half-hour reading starting `slot` intervals after 2024-01-01T00:00Z.
pub(crate) fn reading(slot: i64, consumption: f64) -> Reading {
    let start = datetime!(2024-01-01 00:00:00 UTC) + Duration::minutes(30 * slot);
    Reading {
        interval_start: start,
        interval_end: start + Duration::minutes(30),
        consumption,
    }
}

/// Gas point at 2024-01-01T00:30Z with round-number fields.
pub(crate) fn sample_point() -> Point {
    Point {
        measurement: SeriesKind::Gas,
        timestamp: datetime!(2024-01-01 00:30:00 UTC),
        tags: PointTags {
            active_rate: "unit_rate_gas",
            time_of_day: "00:30".to_string(),
        },
        fields: PointFields {
            consumption: 1.25,
            cost: 0.125,
            total_cost: 0.625,
            standing_charge: 24.0,
            unit_charge: 0.1,
        },
    }
}

/// Replays a fixed sequence of page results and records every request.
pub(crate) struct ScriptedApi {
    script: Mutex<VecDeque<Result<ConsumptionPage, UpstreamError>>>,
    requests: Mutex<Vec<(String, Option<String>, String)>>,
}

impl ScriptedApi {
    pub(crate) fn new(script: Vec<Result<ConsumptionPage, UpstreamError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn cursors(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cursor, _)| cursor.clone())
            .collect()
    }

    /// Endpoints requested, consecutive duplicates collapsed.
    pub(crate) fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _, _)| endpoint.clone())
            .collect();
        endpoints.dedup();
        endpoints
    }

    /// `period_from` of every request.
    pub(crate) fn window_starts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, from)| from.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl ConsumptionApi for ScriptedApi {
    async fn get_page(
        &self,
        endpoint: &str,
        window: &Window,
        page: Option<&str>,
    ) -> Result<ConsumptionPage, UpstreamError> {
        self.requests.lock().unwrap().push((
            endpoint.to_string(),
            page.map(str::to_string),
            window.from_iso().to_string(),
        ));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(UpstreamError::Transport("script exhausted".to_string())))
    }
}

/// Keeps every stored batch, or rejects them all.
#[derive(Default)]
pub(crate) struct RecordingSink {
    batches: Mutex<Vec<(SeriesKind, Vec<Point>)>>,
    reject: bool,
}

impl RecordingSink {
    pub(crate) fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub(crate) fn batches(&self) -> Vec<(SeriesKind, Vec<Point>)> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PointSink for RecordingSink {
    async fn store(&self, series: SeriesKind, points: &[Point]) -> Result<(), PipelineError> {
        if self.reject {
            return Err(PipelineError::SinkWrite {
                series,
                message: "HTTP 500".to_string(),
            });
        }
        self.batches.lock().unwrap().push((series, points.to_vec()));
        Ok(())
    }
}

pub(crate) struct CannedResponse {
    pub status: u16,
    pub body: String,
}

impl CannedResponse {
    pub(crate) fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Minimal HTTP/1.1 server: answers one connection per canned response, in
/// order, and hands back the raw requests it received.
pub(crate) async fn serve_canned(
    responses: Vec<CannedResponse>,
) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);

            let reply = format!(
                "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                response.status,
                response.body.len(),
                response.body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
        requests
    });

    (addr, handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}
