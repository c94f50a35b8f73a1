use std::time::Duration;

use octograph_domain::domain::Reading;
use reqwest::{Client, Url};

use crate::{
    pipeline::{ConsumptionApi, ConsumptionPage, PipelineError, UpstreamError},
    window::Window,
};

pub const DEFAULT_BASE_URL: &str = "https://api.octopus.energy/v1";

/// Ceiling on a single request so a hung socket cannot stall the run.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Longest slice of an error body kept in log messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Consumption endpoints of the Octopus Energy REST API.
///
/// Authenticates with HTTP Basic, the API key as username and an empty
/// password.
pub struct OctopusApi {
    client: Client,
    api_key: String,
    page_size: Option<u32>,
}

#[derive(serde::Deserialize)]
struct IncomingPage {
    #[serde(default)]
    results: Option<Vec<Reading>>,
    #[serde(default)]
    next: Option<String>,
}

impl OctopusApi {
    pub fn new(
        api_key: impl Into<String>,
        timeout: Duration,
        page_size: Option<u32>,
    ) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("octograph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            page_size,
        })
    }
}

/// Parses one response body.
///
/// A missing `results` key is an empty page; a missing, null or empty `next`
/// ends pagination.
pub fn parse_page(body: &[u8]) -> Result<ConsumptionPage, UpstreamError> {
    let incoming: IncomingPage = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::Payload(format!("invalid consumption page: {e}")))?;

    let next_page = match incoming.next.as_deref() {
        None | Some("") => None,
        Some(next) => Some(page_from_next_link(next)?),
    };

    Ok(ConsumptionPage {
        results: incoming.results.unwrap_or_default(),
        next_page,
    })
}

fn page_from_next_link(next: &str) -> Result<String, UpstreamError> {
    let url = Url::parse(next)
        .map_err(|e| UpstreamError::Payload(format!("invalid next link {next}: {e}")))?;

    url.query_pairs()
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| UpstreamError::Payload(format!("next link without page parameter: {next}")))
}

fn truncate(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[async_trait::async_trait]
impl ConsumptionApi for OctopusApi {
    async fn get_page(
        &self,
        endpoint: &str,
        window: &Window,
        page: Option<&str>,
    ) -> Result<ConsumptionPage, UpstreamError> {
        let mut query: Vec<(&str, String)> = vec![
            ("period_from", window.from_iso().to_string()),
            ("period_to", window.to_iso().to_string()),
        ];
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = self.page_size {
            query.push(("page_size", size.to_string()));
        }

        let response = self
            .client
            .get(endpoint)
            .query(&query)
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Transport(format!(
                "HTTP {status}: {}",
                truncate(body)
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(format!("failed to read body: {e}")))?;

        parse_page(&body)
    }
}
