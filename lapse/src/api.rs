//! HTTP client for the Word Lapse API
//!
//! Endpoints (all GET):
//! - `{api}`                                  server metadata
//! - `{api}/neighbors/cached?tok=&corpus=`    `{ is_cached }`
//! - `{api}/neighbors?tok=&corpus=`           full result payload
//! - `{api}/autocomplete?prefix=`             completion candidates

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::LapseConfig;
use crate::interface::{LapseError, Metadata, SearchQuery, WordLapseApi};
use crate::models::RawResult;

const USER_AGENT: &str = concat!("word-lapse/", env!("CARGO_PKG_VERSION"));
/// Longest body excerpt carried in an HTTP error message
const MAX_ERROR_EXCERPT: usize = 200;

#[derive(Debug, Deserialize)]
struct CachedResponse {
    #[serde(default)]
    is_cached: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Completion {
    Plain(String),
    Record {
        #[serde(alias = "value", alias = "word")]
        token: String,
    },
}

/// `WordLapseApi` over HTTP
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
    probe_timeout: Duration,
}

impl HttpApi {
    pub fn new(config: &LapseConfig) -> Result<Self, LapseError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base: config.api_url.clone(),
            probe_timeout: config.probe_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn neighbors_url(&self, query: &SearchQuery) -> Url {
        endpoint_url(&self.base, &["neighbors"], &query_params(query))
    }

    pub fn cached_url(&self, query: &SearchQuery) -> Url {
        endpoint_url(&self.base, &["neighbors", "cached"], &query_params(query))
    }

    pub fn autocomplete_url(&self, prefix: &str) -> Url {
        endpoint_url(&self.base, &["autocomplete"], &[("prefix", prefix)])
    }
}

fn query_params(query: &SearchQuery) -> Vec<(&str, &str)> {
    let mut params = vec![("tok", query.text())];
    if let Some(corpus) = query.corpus() {
        params.push(("corpus", corpus));
    }
    params
}

/// Append path segments and query pairs to the API base URL.
pub fn endpoint_url(base: &Url, segments: &[&str], params: &[(&str, &str)]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    url
}

/// Pull a validation message out of a FastAPI-style `detail` field.
/// Handles `detail: [{msg}]`, `detail: {msg}` and `detail: "..."`.
pub fn detail_message(body: &Value) -> Option<String> {
    let detail = body.get("detail")?;
    let message = match detail {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => detail.get("msg").and_then(Value::as_str)?.to_string(),
        Value::String(text) => text.clone(),
        _ => return None,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

/// Validate a `/neighbors` response. An API-reported validation error is a
/// failure even when it arrives with a 200.
pub fn parse_neighbors_body(status: u16, body: &[u8]) -> Result<RawResult, LapseError> {
    let value: Option<Value> = serde_json::from_slice(body).ok();

    if let Some(message) = value.as_ref().and_then(detail_message) {
        return Err(LapseError::Api(message));
    }

    if !(200..300).contains(&status) {
        let excerpt: String = String::from_utf8_lossy(body).chars().take(MAX_ERROR_EXCERPT).collect();
        return Err(LapseError::Http { status, message: excerpt });
    }

    let value = value.ok_or_else(|| LapseError::Decode("response is not JSON".to_string()))?;
    if !value.is_object() {
        return Err(LapseError::Decode(format!("expected an object, got {}", value)));
    }
    Ok(serde_json::from_value(value)?)
}

/// Read server metadata. Missing or mistyped fields fall back to defaults.
pub fn parse_metadata(body: &Value) -> Metadata {
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);
    let config = body.get("config");

    let corpora = config
        .and_then(|c| c.get("CORPORA_SET"))
        .and_then(Value::as_object)
        .map(|set| {
            set.iter()
                .map(|(id, label)| {
                    let label = label.as_str().map(str::to_string).unwrap_or_else(|| id.clone());
                    (id.clone(), label)
                })
                .collect()
        })
        .unwrap_or_default();

    Metadata {
        name: text(body.get("name")),
        commit_sha: text(body.get("commit_sha")),
        corpora,
        cached_entries: body
            .get("cache")
            .and_then(|c| c.get("cached_entries"))
            .and_then(Value::as_u64),
        worker_concurrency: config
            .and_then(|c| c.get("RQ_CONCURRENCY"))
            .and_then(Value::as_i64)
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok()),
    }
}

#[async_trait::async_trait]
impl WordLapseApi for HttpApi {
    async fn is_cached(&self, query: &SearchQuery) -> Result<bool, LapseError> {
        let url = self.cached_url(query);
        let response = self
            .client
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;
        let cached: CachedResponse = response.json().await?;
        Ok(cached.is_cached)
    }

    async fn neighbors(&self, query: &SearchQuery) -> Result<RawResult, LapseError> {
        let url = self.neighbors_url(query);
        let start = Instant::now();
        debug!("Fetching neighbors - tok={}, corpus={:?}", query.text(), query.corpus());

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        debug!(
            "Neighbors response - tok={}, status={}, bytes={}, duration={:.2}s",
            query.text(),
            status,
            body.len(),
            start.elapsed().as_secs_f32()
        );
        parse_neighbors_body(status, &body)
    }

    async fn autocomplete(&self, prefix: &str) -> Result<Vec<String>, LapseError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .get(self.autocomplete_url(prefix))
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;
        let completions: Vec<Completion> = response.json().await?;
        Ok(completions
            .into_iter()
            .map(|c| match c {
                Completion::Plain(token) => token,
                Completion::Record { token } => token,
            })
            .collect())
    }

    async fn metadata(&self) -> Result<Metadata, LapseError> {
        let response = self
            .client
            .get(self.base.clone())
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Ok(parse_metadata(&body))
    }
}
