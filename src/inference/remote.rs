//! Replicate predictions API.
//! [https://replicate.com/docs/reference/http#predictions.create]

use eyre::{Result, eyre};
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::time::{Duration, Instant};

use super::ModelBackend;

const API_BASE: &str = "https://api.replicate.com/v1";
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEADLINE: Duration = Duration::from_secs(300);

/// Which model a prediction runs: the latest deployment of `owner/name`, or a pinned version.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelRef {
    Latest { owner: String, name: String },
    Version { version: String },
}

impl ModelRef {
    /// Accepts `owner/name` or `owner/name:version`.
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (path, version) = match raw.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (raw, None),
        };
        let Some((owner, name)) = path.split_once('/') else {
            return Err(eyre!("replicate: model must look like owner/name[:version], got {raw:?}"));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(eyre!("replicate: model must look like owner/name[:version], got {raw:?}"));
        }
        match version {
            Some(v) if v.is_empty() => Err(eyre!("replicate: empty version in {raw:?}")),
            Some(v) => Ok(ModelRef::Version {
                version: v.to_string(),
            }),
            None => Ok(ModelRef::Latest {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn create_url(&self, base: &str) -> String {
        match self {
            ModelRef::Latest { owner, name } => format!("{base}/models/{owner}/{name}/predictions"),
            ModelRef::Version { .. } => format!("{base}/predictions"),
        }
    }

    fn create_body(&self, prompt: &str) -> Value {
        let input = json!({ "prompt": prompt });
        match self {
            ModelRef::Latest { .. } => json!({ "input": input }),
            ModelRef::Version { version } => json!({ "version": version, "input": input }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    status: PredictionStatus,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
    urls: Option<PredictionUrls>,
}

/// Language models stream their output as a list of string chunks.
fn join_output(output: &Value) -> String {
    match output {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => other.to_string(),
    }
}

pub struct RemoteBackend {
    client: reqwest::Client,
    model: ModelRef,
    label: String,
    base_url: String,
    deadline: Duration,
}

impl RemoteBackend {
    pub fn new(model: &str, api_token: &str) -> Result<Self> {
        Ok(Self {
            client: build_http_client(api_token)?,
            model: ModelRef::parse(model)?,
            label: model.trim().to_string(),
            base_url: API_BASE.to_string(),
            deadline: DEADLINE,
        })
    }

    /// Send predictions somewhere other than the public API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[cfg(test)]
    fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run one request, giving up once the overall deadline has passed.
    async fn within_deadline<T>(
        &self,
        started: Instant,
        request: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let remaining = self.deadline.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, request).await {
            Ok(result) => result,
            Err(_) => Err(eyre!("replicate: prediction timed out after {:?}", self.deadline)),
        }
    }

    async fn create(&self, prompt: &str) -> Result<Prediction> {
        let prediction = self
            .client
            .post(self.model.create_url(&self.base_url))
            // Ask the API to hold the request open until the prediction finishes.
            .header("Prefer", "wait")
            .json(&self.model.create_body(prompt))
            .send()
            .await?
            .error_for_status()?
            .json::<Prediction>()
            .await?;
        Ok(prediction)
    }

    async fn fetch(&self, url: &str) -> Result<Prediction> {
        let prediction = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Prediction>()
            .await?;
        Ok(prediction)
    }
}

/// Build an HTTP client that authenticates every request and names itself.
fn build_http_client(api_token: &str) -> Result<reqwest::Client> {
    use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("llama-chat/", env!("CARGO_PKG_VERSION"))),
    );
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_token.trim()))
        .map_err(|e| eyre!("replicate: bad api token: {e}"))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .use_rustls_tls()
        .build()?;
    Ok(client)
}

#[async_trait::async_trait]
impl ModelBackend for RemoteBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let started = Instant::now();
        let mut prediction = self.within_deadline(started, self.create(prompt)).await?;

        loop {
            tracing::trace!(status = ?prediction.status, "replicate: prediction status");
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(join_output(&prediction.output)),
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    let reason = match &prediction.error {
                        Value::Null => format!("{:?}", prediction.status).to_lowercase(),
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    return Err(eyre!("replicate: prediction did not succeed: {reason}"));
                }
                PredictionStatus::Starting
                | PredictionStatus::Processing
                | PredictionStatus::Unknown => {}
            }

            let Some(urls) = prediction.urls.as_ref() else {
                return Err(eyre!("replicate: unfinished prediction has no polling url"));
            };
            let url = urls.get.clone();
            let poll = async {
                tokio::time::sleep(POLL_INTERVAL).await;
                self.fetch(&url).await
            };
            prediction = self.within_deadline(started, poll).await?;
        }
    }
}
