use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::category::UNCATEGORIZED;

pub const DEFAULT_CLASSIFIER_URL: &str = "http://127.0.0.1:5000/predict";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Something that turns window text into a raw category label.
pub trait PredictBackend {
    fn predict(&self, text: &str) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// `POST /predict {"text": ...}` -> `{"category": ...}`.
#[derive(Clone)]
pub struct HttpPredictor {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl PredictBackend for HttpPredictor {
    async fn predict(&self, text: &str) -> anyhow::Result<String> {
        let res = self
            .client
            .post(&self.url)
            .json(&PredictRequest { text })
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let detail = res
                .json::<PredictResponse>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_default();
            anyhow::bail!("http_{} {detail}", status.as_u16());
        }
        let body: PredictResponse = res.json().await?;
        Ok(body
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string()))
    }
}

/// Classifier front: never fails, never blocks sampling on a bad backend.
pub struct Classifier<B> {
    backend: B,
}

impl<B: PredictBackend> Classifier<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub async fn classify(&self, app_name: Option<&str>, window_title: Option<&str>) -> String {
        let (Some(app), Some(title)) = (non_empty(app_name), non_empty(window_title)) else {
            return UNCATEGORIZED.to_string();
        };
        let text = format!("{app} {title}");
        match self.backend.predict(&text).await {
            Ok(label) => label,
            Err(e) => {
                warn!("classification failed, using {UNCATEGORIZED}: {e}");
                UNCATEGORIZED.to_string()
            }
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}
