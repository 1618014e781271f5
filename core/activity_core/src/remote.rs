//! Adapter for the hosted summary store (PostgREST-style REST API).
//!
//! Only the request/response contract lives here. Daily rollups are
//! maintained by the store's own triggers; weekly rollups are recomputed on
//! request through the `calculate_weekly_summary` RPC.
//!
//! "No rows" is never an error: single-row lookups return `Ok(None)` and list
//! lookups return an empty collection.

use chrono::{Datelike, Days, Local, NaiveDate};
use reqwest::{header, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::daily_log::retention_cutoff;
use crate::record::ActivityRecord;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const TOP_APPS_PER_CATEGORY: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote store misconfigured: {0}")]
    Config(String),

    #[error("remote store unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected remote payload: {0}")]
    Decode(String),
}

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub url: String,
    pub key: String,
    pub user_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RemoteDailySummary {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub study_minutes: f64,
    #[serde(default)]
    pub entertainment_minutes: f64,
    #[serde(default)]
    pub others_minutes: f64,
    #[serde(default)]
    pub total_minutes: f64,
    #[serde(default)]
    pub study_percentage: f64,
    #[serde(default)]
    pub entertainment_percentage: f64,
    #[serde(default)]
    pub others_percentage: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RemoteWeeklySummary {
    pub year: i32,
    pub week_number: u32,
    #[serde(default)]
    pub week_start: Option<NaiveDate>,
    #[serde(default)]
    pub study_minutes: f64,
    #[serde(default)]
    pub entertainment_minutes: f64,
    #[serde(default)]
    pub others_minutes: f64,
    #[serde(default)]
    pub total_minutes: f64,
    #[serde(default)]
    pub study_percentage: f64,
    #[serde(default)]
    pub entertainment_percentage: f64,
    #[serde(default)]
    pub others_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AppUsage {
    pub app_name: String,
    pub category: String,
    #[serde(default)]
    pub total_minutes: f64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RemoteActivityLog {
    pub timestamp: String,
    pub app_name: String,
    #[serde(default)]
    pub window_title: String,
    pub category: String,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct NewActivityLog<'a> {
    user_id: &'a str,
    timestamp: String,
    app_name: &'a str,
    window_title: &'a str,
    category: String,
    duration_seconds: u64,
    date: NaiveDate,
}

#[derive(Serialize)]
struct WeeklySummaryRpc<'a> {
    target_user_id: &'a str,
    target_date: NaiveDate,
}

#[derive(Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base: String,
    key: String,
    user_id: String,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let url = config.url.trim().trim_end_matches('/');
        if url.is_empty() || config.key.trim().is_empty() {
            return Err(RemoteError::Config("missing url or key".to_string()));
        }
        reqwest::Url::parse(url).map_err(|e| RemoteError::Config(format!("bad url {url}: {e}")))?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base: format!("{url}/rest/v1"),
            key: config.key.trim().to_string(),
            user_id: config.user_id,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("apikey", &self.key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.key))
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{name}", self.base)
    }

    fn user_filter(&self) -> (&'static str, String) {
        ("user_id", format!("eq.{}", self.user_id))
    }

    pub async fn insert_batch(&self, records: &[ActivityRecord]) -> Result<(), RemoteError> {
        if records.is_empty() {
            return Ok(());
        }
        let rows: Vec<NewActivityLog<'_>> = records
            .iter()
            .map(|r| NewActivityLog {
                user_id: &self.user_id,
                timestamp: r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
                app_name: &r.app_name,
                window_title: &r.window_title,
                category: r.category.to_lowercase(),
                duration_seconds: r.duration_seconds,
                date: r.date(),
            })
            .collect();

        let rb = self
            .client
            .post(self.table("activity_logs"))
            .header("Prefer", "return=minimal")
            .json(&rows);
        send_empty(self.authed(rb)).await?;
        debug!("inserted {} activity logs", rows.len());
        Ok(())
    }

    pub async fn get_daily_summary(
        &self,
        date: NaiveDate,
    ) -> Result<Option<RemoteDailySummary>, RemoteError> {
        let rb = self.client.get(self.table("daily_summary")).query(&[
            ("select", "*".to_string()),
            self.user_filter(),
            ("date", format!("eq.{date}")),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<RemoteDailySummary> = send_json(self.authed(rb)).await?;
        Ok(rows.into_iter().next())
    }

    /// Week containing `date`, keyed by ISO year and ISO week number.
    pub async fn get_weekly_summary(
        &self,
        date: NaiveDate,
    ) -> Result<Option<RemoteWeeklySummary>, RemoteError> {
        let week = date.iso_week();
        let rb = self.client.get(self.table("weekly_summary")).query(&[
            ("select", "*".to_string()),
            self.user_filter(),
            ("year", format!("eq.{}", week.year())),
            ("week_number", format!("eq.{}", week.week())),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<RemoteWeeklySummary> = send_json(self.authed(rb)).await?;
        Ok(rows.into_iter().next())
    }

    /// Daily summaries from `today - (days - 1)` onward, oldest first.
    pub async fn get_last_n_days(&self, days: u32) -> Result<Vec<RemoteDailySummary>, RemoteError> {
        let start = window_start(Local::now().date_naive(), days);
        let rb = self.client.get(self.table("daily_summary")).query(&[
            ("select", "*".to_string()),
            self.user_filter(),
            ("date", format!("gte.{start}")),
            ("order", "date.asc".to_string()),
        ]);
        send_json(self.authed(rb)).await
    }

    /// Most-used apps per category over the last `days` days.
    pub async fn get_top_apps(
        &self,
        days: u32,
    ) -> Result<BTreeMap<String, Vec<AppUsage>>, RemoteError> {
        let start = window_start(Local::now().date_naive(), days);
        let rb = self.client.get(self.table("app_usage")).query(&[
            ("select", "*".to_string()),
            self.user_filter(),
            ("date", format!("gte.{start}")),
            ("order", "total_minutes.desc".to_string()),
        ]);
        let rows: Vec<AppUsage> = send_json(self.authed(rb)).await?;
        Ok(group_top_apps(rows))
    }

    /// Raw rows for `date` (today when absent), newest first.
    pub async fn get_activity_logs(
        &self,
        date: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<RemoteActivityLog>, RemoteError> {
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        let rb = self.client.get(self.table("activity_logs")).query(&[
            ("select", "*".to_string()),
            self.user_filter(),
            ("date", format!("eq.{date}")),
            ("order", "timestamp.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        send_json(self.authed(rb)).await
    }

    pub async fn cleanup_older_than(&self, days: u32) -> Result<(), RemoteError> {
        let Some(cutoff) = retention_cutoff(Local::now().date_naive(), days) else {
            return Ok(());
        };
        let rb = self
            .client
            .delete(self.table("activity_logs"))
            .query(&[self.user_filter(), ("date", format!("lt.{cutoff}"))]);
        send_empty(self.authed(rb)).await?;
        info!("cleaned up remote activity logs older than {cutoff}");
        Ok(())
    }

    pub async fn update_weekly_summary(&self, date: NaiveDate) -> Result<(), RemoteError> {
        let rb = self
            .client
            .post(format!("{}/rpc/calculate_weekly_summary", self.base))
            .json(&WeeklySummaryRpc {
                target_user_id: &self.user_id,
                target_date: date,
            });
        send_empty(self.authed(rb)).await?;
        info!("weekly summary updated for {date}");
        Ok(())
    }

    pub async fn test_connection(&self) -> Result<(), RemoteError> {
        let rb = self
            .client
            .get(self.table("daily_summary"))
            .query(&[("select", "id"), ("limit", "1")]);
        send_empty(self.authed(rb)).await
    }
}

fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.max(1) - 1)))
        .unwrap_or(NaiveDate::MIN)
}

fn group_top_apps(rows: Vec<AppUsage>) -> BTreeMap<String, Vec<AppUsage>> {
    let mut out: BTreeMap<String, Vec<AppUsage>> = BTreeMap::new();
    for row in rows {
        let bucket = out.entry(row.category.clone()).or_default();
        if bucket.len() < TOP_APPS_PER_CATEGORY {
            bucket.push(row);
        }
    }
    out
}

async fn send_checked(rb: RequestBuilder) -> Result<reqwest::Response, RemoteError> {
    let res = rb.send().await?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(res)
}

async fn send_json<T: DeserializeOwned>(rb: RequestBuilder) -> Result<T, RemoteError> {
    let res = send_checked(rb).await?;
    res.json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

async fn send_empty(rb: RequestBuilder) -> Result<(), RemoteError> {
    send_checked(rb).await.map(|_| ())
}
