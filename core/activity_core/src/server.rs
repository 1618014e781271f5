//! Reporting API over the local day logs and the remote summary store.

use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::aggregate::{aggregate, raw_category_minutes, DailySummary};
use crate::daily_log::DailyLog;
use crate::remote::{
    AppUsage, RemoteDailySummary, RemoteError, RemoteStore, RemoteWeeklySummary,
};

const IMPORT_BATCH_SIZE: usize = 50;
const DEFAULT_DAYS: u32 = 7;
const MAX_DAYS: u32 = 366;

#[derive(Clone)]
pub struct AppState {
    pub log: DailyLog,
    pub remote: Option<RemoteStore>,
    pub retention_days: u32,
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(OkResponse {
        ok: true,
        data: Some(data),
    })
    .into_response()
}

fn err(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrResponse { ok: false, error })).into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/activity-data", get(get_activity_data))
        .route("/api/daily-summary", get(get_daily_summary))
        .route("/api/last-7-days", get(get_last_days))
        .route("/api/weekly-summary", get(get_weekly_summary))
        .route("/api/top-apps", get(get_top_apps))
        .route("/api/activity-logs", get(get_activity_logs))
        .route("/api/stats", get(get_stats))
        .route("/api/import", post(post_import).options(options_ok))
        .route("/data/cleanup", post(post_cleanup).options(options_ok))
        .with_state(state)
        .layer(cors)
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
    remote: bool,
}

async fn health(State(state): State<AppState>) -> Response {
    ok(HealthInfo {
        service: "activity_core",
        version: env!("CARGO_PKG_VERSION"),
        remote: state.remote.is_some(),
    })
}

fn parse_date(input: Option<&str>) -> Result<NaiveDate, Response> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| err(StatusCode::BAD_REQUEST, "invalid_date")),
    }
}

fn remote_of(state: &AppState) -> Result<&RemoteStore, Response> {
    state
        .remote
        .as_ref()
        .ok_or_else(|| err(StatusCode::SERVICE_UNAVAILABLE, "remote_unavailable"))
}

fn remote_failed(what: &str, e: RemoteError) -> Response {
    error!("{what} failed: {e}");
    err(StatusCode::SERVICE_UNAVAILABLE, "remote_unavailable")
}

async fn get_activity_data(State(state): State<AppState>) -> Response {
    let today = Local::now().date_naive();
    match state.log.read_day(today) {
        Ok(read) => {
            let minutes: HashMap<String, f64> =
                raw_category_minutes(&read.records, state.log.interval_seconds());
            ok(minutes)
        }
        Err(e) => {
            error!("read_day failed: {e:#}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "log_error")
        }
    }
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Serialize)]
struct DailySummaryView {
    date: NaiveDate,
    #[serde(flatten)]
    summary: DailySummary,
    total_activities: usize,
    updated_at: String,
    message: &'static str,
}

async fn get_daily_summary(State(state): State<AppState>, Query(q): Query<DateQuery>) -> Response {
    let date = match parse_date(q.date.as_deref()) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let read = match state.log.read_day(date) {
        Ok(v) => v,
        Err(e) => {
            error!("read_day failed: {e:#}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "log_error");
        }
    };
    let message = if read.records.is_empty() {
        "No data tracked yet"
    } else {
        "Data from local log"
    };
    ok(DailySummaryView {
        date,
        summary: aggregate(&read.records, state.log.interval_seconds()),
        total_activities: read.records.len(),
        updated_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        message,
    })
}

#[derive(Deserialize)]
struct DaysQuery {
    days: Option<u32>,
}

fn clamp_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

async fn get_last_days(State(state): State<AppState>, Query(q): Query<DaysQuery>) -> Response {
    let remote = match remote_of(&state) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match remote.get_last_n_days(clamp_days(q.days)).await {
        Ok(rows) => ok(rows),
        Err(e) => remote_failed("get_last_n_days", e),
    }
}

async fn get_weekly_summary(State(state): State<AppState>, Query(q): Query<DateQuery>) -> Response {
    let date = match parse_date(q.date.as_deref()) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let remote = match remote_of(&state) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match remote.get_weekly_summary(date).await {
        Ok(Some(week)) => ok(week),
        Ok(None) => err(StatusCode::NOT_FOUND, "no_data"),
        Err(e) => remote_failed("get_weekly_summary", e),
    }
}

async fn get_top_apps(State(state): State<AppState>, Query(q): Query<DaysQuery>) -> Response {
    let remote = match remote_of(&state) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match remote.get_top_apps(clamp_days(q.days)).await {
        Ok(apps) => ok(apps),
        Err(e) => remote_failed("get_top_apps", e),
    }
}

#[derive(Deserialize)]
struct LogsQuery {
    date: Option<String>,
    limit: Option<String>,
}

const DEFAULT_LOGS_LIMIT: usize = 100;
const MAX_LOGS_LIMIT: usize = 1000;

fn parse_limit(input: Option<&str>) -> Result<usize, Response> {
    match input.map(str::trim) {
        None | Some("") => Ok(DEFAULT_LOGS_LIMIT),
        Some(s) => s
            .parse::<usize>()
            .map(|n| n.clamp(1, MAX_LOGS_LIMIT))
            .map_err(|_| err(StatusCode::BAD_REQUEST, "invalid_limit")),
    }
}

async fn get_activity_logs(State(state): State<AppState>, Query(q): Query<LogsQuery>) -> Response {
    let date = match q.date.as_deref() {
        None => None,
        Some(s) => match parse_date(Some(s)) {
            Ok(d) => Some(d),
            Err(resp) => return resp,
        },
    };
    let limit = match parse_limit(q.limit.as_deref()) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let remote = match remote_of(&state) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match remote.get_activity_logs(date, limit).await {
        Ok(rows) => ok(rows),
        Err(e) => remote_failed("get_activity_logs", e),
    }
}

#[derive(Serialize)]
struct Stats {
    today: Option<RemoteDailySummary>,
    last_7_days: Vec<RemoteDailySummary>,
    current_week: Option<RemoteWeeklySummary>,
    top_apps: BTreeMap<String, Vec<AppUsage>>,
}

async fn get_stats(State(state): State<AppState>) -> Response {
    let remote = match remote_of(&state) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let today = Local::now().date_naive();
    let stats = async {
        Ok::<_, RemoteError>(Stats {
            today: remote.get_daily_summary(today).await?,
            last_7_days: remote.get_last_n_days(DEFAULT_DAYS).await?,
            current_week: remote.get_weekly_summary(today).await?,
            top_apps: remote.get_top_apps(DEFAULT_DAYS).await?,
        })
    }
    .await;
    match stats {
        Ok(s) => ok(s),
        Err(e) => remote_failed("stats", e),
    }
}

#[derive(Deserialize, Default)]
struct ImportRequest {
    date: Option<String>,
}

#[derive(Serialize)]
struct ImportResult {
    date: NaiveDate,
    imported: usize,
    failed_batches: usize,
    skipped_rows: usize,
}

/// Copies one day of the local log into the remote store.
async fn post_import(State(state): State<AppState>, body: Option<Json<ImportRequest>>) -> Response {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let date = match parse_date(req.date.as_deref()) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let remote = match remote_of(&state) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let read = match state.log.read_day(date) {
        Ok(v) => v,
        Err(e) => {
            error!("read_day failed: {e:#}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "log_error");
        }
    };

    let mut result = ImportResult {
        date,
        imported: 0,
        failed_batches: 0,
        skipped_rows: read.skipped,
    };
    for batch in read.records.chunks(IMPORT_BATCH_SIZE) {
        match remote.insert_batch(batch).await {
            Ok(()) => result.imported += batch.len(),
            Err(e) => {
                error!("import batch of {} failed: {e}", batch.len());
                result.failed_batches += 1;
            }
        }
    }
    info!(
        "imported {} activities for {date} ({} failed batches)",
        result.imported, result.failed_batches
    );
    ok(result)
}

#[derive(Deserialize, Default)]
struct CleanupRequest {
    days: Option<u32>,
}

#[derive(Serialize)]
struct CleanupResult {
    days: u32,
    removed_days: Vec<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_cleaned: Option<bool>,
}

async fn post_cleanup(State(state): State<AppState>, body: Option<Json<CleanupRequest>>) -> Response {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let days = req.days.unwrap_or(state.retention_days);
    let today = Local::now().date_naive();

    let removed_days = match state.log.cleanup_older_than(days, today) {
        Ok(v) => v,
        Err(e) => {
            error!("local cleanup failed: {e:#}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "log_error");
        }
    };

    let remote_cleaned = match state.remote.as_ref() {
        None => None,
        Some(remote) => match remote.cleanup_older_than(days).await {
            Ok(()) => Some(true),
            Err(e) => {
                error!("remote cleanup failed: {e}");
                Some(false)
            }
        },
    };

    ok(CleanupResult {
        days,
        removed_days,
        remote_cleaned,
    })
}
