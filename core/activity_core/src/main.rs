use activity_core::{
    config::{self, TrackerConfig, DEFAULT_INTERVAL_SECONDS, DEFAULT_RETENTION_DAYS},
    daily_log::DailyLog,
    server::{router, AppState},
};
use clap::Parser;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 5000;

#[derive(Parser, Debug)]
#[command(name = "activity_core", version)]
struct Args {
    /// Listen address.
    ///
    /// Accepts:
    /// - ip:port (recommended), e.g. 127.0.0.1:5000
    /// - ip (implies port 5000), e.g. 127.0.0.1
    #[arg(long, default_value = "127.0.0.1:5000")]
    listen: String,

    /// Directory holding the per-day activity logs.
    #[arg(long, default_value = config::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Sampling interval the tracker runs with (seconds). Each logged row counts for this long.
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECONDS)]
    interval_seconds: u64,

    /// Default retention window for /data/cleanup (days).
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
    retention_days: u32,

    /// Remote summary store base URL. Falls back to SUPABASE_URL.
    #[arg(long)]
    remote_url: Option<String>,

    /// Remote summary store API key. Falls back to SUPABASE_ANON_KEY.
    #[arg(long)]
    remote_key: Option<String>,

    /// Owner id for remote rows.
    #[arg(long)]
    user_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "activity_core=info,tower_http=info".into()),
        )
        .init();

    config::load_env_files();
    let args = Args::parse();

    let cfg = TrackerConfig {
        interval_seconds: args.interval_seconds,
        log_dir: args.log_dir,
        retention_days: args.retention_days,
        remote: config::resolve_remote(args.remote_url, args.remote_key, args.user_id),
        ..TrackerConfig::default()
    };
    cfg.validate()?;

    let state = AppState {
        log: DailyLog::new(&cfg.log_dir, cfg.interval_seconds),
        remote: cfg.remote_store(),
        retention_days: cfg.retention_days,
    };
    if let Some(remote) = state.remote.as_ref() {
        match remote.test_connection().await {
            Ok(()) => info!("remote store reachable"),
            Err(e) => warn!("remote store not reachable yet: {e}"),
        }
    }

    let app = router(state);
    let addr = parse_listen(&args.listen)?;
    info!("Core listening on http://{addr}");
    info!("Logs: {}", cfg.log_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        if host == "localhost" {
            let port: u16 = port_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
                    input,
                    DEFAULT_PORT
                )
            })?;
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), port));
        }
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listen_accepts_common_forms() {
        assert_eq!(
            parse_listen("127.0.0.1:8080").unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_listen("0.0.0.0").unwrap().port(), DEFAULT_PORT);
        assert_eq!(parse_listen("localhost:9000").unwrap().port(), 9000);
        assert_eq!(parse_listen("localhost").unwrap().port(), DEFAULT_PORT);
        assert!(parse_listen("localhost:http").is_err());
        assert!(parse_listen("example.com:80").is_err());
    }
}
