use activity_core::{
    classifier::{DEFAULT_CLASSIFIER_URL, DEFAULT_TIMEOUT},
    config::{self, TrackerConfig, DEFAULT_BATCH_SIZE, DEFAULT_INTERVAL_SECONDS},
};
#[cfg(windows)]
use activity_core::{
    classifier::{Classifier, HttpPredictor},
    daily_log::DailyLog,
    sink::ActivitySink,
    tracker,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "windows_collector", version)]
struct Args {
    /// Classifier endpoint, e.g. http://127.0.0.1:5000/predict
    #[arg(long, default_value = DEFAULT_CLASSIFIER_URL)]
    classifier_url: String,

    /// Classifier request timeout (seconds). Keep it short so the sampling cadence holds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    classifier_timeout_seconds: u64,

    /// Poll interval (seconds). Every logged row stands for this long.
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECONDS)]
    interval_seconds: u64,

    /// Records buffered before one batch is sent to the remote store (1 = immediate).
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Directory holding the per-day activity logs.
    #[arg(long, default_value = config::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Remote summary store base URL. Falls back to SUPABASE_URL.
    #[arg(long)]
    remote_url: Option<String>,

    /// Remote summary store API key. Falls back to SUPABASE_ANON_KEY.
    #[arg(long)]
    remote_key: Option<String>,

    /// Owner id for remote rows.
    #[arg(long)]
    user_id: Option<String>,

    /// Keep the log local even when remote credentials are available.
    #[arg(long, default_value_t = false)]
    local_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "windows_collector=info,activity_core=info".into()),
        )
        .init();

    config::load_env_files();
    let args = Args::parse();

    let remote = if args.local_only {
        None
    } else {
        config::resolve_remote(args.remote_url.clone(), args.remote_key.clone(), args.user_id.clone())
    };
    let cfg = TrackerConfig {
        interval_seconds: args.interval_seconds,
        batch_size: args.batch_size,
        log_dir: args.log_dir.clone(),
        remote,
        ..TrackerConfig::default()
    };
    cfg.validate()?;

    #[cfg(not(windows))]
    {
        eprintln!("windows_collector only runs on Windows.");
        eprintln!("Logs would be written to: {}", cfg.log_dir.display());
        Ok(())
    }

    #[cfg(windows)]
    {
        windows_main(args, cfg).await
    }
}

#[cfg(windows)]
async fn windows_main(args: Args, cfg: TrackerConfig) -> anyhow::Result<()> {
    use std::time::Duration;
    use tracing::info;

    // Two collectors would log every tick twice.
    let _mutex = match ensure_single_instance_mutex() {
        Ok(g) => g,
        Err(e) => {
            info!("windows_collector already running; exit ({e})");
            return Ok(());
        }
    };

    let predictor = HttpPredictor::new(
        args.classifier_url.as_str(),
        Duration::from_secs(args.classifier_timeout_seconds.max(1)),
    )?;
    let log = DailyLog::new(&cfg.log_dir, cfg.interval_seconds);
    let sink = ActivitySink::new(log, cfg.remote_store(), cfg.batch_size);

    info!("Windows collector started.");
    info!("Classifier: {}", args.classifier_url);
    info!("Logs: {}", cfg.log_dir.display());
    info!("Press Ctrl+C to stop tracking");

    let stats = tracker::run(
        ForegroundWindow,
        Classifier::new(predictor),
        sink,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await?;
    info!("collector stopped after {} samples", stats.appended);
    Ok(())
}

#[cfg(windows)]
struct MutexGuard(windows_sys::Win32::Foundation::HANDLE);

#[cfg(windows)]
impl Drop for MutexGuard {
    fn drop(&mut self) {
        unsafe {
            windows_sys::Win32::Foundation::CloseHandle(self.0);
        }
    }
}

#[cfg(windows)]
fn ensure_single_instance_mutex() -> anyhow::Result<MutexGuard> {
    use std::ffi::c_void;
    use std::iter;
    use windows_sys::Win32::Foundation::{GetLastError, BOOL, ERROR_ALREADY_EXISTS, HANDLE};

    // Direct kernel32 binding; not every windows-sys build re-exports CreateMutexW.
    #[link(name = "kernel32")]
    extern "system" {
        fn CreateMutexW(
            lp_mutex_attributes: *const c_void,
            b_initial_owner: BOOL,
            lp_name: *const u16,
        ) -> HANDLE;
    }

    let name: Vec<u16> = "Local\\ActivityTracker.windows_collector"
        .encode_utf16()
        .chain(iter::once(0))
        .collect();

    unsafe {
        let h = CreateMutexW(std::ptr::null(), 0, name.as_ptr());
        if h.is_null() {
            anyhow::bail!("CreateMutexW_failed");
        }
        if GetLastError() == ERROR_ALREADY_EXISTS {
            windows_sys::Win32::Foundation::CloseHandle(h);
            anyhow::bail!("already_exists");
        }
        Ok(MutexGuard(h))
    }
}

/// Win32 foreground window: executable file name plus window text.
#[cfg(windows)]
struct ForegroundWindow;

#[cfg(windows)]
impl tracker::WindowSource for ForegroundWindow {
    fn sample(&mut self) -> Option<tracker::ActiveWindow> {
        use std::path::Path;

        let (pid, window_title) = foreground_window()?;
        let exe_path = query_process_exe_path(pid)?;
        let app_name = Path::new(&exe_path)
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())?;
        Some(tracker::ActiveWindow {
            app_name,
            window_title,
        })
    }
}

#[cfg(windows)]
fn foreground_window() -> Option<(u32, String)> {
    use windows_sys::Win32::Foundation::HWND;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    };

    unsafe {
        let hwnd: HWND = GetForegroundWindow();
        if hwnd.is_null() {
            return None;
        }

        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, &mut pid);
        if pid == 0 {
            return None;
        }

        let len = GetWindowTextLengthW(hwnd);
        let title = if len > 0 {
            let mut buf = vec![0u16; (len as usize) + 1];
            let read = GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32);
            if read > 0 {
                buf.truncate(read as usize);
                String::from_utf16_lossy(&buf)
            } else {
                String::new()
            }
        } else {
            String::new()
        };

        Some((pid, title))
    }
}

#[cfg(windows)]
fn query_process_exe_path(pid: u32) -> Option<String> {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    unsafe {
        // Fails for exited processes and for elevated ones we may not inspect.
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle.is_null() {
            return None;
        }

        let mut buf = vec![0u16; 1024];
        let mut size: u32 = buf.len() as u32;
        let ok = QueryFullProcessImageNameW(handle, 0, buf.as_mut_ptr(), &mut size);
        let _ = CloseHandle(handle);
        if ok == 0 || size == 0 {
            None
        } else {
            buf.truncate(size as usize);
            Some(String::from_utf16_lossy(&buf))
        }
    }
}
