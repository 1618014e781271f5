use activity_core::category::UNCATEGORIZED;
use activity_core::classifier::{Classifier, HttpPredictor, PredictBackend};
use activity_core::daily_log::DailyLog;
use activity_core::sink::ActivitySink;
use activity_core::tracker::{self, ActiveWindow, WindowSource};
use chrono::Local;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays a fixed list of samples, then reports "no window".
struct Scripted {
    samples: VecDeque<Option<ActiveWindow>>,
    done_after: usize,
    taken: usize,
    done: Option<oneshot::Sender<()>>,
}

impl Scripted {
    fn new(samples: Vec<Option<(&str, &str)>>) -> Self {
        Self {
            samples: samples
                .into_iter()
                .map(|s| {
                    s.map(|(app, title)| ActiveWindow {
                        app_name: app.to_string(),
                        window_title: title.to_string(),
                    })
                })
                .collect(),
            done_after: usize::MAX,
            taken: 0,
            done: None,
        }
    }
}

impl WindowSource for Scripted {
    fn sample(&mut self) -> Option<ActiveWindow> {
        self.taken += 1;
        if self.taken >= self.done_after {
            if let Some(tx) = self.done.take() {
                let _ = tx.send(());
            }
        }
        self.samples.pop_front().flatten()
    }
}

#[derive(Clone, Default)]
struct Echo {
    calls: Arc<AtomicUsize>,
}

impl PredictBackend for Echo {
    async fn predict(&self, text: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(if text.starts_with("steam.exe") {
            "gaming".to_string()
        } else {
            "work".to_string()
        })
    }
}

#[tokio::test]
async fn tick_records_only_complete_samples() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path(), 5);
    let mut sink = ActivitySink::new(log.clone(), None, 1);
    let echo = Echo::default();
    let classifier = Classifier::new(echo.clone());
    let mut source = Scripted::new(vec![
        Some(("code.exe", "main.rs")),
        None,
        Some(("explorer.exe", "")),
        Some(("steam.exe", "Library")),
    ]);

    let mut recorded = Vec::new();
    for _ in 0..4 {
        if let Some(r) = tracker::tick(&mut source, &classifier, &mut sink).await.unwrap() {
            recorded.push(r);
        }
    }

    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].category, "work");
    assert_eq!(recorded[1].category, "gaming");
    assert_eq!(recorded[1].duration_seconds, 5);
    assert_eq!(echo.calls.load(Ordering::SeqCst), 2, "empty samples skip the classifier");

    let today = Local::now().date_naive();
    let mut stored = log.read_day(today).unwrap().records;
    stored.extend(log.read_day(today.succ_opt().unwrap()).unwrap().records);
    assert_eq!(stored, recorded);
}

#[tokio::test]
async fn run_stops_on_shutdown_and_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path(), 1);
    let sink = ActivitySink::new(log.clone(), None, 1);
    let (tx, rx) = oneshot::channel();
    let mut source = Scripted::new(vec![
        Some(("code.exe", "a.rs")),
        Some(("code.exe", "b.rs")),
        Some(("code.exe", "c.rs")),
    ]);
    source.done_after = 3;
    source.done = Some(tx);

    let stats = tokio::time::timeout(
        Duration::from_secs(30),
        tracker::run(source, Classifier::new(Echo::default()), sink, async {
            let _ = rx.await;
        }),
    )
    .await
    .expect("tracker did not stop")
    .unwrap();

    assert_eq!(stats.appended, 3);
}

#[tokio::test]
async fn unreachable_classifier_still_records_uncategorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_json(json!({"text": "code.exe main.rs"})))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "ML model not available."})))
        .expect(1)
        .mount(&server)
        .await;

    let predictor =
        HttpPredictor::new(format!("{}/predict", server.uri()), Duration::from_secs(3)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut sink = ActivitySink::new(DailyLog::new(dir.path(), 5), None, 1);
    let mut source = Scripted::new(vec![Some(("code.exe", "main.rs"))]);

    let r = tracker::tick(&mut source, &Classifier::new(predictor), &mut sink)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(r.category, UNCATEGORIZED);
    assert_eq!(sink.stats().appended, 1);
}

#[tokio::test]
async fn http_predictor_returns_category() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"category": "entertainment"})))
        .mount(&server)
        .await;

    let predictor =
        HttpPredictor::new(format!("{}/predict", server.uri()), Duration::from_secs(3)).unwrap();
    let c = Classifier::new(predictor);
    assert_eq!(c.classify(Some("vlc.exe"), Some("movie.mkv")).await, "entertainment");
}
