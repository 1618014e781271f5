//! The sampling loop: sample -> classify -> append (-> maybe flush), once per
//! tick, strictly in sequence.

use chrono::Local;
use std::future::Future;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::aggregate::summary_table;
use crate::classifier::{Classifier, PredictBackend};
use crate::record::ActivityRecord;
use crate::sink::{ActivitySink, SinkStats};

/// The foreground window at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveWindow {
    pub app_name: String,
    pub window_title: String,
}

/// Source of foreground-window samples.
///
/// Implementations swallow OS failures (no window, exited process, access
/// denied) and report them as `None`.
pub trait WindowSource {
    fn sample(&mut self) -> Option<ActiveWindow>;
}

/// Runs one tick. Returns `Ok(None)` when nothing was recorded.
pub async fn tick<S, B>(
    source: &mut S,
    classifier: &Classifier<B>,
    sink: &mut ActivitySink,
) -> anyhow::Result<Option<ActivityRecord>>
where
    S: WindowSource,
    B: PredictBackend,
{
    let window = source.sample();
    let app = window.as_ref().map(|w| w.app_name.as_str());
    let title = window.as_ref().map(|w| w.window_title.as_str());
    let category = classifier.classify(app, title).await;

    let Some(window) = window else {
        return Ok(None);
    };
    if window.app_name.trim().is_empty() || window.window_title.trim().is_empty() {
        return Ok(None);
    }

    let record = ActivityRecord::new(
        Local::now().naive_local(),
        window.app_name,
        window.window_title,
        category,
        sink.log().interval_seconds(),
    );
    sink.record(record.clone()).await?;
    info!(
        "[{}] {:15} | {}",
        record.timestamp.format("%H:%M:%S"),
        record.category.to_uppercase(),
        record.app_name
    );
    Ok(Some(record))
}

/// Samples until `shutdown` resolves (or a local write fails), then flushes
/// the sink and logs today's summary table.
pub async fn run<S, B, F>(
    mut source: S,
    classifier: Classifier<B>,
    mut sink: ActivitySink,
    shutdown: F,
) -> anyhow::Result<SinkStats>
where
    S: WindowSource,
    B: PredictBackend,
    F: Future<Output = ()>,
{
    let mut ticker = interval(sink.log().interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut failure: Option<anyhow::Error> = None;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("stopping tracker");
                break;
            }
            _ = ticker.tick() => {
                match tick(&mut source, &classifier, &mut sink).await {
                    Ok(Some(_)) => {}
                    Ok(None) => debug!("no active window"),
                    Err(e) => {
                        error!("local log write failed, stopping: {e:#}");
                        failure = Some(e);
                        break;
                    }
                }
            }
        }
    }

    let today = Local::now().date_naive();
    let log = sink.log().clone();
    let stats = sink.shutdown(today).await;

    match log.read_day(today) {
        Ok(read) => info!(
            "--- Activity Summary ---\n{}",
            summary_table(&read.records, log.interval_seconds())
        ),
        Err(e) => error!("could not read back today's log: {e:#}"),
    }
    info!(
        "tracker stopped: {} appended, {} mirrored, {} failed batches",
        stats.appended, stats.mirrored, stats.failed_batches
    );

    match failure {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}
