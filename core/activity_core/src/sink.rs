use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::daily_log::DailyLog;
use crate::record::ActivityRecord;
use crate::remote::RemoteStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub appended: usize,
    pub mirrored: usize,
    pub failed_batches: usize,
}

/// Writes every record to the local day log and mirrors batches remotely.
///
/// The local append decides success; the remote side is best-effort and a
/// failed batch is dropped from the buffer without retry.
pub struct ActivitySink {
    log: DailyLog,
    remote: Option<RemoteStore>,
    batch_size: usize,
    buffer: Vec<ActivityRecord>,
    stats: SinkStats,
}

impl ActivitySink {
    pub fn new(log: DailyLog, remote: Option<RemoteStore>, batch_size: usize) -> Self {
        Self {
            log,
            remote,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            stats: SinkStats::default(),
        }
    }

    pub fn log(&self) -> &DailyLog {
        &self.log
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub async fn record(&mut self, record: ActivityRecord) -> anyhow::Result<()> {
        self.log.append(&record)?;
        self.stats.appended += 1;

        if self.remote.is_some() {
            self.buffer.push(record);
            if self.buffer.len() >= self.batch_size {
                self.flush().await;
            }
        }
        Ok(())
    }

    /// Sends the whole buffer as one batch and clears it. Returns whether the
    /// batch (if any) reached the remote store.
    pub async fn flush(&mut self) -> bool {
        if self.buffer.is_empty() {
            return true;
        }
        let batch = std::mem::take(&mut self.buffer);
        let Some(remote) = self.remote.as_ref() else {
            return false;
        };
        match remote.insert_batch(&batch).await {
            Ok(()) => {
                self.stats.mirrored += batch.len();
                info!("synced {} activities to remote store", batch.len());
                true
            }
            Err(e) => {
                self.stats.failed_batches += 1;
                warn!("remote batch of {} failed (kept locally only): {e}", batch.len());
                false
            }
        }
    }

    /// Final flush, then a best-effort weekly rollup request.
    pub async fn shutdown(mut self, today: NaiveDate) -> SinkStats {
        if !self.buffer.is_empty() {
            let n = self.buffer.len();
            if self.flush().await {
                info!("synced final {n} activities to remote store");
            }
        }
        if let Some(remote) = self.remote.as_ref() {
            if let Err(e) = remote.update_weekly_summary(today).await {
                warn!("weekly summary update failed: {e}");
            }
        }
        self.stats
    }
}
