//! Append-only per-day CSV log, the local system of record.
//!
//! One file per calendar day (`desktop_activity_YYYY-MM-DD.csv`) with a single
//! header row. Readers re-read the whole file on every request; the only
//! mutator is [`DailyLog::append`], which writes each row with one `write_all`.

use anyhow::Context;
use chrono::{Days, NaiveDate};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::record::{parse_timestamp, ActivityRecord};

pub const HEADER: [&str; 4] = ["Timestamp", "App Name", "Window Title", "Category"];

const FILE_PREFIX: &str = "desktop_activity_";
const FILE_SUFFIX: &str = ".csv";

#[derive(Clone, Debug)]
pub struct DailyLog {
    dir: PathBuf,
    interval_seconds: u64,
}

/// Rows read back from one day's log.
#[derive(Debug, Default)]
pub struct LogRead {
    pub records: Vec<ActivityRecord>,
    /// Rows that had the wrong column count or an unparseable timestamp.
    pub skipped: usize,
}

impl DailyLog {
    pub fn new(dir: impl Into<PathBuf>, interval_seconds: u64) -> Self {
        Self {
            dir: dir.into(),
            interval_seconds,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn file_name(date: NaiveDate) -> String {
        format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d"))
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(Self::file_name(date))
    }

    /// Appends one record to the file of the record's own day.
    ///
    /// Errors here mean the system of record is not writable and must reach
    /// the operator.
    pub fn append(&self, record: &ActivityRecord) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create log dir {}", self.dir.display()))?;
        let path = self.path_for(record.date());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;

        let mut out = String::new();
        if file.metadata()?.len() == 0 {
            out.push_str(&HEADER.join(","));
            out.push('\n');
        }
        let row = [
            csv_escape(&record.timestamp_string()),
            csv_escape(&record.app_name),
            csv_escape(&record.window_title),
            csv_escape(&record.category),
        ];
        out.push_str(&row.join(","));
        out.push('\n');

        file.write_all(out.as_bytes())
            .with_context(|| format!("append to {}", path.display()))?;
        Ok(())
    }

    /// Reads every valid row of `date`'s log. A missing file is an empty day.
    pub fn read_day(&self, date: NaiveDate) -> anyhow::Result<LogRead> {
        let path = self.path_for(date);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LogRead::default()),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        let text = String::from_utf8_lossy(&bytes);

        let mut out = LogRead::default();
        for (i, row) in parse_csv(&text).into_iter().enumerate() {
            if i == 0 && row.first().map(|s| s.as_str()) == Some(HEADER[0]) {
                continue;
            }
            if row.len() == 1 && row[0].trim().is_empty() {
                continue;
            }
            match self.row_to_record(&row) {
                Some(r) => out.records.push(r),
                None => out.skipped += 1,
            }
        }

        if out.skipped > 0 {
            warn!(
                "skipped {} malformed rows in {}",
                out.skipped,
                path.display()
            );
        }
        Ok(out)
    }

    fn row_to_record(&self, row: &[String]) -> Option<ActivityRecord> {
        let [ts, app, title, category] = row else {
            return None;
        };
        let ts = parse_timestamp(ts)?;
        Some(ActivityRecord::new(
            ts,
            app.as_str(),
            title.as_str(),
            category.as_str(),
            self.interval_seconds,
        ))
    }

    /// Dates that currently have a log file, oldest first.
    pub fn list_days(&self) -> anyhow::Result<Vec<NaiveDate>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("list {}", self.dir.display())),
        };
        let mut days: Vec<NaiveDate> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(date_from_file_name))
            .collect();
        days.sort_unstable();
        Ok(days)
    }

    /// Retention sweep: deletes whole day files older than `today - days`.
    /// A window reaching past the calendar's start removes nothing.
    pub fn cleanup_older_than(&self, days: u32, today: NaiveDate) -> anyhow::Result<Vec<NaiveDate>> {
        let cutoff = retention_cutoff(today, days).unwrap_or(NaiveDate::MIN);
        let mut removed = Vec::new();
        for day in self.list_days()? {
            if day >= cutoff {
                continue;
            }
            let path = self.path_for(day);
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            removed.push(day);
        }
        if !removed.is_empty() {
            info!("removed {} log files older than {cutoff}", removed.len());
        }
        Ok(removed)
    }
}

/// First day kept by a `days`-long retention window, `None` if out of range.
pub fn retention_cutoff(today: NaiveDate, days: u32) -> Option<NaiveDate> {
    today.checked_sub_days(Days::new(u64::from(days)))
}

fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn csv_escape(s: &str) -> String {
    let needs_quote = s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');
    if !needs_quote {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Splits CSV text into rows of fields. Quoted fields may contain commas,
/// doubled quotes and line breaks.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
