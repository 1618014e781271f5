use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::category::{normalize, NormalizedCategory};

/// Timestamp layout used in the per-day log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One sample of the foreground window.
///
/// `duration_seconds` is the poll interval the record stands for, not a
/// measured duration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivityRecord {
    pub timestamp: NaiveDateTime,
    pub app_name: String,
    pub window_title: String,
    pub category: String,
    pub duration_seconds: u64,
}

impl ActivityRecord {
    pub fn new(
        timestamp: NaiveDateTime,
        app_name: impl Into<String>,
        window_title: impl Into<String>,
        category: impl Into<String>,
        duration_seconds: u64,
    ) -> Self {
        Self {
            // Second precision only; keeps the log round-trip lossless.
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            app_name: app_name.into(),
            window_title: window_title.into(),
            category: category.into(),
            duration_seconds,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn normalized(&self) -> NormalizedCategory {
        normalize(&self.category)
    }
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}
