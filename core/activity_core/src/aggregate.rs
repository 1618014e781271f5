//! Time aggregation over sampled records.
//!
//! Every record stands for one poll interval, so a category's time is
//! `count × interval`. Values are rounded to two decimals only when a summary
//! is produced.

use serde::Serialize;
use std::collections::HashMap;

use crate::category::NormalizedCategory;
use crate::record::ActivityRecord;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DailySummary {
    pub study_minutes: f64,
    pub entertainment_minutes: f64,
    pub others_minutes: f64,
    pub total_minutes: f64,
    pub study_percentage: f64,
    pub entertainment_percentage: f64,
    pub others_percentage: f64,
}

pub fn aggregate(records: &[ActivityRecord], interval_seconds: u64) -> DailySummary {
    let mut counts: HashMap<NormalizedCategory, u64> = HashMap::new();
    for r in records {
        *counts.entry(r.normalized()).or_default() += 1;
    }

    let minutes = |c: NormalizedCategory| {
        let seconds = counts.get(&c).copied().unwrap_or(0) * interval_seconds;
        seconds as f64 / 60.0
    };
    let study = minutes(NormalizedCategory::Study);
    let entertainment = minutes(NormalizedCategory::Entertainment);
    let others = minutes(NormalizedCategory::Others);
    let total = study + entertainment + others;

    let pct = |m: f64| if total > 0.0 { 100.0 * m / total } else { 0.0 };

    DailySummary {
        study_minutes: round2(study),
        entertainment_minutes: round2(entertainment),
        others_minutes: round2(others),
        total_minutes: round2(total),
        study_percentage: round2(pct(study)),
        entertainment_percentage: round2(pct(entertainment)),
        others_percentage: round2(pct(others)),
    }
}

/// Seconds per raw label, exactly as logged.
pub fn category_seconds(records: &[ActivityRecord], interval_seconds: u64) -> HashMap<String, u64> {
    let mut out: HashMap<String, u64> = HashMap::new();
    for r in records {
        *out.entry(r.category.clone()).or_default() += interval_seconds;
    }
    out
}

/// Minutes per raw label, rounded for presentation.
pub fn raw_category_minutes(
    records: &[ActivityRecord],
    interval_seconds: u64,
) -> HashMap<String, f64> {
    category_seconds(records, interval_seconds)
        .into_iter()
        .map(|(k, s)| (k, round2(s as f64 / 60.0)))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryRow {
    pub category: String,
    pub total_minutes: f64,
}

/// Per-label rows sorted by time spent, most first; ties by label.
pub fn summary_rows(records: &[ActivityRecord], interval_seconds: u64) -> Vec<CategoryRow> {
    let mut rows: Vec<(String, u64)> = category_seconds(records, interval_seconds)
        .into_iter()
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter()
        .map(|(category, seconds)| CategoryRow {
            category,
            total_minutes: round2(seconds as f64 / 60.0),
        })
        .collect()
}

/// Text report printed when the tracker stops.
pub fn summary_table(records: &[ActivityRecord], interval_seconds: u64) -> String {
    let rows = summary_rows(records, interval_seconds);
    if rows.is_empty() {
        return "No activity was tracked.".to_string();
    }

    let width = rows
        .iter()
        .map(|r| r.category.chars().count())
        .max()
        .unwrap_or(0)
        .max("Category".len());

    let mut out = format!("{:<width$}  Total Minutes\n", "Category");
    for r in &rows {
        out.push_str(&format!("{:<width$}  {:>13.2}\n", r.category, r.total_minutes));
    }
    let total: f64 = rows.iter().map(|r| r.total_minutes).sum();
    out.push_str(&format!("\nTotal Tracked Time: {total:.2} minutes"));
    out
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn records(labels: &[(&str, usize)]) -> Vec<ActivityRecord> {
        let ts = NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        labels
            .iter()
            .flat_map(|(label, n)| {
                (0..*n).map(move |_| ActivityRecord::new(ts, "app.exe", "title", *label, 5))
            })
            .collect()
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(aggregate(&[], 5), DailySummary::default());
    }

    #[test]
    fn single_category_gets_everything() {
        let rs = records(&[("gaming", 12)]);
        let s = aggregate(&rs, 5);
        assert_eq!(s.total_minutes, 1.0);
        assert_eq!(s.entertainment_minutes, 1.0);
        assert_eq!(s.entertainment_percentage, 100.0);
        assert_eq!(s.study_percentage, 0.0);
        assert_eq!(s.others_percentage, 0.0);
    }

    #[test]
    fn mixed_scenario_matches_expected_split() {
        let rs = records(&[("study", 3), ("entertainment", 2), ("other", 1)]);
        let s = aggregate(&rs, 5);
        assert_eq!(s.study_minutes, 0.25);
        assert_eq!(s.entertainment_minutes, 0.17);
        assert_eq!(s.others_minutes, 0.08);
        assert_eq!(s.total_minutes, 0.5);
        assert_eq!(s.study_percentage, 50.0);
        assert_eq!(s.entertainment_percentage, 33.33);
        assert_eq!(s.others_percentage, 16.67);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let rs = records(&[("work", 7), ("social", 5), ("Uncategorized", 11), ("news", 3)]);
        let s = aggregate(&rs, 5);
        let sum = s.study_percentage + s.entertainment_percentage + s.others_percentage;
        assert!((sum - 100.0).abs() < 0.02, "sum was {sum}");
    }

    #[test]
    fn summary_rows_sorted_by_time() {
        let rs = records(&[("study", 2), ("gaming", 6), ("other", 2)]);
        let rows = summary_rows(&rs, 5);
        let names: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(names, vec!["gaming", "other", "study"]);
        assert_eq!(rows[0].total_minutes, 0.5);
    }

    #[test]
    fn summary_table_reports_total() {
        let rs = records(&[("study", 12), ("gaming", 6)]);
        let table = summary_table(&rs, 5);
        assert!(table.starts_with("Category"));
        assert!(table.contains("study"));
        assert!(table.ends_with("Total Tracked Time: 1.50 minutes"));
        assert_eq!(summary_table(&[], 5), "No activity was tracked.");
    }

    #[test]
    fn raw_minutes_keep_original_labels() {
        let rs = records(&[("Work", 6), ("work", 6)]);
        let m = raw_category_minutes(&rs, 5);
        assert_eq!(m.get("Work"), Some(&0.5));
        assert_eq!(m.get("work"), Some(&0.5));
    }
}
