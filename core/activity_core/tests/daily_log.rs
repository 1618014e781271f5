use activity_core::aggregate::aggregate;
use activity_core::daily_log::DailyLog;
use activity_core::record::ActivityRecord;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;

fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 4, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

#[test]
fn append_then_read_is_lossless() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path(), 5);

    let written = vec![
        ActivityRecord::new(at(3, 9, 0, 0), "code.exe", "main.rs - project", "work", 5),
        ActivityRecord::new(at(3, 9, 0, 5), "chrome.exe", "Search, \"quoted\" results", "study", 5),
        ActivityRecord::new(at(3, 9, 0, 10), "notepad.exe", "line one\nline two", "other", 5),
        ActivityRecord::new(at(3, 9, 0, 15), "steam.exe", "", "Uncategorized", 5),
        ActivityRecord::new(at(3, 9, 0, 20), "spotify.exe", "Café - ünïcödé", "entertainment", 5),
    ];
    for r in &written {
        log.append(r).unwrap();
    }

    let read = log.read_day(at(3, 0, 0, 0).date()).unwrap();
    assert_eq!(read.skipped, 0);
    assert_eq!(read.records, written);

    let text = fs::read_to_string(log.path_for(at(3, 0, 0, 0).date())).unwrap();
    assert!(text.starts_with("Timestamp,App Name,Window Title,Category\n"));
    assert_eq!(text.matches("Timestamp,App Name").count(), 1, "header written once");
}

#[test]
fn records_land_in_their_own_day_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path(), 5);
    log.append(&ActivityRecord::new(at(3, 23, 59, 58), "a.exe", "t", "study", 5))
        .unwrap();
    log.append(&ActivityRecord::new(at(4, 0, 0, 3), "a.exe", "t", "study", 5))
        .unwrap();

    assert_eq!(log.read_day(at(3, 0, 0, 0).date()).unwrap().records.len(), 1);
    assert_eq!(log.read_day(at(4, 0, 0, 0).date()).unwrap().records.len(), 1);
    assert_eq!(
        log.list_days().unwrap(),
        vec![at(3, 0, 0, 0).date(), at(4, 0, 0, 0).date()]
    );
}

#[test]
fn missing_day_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path().join("not-created-yet"), 5);
    let read = log.read_day(at(1, 0, 0, 0).date()).unwrap();
    assert!(read.records.is_empty());
    assert_eq!(read.skipped, 0);
    assert!(log.list_days().unwrap().is_empty());
}

#[test]
fn malformed_rows_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path(), 5);
    let day = at(5, 0, 0, 0).date();
    fs::write(
        log.path_for(day),
        "Timestamp,App Name,Window Title,Category\n\
         2026-04-05 10:00:00,code.exe,editor,study\n\
         not-a-time,code.exe,editor,study\n\
         2026-04-05 10:00:10,code.exe\n\
         \n\
         2026-04-05 10:00:15,code.exe,editor,study,extra\n\
         2026-04-05 10:00:20,game.exe,match,gaming\n",
    )
    .unwrap();

    let read = log.read_day(day).unwrap();
    assert_eq!(read.records.len(), 2);
    assert_eq!(read.skipped, 3);

    let s = aggregate(&read.records, log.interval_seconds());
    assert_eq!(s.total_minutes, 0.17);
    assert_eq!(s.study_percentage, 50.0);
    assert_eq!(s.entertainment_percentage, 50.0);
}

#[test]
fn cleanup_removes_only_old_days() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path(), 5);
    for day in [1, 10, 20] {
        log.append(&ActivityRecord::new(at(day, 12, 0, 0), "a.exe", "t", "study", 5))
            .unwrap();
    }
    fs::write(dir.path().join("unrelated.txt"), "keep me").unwrap();

    let removed = log.cleanup_older_than(10, at(20, 0, 0, 0).date()).unwrap();
    assert_eq!(removed, vec![at(1, 0, 0, 0).date()]);
    assert_eq!(
        log.list_days().unwrap(),
        vec![at(10, 0, 0, 0).date(), at(20, 0, 0, 0).date()]
    );
    assert!(dir.path().join("unrelated.txt").exists());
}

#[test]
fn cleanup_with_huge_window_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let log = DailyLog::new(dir.path(), 5);
    log.append(&ActivityRecord::new(at(1, 12, 0, 0), "a.exe", "t", "study", 5))
        .unwrap();

    let removed = log.cleanup_older_than(u32::MAX, at(20, 0, 0, 0).date()).unwrap();
    assert!(removed.is_empty());
    assert_eq!(log.list_days().unwrap(), vec![at(1, 0, 0, 0).date()]);
}
