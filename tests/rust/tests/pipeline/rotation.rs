//! Rotation by size and by day, and retention of old files

use chrono::{Local, TimeZone};
use flate2::read::GzDecoder;
use pretty_assertions::assert_eq;
use reqlog_core::{ChannelKind, RotationPolicy, RotationScheduler};
use std::io::Read;
use std::path::Path;
use tests::fixtures::{read_lines, TestLogger};
use tests::lines::without_timestamp;
use tokio_util::sync::CancellationToken;

fn gunzip(path: &Path) -> String {
    let file = std::fs::File::open(path).expect("archive exists");
    let mut out = String::new();
    GzDecoder::new(file)
        .read_to_string(&mut out)
        .expect("valid gzip");
    out
}

fn midnight_29th() -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2024, 8, 29, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn test_size_rotation_numbers_parts() {
    // Each line is 35 bytes with its newline, so two fit under the cap
    let t = TestLogger::with_policy(RotationPolicy {
        max_file_size: 100,
        compress: false,
        ..RotationPolicy::default()
    })
    .await;

    for i in 0..10 {
        t.logger.info(format!("line {:02}", i), None).await;
    }

    assert_eq!(
        t.file_names(ChannelKind::Level),
        vec![
            "28-08-2024 level-1.log",
            "28-08-2024 level-2.log",
            "28-08-2024 level-3.log",
            "28-08-2024 level-4.log",
            "28-08-2024 level.log",
        ]
    );

    let mut all = Vec::new();
    for index in 0..5 {
        let name = match index {
            0 => "28-08-2024 level.log".to_string(),
            n => format!("28-08-2024 level-{}.log", n),
        };
        let lines = read_lines(&t.base_dir().join("level").join(&name));
        assert_eq!(lines.len(), 2, "{} should hold two lines", name);
        all.extend(lines);
    }
    let messages: Vec<&str> = all.iter().map(|l| without_timestamp(l)).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("INFO: line {:02}", i)).collect();
    assert_eq!(messages, expected);
}

#[tokio::test]
async fn test_scheduler_rolls_all_channels_at_midnight() {
    let t = TestLogger::new().await;
    t.logger.info("late request", None).await;

    t.clock.set(midnight_29th());
    let scheduler = RotationScheduler::new(t.logger.clone());
    let summary = scheduler.fire().await;

    assert_eq!(summary.rotated, ChannelKind::ALL.to_vec());
    assert!(summary.failed.is_empty());
    assert_eq!(summary.compressed, 3);

    for kind in ChannelKind::ALL {
        let names = t.file_names(kind);
        assert_eq!(
            names,
            vec![
                format!("28-08-2024 {}.log.gz", kind),
                format!("29-08-2024 {}.log", kind),
            ]
        );

        let archived = gunzip(&t.base_dir().join(kind.as_str()).join(&names[0]));
        assert_eq!(archived, "28/08/2024, 10:00:00 INFO: late request\n");

        assert_eq!(
            t.lines(kind).await,
            vec!["29/08/2024, 00:00:00 INFO: Rotating logs for a new day"]
        );
    }
}

#[tokio::test]
async fn test_scheduler_is_noop_on_current_day() {
    let t = TestLogger::new().await;

    let summary = RotationScheduler::new(t.logger.clone()).fire().await;

    assert!(summary.rotated.is_empty());
    assert_eq!(summary.compressed, 0);
    assert_eq!(
        t.file_names(ChannelKind::Access),
        vec!["28-08-2024 access.log"]
    );
}

#[tokio::test]
async fn test_write_after_midnight_opens_new_file() {
    let t = TestLogger::new().await;
    t.logger.info("before midnight", None).await;

    // No scheduler: the write path notices the new day by itself
    t.clock.set(midnight_29th());
    t.logger.info("after midnight", None).await;

    let path = t
        .logger
        .channel(ChannelKind::Access)
        .active_path()
        .await
        .expect("active file");
    assert!(path.ends_with("29-08-2024 access.log"));
    assert_eq!(
        t.lines(ChannelKind::Access).await,
        vec!["29/08/2024, 00:00:00 INFO: after midnight"]
    );
    assert!(t
        .file_names(ChannelKind::Access)
        .iter()
        .any(|name| name.starts_with("28-08-2024 access.log")));
}

#[tokio::test]
async fn test_retention_removes_expired_and_compresses_recent() {
    let t = TestLogger::new().await;
    let level_dir = t.base_dir().join("level");
    std::fs::write(level_dir.join("01-08-2024 level.log"), "old\n").unwrap();
    std::fs::write(level_dir.join("02-08-2024 level-1.log.gz"), "old archive").unwrap();
    std::fs::write(level_dir.join("20-08-2024 level.log"), "recent\n").unwrap();
    std::fs::write(level_dir.join("notes.txt"), "not a log").unwrap();

    t.clock.set(midnight_29th());
    let summary = RotationScheduler::new(t.logger.clone()).fire().await;

    assert_eq!(summary.removed, 2);
    // Three previous-day files plus the recent level file
    assert_eq!(summary.compressed, 4);
    assert_eq!(
        t.file_names(ChannelKind::Level),
        vec![
            "20-08-2024 level.log.gz",
            "28-08-2024 level.log.gz",
            "29-08-2024 level.log",
            "notes.txt",
        ]
    );
    assert_eq!(gunzip(&level_dir.join("20-08-2024 level.log.gz")), "recent\n");
}

#[tokio::test(start_paused = true)]
async fn test_spawned_scheduler_fires_at_midnight() {
    let t = TestLogger::new().await;
    let scheduler = RotationScheduler::new(t.logger.clone());
    let mut events = scheduler.subscribe();
    let cancel = CancellationToken::new();
    let handle = scheduler.spawn(cancel.clone());

    // The loop sleeps on tokio time; move the wall clock first so the fired
    // cycle sees the new day
    t.clock.set(midnight_29th());
    tokio::time::advance(std::time::Duration::from_secs(14 * 60 * 60 + 1)).await;

    let summary = events.recv().await.expect("summary");
    assert_eq!(summary.rotated.len(), 3);

    cancel.cancel();
    handle.await.expect("scheduler task");
}

#[tokio::test]
async fn test_failed_rotation_is_reported_and_scheduler_keeps_going() {
    let t = TestLogger::new().await;
    let level_dir = t.base_dir().join("level");
    std::fs::remove_dir_all(&level_dir).unwrap();
    std::fs::write(&level_dir, "not a directory").unwrap();

    t.clock.set(midnight_29th());
    let scheduler = RotationScheduler::new(t.logger.clone());
    let summary = scheduler.fire().await;

    assert_eq!(summary.rotated, vec![ChannelKind::Access, ChannelKind::Detail]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, ChannelKind::Level);

    for kind in [ChannelKind::Access, ChannelKind::Detail] {
        let messages: Vec<String> = t
            .lines(kind)
            .await
            .iter()
            .map(|l| {
                let line = without_timestamp(l);
                line.split(" | ").next().unwrap_or(line).to_string()
            })
            .collect();
        assert_eq!(
            messages,
            vec![
                "INFO: Rotating logs for a new day",
                "ERROR: Failed to rotate level logs",
            ]
        );
    }
    let detail = t.lines(ChannelKind::Detail).await;
    let report = tests::lines::detail_metadata(&detail[1]).expect("failure metadata");
    assert_eq!(report["channel"], "level");
    assert!(t.logger.dropped_writes() > 0);

    // Still blocked: the next cycle reports again
    let summary = scheduler.fire().await;
    assert!(summary.rotated.is_empty());
    assert_eq!(summary.failed.len(), 1);

    // Once the path is free the level channel comes back
    std::fs::remove_file(&level_dir).unwrap();
    let summary = scheduler.fire().await;
    assert_eq!(summary.rotated, vec![ChannelKind::Level]);
    assert!(summary.failed.is_empty());
    assert_eq!(
        t.lines(ChannelKind::Level).await,
        vec!["29/08/2024, 00:00:00 INFO: Rotating logs for a new day"]
    );
}
