//! Daily rotation scheduler
//!
//! Runs as a single background task that wakes at local midnight and rolls
//! every channel whose active file belongs to a previous day. Size-based
//! rollover stays inside each channel and is independent of this task.

use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::logger::Logger;
use crate::{ChannelKind, Clock, Metadata, SharedClock};

/// Wait used when the next midnight cannot be resolved (DST gaps)
const FALLBACK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of one rotation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationSummary {
    /// Channels that moved to a new day's file
    pub rotated: Vec<ChannelKind>,
    /// Archives produced by retention
    pub compressed: usize,
    /// Expired files removed by retention
    pub removed: usize,
    /// Channels whose rotation failed, with the error text
    pub failed: Vec<(ChannelKind, String)>,
}

/// Time from `now` until the next local midnight
pub fn until_next_midnight(now: DateTime<Local>) -> Duration {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .and_then(|next| (next - now).to_std().ok())
        .unwrap_or(FALLBACK_INTERVAL)
}

/// Midnight trigger that rolls channels over to the new day
pub struct RotationScheduler {
    logger: Arc<Logger>,
    clock: SharedClock,
    events: broadcast::Sender<RotationSummary>,
}

impl RotationScheduler {
    pub fn new(logger: Arc<Logger>) -> Self {
        let clock = logger.clock().clone();
        let (events, _) = broadcast::channel(16);
        Self {
            logger,
            clock,
            events,
        }
    }

    /// Receive a summary after each completed cycle
    pub fn subscribe(&self) -> broadcast::Receiver<RotationSummary> {
        self.events.subscribe()
    }

    /// Run one rotation cycle now
    ///
    /// Channels are rolled before the "Rotating logs for a new day" notice is
    /// written. Logging it first would roll the files from the write path
    /// anyway; rolling here first lets this cycle's retention report cover the
    /// finished day, and puts the notice and any failure reports in the new
    /// day's files. A failing channel never stops the others.
    pub async fn fire(&self) -> RotationSummary {
        let mut summary = RotationSummary::default();

        for channel in self.logger.channels() {
            match channel.rotate_for_new_day().await {
                Ok(Some(report)) => {
                    summary.rotated.push(channel.kind());
                    summary.compressed += report.compressed.len();
                    summary.removed += report.removed.len();
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("[Scheduler] Rotation of {} channel failed: {}", channel.kind(), e);
                    summary.failed.push((channel.kind(), e.to_string()));
                }
            }
        }

        self.logger.info("Rotating logs for a new day", None).await;
        for (kind, error) in &summary.failed {
            self.logger
                .error(
                    format!("Failed to rotate {} logs", kind),
                    Metadata::new().with("channel", kind.as_str()).with("error", error),
                )
                .await;
        }

        info!(
            "[Scheduler] Rotation complete: {} rotated, {} compressed, {} removed, {} failed",
            summary.rotated.len(),
            summary.compressed,
            summary.removed,
            summary.failed.len()
        );
        // No subscribers is fine
        let _ = self.events.send(summary.clone());
        summary
    }

    /// Start the daily loop; it stops when `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let wait = until_next_midnight(self.clock.now());
                info!("[Scheduler] Next rotation in {}s", wait.as_secs());

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("[Scheduler] Stopped");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                self.fire().await;
            }
        })
    }
}
