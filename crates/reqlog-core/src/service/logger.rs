//! Logger facade - leveled calls fanned out to the three channels
//!
//! One `Logger` is built at startup and shared as `Arc<Logger>` with every
//! producer. Logging never fails from the caller's point of view: a channel
//! that cannot be written drops the record and reports through `tracing`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::channel::{Channel, ChannelError};
use super::formatter::render;
use crate::{ChannelKind, Clock, LogConfig, LogLevel, LogRecord, Metadata, SharedClock};

/// Process-wide logging entry point
pub struct Logger {
    clock: SharedClock,
    channels: Vec<Arc<Channel>>,
    dropped: AtomicU64,
}

impl Logger {
    /// Create the channel directories and open every channel's file for today
    pub async fn init(config: LogConfig, clock: SharedClock) -> Result<Self, ChannelError> {
        let mut channels = Vec::with_capacity(ChannelKind::ALL.len());
        for kind in ChannelKind::ALL {
            channels.push(Arc::new(Channel::open(kind, &config, clock.clone()).await?));
        }

        info!(
            "[Logger] Writing access, detail and level logs under {:?}",
            config.base_dir
        );

        Ok(Self {
            clock,
            channels,
            dropped: AtomicU64::new(0),
        })
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// All channels, in `ChannelKind::ALL` order
    pub fn channels(&self) -> &[Arc<Channel>] {
        &self.channels
    }

    pub fn channel(&self, kind: ChannelKind) -> &Arc<Channel> {
        // Channels are built from ChannelKind::ALL, so the kind is always present
        let idx = ChannelKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        &self.channels[idx]
    }

    /// Number of channel writes dropped because of a channel error
    pub fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Build a record and write it to every channel that accepts its level
    pub async fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        metadata: impl Into<Option<Metadata>>,
    ) {
        let record = LogRecord::new(level, message, self.clock.now())
            .with_metadata(metadata.into().unwrap_or_default());
        self.write_record(&record).await;
    }

    /// Fan a prepared record out to its channels
    pub async fn write_record(&self, record: &LogRecord) {
        for channel in self.channels.iter().filter(|c| c.kind().accepts(record.level)) {
            let line = render(channel.kind(), record);
            if let Err(e) = channel.write(&line).await {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("[Logger] Dropped {} record: {}", record.level, e);
            }
        }
    }

    pub async fn emergency(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Emergency, message, metadata).await
    }

    pub async fn alert(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Alert, message, metadata).await
    }

    pub async fn critical(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Critical, message, metadata).await
    }

    pub async fn error(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Error, message, metadata).await
    }

    pub async fn warning(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Warning, message, metadata).await
    }

    pub async fn notice(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Notice, message, metadata).await
    }

    pub async fn info(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Info, message, metadata).await
    }

    pub async fn debug(&self, message: impl Into<String>, metadata: impl Into<Option<Metadata>>) {
        self.log(LogLevel::Debug, message, metadata).await
    }

    /// Flush and close every channel
    pub async fn shutdown(&self) {
        let closing = self.channels.iter().map(|channel| async move {
            if let Err(e) = channel.shutdown().await {
                warn!("[Logger] Failed to close {} channel: {}", channel.kind(), e);
            }
        });
        futures::future::join_all(closing).await;
        info!("[Logger] All channels closed");
    }
}
