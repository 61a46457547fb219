//! Logging configuration

use std::path::{Path, PathBuf};

use super::ChannelKind;

/// 200 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 200 * 1024 * 1024;

pub const DEFAULT_RETENTION_DAYS: u32 = 14;

/// `DD-MM-YYYY`
pub const DEFAULT_DATE_PATTERN: &str = "%d-%m-%Y";

/// Per-channel rotation policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Maximum file size before a numeric-suffixed file is started (bytes)
    pub max_file_size: u64,

    /// Files dated further back than this are pruned
    pub max_retention_days: u32,

    /// Gzip finalized files on rotation
    pub compress: bool,

    /// chrono format for the date part of file names
    pub date_pattern: String,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_retention_days: DEFAULT_RETENTION_DAYS,
            compress: true,
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
        }
    }
}

/// Configuration for the logging pipeline
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base directory; each channel writes to `<base_dir>/<channel>`
    pub base_dir: PathBuf,

    /// Policy applied to every channel
    pub policy: RotationPolicy,
}

impl LogConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            policy: RotationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn channel_dir(&self, kind: ChannelKind) -> PathBuf {
        channel_dir(&self.base_dir, kind)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("logs")
    }
}

pub fn channel_dir(base_dir: &Path, kind: ChannelKind) -> PathBuf {
    base_dir.join(kind.as_str())
}
