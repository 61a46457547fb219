//! Rotating channel sink - one file-backed destination per channel kind
//!
//! Files are named `<date> <kind>.log`, then `<date> <kind>-1.log`,
//! `<date> <kind>-2.log`, ... as the size cap is reached within a day.
//! Finalized files are gzipped and pruned once they fall outside the
//! retention window.

use chrono::{Duration, NaiveDate};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{ChannelKind, Clock, LogConfig, RotationPolicy, SharedClock};

/// Errors raised by a channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to write {channel} log {path:?}: {source}")]
    Write {
        channel: ChannelKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to rotate {channel} log in {dir:?}: {source}")]
    Rotation {
        channel: ChannelKind,
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to compress {path:?}: {source}")]
    Compression {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} channel is shut down")]
    Closed(ChannelKind),
}

/// A parsed channel file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFile {
    pub path: PathBuf,
    pub date: NaiveDate,
    pub index: u32,
    pub compressed: bool,
}

impl ChannelFile {
    fn key(&self) -> (NaiveDate, u32) {
        (self.date, self.index)
    }
}

/// Outcome of one retention sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    pub compressed: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// The file currently receiving writes
struct ActiveFile {
    date: NaiveDate,
    index: u32,
    path: PathBuf,
    file: File,
    size: u64,
}

impl ActiveFile {
    /// Take the size from disk, e.g. after a write that may have landed in part
    async fn refresh_size(&mut self) {
        match self.file.metadata().await {
            Ok(meta) => self.size = meta.len(),
            Err(e) => warn!("[Channel] Failed to read size of {:?}: {}", self.path, e),
        }
    }
}

#[derive(Default)]
struct ChannelState {
    active: Option<ActiveFile>,
    shut_down: bool,
}

/// Rotating, size- and age-bounded log destination
///
/// Writes and rotations share a single mutex, so lines never interleave and
/// size accounting stays exact under concurrent callers.
pub struct Channel {
    kind: ChannelKind,
    dir: PathBuf,
    naming: FileNaming,
    policy: RotationPolicy,
    clock: SharedClock,
    state: Mutex<ChannelState>,
    sweep_lock: Arc<Mutex<()>>,
}

impl Channel {
    /// Create the channel directory if needed and open today's file
    pub async fn open(
        kind: ChannelKind,
        config: &LogConfig,
        clock: SharedClock,
    ) -> Result<Self, ChannelError> {
        let dir = config.channel_dir(kind);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ChannelError::Rotation {
                channel: kind,
                dir: dir.clone(),
                source,
            })?;

        let channel = Self {
            kind,
            naming: FileNaming::new(kind, &config.policy.date_pattern),
            dir,
            policy: config.policy.clone(),
            clock,
            state: Mutex::new(ChannelState::default()),
            sweep_lock: Arc::new(Mutex::new(())),
        };

        let today = channel.clock.now().date_naive();
        let active = channel.open_for_date(today, None).await?;
        debug!("[Channel] {} opened {:?}", kind, active.path);
        channel.state.lock().await.active = Some(active);

        Ok(channel)
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Path of the file currently receiving writes
    pub async fn active_path(&self) -> Option<PathBuf> {
        self.state.lock().await.active.as_ref().map(|a| a.path.clone())
    }

    /// Date of the file currently receiving writes
    pub async fn active_date(&self) -> Option<NaiveDate> {
        self.state.lock().await.active.as_ref().map(|a| a.date)
    }

    /// Append `line` plus a newline
    ///
    /// Checks before writing: a day change or a write that would push the
    /// active file past the size cap starts a new file first. A record larger
    /// than the cap still lands whole in its own file.
    pub async fn write(&self, line: &str) -> Result<(), ChannelError> {
        let today = self.clock.now().date_naive();
        let mut state = self.state.lock().await;
        if state.shut_down {
            return Err(ChannelError::Closed(self.kind));
        }

        let mut rolled = false;
        let mut active = match state.active.take() {
            Some(active) if active.date == today => active,
            Some(stale) => {
                close_file(stale.file).await;
                rolled = true;
                self.open_for_date(today, None).await?
            }
            // A previous rotation failed to open its file; retry now
            None => self.open_for_date(today, None).await?,
        };

        let len = line.len() as u64 + 1;
        if active.size > 0 && active.size + len > self.policy.max_file_size {
            info!(
                "[Channel] {} reached {} bytes, starting part {}",
                self.kind,
                active.size,
                active.index + 1
            );
            let next_index = active.index + 1;
            close_file(active.file).await;
            rolled = true;
            active = self.open_for_date(today, Some(next_index)).await?;
        }

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let result = async {
            active.file.write_all(buf.as_bytes()).await?;
            active.file.flush().await
        }
        .await;
        let path = active.path.clone();
        let active_key = (active.date, active.index);
        match result {
            Ok(()) => active.size += len,
            Err(source) => {
                active.refresh_size().await;
                state.active = Some(active);
                return Err(ChannelError::Write {
                    channel: self.kind,
                    path,
                    source,
                });
            }
        }
        state.active = Some(active);
        drop(state);

        if rolled {
            // Keep archiving off the request path
            let sweep = self.sweeper();
            tokio::spawn(async move {
                if let Err(e) = sweep.run(today, active_key).await {
                    warn!("[Channel] Retention sweep failed: {}", e);
                }
            });
        }

        Ok(())
    }

    /// Close the active file and start a new one for the current date
    ///
    /// A rotation within the same day moves to the next numeric part.
    /// Retention runs before this returns.
    pub async fn rotate(&self) -> Result<RetentionReport, ChannelError> {
        self.rotate_inner(false).await.map(|r| r.unwrap_or_default())
    }

    /// Rotate only if the active file belongs to an earlier day
    ///
    /// Returns `None` when the channel was already current.
    pub async fn rotate_for_new_day(&self) -> Result<Option<RetentionReport>, ChannelError> {
        self.rotate_inner(true).await
    }

    async fn rotate_inner(
        &self,
        only_if_stale: bool,
    ) -> Result<Option<RetentionReport>, ChannelError> {
        let today = self.clock.now().date_naive();
        let mut state = self.state.lock().await;
        if state.shut_down {
            return Err(ChannelError::Closed(self.kind));
        }

        let next_index = match &state.active {
            Some(active) if active.date == today => {
                if only_if_stale {
                    return Ok(None);
                }
                Some(active.index + 1)
            }
            _ => None,
        };

        if let Some(old) = state.active.take() {
            info!("[Channel] Rotating {} log {:?}", self.kind, old.path);
            close_file(old.file).await;
        }

        let active = self.open_for_date(today, next_index).await?;
        let active_key = (active.date, active.index);
        state.active = Some(active);
        drop(state);

        self.sweeper().run(today, active_key).await.map(Some)
    }

    /// Flush and close the active file; later writes fail with `Closed`
    pub async fn shutdown(&self) -> Result<(), ChannelError> {
        let mut state = self.state.lock().await;
        state.shut_down = true;
        if let Some(mut active) = state.active.take() {
            active
                .file
                .flush()
                .await
                .map_err(|source| ChannelError::Write {
                    channel: self.kind,
                    path: active.path.clone(),
                    source,
                })?;
            close_file(active.file).await;
        }
        Ok(())
    }

    /// All files of this channel currently on disk, oldest first
    pub async fn list_files(&self) -> Result<Vec<ChannelFile>, ChannelError> {
        list_channel_files(&self.dir, &self.naming)
            .await
            .map_err(|source| ChannelError::Rotation {
                channel: self.kind,
                dir: self.dir.clone(),
                source,
            })
    }

    fn sweeper(&self) -> RetentionSweep {
        RetentionSweep {
            kind: self.kind,
            dir: self.dir.clone(),
            naming: self.naming.clone(),
            policy: self.policy.clone(),
            lock: self.sweep_lock.clone(),
        }
    }

    /// Open the file for `date`
    ///
    /// With no explicit index, resumes the highest existing part for the date.
    async fn open_for_date(
        &self,
        date: NaiveDate,
        index: Option<u32>,
    ) -> Result<ActiveFile, ChannelError> {
        let rotation_err = |source| ChannelError::Rotation {
            channel: self.kind,
            dir: self.dir.clone(),
            source,
        };

        // The directory may have been removed underneath us
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(rotation_err)?;

        let index = match index {
            Some(index) => index,
            None => {
                let existing = list_channel_files(&self.dir, &self.naming)
                    .await
                    .map_err(rotation_err)?;
                existing
                    .iter()
                    .filter(|f| f.date == date)
                    .map(|f| if f.compressed { f.index + 1 } else { f.index })
                    .max()
                    .unwrap_or(0)
            }
        };

        let path = self.dir.join(self.naming.file_name(date, index));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(rotation_err)?;
        let size = file.metadata().await.map_err(rotation_err)?.len();

        Ok(ActiveFile {
            date,
            index,
            path,
            file,
            size,
        })
    }
}

async fn close_file(mut file: File) {
    if let Err(e) = file.shutdown().await {
        warn!("[Channel] Failed to close log file: {}", e);
    }
}

/// Builds and parses channel file names
#[derive(Debug, Clone)]
pub struct FileNaming {
    kind: ChannelKind,
    date_pattern: String,
}

impl FileNaming {
    pub fn new(kind: ChannelKind, date_pattern: &str) -> Self {
        Self {
            kind,
            date_pattern: date_pattern.to_string(),
        }
    }

    /// `<date> <kind>.log` for part 0, `<date> <kind>-<n>.log` after that
    pub fn file_name(&self, date: NaiveDate, index: u32) -> String {
        let date = date.format(&self.date_pattern);
        if index == 0 {
            format!("{} {}.log", date, self.kind)
        } else {
            format!("{} {}-{}.log", date, self.kind, index)
        }
    }

    /// Parse a plain or gzipped file name belonging to this channel
    pub fn parse(&self, name: &str) -> Option<(NaiveDate, u32, bool)> {
        let (name, compressed) = match name.strip_suffix(".gz") {
            Some(stripped) => (stripped, true),
            None => (name, false),
        };
        let stem = name.strip_suffix(".log")?;
        let (date, rest) = stem.rsplit_once(' ')?;

        let index = if rest == self.kind.as_str() {
            0
        } else {
            let suffix = rest.strip_prefix(self.kind.as_str())?.strip_prefix('-')?;
            suffix.parse().ok()?
        };

        let date = NaiveDate::parse_from_str(date, &self.date_pattern).ok()?;
        Some((date, index, compressed))
    }
}

async fn list_channel_files(dir: &Path, naming: &FileNaming) -> io::Result<Vec<ChannelFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((date, index, compressed)) = naming.parse(name) {
            files.push(ChannelFile {
                path,
                date,
                index,
                compressed,
            });
        }
    }

    files.sort_by_key(|f| (f.date, f.index, f.compressed));
    Ok(files)
}

/// Compression and pruning of finalized files
///
/// Only files ordered before the active part are touched, so a sweep that
/// races with a later rotation never archives the file being written.
/// Sweeps of one channel run one at a time.
#[derive(Clone)]
struct RetentionSweep {
    kind: ChannelKind,
    dir: PathBuf,
    naming: FileNaming,
    policy: RotationPolicy,
    lock: Arc<Mutex<()>>,
}

impl RetentionSweep {
    async fn run(
        &self,
        today: NaiveDate,
        active_key: (NaiveDate, u32),
    ) -> Result<RetentionReport, ChannelError> {
        let _guard = self.lock.lock().await;
        let files = list_channel_files(&self.dir, &self.naming)
            .await
            .map_err(|source| ChannelError::Rotation {
                channel: self.kind,
                dir: self.dir.clone(),
                source,
            })?;

        let cutoff = today - Duration::days(i64::from(self.policy.max_retention_days));
        let mut report = RetentionReport::default();

        for file in files.into_iter().filter(|f| f.key() < active_key) {
            if file.date < cutoff {
                match tokio::fs::remove_file(&file.path).await {
                    Ok(()) => {
                        debug!("[Channel] Removed expired log file: {:?}", file.path);
                        report.removed.push(file.path);
                    }
                    Err(e) => warn!("[Channel] Failed to remove {:?}: {}", file.path, e),
                }
            } else if self.policy.compress && !file.compressed {
                match compress_log_file(&file.path).await {
                    Ok(gz_path) => report.compressed.push(gz_path),
                    Err(e) => warn!("[Channel] {}", e),
                }
            }
        }

        Ok(report)
    }
}

/// Gzip `path` into `path.gz` and remove the original
pub async fn compress_log_file(path: &Path) -> Result<PathBuf, ChannelError> {
    let mut gz_name = path.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);

    let src = path.to_path_buf();
    let dst = gz_path.clone();
    let compress_err = |source| ChannelError::Compression {
        path: path.to_path_buf(),
        source,
    };

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut input = std::fs::File::open(&src)?;
        let output = std::fs::File::create(&dst)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut input, &mut encoder)?;
        encoder.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| compress_err(io::Error::new(io::ErrorKind::Other, e)))?
    .map_err(compress_err)?;

    tokio::fs::remove_file(path).await.map_err(compress_err)?;

    info!("[Channel] Compressed log file: {:?} -> {:?}", path, gz_path);
    Ok(gz_path)
}
