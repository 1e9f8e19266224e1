//! Rolling file sink.
//!
//! [`RollingWriter`] owns the file handle and the rotation strategy;
//! [`RollingFileSink`] pairs it with the configuration it was opened from
//! and delegates all I/O to it.

use std::{
    any::Any,
    env, fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use delegate::delegate;
use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::strategy::{RotationLimits, RotationStrategy, open_append_writer};
use crate::sink::{SinkError, TetherSinkTrait};

const BYTES_PER_MB: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Settings accepted by the `rolling_file` registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollingFileConfig {
    pub filename: PathBuf,
    /// Rotate once the file would grow past this many mebibytes.
    pub max_size_mb: u64,
    pub max_backups: usize,
    /// Delete backups older than this many days. `0` keeps them forever.
    pub max_age_days: u64,
    pub compress: bool,
}

impl Default for RollingFileConfig {
    fn default() -> Self {
        Self {
            filename: default_log_path(),
            max_size_mb: 500,
            max_backups: 3,
            max_age_days: 30,
            compress: true,
        }
    }
}

impl RollingFileConfig {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    pub fn limits(&self) -> RotationLimits {
        let limits = RotationLimits::new(
            self.max_size_mb.saturating_mul(BYTES_PER_MB),
            self.max_backups,
        )
        .with_compression(self.compress);
        if self.max_age_days == 0 {
            limits
        } else {
            limits.with_max_age(Duration::from_secs(
                self.max_age_days.saturating_mul(SECONDS_PER_DAY),
            ))
        }
    }
}

/// `<program>.log` in the system temporary directory.
pub fn default_log_path() -> PathBuf {
    let program = env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "tetherlog".to_owned());
    env::temp_dir().join(format!("{program}.log"))
}

struct WriterState {
    writer: BufWriter<File>,
    strategy: RotationStrategy,
}

/// Appending file writer that rolls over by size.
pub struct RollingWriter {
    path: PathBuf,
    state: Mutex<Option<WriterState>>,
}

impl RollingWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl Into<PathBuf>, limits: RotationLimits) -> std::io::Result<Self> {
        let path = path.into();
        let writer = open_append_writer(&path)?;
        let strategy = RotationStrategy::new(path.clone(), limits);
        Ok(Self {
            path,
            state: Mutex::new(Some(WriterState { writer, strategy })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize, SinkError> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(SinkError::Closed)?;
        if state.strategy.should_rotate(&state.writer, buf.len() as u64)?
            && let Err(err) = state.strategy.rotate(&mut state.writer)
        {
            warn!(
                target: "tetherlog::rolling_file",
                "rotation of {} failed: {err}",
                self.path.display()
            );
        }
        state.writer.write_all(buf)?;
        Ok(buf.len())
    }

    pub fn flush(&self) -> Result<(), SinkError> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(SinkError::Closed)?;
        state.writer.flush()?;
        Ok(())
    }

    pub fn close(&self) -> Result<(), SinkError> {
        let state = self.state.lock().take().ok_or(SinkError::AlreadyClosed)?;
        let file = state
            .writer
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))?;
        file.sync_all()?;
        Ok(())
    }
}

/// Sink appending to a file that rotates by size.
///
/// Each [`duplicate`](TetherSinkTrait::duplicate) opens its own handle on
/// the same path.
pub struct RollingFileSink {
    writer: RollingWriter,
    config: RollingFileConfig,
    limits: RotationLimits,
}

impl RollingFileSink {
    pub fn open(config: RollingFileConfig) -> std::io::Result<Self> {
        let limits = config.limits();
        let writer = RollingWriter::open(config.filename.clone(), limits)?;
        Ok(Self {
            writer,
            config,
            limits,
        })
    }

    /// Sink with explicit limits, bypassing the megabyte and day units of
    /// [`RollingFileConfig`].
    pub fn with_limits(path: impl Into<PathBuf>, limits: RotationLimits) -> std::io::Result<Self> {
        let path = path.into();
        let writer = RollingWriter::open(path.clone(), limits)?;
        Ok(Self {
            writer,
            config: RollingFileConfig::new(path),
            limits,
        })
    }

    pub fn config(&self) -> &RollingFileConfig {
        &self.config
    }

    pub fn limits(&self) -> RotationLimits {
        self.limits
    }

    delegate! {
        to self.writer {
            pub fn path(&self) -> &Path;
        }
    }
}

impl TetherSinkTrait for RollingFileSink {
    delegate! {
        to self.writer {
            fn write(&self, buf: &[u8]) -> Result<usize, SinkError>;
            fn flush(&self) -> Result<(), SinkError>;
            fn close(&self) -> Result<(), SinkError>;
        }
    }

    fn duplicate(&self) -> Option<Arc<dyn TetherSinkTrait>> {
        match RollingWriter::open(self.path().to_path_buf(), self.limits) {
            Ok(writer) => Some(Arc::new(Self {
                writer,
                config: self.config.clone(),
                limits: self.limits,
            })),
            Err(err) => {
                warn!(
                    target: "tetherlog::rolling_file",
                    "failed to reopen {}: {err}",
                    self.path().display()
                );
                None
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for RollingFileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingFileSink")
            .field("path", &self.path())
            .field("limits", &self.limits)
            .finish()
    }
}

impl Drop for RollingWriter {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.lock().take()
            && let Err(err) = state.writer.flush()
        {
            warn!(
                target: "tetherlog::rolling_file",
                "failed to flush {} on drop: {err}",
                self.path.display()
            );
        }
    }
}
