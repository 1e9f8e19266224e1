//! Size-based rotation with backup retention and optional compression.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use flate2::{Compression, write::GzEncoder};

/// Rotation thresholds and retention rules for a rolling file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationLimits {
    /// Size in bytes that triggers a rollover. `0` disables rotation.
    pub max_bytes: u64,
    /// Number of backups to keep. `0` truncates the file in place instead.
    pub max_backups: usize,
    /// Backups last modified longer ago than this are deleted after a rollover.
    pub max_age: Option<Duration>,
    /// Gzip backups as `<name>.<n>.gz`.
    pub compress: bool,
}

impl RotationLimits {
    pub const fn new(max_bytes: u64, max_backups: usize) -> Self {
        Self {
            max_bytes,
            max_backups,
            max_age: None,
            compress: false,
        }
    }

    /// Limits that never rotate.
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub const fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

impl Default for RotationLimits {
    fn default() -> Self {
        Self::disabled()
    }
}

pub(crate) struct RotationStrategy {
    path: PathBuf,
    limits: RotationLimits,
}

impl RotationStrategy {
    pub(crate) fn new(path: PathBuf, limits: RotationLimits) -> Self {
        Self { path, limits }
    }

    pub(crate) fn should_rotate(
        &self,
        writer: &BufWriter<File>,
        next_write_bytes: u64,
    ) -> io::Result<bool> {
        if self.limits.max_bytes == 0 {
            return Ok(false);
        }
        let current_file_len = writer.get_ref().metadata()?.len();
        let buffered_bytes = writer.buffer().len() as u64;
        if current_file_len + buffered_bytes == 0 {
            return Ok(false);
        }
        Ok(current_file_len + buffered_bytes + next_write_bytes > self.limits.max_bytes)
    }

    /// Move the active file to backup `1` and continue in a fresh file.
    ///
    /// Without backups the file is truncated in place. If the fresh file
    /// cannot be opened, `writer` keeps pointing at the renamed file so no
    /// output is lost.
    pub(crate) fn rotate(&self, writer: &mut BufWriter<File>) -> io::Result<()> {
        writer.flush()?;
        if self.limits.max_backups == 0 {
            let file = writer.get_mut();
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            return Ok(());
        }

        self.rotate_backups()?;
        rename_file_if_exists(&self.path, &self.backup_path(1))?;
        *writer = open_fresh_writer(&self.path)?;

        if self.limits.compress {
            self.compress_backup(1)?;
        }
        self.prune_expired(SystemTime::now())
    }

    pub(crate) fn backup_path(&self, index: usize) -> PathBuf {
        self.suffixed(&format!(".{index}"))
    }

    pub(crate) fn compressed_path(&self, index: usize) -> PathBuf {
        self.suffixed(&format!(".{index}.gz"))
    }

    fn suffixed(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|file_name| file_name.to_os_string())
            .unwrap_or_else(|| self.path.as_os_str().to_os_string());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Both on-disk spellings of backup `index`, plain first.
    fn backup_variants(&self, index: usize) -> [PathBuf; 2] {
        [self.backup_path(index), self.compressed_path(index)]
    }

    fn rotate_backups(&self) -> io::Result<()> {
        self.remove_excess_backups()?;
        for oldest in self.backup_variants(self.limits.max_backups) {
            remove_file_if_exists(&oldest)?;
        }
        self.cascade_backups()
    }

    fn remove_excess_backups(&self) -> io::Result<()> {
        let mut extra = self.limits.max_backups + 1;
        loop {
            let mut removed = false;
            for candidate in self.backup_variants(extra) {
                match fs::remove_file(&candidate) {
                    Ok(()) => removed = true,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err),
                }
            }
            if !removed {
                return Ok(());
            }
            extra += 1;
        }
    }

    fn cascade_backups(&self) -> io::Result<()> {
        for idx in (1..self.limits.max_backups).rev() {
            let plain = self.backup_path(idx);
            if plain.exists() {
                rename_file_if_exists(&plain, &self.backup_path(idx + 1))?;
            }
            let compressed = self.compressed_path(idx);
            if compressed.exists() {
                rename_file_if_exists(&compressed, &self.compressed_path(idx + 1))?;
            }
        }
        Ok(())
    }

    fn compress_backup(&self, index: usize) -> io::Result<()> {
        let src = self.backup_path(index);
        let dst = self.compressed_path(index);
        let mut input = File::open(&src)?;
        let mut encoder = GzEncoder::new(File::create(&dst)?, Compression::default());
        io::copy(&mut input, &mut encoder)?;
        encoder.finish()?.sync_all()?;
        drop(input);
        fs::remove_file(&src)
    }

    /// Delete backups whose modification time is older than `max_age`.
    pub(crate) fn prune_expired(&self, now: SystemTime) -> io::Result<()> {
        let Some(max_age) = self.limits.max_age else {
            return Ok(());
        };
        for idx in 1..=self.limits.max_backups {
            for candidate in self.backup_variants(idx) {
                let modified = match fs::metadata(&candidate).and_then(|meta| meta.modified()) {
                    Ok(modified) => modified,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                    Err(err) => return Err(err),
                };
                let age = now.duration_since(modified).unwrap_or_default();
                if age > max_age {
                    remove_file_if_exists(&candidate)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn open_append_writer(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn open_fresh_writer(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(BufWriter::new(file))
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn rename_file_if_exists(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
