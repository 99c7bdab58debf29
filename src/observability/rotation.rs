//! Size-bounded rolling log file.
//!
//! # Responsibilities
//! - Append log lines to the active file, opening it lazily
//! - Rotate when a write would push the file past its size limit
//! - Prune rotated files by count and age, optionally gzipping survivors
//!
//! # Naming
//! ```text
//! logs/access.log                              active file
//! logs/access-2024-05-01T10-15-30.120.log      rotated backup
//! logs/access-2024-04-30T08-00-00.004.log.gz   compressed backup
//! ```
//!
//! # Design Decisions
//! - Implements `std::io::Write` so it can sit behind `tracing_appender::non_blocking`;
//!   the appender worker thread is the only writer, so no locking happens here
//! - Pruning failures never fail the write that triggered them

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeDelta, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::LogFileConfig;

const MEGABYTE: u64 = 1024 * 1024;
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const COMPRESS_SUFFIX: &str = ".gz";

/// A log file that rotates itself by size and prunes its backups.
#[derive(Debug)]
pub struct RollingFile {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    max_age: Option<TimeDelta>,
    compress: bool,
    local_time: bool,
    file: Option<File>,
    size: u64,
}

/// A rotated file found next to the active log.
#[derive(Debug, Clone)]
struct Backup {
    path: PathBuf,
    timestamp: NaiveDateTime,
    compressed: bool,
}

impl Backup {
    /// Name with any compression suffix removed, so `x.log` and `x.log.gz` count once.
    fn base_name(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.strip_suffix(COMPRESS_SUFFIX)
            .map(str::to_string)
            .unwrap_or(name)
    }
}

impl RollingFile {
    /// Create a rolling file from a rotation policy. Nothing is opened until the first write.
    pub fn new(config: &LogFileConfig) -> Self {
        let max_size_mb = if config.max_size_mb == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            config.max_size_mb
        };
        let max_age = match config.max_age_days {
            0 => None,
            days => i64::try_from(days).ok().and_then(TimeDelta::try_days),
        };

        Self {
            path: config.path.clone(),
            max_bytes: max_size_mb.saturating_mul(MEGABYTE),
            max_backups: config.max_backups,
            max_age,
            compress: config.compress,
            local_time: config.local_time,
            file: None,
            size: 0,
        }
    }

    #[cfg(test)]
    fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the active file and start a new one, archiving the old contents.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        self.open_new()?;
        let _ = self.prune();
        Ok(())
    }

    fn open_existing_or_new(&mut self, write_len: u64) -> io::Result<()> {
        let _ = self.prune();

        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.open_new(),
            Err(e) => return Err(e),
        };

        if meta.len() + write_len >= self.max_bytes {
            return self.rotate();
        }

        match OpenOptions::new().append(true).open(&self.path) {
            Ok(file) => {
                self.file = Some(file);
                self.size = meta.len();
                Ok(())
            }
            // Unreadable leftovers are archived rather than appended to.
            Err(_) => self.open_new(),
        }
    }

    fn open_new(&mut self) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        if self.path.exists() {
            fs::rename(&self.path, self.backup_path())?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = Some(file);
        self.size = 0;
        Ok(())
    }

    fn now(&self) -> NaiveDateTime {
        if self.local_time {
            Local::now().naive_local()
        } else {
            Utc::now().naive_utc()
        }
    }

    /// `(prefix, extension)` used to build and recognise backup names.
    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (format!("{}-", stem), ext)
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// A backup name not yet taken, plain or compressed. Rotations within the
    /// same millisecond step the timestamp forward.
    fn backup_path(&self) -> PathBuf {
        let (prefix, ext) = self.name_parts();
        let mut timestamp = self.now();
        loop {
            let name = format!("{}{}{}", prefix, timestamp.format(BACKUP_TIME_FORMAT), ext);
            let path = self.dir().join(&name);
            let compressed = self.dir().join(format!("{}{}", name, COMPRESS_SUFFIX));
            if !path.exists() && !compressed.exists() {
                return path;
            }
            timestamp += TimeDelta::milliseconds(1);
        }
    }

    /// Rotated files next to the active log, newest first.
    fn backups(&self) -> io::Result<Vec<Backup>> {
        let (prefix, ext) = self.name_parts();
        let compressed_ext = format!("{}{}", ext, COMPRESS_SUFFIX);
        let mut backups = Vec::new();

        for entry in fs::read_dir(self.dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };

            let (stamp, compressed) = if let Some(stamp) = rest.strip_suffix(&compressed_ext) {
                (stamp, true)
            } else if let Some(stamp) = rest.strip_suffix(&ext) {
                (stamp, false)
            } else {
                continue;
            };

            if let Ok(timestamp) = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT) {
                backups.push(Backup {
                    path: entry.path(),
                    timestamp,
                    compressed,
                });
            }
        }

        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(backups)
    }

    /// Apply the count, age and compression rules to existing backups.
    pub fn prune(&self) -> io::Result<()> {
        if self.max_backups == 0 && self.max_age.is_none() && !self.compress {
            return Ok(());
        }

        let mut remaining = self.backups()?;
        let mut remove = Vec::new();

        if self.max_backups > 0 && remaining.len() > self.max_backups {
            let mut preserved = HashSet::new();
            let mut kept = Vec::new();
            for backup in remaining {
                preserved.insert(backup.base_name());
                if preserved.len() > self.max_backups {
                    remove.push(backup);
                } else {
                    kept.push(backup);
                }
            }
            remaining = kept;
        }

        if let Some(max_age) = self.max_age {
            let cutoff = self.now() - max_age;
            let (expired, kept): (Vec<_>, Vec<_>) =
                remaining.into_iter().partition(|b| b.timestamp < cutoff);
            remove.extend(expired);
            remaining = kept;
        }

        for backup in &remove {
            fs::remove_file(&backup.path)?;
        }

        if self.compress {
            for backup in remaining.iter().filter(|b| !b.compressed) {
                compress_file(&backup.path)?;
            }
        }

        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let write_len = buf.len() as u64;
        if write_len > self.max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write length {} exceeds maximum file size {}",
                    write_len, self.max_bytes
                ),
            ));
        }

        if self.file.is_none() {
            self.open_existing_or_new(write_len)?;
        }

        if self.size + write_len > self.max_bytes {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "log file is not open"))?;
        let written = file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Gzip `path` into `path.gz` and remove the original.
fn compress_file(path: &Path) -> io::Result<()> {
    let mut source = File::open(path)?;
    let mut target = path.as_os_str().to_owned();
    target.push(COMPRESS_SUFFIX);

    let mut encoder = GzEncoder::new(File::create(&target)?, Compression::default());
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?.sync_all()?;

    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn policy(dir: &Path) -> LogFileConfig {
        LogFileConfig {
            path: dir.join("access.log"),
            max_size_mb: 1,
            max_backups: 0,
            max_age_days: 0,
            compress: false,
            local_time: false,
        }
    }

    fn backup_name(age: TimeDelta) -> String {
        let stamp = (Utc::now().naive_utc() - age).format(BACKUP_TIME_FORMAT);
        format!("access-{}.log", stamp)
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn opens_lazily_and_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = policy(dir.path());

        let file = RollingFile::new(&config);
        assert!(!file.path().exists());
        drop(file);

        let mut first = RollingFile::new(&config);
        first.write_all(b"first\n").unwrap();
        drop(first);

        let mut second = RollingFile::new(&config);
        second.write_all(b"second\n").unwrap();
        second.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("access.log")).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = policy(dir.path());
        config.path = dir.path().join("nested/deeper/access.log");

        let mut file = RollingFile::new(&config);
        file.write_all(b"line\n").unwrap();

        assert!(dir.path().join("nested/deeper/access.log").exists());
    }

    #[test]
    fn rotates_when_write_would_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::new(&policy(dir.path())).with_max_bytes(10);

        file.write_all(b"12345678\n").unwrap();
        file.write_all(b"abcdef\n").unwrap();
        file.flush().unwrap();

        let active = fs::read_to_string(dir.path().join("access.log")).unwrap();
        assert_eq!(active, "abcdef\n");

        let backups = file.backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0].path).unwrap(), "12345678\n");
    }

    #[test]
    fn rapid_rotations_keep_every_backup() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::new(&policy(dir.path())).with_max_bytes(10);

        for line in ["line-one\n", "line-two\n", "line-3!!\n", "line-4!!\n", "last\n"] {
            file.write_all(line.as_bytes()).unwrap();
        }
        file.flush().unwrap();

        let backups = file.backups().unwrap();
        assert_eq!(backups.len(), 4);
        let mut archived: Vec<String> = backups
            .iter()
            .map(|b| fs::read_to_string(&b.path).unwrap())
            .collect();
        archived.sort();
        assert_eq!(archived, ["line-3!!\n", "line-4!!\n", "line-one\n", "line-two\n"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("access.log")).unwrap(),
            "last\n"
        );
    }

    #[test]
    fn rejects_writes_larger_than_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::new(&policy(dir.path())).with_max_bytes(4);

        let err = file.write(b"too long").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_size_uses_default_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = policy(dir.path());
        config.max_size_mb = 0;

        let file = RollingFile::new(&config);
        assert_eq!(file.max_bytes, DEFAULT_MAX_SIZE_MB * MEGABYTE);
    }

    #[test]
    fn keeps_only_newest_backups() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = policy(dir.path());
        config.max_backups = 2;

        let newest = backup_name(TimeDelta::try_minutes(1).unwrap());
        let middle = backup_name(TimeDelta::try_minutes(2).unwrap());
        let old = backup_name(TimeDelta::try_minutes(3).unwrap());
        let oldest = backup_name(TimeDelta::try_minutes(4).unwrap());
        for name in [&newest, &middle, &old, &oldest] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        RollingFile::new(&config).prune().unwrap();

        let mut expected = vec![newest, middle];
        expected.sort();
        assert_eq!(names_in(dir.path()), expected);
    }

    #[test]
    fn removes_expired_backups() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = policy(dir.path());
        config.max_age_days = 1;

        let fresh = backup_name(TimeDelta::try_hours(2).unwrap());
        let stale = backup_name(TimeDelta::try_days(3).unwrap());
        fs::write(dir.path().join(&fresh), "x").unwrap();
        fs::write(dir.path().join(&stale), "x").unwrap();

        RollingFile::new(&config).prune().unwrap();

        assert_eq!(names_in(dir.path()), vec![fresh]);
    }

    #[test]
    fn compresses_remaining_backups() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = policy(dir.path());
        config.compress = true;

        let name = backup_name(TimeDelta::try_minutes(5).unwrap());
        fs::write(dir.path().join(&name), "archived line\n").unwrap();

        RollingFile::new(&config).prune().unwrap();

        let gz_name = format!("{}.gz", name);
        assert_eq!(names_in(dir.path()), vec![gz_name.clone()]);

        let mut decoded = String::new();
        GzDecoder::new(File::open(dir.path().join(gz_name)).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "archived line\n");
    }

    #[test]
    fn leaves_unrelated_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = policy(dir.path());
        config.max_backups = 1;
        config.max_age_days = 1;

        fs::write(dir.path().join("access.log"), "active").unwrap();
        fs::write(dir.path().join("access-notes.log"), "x").unwrap();
        fs::write(dir.path().join("other-2020-01-01T00-00-00.000.log"), "x").unwrap();

        RollingFile::new(&config).prune().unwrap();

        assert_eq!(
            names_in(dir.path()),
            vec![
                "access-notes.log".to_string(),
                "access.log".to_string(),
                "other-2020-01-01T00-00-00.000.log".to_string(),
            ]
        );
    }
}
