use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};
use walletbook_core::{storage::KeyValueStore, CoreError};

const FILE_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// Directory layout used by [`JsonFileStore`].
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub data_root: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    /// `<base>/data` and `<base>/backups`.
    pub fn under(base: &Path) -> Self {
        Self {
            data_root: base.join("data"),
            backup_root: base.join("backups"),
        }
    }
}

/// One snapshot directory under the backup root.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
    pub file_count: usize,
}

/// Filesystem-backed key/value store: every key lives in its own JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    paths: StoragePaths,
    retention: usize,
}

impl JsonFileStore {
    pub fn new(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> Result<Self, CoreError> {
        fs::create_dir_all(&paths.data_root)?;
        fs::create_dir_all(&paths.backup_root)?;
        Ok(Self {
            paths,
            retention: retention.max(1),
        })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn key_path(&self, key: &str) -> PathBuf {
        self.paths
            .data_root
            .join(format!("{}.{}", canonical_key(key), FILE_EXTENSION))
    }

    /// Newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        let root = &self.paths.backup_root;
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            entries.push(BackupInfo {
                id: id.to_string(),
                created_at: parse_backup_timestamp(id),
                file_count: json_files(&path)?.len(),
                path: path.clone(),
            });
        }
        entries.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    /// Replaces every stored key with the contents of backup `id`.
    pub fn restore_backup(&self, id: &str) -> Result<BackupInfo, CoreError> {
        let info = self
            .list_backups()?
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| CoreError::Storage(format!("backup `{}` not found", id)))?;
        for current in json_files(&self.paths.data_root)? {
            fs::remove_file(current)?;
        }
        for source in json_files(&info.path)? {
            if let Some(name) = source.file_name() {
                let target = self.paths.data_root.join(name);
                let tmp = tmp_path(&target);
                fs::copy(&source, &tmp)?;
                fs::rename(&tmp, &target)?;
            }
        }
        info!(backup = %info.id, files = info.file_count, "backup restored");
        Ok(info)
    }

    /// Removes backup `id`. Unknown ids are a no-op.
    pub fn delete_backup(&self, id: &str) -> Result<(), CoreError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(CoreError::Storage(format!("`{}` is not a backup id", id)));
        }
        let path = self.paths.backup_root.join(id);
        if path.is_dir() {
            fs::remove_dir_all(path)?;
            info!(backup = id, "backup deleted");
        }
        Ok(())
    }

    fn next_backup_dir(&self, note: Option<&str>) -> PathBuf {
        let mut stem = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let mut candidate = self.paths.backup_root.join(&stem);
        let mut counter = 2;
        while candidate.exists() {
            candidate = self.paths.backup_root.join(format!("{}-{}", stem, counter));
            counter += 1;
        }
        candidate
    }

    fn prune_backups(&self) -> Result<(), CoreError> {
        for entry in self.list_backups()?.into_iter().skip(self.retention) {
            if let Err(err) = fs::remove_dir_all(&entry.path) {
                warn!(backup = %entry.id, error = %err, "failed to prune backup");
            }
        }
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let path = self.key_path(key);
        let tmp = tmp_path(&path);
        write_atomic(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(key, bytes = value.len(), "key written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CoreError> {
        let mut keys: Vec<String> = json_files(&self.paths.data_root)?
            .iter()
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn backup(&self, note: Option<&str>) -> Result<Option<String>, CoreError> {
        let dir = self.next_backup_dir(note);
        fs::create_dir_all(&dir)?;
        let files = json_files(&self.paths.data_root)?;
        for source in &files {
            if let Some(name) = source.file_name() {
                fs::copy(source, dir.join(name))?;
            }
        }
        self.prune_backups()?;
        let id = dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| CoreError::Storage("backup directory has no name".into()))?;
        info!(backup = %id, files = files.len(), "backup created");
        Ok(Some(id))
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(FILE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Keys become file stems: lowercase ASCII alphanumerics, `.` and `-` survive.
fn canonical_key(key: &str) -> String {
    let sanitized: String = key
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches(|c| c == '_' || c == '.').is_empty() {
        "unnamed".into()
    } else {
        sanitized
    }
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Reads the `YYYYMMDD_HHMMSS` prefix of a backup id.
fn parse_backup_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let mut segments = id.split('_');
    let date = segments.next()?;
    let time = segments.next()?;
    let time = time.split('-').next()?;
    if !is_digits(date, 8) || !is_digits(time, 6) {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{}{}", date, time), "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
