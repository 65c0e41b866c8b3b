//! Backup service
//!
//! Exports a consistent snapshot of every entity as one JSON document and
//! imports such documents back through the import engine. Backup files are
//! written to a directory with a SHA-256 checksum and a retention policy.

use crate::config::{BACKUP_FILE_EXTENSION, BACKUP_FILE_PREFIX, DEFAULT_BACKUP_RETENTION_COUNT};
use crate::database::{rows, EntityStore, Folder, Label, Note, NoteLabel, Settings};
use crate::error::{AppError, Result};
use crate::services::import::{ImportEngine, ImportReport};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Portable snapshot of the whole store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupDocument {
    pub folders: Vec<Folder>,
    pub notes: Vec<Note>,
    pub labels: Vec<Label>,
    pub note_labels: Vec<NoteLabel>,
    pub settings: Settings,
}

impl BackupDocument {
    pub fn new(
        folders: Vec<Folder>,
        notes: Vec<Note>,
        labels: Vec<Label>,
        note_labels: Vec<NoteLabel>,
        settings: Settings,
    ) -> Self {
        Self {
            folders,
            notes,
            labels,
            note_labels,
            settings,
        }
    }
}

/// Serialize a document as pretty-printed JSON with stable field order
pub fn encode_document(document: &BackupDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Parse a document, ignoring unknown keys.
///
/// Entity arrays may be absent; `settings` may not. Errors name the
/// offending array element, e.g. `notes[3]`.
pub fn decode_document(json: &str) -> Result<BackupDocument> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| AppError::parse("BackupDocument", e))?;
    let Value::Object(mut root) = value else {
        return Err(AppError::parse(
            "BackupDocument",
            "top level must be a JSON object",
        ));
    };

    let folders = decode_array(&mut root, "folders")?;
    let notes = decode_array(&mut root, "notes")?;
    let labels = decode_array(&mut root, "labels")?;
    let note_labels = decode_array(&mut root, "noteLabels")?;
    let settings = match root.remove("settings") {
        None | Some(Value::Null) => return Err(AppError::parse("settings", "missing")),
        Some(value) => serde_json::from_value::<Settings>(value)
            .map_err(|e| AppError::parse("settings", e))?,
    };

    Ok(BackupDocument::new(
        folders,
        notes,
        labels,
        note_labels,
        settings,
    ))
}

fn decode_array<T: DeserializeOwned>(root: &mut Map<String, Value>, key: &str) -> Result<Vec<T>> {
    let items = match root.remove(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(AppError::parse(key, "expected an array")),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|e| AppError::parse(format!("{}[{}]", key, index), e))
        })
        .collect()
}

/// A backup file written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupFile {
    pub path: PathBuf,
    pub size: u64,
    pub checksum: String,
}

#[derive(Clone)]
pub struct BackupService {
    store: EntityStore,
    engine: ImportEngine,
    retention: usize,
}

impl BackupService {
    pub fn new(store: EntityStore) -> Self {
        Self {
            engine: ImportEngine::new(store.clone()),
            store,
            retention: DEFAULT_BACKUP_RETENTION_COUNT,
        }
    }

    /// Keep at most `count` backup files per directory (minimum one)
    pub fn with_retention(mut self, count: usize) -> Self {
        self.retention = count.max(1);
        self
    }

    /// Snapshot every entity in one read transaction
    pub async fn export_document(&self) -> Result<BackupDocument> {
        let mut tx = self.store.begin_snapshot().await?;
        let folders = rows::list_folders(&mut *tx).await?;
        let notes = rows::list_all_notes(&mut *tx).await?;
        let labels = rows::list_all_labels(&mut *tx).await?;
        let note_labels = rows::list_all_note_labels(&mut *tx).await?;
        let settings = rows::load_settings(&mut *tx).await?;
        tx.commit().await?;

        Ok(BackupDocument::new(
            folders,
            notes,
            labels,
            note_labels,
            settings,
        ))
    }

    pub async fn export_json(&self) -> Result<String> {
        let document = self.export_document().await?;
        encode_document(&document)
    }

    pub async fn import_json(&self, json: &str) -> Result<ImportReport> {
        let document = decode_document(json)?;
        self.engine.import(document).await
    }

    pub async fn import_file(&self, path: &Path) -> Result<ImportReport> {
        tracing::info!("Importing backup file: {:?}", path);
        let json = fs::read_to_string(path).await?;
        self.import_json(&json).await
    }

    /// Write a new backup file into `dir`, then prune old ones
    pub async fn write_backup(&self, dir: &Path) -> Result<BackupFile> {
        fs::create_dir_all(dir).await?;

        let json = self.export_json().await?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let path = dir.join(format!(
            "{}{}.{}",
            BACKUP_FILE_PREFIX, timestamp, BACKUP_FILE_EXTENSION
        ));
        fs::write(&path, json.as_bytes()).await?;

        let backup = BackupFile {
            size: json.len() as u64,
            checksum: calculate_checksum(json.as_bytes()),
            path,
        };
        tracing::info!("Backup written: {:?} ({} bytes)", backup.path, backup.size);

        self.apply_retention_policy(dir).await?;

        Ok(backup)
    }

    /// Backup files in `dir`, newest first
    pub async fn list_backups(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut backups = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_backup_file(&path) {
                backups.push(path);
            }
        }

        // Timestamps in the file names sort chronologically
        backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(backups)
    }

    async fn apply_retention_policy(&self, dir: &Path) -> Result<()> {
        let backups = self.list_backups(dir).await?;

        for path in backups.iter().skip(self.retention) {
            tracing::info!("Deleting old backup: {:?}", path);
            if let Err(e) = fs::remove_file(path).await {
                tracing::warn!("Failed to delete backup file {:?}: {}", path, e);
            }
        }

        Ok(())
    }
}

fn is_backup_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with(BACKUP_FILE_PREFIX)
        && path.extension().and_then(|e| e.to_str()) == Some(BACKUP_FILE_EXTENSION)
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
