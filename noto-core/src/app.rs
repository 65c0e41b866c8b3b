//! Application state and initialization
//!
//! Builds the entity store and every repository and service on top of it.

use crate::config::{BACKUPS_DIR_NAME, DATABASE_FILE_NAME};
use crate::database::{create_memory_pool, create_pool, EntityStore};
use crate::error::Result;
use crate::repositories::{
    FolderRepository, LabelRepository, NoteLabelRepository, NoteRepository, SettingsRepository,
};
use crate::services::BackupService;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// Central application state holding all repositories and services
#[derive(Clone)]
pub struct AppState {
    pub store: EntityStore,
    pub folders: FolderRepository,
    pub notes: NoteRepository,
    pub labels: LabelRepository,
    pub note_labels: NoteLabelRepository,
    pub settings: SettingsRepository,
    pub backup: BackupService,
}

impl AppState {
    /// Open (or create) the store kept in `data_dir`
    pub async fn initialize(data_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing data layer in {:?}", data_dir);

        std::fs::create_dir_all(data_dir)?;
        std::fs::create_dir_all(data_dir.join(BACKUPS_DIR_NAME))?;

        let pool = create_pool(&data_dir.join(DATABASE_FILE_NAME)).await?;
        Ok(Self::with_pool(pool))
    }

    /// State over a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let pool = create_memory_pool().await?;
        Ok(Self::with_pool(pool))
    }

    fn with_pool(pool: SqlitePool) -> Self {
        let store = EntityStore::new(pool);

        Self {
            folders: FolderRepository::new(store.clone()),
            notes: NoteRepository::new(store.clone()),
            labels: LabelRepository::new(store.clone()),
            note_labels: NoteLabelRepository::new(store.clone()),
            settings: SettingsRepository::new(store.clone()),
            backup: BackupService::new(store.clone()),
            store,
        }
    }
}

/// Default backups directory under a data directory
pub fn backups_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(BACKUPS_DIR_NAME)
}
