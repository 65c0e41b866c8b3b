//! Folder repository
//!
//! Owns the general-folder rules: it cannot be created twice, loses no
//! flag on update, and can never be deleted.

use super::ensure_unsaved;
use crate::config::GENERAL_FOLDER_ID;
use crate::database::{rows, EntityStore, Folder, Subscription, Table, TableSet};
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct FolderRepository {
    store: EntityStore,
}

impl FolderRepository {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// All folders ordered by title
    pub async fn list(&self) -> Result<Subscription<Vec<Folder>>> {
        self.store
            .subscribe(TableSet::of(&[Table::Folders]), |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::list_folders(&mut conn).await
            })
            .await
    }

    /// One folder; the stream yields `None` once the folder is deleted
    pub async fn get(&self, id: i64) -> Result<Subscription<Option<Folder>>> {
        let subscription = self
            .store
            .subscribe(TableSet::of(&[Table::Folders]), move |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::fetch_folder(&mut conn, id).await
            })
            .await?;

        if subscription.current().is_none() {
            return Err(AppError::not_found("Folder", id));
        }
        Ok(subscription)
    }

    /// The live general folder
    pub async fn general(&self) -> Result<Folder> {
        let mut conn = self.store.read().await?;
        rows::fetch_folder(&mut conn, GENERAL_FOLDER_ID)
            .await?
            .ok_or_else(|| AppError::not_found("Folder", GENERAL_FOLDER_ID))
    }

    pub async fn create(&self, folder: &Folder) -> Result<i64> {
        ensure_unsaved("Folder", folder.id)?;
        if folder.is_general {
            return Err(AppError::InvalidArgument(
                "the general folder already exists".to_string(),
            ));
        }

        tracing::info!("Creating folder: {}", folder.title);

        let mut txn = self.store.begin_write().await?;
        let id = rows::insert_folder(txn.conn(), folder).await?;
        txn.touch(Table::Folders);
        txn.commit().await?;

        tracing::info!("Folder created: {}", id);
        Ok(id)
    }

    /// Replace a folder's mutable fields. The general flag is not writable.
    pub async fn update(&self, folder: &Folder) -> Result<()> {
        tracing::debug!("Updating folder: {}", folder.id);

        let mut txn = self.store.begin_write().await?;
        if rows::update_folder(txn.conn(), folder).await? == 0 {
            return Err(AppError::not_found("Folder", folder.id));
        }
        txn.touch(Table::Folders);
        txn.commit().await
    }

    /// Delete a folder together with its notes, labels and their links.
    ///
    /// If the settings point the main interface at this folder, they are
    /// moved back to the general folder in the same transaction.
    pub async fn delete(&self, folder: &Folder) -> Result<()> {
        if folder.id == GENERAL_FOLDER_ID || folder.is_general {
            return Err(AppError::InvalidOperation(
                "the general folder cannot be deleted".to_string(),
            ));
        }

        tracing::info!("Deleting folder: {}", folder.id);

        let mut txn = self.store.begin_write().await?;
        if rows::delete_folder(txn.conn(), folder.id).await? == 0 {
            return Err(AppError::not_found("Folder", folder.id));
        }
        txn.touch(Table::Folders);
        txn.touch(Table::Notes);
        txn.touch(Table::Labels);
        txn.touch(Table::NoteLabels);

        let mut settings = rows::load_settings(txn.conn()).await?;
        if settings.main_interface_id == folder.id {
            settings.main_interface_id = GENERAL_FOLDER_ID;
            rows::store_settings(txn.conn(), &settings).await?;
            txn.touch(Table::Settings);
        }

        txn.commit().await?;

        tracing::info!("Folder deleted: {}", folder.id);
        Ok(())
    }

    /// Number of non-archived notes in a folder
    pub async fn count_notes(&self, id: i64) -> Result<i64> {
        let mut conn = self.store.read().await?;
        rows::count_folder_notes(&mut conn, id).await
    }
}
