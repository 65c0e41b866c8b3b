//! Label repository

use super::ensure_unsaved;
use crate::database::{rows, EntityStore, Label, Subscription, Table, TableSet};
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct LabelRepository {
    store: EntityStore,
}

impl LabelRepository {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Labels of a folder ordered by position
    pub async fn list_by_folder(&self, folder_id: i64) -> Result<Subscription<Vec<Label>>> {
        self.store
            .subscribe(TableSet::of(&[Table::Labels]), move |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::list_labels_by_folder(&mut conn, folder_id).await
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Subscription<Option<Label>>> {
        let subscription = self
            .store
            .subscribe(TableSet::of(&[Table::Labels]), move |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::fetch_label(&mut conn, id).await
            })
            .await?;

        if subscription.current().is_none() {
            return Err(AppError::not_found("Label", id));
        }
        Ok(subscription)
    }

    pub async fn create(&self, label: &Label) -> Result<i64> {
        ensure_unsaved("Label", label.id)?;

        let mut txn = self.store.begin_write().await?;
        if !rows::folder_exists(txn.conn(), label.folder_id).await? {
            return Err(AppError::InvalidArgument(format!(
                "folder {} does not exist",
                label.folder_id
            )));
        }
        let id = rows::insert_label(txn.conn(), label).await?;
        txn.touch(Table::Labels);
        txn.commit().await?;

        tracing::debug!("Created label: {}", id);
        Ok(id)
    }

    pub async fn update(&self, label: &Label) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        if !rows::folder_exists(txn.conn(), label.folder_id).await? {
            return Err(AppError::InvalidArgument(format!(
                "folder {} does not exist",
                label.folder_id
            )));
        }
        if rows::update_label(txn.conn(), label).await? == 0 {
            return Err(AppError::not_found("Label", label.id));
        }
        txn.touch(Table::Labels);
        txn.commit().await
    }

    /// Delete a label and every link to it
    pub async fn delete(&self, label: &Label) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        if rows::delete_label(txn.conn(), label.id).await? == 0 {
            return Err(AppError::not_found("Label", label.id));
        }
        txn.touch(Table::Labels);
        txn.touch(Table::NoteLabels);
        txn.commit().await?;

        tracing::debug!("Deleted label: {}", label.id);
        Ok(())
    }
}
