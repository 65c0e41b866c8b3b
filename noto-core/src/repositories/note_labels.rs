//! Note-label link repository
//!
//! A (note, label) pair is linked at most once.

use super::ensure_unsaved;
use crate::database::{rows, EntityStore, NoteLabel, Subscription, Table, TableSet, WriteTxn};
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct NoteLabelRepository {
    store: EntityStore,
}

impl NoteLabelRepository {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub async fn list_by_note(&self, note_id: i64) -> Result<Subscription<Vec<NoteLabel>>> {
        self.store
            .subscribe(TableSet::of(&[Table::NoteLabels]), move |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::list_note_labels_by_note(&mut conn, note_id).await
            })
            .await
    }

    pub async fn list_by_label(&self, label_id: i64) -> Result<Subscription<Vec<NoteLabel>>> {
        self.store
            .subscribe(TableSet::of(&[Table::NoteLabels]), move |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::list_note_labels_by_label(&mut conn, label_id).await
            })
            .await
    }

    /// One link; the stream yields `None` once the link is deleted
    pub async fn get(&self, id: i64) -> Result<Subscription<Option<NoteLabel>>> {
        let subscription = self
            .store
            .subscribe(TableSet::of(&[Table::NoteLabels]), move |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::fetch_note_label(&mut conn, id).await
            })
            .await?;

        if subscription.current().is_none() {
            return Err(AppError::not_found("NoteLabel", id));
        }
        Ok(subscription)
    }

    pub async fn create(&self, link: &NoteLabel) -> Result<i64> {
        ensure_unsaved("NoteLabel", link.id)?;

        let mut txn = self.store.begin_write().await?;
        ensure_linkable(&mut txn, link).await?;
        let id = rows::insert_note_label(txn.conn(), link).await?;
        txn.touch(Table::NoteLabels);
        txn.commit().await?;

        Ok(id)
    }

    /// Re-point a link at another note and/or label
    pub async fn update(&self, link: &NoteLabel) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        ensure_linkable(&mut txn, link).await?;
        if rows::update_note_label(txn.conn(), link).await? == 0 {
            return Err(AppError::not_found("NoteLabel", link.id));
        }
        txn.touch(Table::NoteLabels);
        txn.commit().await
    }

    pub async fn delete(&self, link: &NoteLabel) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        if rows::delete_note_label(txn.conn(), link.id).await? == 0 {
            return Err(AppError::not_found("NoteLabel", link.id));
        }
        txn.touch(Table::NoteLabels);
        txn.commit().await
    }

    /// Unlink a label from a note regardless of the link's id
    pub async fn delete_pair(&self, note_id: i64, label_id: i64) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        if rows::delete_note_label_pair(txn.conn(), note_id, label_id).await? == 0 {
            return Err(AppError::InvalidArgument(format!(
                "note {} has no label {}",
                note_id, label_id
            )));
        }
        txn.touch(Table::NoteLabels);
        txn.commit().await
    }
}

/// Both ends must exist and no other link may join the same pair
async fn ensure_linkable(txn: &mut WriteTxn, link: &NoteLabel) -> Result<()> {
    if !rows::note_exists(txn.conn(), link.note_id).await? {
        return Err(AppError::InvalidArgument(format!(
            "note {} does not exist",
            link.note_id
        )));
    }
    if !rows::label_exists(txn.conn(), link.label_id).await? {
        return Err(AppError::InvalidArgument(format!(
            "label {} does not exist",
            link.label_id
        )));
    }
    match rows::find_note_label_pair(txn.conn(), link.note_id, link.label_id).await? {
        Some(existing) if existing != link.id => Err(AppError::InvalidArgument(format!(
            "note {} already has label {}",
            link.note_id, link.label_id
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GENERAL_FOLDER_ID;
    use crate::database::{Label, Note};
    use crate::repositories::test_support::create_test_store;
    use crate::repositories::{LabelRepository, NoteRepository};

    type Fixture = (NoteLabelRepository, NoteRepository, LabelRepository, i64, i64);

    async fn create_note_and_label() -> Fixture {
        let store = create_test_store().await;
        let notes = NoteRepository::new(store.clone());
        let labels = LabelRepository::new(store.clone());
        let note_id = notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Tagged", ""))
            .await
            .unwrap();
        let label_id = labels
            .create(&Label::new(GENERAL_FOLDER_ID, "work"))
            .await
            .unwrap();

        (NoteLabelRepository::new(store), notes, labels, note_id, label_id)
    }

    #[tokio::test]
    async fn test_link_and_unlink() {
        let (repo, _, _, note_id, label_id) = create_note_and_label().await;
        let mut links = repo.list_by_note(note_id).await.unwrap();

        let link_id = repo.create(&NoteLabel::new(note_id, label_id)).await.unwrap();
        let current = links.next().await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, link_id);

        repo.delete_pair(note_id, label_id).await.unwrap();
        assert!(links.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_link_is_rejected() {
        let (repo, _, _, note_id, label_id) = create_note_and_label().await;
        repo.create(&NoteLabel::new(note_id, label_id)).await.unwrap();

        let result = repo.create(&NoteLabel::new(note_id, label_id)).await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_deleting_label_removes_links() {
        let (repo, _, labels, note_id, label_id) = create_note_and_label().await;
        repo.create(&NoteLabel::new(note_id, label_id)).await.unwrap();
        let mut links = repo.list_by_label(label_id).await.unwrap();

        let label = labels.get(label_id).await.unwrap().current().unwrap();
        labels.delete(&label).await.unwrap();

        assert!(links.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_note_removes_links() {
        let (repo, notes, _, note_id, label_id) = create_note_and_label().await;
        repo.create(&NoteLabel::new(note_id, label_id)).await.unwrap();
        let mut links = repo.list_by_label(label_id).await.unwrap();

        let note = notes.get(note_id).await.unwrap().current().unwrap();
        notes.delete(&note).await.unwrap();

        assert!(links.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_link_is_not_found() {
        let (repo, _, _, _, _) = create_note_and_label().await;

        let result = repo.get(404).await;

        assert!(matches!(
            result,
            Err(AppError::NotFound {
                entity: "NoteLabel",
                id: 404
            })
        ));
    }

    #[tokio::test]
    async fn test_update_repoints_link() {
        let (repo, _, labels, note_id, label_id) = create_note_and_label().await;
        let link_id = repo.create(&NoteLabel::new(note_id, label_id)).await.unwrap();
        let other_label = labels
            .create(&Label::new(GENERAL_FOLDER_ID, "later"))
            .await
            .unwrap();
        let mut link = repo.get(link_id).await.unwrap();

        repo.update(&NoteLabel {
            id: link_id,
            note_id,
            label_id: other_label,
        })
        .await
        .unwrap();

        let updated = link.next().await.unwrap().unwrap();
        assert_eq!(updated.label_id, other_label);
        assert!(repo.list_by_label(label_id).await.unwrap().current().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_taken_pair_and_missing_id() {
        let (repo, _, labels, note_id, label_id) = create_note_and_label().await;
        let other_label = labels
            .create(&Label::new(GENERAL_FOLDER_ID, "later"))
            .await
            .unwrap();
        let first = repo.create(&NoteLabel::new(note_id, label_id)).await.unwrap();
        repo.create(&NoteLabel::new(note_id, other_label)).await.unwrap();

        let taken = repo
            .update(&NoteLabel {
                id: first,
                note_id,
                label_id: other_label,
            })
            .await;
        assert!(matches!(taken, Err(AppError::InvalidArgument(_))));

        let unchanged = repo
            .update(&NoteLabel {
                id: first,
                note_id,
                label_id,
            })
            .await;
        assert!(unchanged.is_ok());

        let missing = repo
            .update(&NoteLabel {
                id: 999,
                note_id,
                label_id: 12345,
            })
            .await;
        assert!(matches!(missing, Err(AppError::InvalidArgument(_))));

        let free_label = labels
            .create(&Label::new(GENERAL_FOLDER_ID, "free"))
            .await
            .unwrap();
        let absent = repo
            .update(&NoteLabel {
                id: 999,
                note_id,
                label_id: free_label,
            })
            .await;
        assert!(matches!(
            absent,
            Err(AppError::NotFound {
                entity: "NoteLabel",
                id: 999
            })
        ));
    }
}
