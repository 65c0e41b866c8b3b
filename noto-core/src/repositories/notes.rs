//! Note repository
//!
//! A note is only persisted while it is valid (title or body non-blank)
//! and while its folder exists.

use super::ensure_unsaved;
use crate::database::{rows, EntityStore, Note, Subscription, Table, TableSet, WriteTxn};
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct NoteRepository {
    store: EntityStore,
}

impl NoteRepository {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Notes of a folder in the folder's sorting order.
    ///
    /// Re-emits when the notes change and when the folder's sorting changes.
    pub async fn list_by_folder(
        &self,
        folder_id: i64,
        include_archived: bool,
    ) -> Result<Subscription<Vec<Note>>> {
        self.store
            .subscribe(
                TableSet::of(&[Table::Notes, Table::Folders]),
                move |pool| async move {
                    let mut conn = pool.acquire().await?;
                    rows::list_notes_by_folder(&mut conn, folder_id, include_archived).await
                },
            )
            .await
    }

    /// One note; the stream yields `None` once the note is deleted
    pub async fn get(&self, id: i64) -> Result<Subscription<Option<Note>>> {
        let subscription = self
            .store
            .subscribe(TableSet::of(&[Table::Notes]), move |pool| async move {
                let mut conn = pool.acquire().await?;
                rows::fetch_note(&mut conn, id).await
            })
            .await?;

        if subscription.current().is_none() {
            return Err(AppError::not_found("Note", id));
        }
        Ok(subscription)
    }

    /// Non-archived notes whose title or body contains `query`, ignoring case
    pub async fn search(&self, query: impl Into<String>) -> Result<Subscription<Vec<Note>>> {
        let query = query.into();
        self.store
            .subscribe(TableSet::of(&[Table::Notes]), move |pool| {
                let query = query.clone();
                async move {
                    let mut conn = pool.acquire().await?;
                    rows::search_notes(&mut conn, &query).await
                }
            })
            .await
    }

    pub async fn create(&self, note: &Note) -> Result<i64> {
        ensure_unsaved("Note", note.id)?;
        ensure_valid(note)?;

        let mut txn = self.store.begin_write().await?;
        ensure_folder(&mut txn, note.folder_id).await?;
        let id = rows::insert_note(txn.conn(), note).await?;
        txn.touch(Table::Notes);
        txn.commit().await?;

        tracing::debug!("Created note: {}", id);
        Ok(id)
    }

    /// Replace a note. Moving it to another folder is allowed.
    pub async fn update(&self, note: &Note) -> Result<()> {
        ensure_valid(note)?;

        let mut txn = self.store.begin_write().await?;
        ensure_folder(&mut txn, note.folder_id).await?;
        if rows::update_note(txn.conn(), note).await? == 0 {
            return Err(AppError::not_found("Note", note.id));
        }
        txn.touch(Table::Notes);
        txn.commit().await?;

        tracing::debug!("Updated note: {}", note.id);
        Ok(())
    }

    /// Delete a note and its label links
    pub async fn delete(&self, note: &Note) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        if rows::delete_note(txn.conn(), note.id).await? == 0 {
            return Err(AppError::not_found("Note", note.id));
        }
        txn.touch(Table::Notes);
        txn.touch(Table::NoteLabels);
        txn.commit().await?;

        tracing::debug!("Deleted note: {}", note.id);
        Ok(())
    }
}

fn ensure_valid(note: &Note) -> Result<()> {
    if !note.is_valid() {
        return Err(AppError::InvalidArgument(
            "a note needs a non-blank title or body".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_folder(txn: &mut WriteTxn, folder_id: i64) -> Result<()> {
    if !rows::folder_exists(txn.conn(), folder_id).await? {
        return Err(AppError::InvalidArgument(format!(
            "folder {} does not exist",
            folder_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GENERAL_FOLDER_ID;
    use crate::database::{Folder, SortingOrder, SortingType};
    use crate::repositories::test_support::create_test_store;
    use crate::repositories::FolderRepository;

    async fn create_test_repos() -> (NoteRepository, FolderRepository) {
        let store = create_test_store().await;
        (NoteRepository::new(store.clone()), FolderRepository::new(store))
    }

    #[tokio::test]
    async fn test_create_and_get_note() {
        let (notes, _) = create_test_repos().await;

        let id = notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Groceries", "milk"))
            .await
            .unwrap();

        let note = notes.get(id).await.unwrap().current().unwrap();
        assert_eq!(note.id, id);
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.folder_id, GENERAL_FOLDER_ID);
    }

    #[tokio::test]
    async fn test_blank_note_is_rejected() {
        let (notes, _) = create_test_repos().await;
        let listed = notes.list_by_folder(GENERAL_FOLDER_ID, true).await.unwrap();

        let result = notes.create(&Note::new(GENERAL_FOLDER_ID, " ", "")).await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
        assert!(listed.current().is_empty());
        assert!(!listed.has_changed());
    }

    #[tokio::test]
    async fn test_note_in_missing_folder_is_rejected() {
        let (notes, _) = create_test_repos().await;

        let result = notes.create(&Note::new(77, "Orphan", "")).await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_list_excludes_archived_unless_requested() {
        let (notes, _) = create_test_repos().await;
        let mut archived = Note::new(GENERAL_FOLDER_ID, "Old", "");
        archived.is_archived = true;
        notes.create(&archived).await.unwrap();
        notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Fresh", ""))
            .await
            .unwrap();

        let active = notes.list_by_folder(GENERAL_FOLDER_ID, false).await.unwrap();
        let everything = notes.list_by_folder(GENERAL_FOLDER_ID, true).await.unwrap();

        assert_eq!(active.current().len(), 1);
        assert_eq!(everything.current().len(), 2);
    }

    #[tokio::test]
    async fn test_list_follows_folder_sorting() {
        let (notes, folders) = create_test_repos().await;
        for title in ["banana", "Apple", "cherry"] {
            notes
                .create(&Note::new(GENERAL_FOLDER_ID, title, ""))
                .await
                .unwrap();
        }
        let mut listed = notes.list_by_folder(GENERAL_FOLDER_ID, false).await.unwrap();

        let mut general = folders.general().await.unwrap();
        general.sorting_type = SortingType::Alphabetical;
        general.sorting_order = SortingOrder::Ascending;
        folders.update(&general).await.unwrap();

        let sorted = listed.next().await.unwrap();
        let titles: Vec<&str> = sorted.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple", "banana", "cherry"]);
    }

    #[tokio::test]
    async fn test_update_moves_note_between_folders() {
        let (notes, folders) = create_test_repos().await;
        let work = folders.create(&Folder::new("Work")).await.unwrap();
        let id = notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Report", ""))
            .await
            .unwrap();
        let general_list = notes.list_by_folder(GENERAL_FOLDER_ID, false).await.unwrap();
        let work_list = notes.list_by_folder(work, false).await.unwrap();

        let mut note = notes.get(id).await.unwrap().current().unwrap();
        note.folder_id = work;
        notes.update(&note).await.unwrap();

        assert!(general_list.current().is_empty());
        assert_eq!(work_list.current(), vec![note]);
    }

    #[tokio::test]
    async fn test_update_rejects_blank_note() {
        let (notes, _) = create_test_repos().await;
        let id = notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Keep", ""))
            .await
            .unwrap();

        let mut note = notes.get(id).await.unwrap().current().unwrap();
        note.title.clear();

        assert!(matches!(
            notes.update(&note).await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_note() {
        let (notes, _) = create_test_repos().await;
        let id = notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Short lived", ""))
            .await
            .unwrap();
        let note = notes.get(id).await.unwrap().current().unwrap();

        notes.delete(&note).await.unwrap();

        assert!(matches!(notes.get(id).await, Err(AppError::NotFound { .. })));
        assert!(matches!(
            notes.delete(&note).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_notes() {
        let (notes, _) = create_test_repos().await;
        notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Shopping List", "Buy milk"))
            .await
            .unwrap();
        notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Todo", "Fix bug"))
            .await
            .unwrap();

        let by_title = notes.search("shopping").await.unwrap().current();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title, "Shopping List");

        let by_body = notes.search("BUG").await.unwrap().current();
        assert_eq!(by_body.len(), 1);
        assert_eq!(by_body[0].title, "Todo");

        let mut none = notes.search("meeting").await.unwrap();
        assert!(none.current().is_empty());

        notes
            .create(&Note::new(GENERAL_FOLDER_ID, "Meeting notes", ""))
            .await
            .unwrap();
        assert_eq!(none.next().await.unwrap().len(), 1);
    }
}
