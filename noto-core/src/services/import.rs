//! Import engine
//!
//! Merges a backup document into the live store:
//! - Every folder, note, label and link is re-keyed to a store-assigned id.
//! - Folders flagged `isGeneral` are merged into the live general folder.
//! - Writes happen in dependency order (folders, notes, labels, links,
//!   settings overwrite) inside one write transaction.
//!
//! Any failure rolls the whole document back. Once started, an import runs
//! on its own task and is not cancelled by its caller going away.

use crate::config::GENERAL_FOLDER_ID;
use crate::database::store::join_task;
use crate::database::{rows, EntityStore, Folder, Table, WriteTxn};
use crate::error::{AppError, Result};
use crate::services::backup::BackupDocument;
use serde::Serialize;
use std::collections::HashMap;

/// What an import wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub folders_merged: usize,
    pub folders_created: usize,
    pub notes: usize,
    pub labels: usize,
    pub note_labels: usize,
}

/// Old document id -> new store id for one entity family
struct RemapTable {
    entity: &'static str,
    ids: HashMap<i64, i64>,
}

impl RemapTable {
    fn new(entity: &'static str) -> Self {
        Self {
            entity,
            ids: HashMap::new(),
        }
    }

    fn record(&mut self, old: i64, new: i64) {
        self.ids.insert(old, new);
    }

    fn get(&self, old: i64) -> Option<i64> {
        self.ids.get(&old).copied()
    }

    /// Resolve a foreign key held by `owner` `owner_id` in its `field`
    fn resolve(
        &self,
        owner: &'static str,
        owner_id: i64,
        field: &'static str,
        old: i64,
    ) -> Result<i64> {
        self.get(old).ok_or_else(|| {
            tracing::warn!(
                "{} {} references unknown {} {}",
                owner,
                owner_id,
                self.entity,
                old
            );
            AppError::DanglingReference {
                entity: owner,
                id: owner_id,
                field,
                target: old,
            }
        })
    }
}

#[derive(Clone)]
pub struct ImportEngine {
    store: EntityStore,
}

impl ImportEngine {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Import a whole document atomically
    pub async fn import(&self, document: BackupDocument) -> Result<ImportReport> {
        validate_notes(&document)?;

        tracing::info!(
            "Importing document: {} folders, {} notes, {} labels, {} note labels",
            document.folders.len(),
            document.notes.len(),
            document.labels.len(),
            document.note_labels.len()
        );

        let store = self.store.clone();
        let task = tokio::spawn(async move {
            let mut txn = store.begin_write().await?;
            let report = apply(&mut txn, &document).await?;
            txn.commit().await?;
            Ok(report)
        });

        let report = join_task(task).await?;

        tracing::info!("Import completed: {:?}", report);
        Ok(report)
    }
}

/// Invalid notes never reach the store, imported or not
fn validate_notes(document: &BackupDocument) -> Result<()> {
    match document.notes.iter().find(|note| !note.is_valid()) {
        Some(note) => Err(AppError::InvalidArgument(format!(
            "note {} has a blank title and body",
            note.id
        ))),
        None => Ok(()),
    }
}

async fn apply(txn: &mut WriteTxn, document: &BackupDocument) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    let mut folder_ids = RemapTable::new("folder");
    let mut note_ids = RemapTable::new("note");
    let mut label_ids = RemapTable::new("label");

    for folder in &document.folders {
        if folder.is_general {
            let live = rows::fetch_folder(txn.conn(), GENERAL_FOLDER_ID)
                .await?
                .ok_or_else(|| AppError::not_found("Folder", GENERAL_FOLDER_ID))?;
            let merged = Folder {
                id: live.id,
                is_general: true,
                ..folder.clone()
            };
            rows::update_folder(txn.conn(), &merged).await?;
            folder_ids.record(folder.id, GENERAL_FOLDER_ID);
            report.folders_merged += 1;
        } else {
            let new_id = rows::insert_folder(txn.conn(), folder).await?;
            folder_ids.record(folder.id, new_id);
            report.folders_created += 1;
        }
    }
    txn.touch(Table::Folders);

    for note in &document.notes {
        let folder_id = folder_ids.resolve("Note", note.id, "folderId", note.folder_id)?;
        let mut remapped = note.clone();
        remapped.id = 0;
        remapped.folder_id = folder_id;
        let new_id = rows::insert_note(txn.conn(), &remapped).await?;
        note_ids.record(note.id, new_id);
        report.notes += 1;
    }
    txn.touch(Table::Notes);

    for label in &document.labels {
        let folder_id = folder_ids.resolve("Label", label.id, "folderId", label.folder_id)?;
        let mut remapped = label.clone();
        remapped.id = 0;
        remapped.folder_id = folder_id;
        let new_id = rows::insert_label(txn.conn(), &remapped).await?;
        label_ids.record(label.id, new_id);
        report.labels += 1;
    }
    txn.touch(Table::Labels);

    for link in &document.note_labels {
        let mut remapped = link.clone();
        remapped.id = 0;
        remapped.note_id = note_ids.resolve("NoteLabel", link.id, "noteId", link.note_id)?;
        remapped.label_id = label_ids.resolve("NoteLabel", link.id, "labelId", link.label_id)?;
        if rows::note_label_pair_exists(txn.conn(), remapped.note_id, remapped.label_id).await? {
            return Err(AppError::InvalidArgument(format!(
                "note label {} repeats the link between note {} and label {}",
                link.id, link.note_id, link.label_id
            )));
        }
        rows::insert_note_label(txn.conn(), &remapped).await?;
        report.note_labels += 1;
    }
    txn.touch(Table::NoteLabels);

    let mut settings = document.settings.clone();
    settings.main_interface_id = folder_ids
        .get(settings.main_interface_id)
        .unwrap_or(GENERAL_FOLDER_ID);
    rows::store_settings(txn.conn(), &settings).await?;
    txn.touch(Table::Settings);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, Label, Note, NoteLabel, NotoColor, Settings, Theme};

    async fn create_test_engine() -> (ImportEngine, EntityStore) {
        let store = EntityStore::new(create_memory_pool().await.unwrap());
        (ImportEngine::new(store.clone()), store)
    }

    fn folder(id: i64, title: &str, is_general: bool) -> Folder {
        Folder {
            id,
            is_general,
            ..Folder::new(title)
        }
    }

    fn note(id: i64, folder_id: i64, title: &str) -> Note {
        Note {
            id,
            ..Note::new(folder_id, title, "")
        }
    }

    #[test]
    fn test_remap_table_reports_dangling_reference() {
        let mut table = RemapTable::new("folder");
        table.record(3, 17);

        assert_eq!(table.resolve("Note", 1, "folderId", 3).unwrap(), 17);
        assert!(matches!(
            table.resolve("Note", 1, "folderId", 4),
            Err(AppError::DanglingReference { target: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_reserved_id_without_flag_is_a_new_folder() {
        let (engine, store) = create_test_engine().await;
        let document = BackupDocument {
            folders: vec![folder(GENERAL_FOLDER_ID, "Work", false)],
            ..BackupDocument::default()
        };

        let report = engine.import(document).await.unwrap();

        assert_eq!(report.folders_created, 1);
        assert_eq!(report.folders_merged, 0);
        let mut conn = store.read().await.unwrap();
        let general = rows::fetch_folder(&mut conn, GENERAL_FOLDER_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(general.title, "General");
    }

    #[tokio::test]
    async fn test_import_remaps_all_references() {
        let (engine, store) = create_test_engine().await;
        let document = BackupDocument {
            folders: vec![folder(5, "General", true), folder(6, "Work", false)],
            notes: vec![note(20, 6, "Plan"), note(21, 5, "Inbox item")],
            labels: vec![Label {
                id: 40,
                ..Label::new(6, "q3")
            }],
            note_labels: vec![NoteLabel {
                id: 70,
                note_id: 20,
                label_id: 40,
            }],
            settings: Settings::default(),
        };

        let report = engine.import(document).await.unwrap();
        assert_eq!(report.folders_merged, 1);
        assert_eq!(report.folders_created, 1);
        assert_eq!(report.note_labels, 1);

        let mut conn = store.read().await.unwrap();
        let folders = rows::list_folders(&mut conn).await.unwrap();
        assert_eq!(folders.len(), 2);
        let work = folders.iter().find(|f| f.title == "Work").unwrap();

        let notes = rows::list_all_notes(&mut conn).await.unwrap();
        let plan = notes.iter().find(|n| n.title == "Plan").unwrap();
        let inbox = notes.iter().find(|n| n.title == "Inbox item").unwrap();
        assert_eq!(plan.folder_id, work.id);
        assert_eq!(inbox.folder_id, GENERAL_FOLDER_ID);

        let labels = rows::list_all_labels(&mut conn).await.unwrap();
        assert_eq!(labels[0].folder_id, work.id);

        let links = rows::list_all_note_labels(&mut conn).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].note_id, plan.id);
        assert_eq!(links[0].label_id, labels[0].id);
    }

    #[tokio::test]
    async fn test_general_folder_is_merged_not_duplicated() {
        let (engine, store) = create_test_engine().await;
        let mut imported_general = folder(12, "Everything", true);
        imported_general.color = NotoColor::Indigo;

        engine
            .import(BackupDocument {
                folders: vec![imported_general],
                ..BackupDocument::default()
            })
            .await
            .unwrap();

        let mut conn = store.read().await.unwrap();
        let folders = rows::list_folders(&mut conn).await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id, GENERAL_FOLDER_ID);
        assert!(folders[0].is_general);
        assert_eq!(folders[0].title, "Everything");
        assert_eq!(folders[0].color, NotoColor::Indigo);
    }

    #[tokio::test]
    async fn test_dangling_reference_rolls_back_everything() {
        let (engine, store) = create_test_engine().await;
        let document = BackupDocument {
            folders: vec![folder(2, "Kept?", false)],
            notes: vec![note(10, 2, "Fine"), note(11, 99, "Lost folder")],
            ..BackupDocument::default()
        };

        let result = engine.import(document).await;
        assert!(matches!(
            result,
            Err(AppError::DanglingReference {
                entity: "Note",
                id: 11,
                field: "folderId",
                target: 99,
            })
        ));

        let mut conn = store.read().await.unwrap();
        assert_eq!(rows::list_folders(&mut conn).await.unwrap().len(), 1);
        assert!(rows::list_all_notes(&mut conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_note_rejects_document() {
        let (engine, _) = create_test_engine().await;
        let document = BackupDocument {
            notes: vec![note(1, GENERAL_FOLDER_ID, " ")],
            ..BackupDocument::default()
        };

        let result = engine.import(document).await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_settings_overwrite_remaps_main_interface() {
        let (engine, store) = create_test_engine().await;
        let document = BackupDocument {
            folders: vec![folder(8, "Journal", false)],
            settings: Settings {
                theme: Theme::Dark,
                main_interface_id: 8,
                ..Settings::default()
            },
            ..BackupDocument::default()
        };

        engine.import(document).await.unwrap();

        let mut conn = store.read().await.unwrap();
        let settings = rows::load_settings(&mut conn).await.unwrap();
        let journal = rows::list_folders(&mut conn)
            .await
            .unwrap()
            .into_iter()
            .find(|f| f.title == "Journal")
            .unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.main_interface_id, journal.id);
    }

    #[tokio::test]
    async fn test_repeated_link_in_document_is_rejected() {
        let (engine, store) = create_test_engine().await;
        let link = |id| NoteLabel {
            id,
            note_id: 20,
            label_id: 40,
        };
        let document = BackupDocument {
            folders: vec![folder(6, "Work", false)],
            notes: vec![note(20, 6, "Plan")],
            labels: vec![Label {
                id: 40,
                ..Label::new(6, "q3")
            }],
            note_labels: vec![link(70), link(71)],
            ..BackupDocument::default()
        };

        match engine.import(document).await {
            Err(AppError::InvalidArgument(message)) => assert!(message.contains("71")),
            other => panic!("expected invalid argument, got {:?}", other),
        }

        let mut conn = store.read().await.unwrap();
        assert_eq!(rows::list_folders(&mut conn).await.unwrap().len(), 1);
        assert!(rows::list_all_note_labels(&mut conn).await.unwrap().is_empty());
    }
}
