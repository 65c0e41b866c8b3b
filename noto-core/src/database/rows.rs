//! Row-level statements
//!
//! Plain SQL against a single connection. Callers decide the transaction
//! scope: repositories run these inside their own write transaction, the
//! import engine runs all of them inside one.

use super::models::*;
use crate::error::Result;
use sqlx::SqliteConnection;

const SETTINGS_KEY: &str = "settings";

// ===== Folders =====

/// Insert a folder with a freshly assigned identifier.
/// The general flag is never set here; the general folder is seeded by the schema.
pub async fn insert_folder(conn: &mut SqliteConnection, folder: &Folder) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO folders (
            title, color, icon, position, creation_date, sorting_type, sorting_order,
            layout, show_notes_count, show_note_creation_date, new_note_cursor,
            notification_interface, is_general
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&folder.title)
    .bind(folder.color.as_str())
    .bind(folder.icon.as_str())
    .bind(folder.position)
    .bind(folder.creation_date)
    .bind(folder.sorting_type.as_str())
    .bind(folder.sorting_order.as_str())
    .bind(folder.layout.as_str())
    .bind(folder.show_notes_count)
    .bind(folder.show_note_creation_date)
    .bind(folder.new_note_cursor.as_str())
    .bind(folder.notification_interface)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    tracing::debug!("Inserted folder: {}", id);
    Ok(id)
}

/// Replace every mutable column of an existing folder.
/// Returns the number of rows changed (0 when the id is absent).
pub async fn update_folder(conn: &mut SqliteConnection, folder: &Folder) -> Result<u64> {
    let changed = sqlx::query(
        r#"
        UPDATE folders SET
            title = ?, color = ?, icon = ?, position = ?, creation_date = ?,
            sorting_type = ?, sorting_order = ?, layout = ?, show_notes_count = ?,
            show_note_creation_date = ?, new_note_cursor = ?, notification_interface = ?
        WHERE id = ?
        "#,
    )
    .bind(&folder.title)
    .bind(folder.color.as_str())
    .bind(folder.icon.as_str())
    .bind(folder.position)
    .bind(folder.creation_date)
    .bind(folder.sorting_type.as_str())
    .bind(folder.sorting_order.as_str())
    .bind(folder.layout.as_str())
    .bind(folder.show_notes_count)
    .bind(folder.show_note_creation_date)
    .bind(folder.new_note_cursor.as_str())
    .bind(folder.notification_interface)
    .bind(folder.id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(changed)
}

/// Delete a folder; notes, labels and their links cascade
pub async fn delete_folder(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
    let changed = sqlx::query("DELETE FROM folders WHERE id = ? AND is_general = 0")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(changed)
}

pub async fn fetch_folder(conn: &mut SqliteConnection, id: i64) -> Result<Option<Folder>> {
    let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(folder)
}

pub async fn list_folders(conn: &mut SqliteConnection) -> Result<Vec<Folder>> {
    let folders = sqlx::query_as::<_, Folder>(
        "SELECT * FROM folders ORDER BY title COLLATE NOCASE ASC, id ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(folders)
}

pub async fn folder_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM folders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

/// Count the non-archived notes of a folder
pub async fn count_folder_notes(conn: &mut SqliteConnection, folder_id: i64) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE folder_id = ? AND is_archived = 0")
            .bind(folder_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(count)
}

// ===== Notes =====

pub async fn insert_note(conn: &mut SqliteConnection, note: &Note) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO notes (
            folder_id, title, body, position, is_starred, is_archived,
            creation_date, access_date, reminder_date
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(note.folder_id)
    .bind(&note.title)
    .bind(&note.body)
    .bind(note.position)
    .bind(note.is_starred)
    .bind(note.is_archived)
    .bind(note.creation_date)
    .bind(note.access_date)
    .bind(note.reminder_date)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    tracing::debug!("Inserted note: {} in folder: {}", id, note.folder_id);
    Ok(id)
}

pub async fn update_note(conn: &mut SqliteConnection, note: &Note) -> Result<u64> {
    let changed = sqlx::query(
        r#"
        UPDATE notes SET
            folder_id = ?, title = ?, body = ?, position = ?, is_starred = ?,
            is_archived = ?, creation_date = ?, access_date = ?, reminder_date = ?
        WHERE id = ?
        "#,
    )
    .bind(note.folder_id)
    .bind(&note.title)
    .bind(&note.body)
    .bind(note.position)
    .bind(note.is_starred)
    .bind(note.is_archived)
    .bind(note.creation_date)
    .bind(note.access_date)
    .bind(note.reminder_date)
    .bind(note.id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(changed)
}

pub async fn delete_note(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
    let changed = sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(changed)
}

pub async fn fetch_note(conn: &mut SqliteConnection, id: i64) -> Result<Option<Note>> {
    let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(note)
}

pub async fn note_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM notes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

fn note_order_clause(sorting_type: SortingType, sorting_order: SortingOrder) -> String {
    let column = match sorting_type {
        SortingType::Manual => "position",
        SortingType::CreationDate => "creation_date",
        SortingType::Alphabetical => {
            "(CASE WHEN trim(title) = '' THEN body ELSE title END) COLLATE NOCASE"
        }
        SortingType::AccessDate => "COALESCE(access_date, creation_date)",
    };
    let direction = match sorting_order {
        SortingOrder::Ascending => "ASC",
        SortingOrder::Descending => "DESC",
    };

    format!("ORDER BY {column} {direction}, id {direction}")
}

/// List the notes of a folder ordered by that folder's own sorting settings
pub async fn list_notes_by_folder(
    conn: &mut SqliteConnection,
    folder_id: i64,
    include_archived: bool,
) -> Result<Vec<Note>> {
    let (sorting_type, sorting_order) = match fetch_folder(conn, folder_id).await? {
        Some(folder) => (folder.sorting_type, folder.sorting_order),
        None => return Ok(Vec::new()),
    };

    let sql = format!(
        "SELECT * FROM notes WHERE folder_id = ? AND (? OR is_archived = 0) {}",
        note_order_clause(sorting_type, sorting_order)
    );

    let notes = sqlx::query_as::<_, Note>(&sql)
        .bind(folder_id)
        .bind(include_archived)
        .fetch_all(&mut *conn)
        .await?;

    Ok(notes)
}

pub async fn list_all_notes(conn: &mut SqliteConnection) -> Result<Vec<Note>> {
    let notes = sqlx::query_as::<_, Note>("SELECT * FROM notes ORDER BY id ASC")
        .fetch_all(&mut *conn)
        .await?;

    Ok(notes)
}

/// Case-insensitive substring search over non-archived notes
pub async fn search_notes(conn: &mut SqliteConnection, query: &str) -> Result<Vec<Note>> {
    let notes = sqlx::query_as::<_, Note>(
        r#"
        SELECT * FROM notes
        WHERE is_archived = 0
          AND (instr(lower(title), lower(?1)) > 0 OR instr(lower(body), lower(?1)) > 0)
        ORDER BY creation_date DESC, id DESC
        "#,
    )
    .bind(query)
    .fetch_all(&mut *conn)
    .await?;

    Ok(notes)
}

// ===== Labels =====

pub async fn insert_label(conn: &mut SqliteConnection, label: &Label) -> Result<i64> {
    let id = sqlx::query("INSERT INTO labels (folder_id, title, position) VALUES (?, ?, ?)")
        .bind(label.folder_id)
        .bind(&label.title)
        .bind(label.position)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    tracing::debug!("Inserted label: {} in folder: {}", id, label.folder_id);
    Ok(id)
}

pub async fn update_label(conn: &mut SqliteConnection, label: &Label) -> Result<u64> {
    let changed =
        sqlx::query("UPDATE labels SET folder_id = ?, title = ?, position = ? WHERE id = ?")
            .bind(label.folder_id)
            .bind(&label.title)
            .bind(label.position)
            .bind(label.id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

    Ok(changed)
}

pub async fn delete_label(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
    let changed = sqlx::query("DELETE FROM labels WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(changed)
}

pub async fn fetch_label(conn: &mut SqliteConnection, id: i64) -> Result<Option<Label>> {
    let label = sqlx::query_as::<_, Label>("SELECT * FROM labels WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(label)
}

pub async fn label_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM labels WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

pub async fn list_labels_by_folder(
    conn: &mut SqliteConnection,
    folder_id: i64,
) -> Result<Vec<Label>> {
    let labels = sqlx::query_as::<_, Label>(
        "SELECT * FROM labels WHERE folder_id = ? ORDER BY position ASC, id ASC",
    )
    .bind(folder_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(labels)
}

pub async fn list_all_labels(conn: &mut SqliteConnection) -> Result<Vec<Label>> {
    let labels = sqlx::query_as::<_, Label>("SELECT * FROM labels ORDER BY id ASC")
        .fetch_all(&mut *conn)
        .await?;

    Ok(labels)
}

// ===== Note labels =====

pub async fn insert_note_label(conn: &mut SqliteConnection, link: &NoteLabel) -> Result<i64> {
    let id = sqlx::query("INSERT INTO note_labels (note_id, label_id) VALUES (?, ?)")
        .bind(link.note_id)
        .bind(link.label_id)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    tracing::debug!(
        "Linked note: {} to label: {} as {}",
        link.note_id,
        link.label_id,
        id
    );
    Ok(id)
}

/// Re-point an existing link; returns the number of rows changed
pub async fn update_note_label(conn: &mut SqliteConnection, link: &NoteLabel) -> Result<u64> {
    let changed = sqlx::query("UPDATE note_labels SET note_id = ?, label_id = ? WHERE id = ?")
        .bind(link.note_id)
        .bind(link.label_id)
        .bind(link.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    tracing::debug!("Updated note label: {}", link.id);
    Ok(changed)
}

pub async fn delete_note_label(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
    let changed = sqlx::query("DELETE FROM note_labels WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(changed)
}

pub async fn delete_note_label_pair(
    conn: &mut SqliteConnection,
    note_id: i64,
    label_id: i64,
) -> Result<u64> {
    let changed = sqlx::query("DELETE FROM note_labels WHERE note_id = ? AND label_id = ?")
        .bind(note_id)
        .bind(label_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(changed)
}

pub async fn fetch_note_label(conn: &mut SqliteConnection, id: i64) -> Result<Option<NoteLabel>> {
    let link = sqlx::query_as::<_, NoteLabel>("SELECT * FROM note_labels WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(link)
}

/// Id of the link joining `note_id` and `label_id`, if any
pub async fn find_note_label_pair(
    conn: &mut SqliteConnection,
    note_id: i64,
    label_id: i64,
) -> Result<Option<i64>> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM note_labels WHERE note_id = ? AND label_id = ?")
            .bind(note_id)
            .bind(label_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(found)
}

pub async fn note_label_pair_exists(
    conn: &mut SqliteConnection,
    note_id: i64,
    label_id: i64,
) -> Result<bool> {
    Ok(find_note_label_pair(conn, note_id, label_id).await?.is_some())
}

pub async fn list_note_labels_by_note(
    conn: &mut SqliteConnection,
    note_id: i64,
) -> Result<Vec<NoteLabel>> {
    let links = sqlx::query_as::<_, NoteLabel>(
        "SELECT * FROM note_labels WHERE note_id = ? ORDER BY id ASC",
    )
    .bind(note_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(links)
}

pub async fn list_note_labels_by_label(
    conn: &mut SqliteConnection,
    label_id: i64,
) -> Result<Vec<NoteLabel>> {
    let links = sqlx::query_as::<_, NoteLabel>(
        "SELECT * FROM note_labels WHERE label_id = ? ORDER BY id ASC",
    )
    .bind(label_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(links)
}

pub async fn list_all_note_labels(conn: &mut SqliteConnection) -> Result<Vec<NoteLabel>> {
    let links = sqlx::query_as::<_, NoteLabel>("SELECT * FROM note_labels ORDER BY id ASC")
        .fetch_all(&mut *conn)
        .await?;

    Ok(links)
}

// ===== Settings =====

/// Load the settings singleton, falling back to defaults before the first write
pub async fn load_settings(conn: &mut SqliteConnection) -> Result<Settings> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(SETTINGS_KEY)
        .fetch_optional(&mut *conn)
        .await?;

    match value {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Settings::default()),
    }
}

pub async fn store_settings(conn: &mut SqliteConnection, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string(settings)?;

    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(SETTINGS_KEY)
    .bind(json)
    .execute(&mut *conn)
    .await?;

    tracing::debug!("Stored settings");
    Ok(())
}
