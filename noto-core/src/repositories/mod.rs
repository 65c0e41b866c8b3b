//! Repositories
//!
//! One validating facade per entity family over the shared `EntityStore`.
//! Reads are live subscriptions; writes validate first, then commit one
//! atomic transaction and return once subscribers have been refreshed.

pub mod folders;
pub mod labels;
pub mod note_labels;
pub mod notes;
pub mod settings;

pub use folders::FolderRepository;
pub use labels::LabelRepository;
pub use note_labels::NoteLabelRepository;
pub use notes::NoteRepository;
pub use settings::SettingsRepository;

use crate::error::{AppError, Result};

/// Create operations only accept records the store has not assigned an id yet
fn ensure_unsaved(entity: &str, id: i64) -> Result<()> {
    if id != 0 {
        return Err(AppError::InvalidArgument(format!(
            "{} to create must have id 0, got {}",
            entity, id
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::database::{create_memory_pool, EntityStore};

    pub async fn create_test_store() -> EntityStore {
        EntityStore::new(create_memory_pool().await.unwrap())
    }
}
