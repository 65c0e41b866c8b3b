//! Services module
//!
//! Whole-store operations built on top of the entity store: backup
//! export/import and the import engine that re-keys documents.

pub mod backup;
pub mod import;

pub use backup::{decode_document, encode_document, BackupDocument, BackupFile, BackupService};
pub use import::{ImportEngine, ImportReport};
