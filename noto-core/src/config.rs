//! Application configuration constants
//!
//! Central location for identifiers, file layout, and resource limits
//! used throughout the data layer.

// ===== General Folder =====

/// Reserved identifier of the general folder.
/// Seeded by the first migration and never reassigned.
pub const GENERAL_FOLDER_ID: i64 = 1;

/// Title given to the general folder when it is first created
pub const GENERAL_FOLDER_TITLE: &str = "General";

// ===== File Layout =====

/// Database file name inside the data directory
pub const DATABASE_FILE_NAME: &str = "noto.sqlite";

/// Directory (inside the data directory) holding exported backups
pub const BACKUPS_DIR_NAME: &str = "backups";

/// File name prefix for exported backup documents
pub const BACKUP_FILE_PREFIX: &str = "noto_backup_";

/// File extension for exported backup documents
pub const BACKUP_FILE_EXTENSION: &str = "json";

/// Number of backup files kept in a backups directory.
/// Older files beyond this count are removed after each new backup.
pub const DEFAULT_BACKUP_RETENTION_COUNT: usize = 10;

// ===== Storage Limits =====

/// Maximum pooled connections for a file-backed store
pub const POOL_MAX_CONNECTIONS: u32 = 5;

/// Seconds a connection waits on a locked database before failing
pub const BUSY_TIMEOUT_SECS: u64 = 5;
