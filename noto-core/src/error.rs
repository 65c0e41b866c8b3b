//! Error types for the Noto data layer
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the UI layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Failed to parse {entity}: {message}")]
    Parse { entity: String, message: String },

    #[error("Dangling reference: {entity} {id} has {field} = {target}, absent from the document")]
    DanglingReference {
        entity: &'static str,
        id: i64,
        field: &'static str,
        target: i64,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl AppError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        AppError::NotFound { entity, id }
    }

    pub(crate) fn parse(entity: impl Into<String>, message: impl ToString) -> Self {
        AppError::Parse {
            entity: entity.into(),
            message: message.to_string(),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
