//! Noto core library
//!
//! The local data layer of the Noto notes application: a transactional
//! entity store with live query subscriptions, validating repositories,
//! and the JSON backup export/import engine.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod repositories;
pub mod services;

pub use app::AppState;
pub use error::{AppError, Result};
