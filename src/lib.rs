//! CurateHub Library Circulation Server
//!
//! REST JSON API for a small library: book catalog, members, loans with
//! due dates and fines, and circulation reports.

use std::sync::Arc;

pub mod api;
pub mod circulation;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
