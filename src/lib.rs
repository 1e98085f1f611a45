//! Bookwell scheduling server
//!
//! Availability and booking engine for multi-tenant service providers:
//! opening hours with holidays and day exceptions, slot search, and a
//! booking lifecycle that never double-books a staff member.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduling;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
