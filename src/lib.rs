//! Deal Digest document analysis service
//!
//! Accepts business documents (TXT, PDF, DOCX, PPTX), extracts their text,
//! and asks a hosted language model for a structured deal summary.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use handlers::create_router;
pub use state::AppState;
