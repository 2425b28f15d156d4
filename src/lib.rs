pub mod api;
pub mod chat;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod providers;

// Re-export commonly used items
pub use config::ChatConfig;
pub use database::Database;
pub use error::AppError;
