//! Shared types for the storefront admin
//!
//! Error types, catalog models and the storage-agnostic display-order
//! logic used by `admin-server`.

pub mod error;
pub mod models;
pub mod ordering;
pub mod util;

// Re-exports
pub use axum::Json;
pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use ordering::{OrderingError, ScopeKey};
