//! Data models
//!
//! Shared between admin-server and the admin UI (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` snowflakes, timestamps are Unix milliseconds.

pub mod category;
pub mod faq;
pub mod game;
pub mod policy;
pub mod price_component;
pub mod service;
pub mod site_config;

// Re-exports
pub use category::*;
pub use faq::*;
pub use game::*;
pub use policy::*;
pub use price_component::*;
pub use service::*;
pub use site_config::*;
