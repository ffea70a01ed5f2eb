//! Database access layer
//!
//! - [`ordering`]: display-order engine and scoped store adapter
//! - [`catalog`]: facades for the ordered entities (FAQ items, categories, services)
//! - [`games`], [`site_content`]: unordered content

pub mod catalog;
pub mod games;
pub mod ordering;
pub mod site_content;
