//! FAQ (accordion) item model

use serde::{Deserialize, Serialize};

/// FAQ entry shown in the public site's accordion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct FaqItem {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub display_order: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create FAQ item payload
///
/// Without `display_order` the item is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqItemCreate {
    pub title: String,
    pub content: String,
    pub display_order: Option<i32>,
}

/// Update FAQ item payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaqItemUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub display_order: Option<i32>,
}
