//! Category Model

use serde::{Deserialize, Serialize};

/// Category entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Icon identifier picked in the admin UI
    pub icon: String,
    pub display_order: i32,
    pub created_at: i64,

    // -- Relations (populated by application code, skipped by FromRow) --

    /// Game IDs (junction table)
    #[cfg_attr(feature = "db", sqlx(skip))]
    #[serde(default)]
    pub game_ids: Vec<i64>,
}

/// Create category payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub display_order: Option<i32>,
    #[serde(default)]
    pub game_ids: Vec<i64>,
}

/// Update category payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub display_order: Option<i32>,
    /// Replaces the whole association set when present
    pub game_ids: Option<Vec<i64>>,
}
