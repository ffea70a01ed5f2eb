//! Game Model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Game {
    pub id: i64,
    pub title: String,
    /// Free-form genre label shown on the public site
    pub category: String,
    pub image: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCreate {
    pub title: String,
    pub category: String,
    pub image: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}
