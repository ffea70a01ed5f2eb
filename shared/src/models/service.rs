//! Service Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price_component::{PriceComponent, PriceComponentInput};

/// Purchasable service, ordered within its category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Service {
    pub id: i64,
    pub category_id: i64,
    /// Joined from categories for listings
    #[cfg_attr(feature = "db", sqlx(default))]
    pub category_name: Option<String>,
    pub title: String,
    pub price: Decimal,
    pub image: String,
    /// Bullet lines shown on the service card
    pub description: Vec<String>,
    pub display_order: i32,
    pub created_at: i64,
    pub updated_at: i64,

    // -- Relations (populated by application code, skipped by FromRow) --

    #[cfg_attr(feature = "db", sqlx(skip))]
    #[serde(default)]
    pub price_components: Vec<PriceComponent>,
    /// Game IDs (junction table)
    #[cfg_attr(feature = "db", sqlx(skip))]
    #[serde(default)]
    pub game_ids: Vec<i64>,
}

/// Create service payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCreate {
    pub category_id: i64,
    pub title: String,
    pub price: Decimal,
    pub image: String,
    pub description: Vec<String>,
    /// Position within the category; appended when absent
    pub display_order: Option<i32>,
    #[serde(default)]
    pub price_components: Vec<PriceComponentInput>,
    #[serde(default)]
    pub game_ids: Vec<i64>,
}

/// Update service payload
///
/// A new `category_id` moves the service to the end of that category unless
/// `display_order` names a position there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub description: Option<Vec<String>>,
    pub display_order: Option<i32>,
    /// Replaces all components when present
    pub price_components: Option<Vec<PriceComponentInput>>,
    /// Replaces the whole association set when present
    pub game_ids: Option<Vec<i64>>,
}
