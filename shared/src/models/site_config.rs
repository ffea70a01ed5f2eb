//! Site configuration (singleton row)

use serde::{Deserialize, Serialize};

/// Texts and links of the public site's shell
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SiteConfig {
    pub logo_text: String,
    pub home_title: String,
    pub home_subtitle: String,
    /// Category names highlighted on the home page
    pub home_categories: Vec<String>,
    pub accordion_title: String,
    pub footer_payment_title: String,
    pub footer_copyright: String,
    pub disclaimer: String,
    pub discord_link: Option<String>,
    pub discord_work_us: Option<String>,
    pub payment_disclaimer: Option<String>,
    pub updated_at: Option<i64>,
}

/// Full replacement payload for the site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfigUpdate {
    pub logo_text: String,
    pub home_title: String,
    pub home_subtitle: String,
    pub home_categories: Vec<String>,
    pub accordion_title: String,
    pub footer_payment_title: String,
    pub footer_copyright: String,
    pub disclaimer: String,
    pub discord_link: Option<String>,
    pub discord_work_us: Option<String>,
    pub payment_disclaimer: Option<String>,
}
