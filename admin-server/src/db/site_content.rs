//! Site configuration and policy page, one row each

use shared::models::{POLICY_SECTION_COUNT, Policies, PoliciesUpdate, SiteConfig, SiteConfigUpdate};
use sqlx::{PgPool, Row};

use crate::error::ServiceResult;

const SITE_CONFIG_COLUMNS: &str = "logo_text, home_title, home_subtitle, home_categories, \
     accordion_title, footer_payment_title, footer_copyright, disclaimer, discord_link, \
     discord_work_us, payment_disclaimer, updated_at";

/// Stored configuration, or `None` before the first save
pub async fn get_site_config(pool: &PgPool) -> ServiceResult<Option<SiteConfig>> {
    let config = sqlx::query_as::<_, SiteConfig>(&format!(
        "SELECT {SITE_CONFIG_COLUMNS} FROM site_config WHERE id = 1"
    ))
    .fetch_optional(pool)
    .await?;
    Ok(config)
}

pub async fn save_site_config(pool: &PgPool, data: SiteConfigUpdate) -> ServiceResult<SiteConfig> {
    let config = sqlx::query_as::<_, SiteConfig>(&format!(
        r#"
        INSERT INTO site_config (
            id, logo_text, home_title, home_subtitle, home_categories, accordion_title,
            footer_payment_title, footer_copyright, disclaimer, discord_link,
            discord_work_us, payment_disclaimer, updated_at
        )
        VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE SET
            logo_text = EXCLUDED.logo_text, home_title = EXCLUDED.home_title,
            home_subtitle = EXCLUDED.home_subtitle, home_categories = EXCLUDED.home_categories,
            accordion_title = EXCLUDED.accordion_title,
            footer_payment_title = EXCLUDED.footer_payment_title,
            footer_copyright = EXCLUDED.footer_copyright, disclaimer = EXCLUDED.disclaimer,
            discord_link = EXCLUDED.discord_link, discord_work_us = EXCLUDED.discord_work_us,
            payment_disclaimer = EXCLUDED.payment_disclaimer, updated_at = EXCLUDED.updated_at
        RETURNING {SITE_CONFIG_COLUMNS}
        "#
    ))
    .bind(&data.logo_text)
    .bind(&data.home_title)
    .bind(&data.home_subtitle)
    .bind(&data.home_categories)
    .bind(&data.accordion_title)
    .bind(&data.footer_payment_title)
    .bind(&data.footer_copyright)
    .bind(&data.disclaimer)
    .bind(&data.discord_link)
    .bind(&data.discord_work_us)
    .bind(&data.payment_disclaimer)
    .bind(shared::util::now_millis())
    .fetch_one(pool)
    .await?;
    tracing::info!("Site configuration saved");
    Ok(config)
}

fn section_columns() -> String {
    (1..=POLICY_SECTION_COUNT)
        .map(|i| format!("section_{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Policy page; every section empty before the first save
pub async fn get_policies(pool: &PgPool) -> ServiceResult<Policies> {
    let row = sqlx::query(&format!(
        "SELECT {}, updated_at FROM policies WHERE id = 1",
        section_columns()
    ))
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(Policies::from_stored(&[], None));
    };
    let mut columns = Vec::with_capacity(POLICY_SECTION_COUNT);
    for i in 1..=POLICY_SECTION_COUNT {
        columns.push(row.try_get::<Option<String>, _>(format!("section_{i}").as_str())?);
    }
    let updated_at: Option<i64> = row.try_get("updated_at")?;
    Ok(Policies::from_stored(&columns, updated_at))
}

pub async fn save_policies(pool: &PgPool, data: PoliciesUpdate) -> ServiceResult<Policies> {
    let policies = Policies {
        sections: data.sections,
        updated_at: Some(shared::util::now_millis()),
    };
    let stored = policies.to_stored();

    let columns = section_columns();
    let params: Vec<String> = (1..=POLICY_SECTION_COUNT + 1).map(|i| format!("${i}")).collect();
    let updates: Vec<String> = (1..=POLICY_SECTION_COUNT)
        .map(|i| format!("section_{i} = EXCLUDED.section_{i}"))
        .collect();
    let sql = format!(
        "INSERT INTO policies (id, {columns}, updated_at) VALUES (1, {}) \
         ON CONFLICT (id) DO UPDATE SET {}, updated_at = EXCLUDED.updated_at",
        params.join(", "),
        updates.join(", "),
    );

    let mut query = sqlx::query(&sql);
    for section in &stored {
        query = query.bind(section.as_deref());
    }
    query.bind(policies.updated_at).execute(pool).await?;

    tracing::info!(
        sections = stored.iter().filter(|s| s.is_some()).count(),
        "Policies saved"
    );
    Ok(Policies::from_stored(&stored, policies.updated_at))
}
