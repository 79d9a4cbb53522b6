use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use tracing::info;

use crate::models::{MetricKind, MetricStatus};

/// Catalog entry shipped with the service.
#[derive(Debug, Clone)]
pub struct DefaultMetric {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub indicator_code: &'static str,
}

// Helper macro to reduce boilerplate
macro_rules! wb {
    ($name:expr, $desc:expr, $unit:expr, $code:expr) => {
        DefaultMetric {
            name: $name,
            description: $desc,
            unit: $unit,
            indicator_code: $code,
        }
    };
}

// ============================================================================
// DEFAULT CATALOG (general live metrics, World Bank indicator codes)
// ============================================================================

static DEFAULT_METRICS: Lazy<Vec<DefaultMetric>> = Lazy::new(|| {
    vec![
        wb!("GDP", "Gross domestic product at current prices", "US$", "NY.GDP.MKTP.CD"),
        wb!("GDP Growth", "Annual GDP growth at constant prices", "%", "NY.GDP.MKTP.KD.ZG"),
        wb!("GDP per Capita", "GDP divided by midyear population", "US$", "NY.GDP.PCAP.CD"),
        wb!("Inflation", "Consumer prices, annual change", "%", "FP.CPI.TOTL.ZG"),
        wb!("Unemployment", "Share of the labor force without work", "%", "SL.UEM.TOTL.ZS"),
        wb!("Population", "Total midyear population", "people", "SP.POP.TOTL"),
        wb!("Exports", "Exports of goods and services", "% of GDP", "NE.EXP.GNFS.ZS"),
    ]
});

static DEFAULT_INDUSTRIES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["Agriculture", "Automotive", "Energy", "Manufacturing", "Technology"]
});

pub fn default_metrics() -> &'static [DefaultMetric] {
    &DEFAULT_METRICS
}

/// Inserts the default industries and live metrics that are not present yet.
/// Existing rows (including admin edits) are left untouched.
pub async fn seed_catalog(pool: &SqlitePool) -> Result<(usize, usize), anyhow::Error> {
    info!(
        "Seeding catalog with {} industries and {} live metrics...",
        DEFAULT_INDUSTRIES.len(),
        DEFAULT_METRICS.len()
    );

    let mut new_industries = 0;
    for name in DEFAULT_INDUSTRIES.iter() {
        let result = sqlx::query("INSERT INTO industries (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(*name)
            .execute(pool)
            .await?;
        new_industries += result.rows_affected() as usize;
    }

    let mut new_metrics = 0;
    for meta in DEFAULT_METRICS.iter() {
        let result = sqlx::query(
            "INSERT INTO metrics (name, description, industry, unit, source, status, kind, indicator_code)
             VALUES ($1, $2, '', $3, 'World Bank', $4, $5, $6)
             ON CONFLICT (name, industry) DO NOTHING",
        )
        .bind(meta.name)
        .bind(meta.description)
        .bind(meta.unit)
        .bind(MetricStatus::Active)
        .bind(MetricKind::Live)
        .bind(meta.indicator_code)
        .execute(pool)
        .await?;
        new_metrics += result.rows_affected() as usize;
    }

    info!("Seeding complete: {new_industries} new industries, {new_metrics} new metrics");
    Ok((new_industries, new_metrics))
}
