use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::models::{
    DashboardInfo, Industry, MetricChanges, MetricDefinition, MetricKind, MetricStatus, NewMetric,
    NewObservation, Observation,
};

const METRIC_COLUMNS: &str = "id, name, description, industry, unit, source, status, kind, \
                              indicator_code, created_at, updated_at";
const OBSERVATION_COLUMNS: &str =
    "id, metric_name, industry, country, year, value, created_at, updated_at";

pub async fn init(config: &Config) -> Result<SqlitePool> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

    let db_path = config.database_path();
    let database_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());

    info!("Connecting to SQLite database: {database_url}");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    migrate(&pool).await?;
    info!("Database initialized successfully.");
    Ok(pool)
}

/// Single-connection in-memory database, used by tests and dry runs.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    // Every connection to `:memory:` is a separate database, so the pool must
    // never open a second one or recycle the first.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    info!("Running migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// True when the error is SQLite rejecting a row that violates a UNIQUE index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

// =====================================================================
// METRIC CATALOG
// =====================================================================

pub async fn find_metric_by_name(
    pool: &SqlitePool,
    name: &str,
    industry: &str,
) -> sqlx::Result<Option<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "SELECT {METRIC_COLUMNS} FROM metrics WHERE name = $1 AND industry = $2"
    ))
    .bind(name)
    .bind(industry)
    .fetch_optional(pool)
    .await
}

pub async fn get_metric(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!("SELECT {METRIC_COLUMNS} FROM metrics WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_manual_metric(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "SELECT {METRIC_COLUMNS} FROM metrics WHERE id = $1 AND kind = $2"
    ))
    .bind(id)
    .bind(MetricKind::Manual)
    .fetch_optional(pool)
    .await
}

pub async fn list_metrics_for_industry(
    pool: &SqlitePool,
    industry: &str,
) -> sqlx::Result<Vec<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "SELECT {METRIC_COLUMNS} FROM metrics WHERE industry = $1 ORDER BY name ASC"
    ))
    .bind(industry)
    .fetch_all(pool)
    .await
}

pub async fn list_all_metrics(pool: &SqlitePool) -> sqlx::Result<Vec<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "SELECT {METRIC_COLUMNS} FROM metrics ORDER BY industry ASC, name ASC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_manual_metrics(pool: &SqlitePool) -> sqlx::Result<Vec<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "SELECT {METRIC_COLUMNS} FROM metrics WHERE kind = $1 ORDER BY name ASC"
    ))
    .bind(MetricKind::Manual)
    .fetch_all(pool)
    .await
}

pub async fn insert_metric(pool: &SqlitePool, metric: &NewMetric) -> sqlx::Result<MetricDefinition> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "INSERT INTO metrics (name, description, industry, unit, source, status, kind, indicator_code)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {METRIC_COLUMNS}"
    ))
    .bind(&metric.name)
    .bind(&metric.description)
    .bind(&metric.industry)
    .bind(&metric.unit)
    .bind(&metric.source)
    .bind(MetricStatus::Active)
    .bind(metric.kind)
    .bind(&metric.indicator_code)
    .fetch_one(pool)
    .await
}

/// Applies `changes` on top of the stored metric. Returns `None` when the id is unknown.
pub async fn update_metric(
    pool: &SqlitePool,
    id: i64,
    changes: &MetricChanges,
) -> sqlx::Result<Option<MetricDefinition>> {
    let Some(current) = get_metric(pool, id).await? else {
        return Ok(None);
    };

    let indicator_code = match &changes.indicator_code {
        Some(code) => code.clone(),
        None => current.indicator_code,
    };

    sqlx::query_as::<_, MetricDefinition>(&format!(
        "UPDATE metrics
         SET description = $1, unit = $2, source = $3, kind = $4, indicator_code = $5,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = $6
         RETURNING {METRIC_COLUMNS}"
    ))
    .bind(changes.description.as_ref().unwrap_or(&current.description))
    .bind(changes.unit.as_ref().unwrap_or(&current.unit))
    .bind(changes.source.as_ref().unwrap_or(&current.source))
    .bind(changes.kind.unwrap_or(current.kind))
    .bind(indicator_code)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn set_metric_status(
    pool: &SqlitePool,
    id: i64,
    status: MetricStatus,
) -> sqlx::Result<Option<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "UPDATE metrics SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2
         RETURNING {METRIC_COLUMNS}"
    ))
    .bind(status)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_metric(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<MetricDefinition>> {
    sqlx::query_as::<_, MetricDefinition>(&format!(
        "DELETE FROM metrics WHERE id = $1 RETURNING {METRIC_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

// =====================================================================
// INDUSTRIES
// =====================================================================

pub async fn list_industries(pool: &SqlitePool) -> sqlx::Result<Vec<Industry>> {
    sqlx::query_as::<_, Industry>(
        "SELECT id, name, created_at, updated_at FROM industries ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn insert_industry(pool: &SqlitePool, name: &str) -> sqlx::Result<Industry> {
    sqlx::query_as::<_, Industry>(
        "INSERT INTO industries (name) VALUES ($1) RETURNING id, name, created_at, updated_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await
}

pub async fn delete_industry(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Industry>> {
    sqlx::query_as::<_, Industry>(
        "DELETE FROM industries WHERE id = $1 RETURNING id, name, created_at, updated_at",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

// =====================================================================
// OBSERVATIONS
// =====================================================================

/// Scope for observation reads. `country` and the year bounds are optional narrowing.
#[derive(Debug, Clone, Default)]
pub struct ObservationFilter<'a> {
    pub metric_name: &'a str,
    pub industry: &'a str,
    pub country: Option<&'a str>,
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
}

/// Inserts one observation. A duplicate `(metric, industry, country, year)`
/// surfaces as a unique-violation error, see [`is_unique_violation`].
pub async fn insert_observation(pool: &SqlitePool, obs: &NewObservation) -> sqlx::Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO metric_data (metric_name, industry, country, year, value)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(&obs.metric_name)
    .bind(&obs.industry)
    .bind(&obs.country)
    .bind(obs.year)
    .bind(obs.value)
    .fetch_one(pool)
    .await?;

    rec.try_get("id")
}

/// Observations in scope, ordered by country then year ascending.
pub async fn find_observations(
    pool: &SqlitePool,
    filter: &ObservationFilter<'_>,
) -> sqlx::Result<Vec<Observation>> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {OBSERVATION_COLUMNS} FROM metric_data WHERE metric_name = "
    ));
    query.push_bind(filter.metric_name);
    query.push(" AND industry = ").push_bind(filter.industry);

    if let Some(country) = filter.country {
        query.push(" AND country = ").push_bind(country);
    }
    if let Some(from) = filter.from_year {
        query.push(" AND year >= ").push_bind(from);
    }
    if let Some(to) = filter.to_year {
        query.push(" AND year <= ").push_bind(to);
    }
    query.push(" ORDER BY country ASC, year ASC");

    query.build_query_as::<Observation>().fetch_all(pool).await
}

pub async fn distinct_countries(
    pool: &SqlitePool,
    metric_name: &str,
    industry: &str,
) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT DISTINCT country FROM metric_data
         WHERE metric_name = $1 AND industry = $2 AND country != ''
         ORDER BY country ASC",
    )
    .bind(metric_name)
    .bind(industry)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|row| row.try_get("country")).collect()
}

/// Deletes every observation of the metric (optionally one country only). Returns the row count.
pub async fn delete_observations(
    pool: &SqlitePool,
    metric_name: &str,
    industry: &str,
    country: Option<&str>,
) -> sqlx::Result<u64> {
    let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM metric_data WHERE metric_name = ");
    query.push_bind(metric_name);
    query.push(" AND industry = ").push_bind(industry);
    if let Some(country) = country {
        query.push(" AND country = ").push_bind(country);
    }

    let result = query.build().execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn update_observation_value(
    pool: &SqlitePool,
    id: i64,
    value: f64,
) -> sqlx::Result<Option<Observation>> {
    sqlx::query_as::<_, Observation>(&format!(
        "UPDATE metric_data SET value = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2
         RETURNING {OBSERVATION_COLUMNS}"
    ))
    .bind(value)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn count_observations(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query("SELECT COUNT(*) AS count FROM metric_data")
        .fetch_one(pool)
        .await?
        .try_get("count")
}

/// Most recently created observations first.
pub async fn list_observations_page(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Observation>> {
    sqlx::query_as::<_, Observation>(&format!(
        "SELECT {OBSERVATION_COLUMNS} FROM metric_data
         ORDER BY created_at DESC, id DESC
         LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// =====================================================================
// REPORTING
// =====================================================================

pub async fn dashboard_info(pool: &SqlitePool) -> sqlx::Result<DashboardInfo> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM metrics WHERE industry = '')  AS macro_metrics,
            (SELECT COUNT(*) FROM metrics WHERE industry != '') AS industry_metrics,
            (SELECT COUNT(*) FROM metrics WHERE kind = 'live')   AS live_metrics,
            (SELECT COUNT(*) FROM metrics WHERE kind = 'manual') AS manual_metrics,
            (SELECT COUNT(*) FROM metric_data)                  AS total_metric_data,
            (SELECT COUNT(*) FROM industries)                   AS total_industries
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardInfo {
        macro_metrics: row.try_get("macro_metrics")?,
        industry_metrics: row.try_get("industry_metrics")?,
        live_metrics: row.try_get("live_metrics")?,
        manual_metrics: row.try_get("manual_metrics")?,
        total_metric_data: row.try_get("total_metric_data")?,
        total_industries: row.try_get("total_industries")?,
    })
}

/// Per-metric observation coverage, for operator inspection.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetricCoverage {
    pub name: String,
    pub industry: String,
    pub kind: MetricKind,
    pub observations: i64,
    pub countries: i64,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
}

pub async fn metric_coverage(pool: &SqlitePool) -> sqlx::Result<Vec<MetricCoverage>> {
    sqlx::query_as::<_, MetricCoverage>(
        r#"
        SELECT
            m.name,
            m.industry,
            m.kind,
            COUNT(d.id) AS observations,
            COUNT(DISTINCT d.country) AS countries,
            MIN(d.year) AS first_year,
            MAX(d.year) AS last_year
        FROM metrics m
        LEFT JOIN metric_data d ON d.metric_name = m.name AND d.industry = m.industry
        GROUP BY m.id
        ORDER BY m.industry, m.name
        "#,
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_metric(name: &str, industry: &str) -> NewMetric {
        NewMetric {
            name: name.to_string(),
            description: String::new(),
            industry: industry.to_string(),
            unit: "%".to_string(),
            source: String::new(),
            kind: MetricKind::Manual,
            indicator_code: None,
        }
    }

    fn observation(country: &str, year: i32, value: f64) -> NewObservation {
        NewObservation {
            metric_name: "Steel Output".to_string(),
            industry: "Manufacturing".to_string(),
            country: country.to_string(),
            year,
            value,
        }
    }

    #[tokio::test]
    async fn test_metric_identity_is_name_and_industry() {
        let pool = connect_in_memory().await.unwrap();

        insert_metric(&pool, &manual_metric("Output", "")).await.unwrap();
        insert_metric(&pool, &manual_metric("Output", "Mining")).await.unwrap();
        let err = insert_metric(&pool, &manual_metric("Output", "Mining")).await.unwrap_err();
        assert!(is_unique_violation(&err));

        let found = find_metric_by_name(&pool, "Output", "Mining").await.unwrap().unwrap();
        assert_eq!(found.industry, "Mining");
        assert!(found.status.is_active());
    }

    #[tokio::test]
    async fn test_observation_uniqueness_and_scoped_delete() {
        let pool = connect_in_memory().await.unwrap();

        insert_observation(&pool, &observation("India", 2020, 1.0)).await.unwrap();
        insert_observation(&pool, &observation("India", 2021, 2.0)).await.unwrap();
        insert_observation(&pool, &observation("Brazil", 2020, 3.0)).await.unwrap();

        let dup = insert_observation(&pool, &observation("India", 2020, 9.0)).await.unwrap_err();
        assert!(is_unique_violation(&dup));

        let countries = distinct_countries(&pool, "Steel Output", "Manufacturing").await.unwrap();
        assert_eq!(countries, vec!["Brazil".to_string(), "India".to_string()]);

        let filter = ObservationFilter {
            metric_name: "Steel Output",
            industry: "Manufacturing",
            country: Some("India"),
            from_year: Some(2021),
            to_year: None,
        };
        let rows = find_observations(&pool, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, 2021);

        let deleted = delete_observations(&pool, "Steel Output", "Manufacturing", Some("India"))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(count_observations(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_metric_keeps_unchanged_fields() {
        let pool = connect_in_memory().await.unwrap();
        let metric = insert_metric(&pool, &manual_metric("Output", "")).await.unwrap();

        let changes = MetricChanges {
            kind: Some(MetricKind::Live),
            indicator_code: Some(Some("NY.GDP.MKTP.CD".to_string())),
            ..MetricChanges::default()
        };
        let updated = update_metric(&pool, metric.id, &changes).await.unwrap().unwrap();
        assert_eq!(updated.kind, MetricKind::Live);
        assert_eq!(updated.unit, "%");
        assert_eq!(updated.indicator_code.as_deref(), Some("NY.GDP.MKTP.CD"));

        assert!(update_metric(&pool, 9999, &changes).await.unwrap().is_none());
    }
}
