use async_trait::async_trait;
use anyhow::Result;
use crate::models::{Country, YearValue};

pub mod worldbank;

/// Remote provider of live metric series.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Yearly observations of `indicator_code` for one country, sorted by year.
    async fn fetch_series(&self, country_code: &str, indicator_code: &str) -> Result<Vec<YearValue>>;

    /// Countries the provider can serve series for.
    async fn fetch_countries(&self) -> Result<Vec<Country>>;
}
