use async_trait::async_trait;
use crate::models::{Country, YearValue};
use super::DataSource;
use anyhow::{Result, anyhow};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

pub struct WorldBankFetcher {
    client: Client,
    base_url: String,
}

impl WorldBankFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(concat!("econoviz/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// World Bank responses are `[metadata, [rows...]]`; returns the rows.
    fn data_rows(json: &Value) -> Result<&Vec<Value>> {
        json.as_array()
            .and_then(|arr| arr.get(1))
            .and_then(|val| val.as_array())
            .ok_or_else(|| anyhow!("Invalid World Bank API response format"))
    }

    fn parse_observations(json: &Value) -> Result<Vec<YearValue>> {
        let mut points = Vec::new();

        for obs in Self::data_rows(json)? {
            // "date": "2023", "value": 123.45 (or null, sometimes a string)
            let Some(year) = obs["date"].as_str().and_then(|d| d.trim().parse::<i32>().ok()) else {
                continue;
            };
            let value = match &obs["value"] {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };

            if let Some(value) = value.filter(|v| v.is_finite()) {
                points.push(YearValue { year, value });
            }
        }

        // API returns newest first
        points.sort_by_key(|p| p.year);
        Ok(points)
    }

    fn parse_countries(json: &Value) -> Result<Vec<Country>> {
        let countries = Self::data_rows(json)?
            .iter()
            .filter(|c| {
                // Aggregates (regions, income groups) carry region id "NA"
                c["region"]["id"].as_str().is_some_and(|region| region != "NA")
            })
            .filter_map(|c| {
                let code = c["id"].as_str().filter(|s| !s.is_empty())?;
                let name = c["name"].as_str().filter(|s| !s.is_empty())?;
                Some(Country { code: code.to_string(), name: name.to_string() })
            })
            .collect();

        Ok(countries)
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("Fetching World Bank data: {url}");

        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("World Bank API Error: {}", resp.status()));
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl DataSource for WorldBankFetcher {
    fn name(&self) -> &str {
        "worldbank"
    }

    async fn fetch_series(&self, country_code: &str, indicator_code: &str) -> Result<Vec<YearValue>> {
        // e.g. {base}/country/IN/indicator/NY.GDP.MKTP.CD?format=json&per_page=1000
        let url = format!(
            "{}/country/{}/indicator/{}?format=json&per_page=1000",
            self.base_url, country_code, indicator_code
        );

        let json = self.get_json(&url).await?;
        let points = Self::parse_observations(&json)?;
        info!("World Bank returned {} points for {indicator_code} ({country_code})", points.len());
        Ok(points)
    }

    async fn fetch_countries(&self) -> Result<Vec<Country>> {
        let url = format!("{}/country?format=json&per_page=300", self.base_url);
        let json = self.get_json(&url).await?;
        Self::parse_countries(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wb_response() {
        let json_data = json!([
            { "page": 1, "pages": 1, "per_page": 50, "total": 4 },
            [
                { "indicator": { "id": "GDP", "value": "GDP" }, "country": { "id": "IN", "value": "India" }, "date": "2023", "value": 3.0 },
                { "indicator": { "id": "GDP", "value": "GDP" }, "country": { "id": "IN", "value": "India" }, "date": "2022", "value": "2.5" },
                { "indicator": { "id": "GDP", "value": "GDP" }, "country": { "id": "IN", "value": "India" }, "date": "2021", "value": null },
                { "indicator": { "id": "GDP", "value": "GDP" }, "country": { "id": "IN", "value": "India" }, "date": "2020", "value": 1.5 }
            ]
        ]);

        let points = WorldBankFetcher::parse_observations(&json_data).unwrap();
        assert_eq!(points.len(), 3); // null value dropped
        assert_eq!(points[0], YearValue { year: 2020, value: 1.5 });
        assert_eq!(points[1].value, 2.5); // string value accepted
        assert_eq!(points[2].year, 2023);
    }

    #[test]
    fn test_error_payload_is_rejected() {
        let json_data = json!([{ "message": [{ "id": "120", "value": "Invalid value" }] }]);
        assert!(WorldBankFetcher::parse_observations(&json_data).is_err());
    }

    #[test]
    fn test_parse_countries_skips_aggregates() {
        let json_data = json!([
            { "page": 1 },
            [
                { "id": "IND", "name": "India", "region": { "id": "SAS", "value": "South Asia" } },
                { "id": "WLD", "name": "World", "region": { "id": "NA", "value": "Aggregates" } },
                { "id": "BRA", "name": "Brazil", "region": { "id": "LCN", "value": "Latin America" } }
            ]
        ]);

        let countries = WorldBankFetcher::parse_countries(&json_data).unwrap();
        let codes: Vec<&str> = countries.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["IND", "BRA"]);
    }
}
