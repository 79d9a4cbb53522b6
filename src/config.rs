use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};
use tracing::{info, warn};

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub json_body_limit: usize,
    pub world_bank_base_url: String,
    pub default_country: String,
    pub seed_catalog: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            port: 8000,
            upload_dir: data_dir.join("uploads"),
            data_dir,
            max_upload_bytes: 10 * 1024 * 1024,
            json_body_limit: 256 * 1024,
            world_bank_base_url: "https://api.worldbank.org/v2".to_string(),
            default_country: "India".to_string(),
            seed_catalog: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            info!("No .env file loaded: {e}");
        }

        let defaults = Self::default();
        let data_dir = PathBuf::from(try_load(
            "DATA_DIR",
            defaults.data_dir.to_string_lossy().into_owned(),
        )?);
        let upload_dir = PathBuf::from(try_load(
            "UPLOAD_DIR",
            data_dir.join("uploads").to_string_lossy().into_owned(),
        )?);

        Ok(Self {
            port: try_load("ECONOVIZ_PORT", defaults.port)?,
            upload_dir,
            data_dir,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            json_body_limit: try_load("JSON_BODY_LIMIT", defaults.json_body_limit)?,
            world_bank_base_url: try_load("WORLD_BANK_BASE_URL", defaults.world_bank_base_url)?,
            default_country: try_load("DEFAULT_COUNTRY", defaults.default_country)?,
            seed_catalog: try_load("SEED_CATALOG", defaults.seed_catalog)?,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("econoviz.db")
    }
}

fn try_load<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("environment variable {key} is invalid: {e}")
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
