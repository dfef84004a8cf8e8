use crate::pricing::{DEFAULT_QUERY_USD_PER_TB, DEFAULT_STORAGE_USD_PER_GB, DEFAULT_USD_TO_LOCAL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const REQUIRED_FIELDS: [&str; 4] = ["project_id", "region", "key_file", "datasets"];

/// Cost rates as written in the settings file. An explicit `null` leaves a
/// rate unset, which the rate model rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSettings {
    #[serde(default = "default_storage_rate")]
    pub storage_usd_per_gb: Option<f64>,
    #[serde(default = "default_query_rate")]
    pub query_usd_per_tb: Option<f64>,
    #[serde(default = "default_currency_multiplier")]
    pub usd_to_local: Option<f64>,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            storage_usd_per_gb: default_storage_rate(),
            query_usd_per_tb: default_query_rate(),
            usd_to_local: default_currency_multiplier(),
        }
    }
}

fn default_storage_rate() -> Option<f64> {
    Some(DEFAULT_STORAGE_USD_PER_GB)
}

fn default_query_rate() -> Option<f64> {
    Some(DEFAULT_QUERY_USD_PER_TB)
}

fn default_currency_multiplier() -> Option<f64> {
    Some(DEFAULT_USD_TO_LOCAL)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub project_id: String,
    pub region: String,
    pub key_file: PathBuf,
    pub datasets: Vec<String>,
    #[serde(default)]
    pub rates: RateSettings,
}

impl Settings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Settings file not found: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to load settings from {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let json: Value = serde_json::from_str(content).context("Failed to parse JSON")?;

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| json.get(field).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(anyhow::anyhow!(
                "Missing required settings: {}",
                missing.join(", ")
            ));
        }

        let mut settings: Settings =
            serde_json::from_value(json).context("Invalid settings values")?;
        settings.key_file = expand_path(&settings.key_file);
        Ok(settings)
    }
}

pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}
