use crate::pricing::{
    Category, ExchangeRates, PricingConfig,
    category::{CategoryFees, CategoryMargin},
};
use std::{env, path::Path, time::Duration};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pricing config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pricing config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Reads `PRICING_CONFIG_PATH` when set, otherwise the built-in table.
pub fn load_pricing_config() -> Result<PricingConfig, ConfigError> {
    match env::var("PRICING_CONFIG_PATH") {
        Ok(path) if !path.trim().is_empty() => pricing_config_from_file(Path::new(path.trim())),
        _ => Ok(default_pricing_config()),
    }
}

pub fn pricing_config_from_file(path: &Path) -> Result<PricingConfig, ConfigError> {
    let shown = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: shown.clone(),
        source,
    })?;
    let mut config = parse_pricing_config(&raw).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;
    if config.default_category.is_none() {
        config.default_category = config.categories.last().map(|c| c.name.clone());
    }
    info!(
        target = "catalog.api",
        path = %shown,
        categories = config.categories.len(),
        "loaded pricing config"
    );
    Ok(config)
}

pub fn parse_pricing_config(raw: &str) -> Result<PricingConfig, serde_yaml::Error> {
    serde_yaml::from_str(raw)
}

fn category(id: &str, name: &str, marketplace: &str, margin: &str) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        fees: CategoryFees {
            marketplace: marketplace.to_string(),
            shopee: marketplace.to_string(),
            entraverse: String::new(),
        },
        margin: CategoryMargin {
            value: margin.to_string(),
            note: String::new(),
        },
    }
}

pub fn default_pricing_config() -> PricingConfig {
    PricingConfig {
        categories: vec![
            category("aksesoris", "Aksesoris", "6.5", "15"),
            category("elektronik", "Elektronik", "4", "10"),
            category("lainnya", "Lainnya", "5", "12"),
        ],
        exchange_rates: ExchangeRates::new([("USD", 15_500.0), ("CNY", 2_200.0)]),
        freight_vendors: Vec::new(),
        default_freight_vendor: None,
        default_category: Some("Lainnya".to_string()),
    }
}

/// Daily pass schedule.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub schedule_enabled: bool,
    pub interval: Duration,
}

impl SyncSettings {
    pub fn from_env() -> Self {
        let schedule_enabled = env::var("SYNC_SCHEDULE_ENABLED")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);
        let hours = env::var("SYNC_INTERVAL_HOURS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(24);
        Self {
            schedule_enabled,
            interval: Duration::from_secs(hours * 3600),
        }
    }
}
