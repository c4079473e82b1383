//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{Result, TradingError};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_, `__` as separator)
/// 2. Configuration file (TOML or YAML, by extension)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| TradingError::Configuration(e.to_string()))?;

    let app: AppConfig = config
        .try_deserialize()
        .map_err(|e| TradingError::Configuration(e.to_string()))?;

    validate(&app)?;
    Ok(app)
}

fn validate(config: &AppConfig) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for gateway in &config.gateways {
        if gateway.name.trim().is_empty() {
            return Err(TradingError::Configuration(
                "Gateway name must not be empty".to_string(),
            ));
        }
        if gateway.name.contains('.') {
            return Err(TradingError::Configuration(format!(
                "Gateway name may not contain '.': {}",
                gateway.name
            )));
        }
        if !seen.insert(gateway.name.as_str()) {
            return Err(TradingError::Configuration(format!(
                "Duplicate gateway name: {}",
                gateway.name
            )));
        }
    }

    Ok(())
}
