//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has a default so a partial (or missing) file still
//! yields a runnable scanner.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::types::SymbolClass;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Knobs for a single scan pass.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    /// Maximum number of symbol tasks in flight at once.
    pub concurrency: usize,
    /// Candles requested per timeframe for the frequency pass.
    pub candle_limit: u32,
    /// Candles requested per timeframe for the breakout pass.
    pub breakout_candle_limit: u32,
    pub rsi_period: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            concurrency: 15,
            candle_limit: 100,
            breakout_candle_limit: 24,
            rsi_period: 14,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub venue: SymbolClass,
    pub futures_base_url: String,
    pub spot_base_url: String,
    pub request_timeout_secs: u64,
    /// Retry budget for transport failures. Zero keeps the single-shot behaviour.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            venue: SymbolClass::Futures,
            futures_base_url: "https://fapi.binance.com/fapi/v1".to_string(),
            spot_base_url: "https://api.binance.com/api/v3".to_string(),
            request_timeout_secs: 20,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl MarketConfig {
    /// REST base URL for the configured venue.
    pub fn base_url(&self) -> &str {
        match self.venue {
            SymbolClass::Futures => &self.futures_base_url,
            SymbolClass::Spot => &self.spot_base_url,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    /// Exit after the first scan instead of looping.
    pub run_once: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_once: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the binary keeps the previous run's rank snapshot.
    pub snapshot_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "rank_snapshot.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}
