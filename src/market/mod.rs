//! Market data sources.
//!
//! Defines the `MarketDataSource` trait consumed by the scanner engine and
//! provides the Binance REST implementation:
//! - Binance USDⓈ-M futures (`fapi/v1`)
//! - Binance spot (`api/v3`)

pub mod binance;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{CandleSeries, SymbolClass, Timeframe};

/// Abstraction over an exchange's public market data.
///
/// Transport failures and timeouts are errors. A recognised provider-side
/// refusal for one symbol (delisted, unknown) is `Ok(None)` so the caller
/// can skip it quietly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Tradable USDT-quoted symbols, in the provider's order.
    async fn list_symbols(&self) -> Result<Vec<String>>;

    /// Up to `limit` most recent candles, oldest first.
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Option<CandleSeries>>;

    /// Market every symbol from this source belongs to.
    fn class(&self) -> SymbolClass;
}
