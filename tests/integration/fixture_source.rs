//! Fixture market data source for integration testing.
//!
//! Provides a deterministic `MarketDataSource` implementation backed by
//! in-memory candle series, with no network access. Series can be
//! swapped between runs and individual symbols can be forced to fail.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use zonescan::market::MarketDataSource;
use zonescan::types::{CandleSeries, SymbolClass, Timeframe};

/// Closes for a steady climb: RSI saturates at 100.
pub fn rising(n: usize) -> Vec<f64> {
    (0..n).map(|i| 10.0 + 0.1 * i as f64).collect()
}

/// Closes for a steady slide: RSI sits at 0.
pub fn falling(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 - 0.5 * i as f64).collect()
}

/// 100/102 alternation: RSI stays mid-range.
pub fn choppy(n: usize) -> Vec<f64> {
    (0..n).map(|i| if i % 2 == 0 { 100.0 } else { 102.0 }).collect()
}

/// Per-timeframe shape for one symbol.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    Rising,
    Falling,
    Choppy,
}

impl Shape {
    fn closes(&self, n: usize) -> Vec<f64> {
        match self {
            Shape::Rising => rising(n),
            Shape::Falling => falling(n),
            Shape::Choppy => choppy(n),
        }
    }
}

/// A deterministic in-memory market.
pub struct FixtureSource {
    symbols: Vec<String>,
    series: Mutex<HashMap<(String, Timeframe), CandleSeries>>,
    failing: Mutex<HashSet<String>>,
    class: SymbolClass,
}

impl FixtureSource {
    /// Number of candles stored per series.
    pub const DEPTH: usize = 100;

    pub fn new(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            series: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            class: SymbolClass::Futures,
        }
    }

    /// Set the shape of every timeframe for `symbol`, in `Timeframe::ALL` order.
    pub fn set_shapes(&self, symbol: &str, shapes: [Shape; 6]) {
        let mut series = self.series.lock().unwrap();
        for (tf, shape) in Timeframe::ALL.iter().zip(shapes) {
            series.insert(
                (symbol.to_string(), *tf),
                CandleSeries::from_closes(&shape.closes(Self::DEPTH)),
            );
        }
    }

    /// Make every candle request for `symbol` fail like a timeout.
    pub fn fail_symbol(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    /// The three-symbol market used by the pipeline tests.
    ///
    /// - ALPHAUSDT climbs on every timeframe
    /// - BETAUSDT climbs on 15m/1h/4h only
    /// - GAMMAUSDT slides on 15m/1h and climbs on 1d
    pub fn three_symbol_market() -> Self {
        use Shape::*;
        let source = Self::new(&["ALPHAUSDT", "BETAUSDT", "GAMMAUSDT"]);
        source.set_shapes("ALPHAUSDT", [Rising; 6]);
        source.set_shapes("BETAUSDT", [Rising, Rising, Rising, Choppy, Choppy, Choppy]);
        source.set_shapes("GAMMAUSDT", [Falling, Falling, Choppy, Choppy, Choppy, Rising]);
        source
    }
}

#[async_trait]
impl MarketDataSource for FixtureSource {
    async fn list_symbols(&self) -> Result<Vec<String>> {
        Ok(self.symbols.clone())
    }

    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Option<CandleSeries>> {
        if self.failing.lock().unwrap().contains(symbol) {
            return Err(anyhow!("request for {symbol} timed out"));
        }

        let series = self.series.lock().unwrap();
        Ok(series.get(&(symbol.to_string(), timeframe)).map(|s| {
            let skip = s.candles.len().saturating_sub(limit as usize);
            CandleSeries::new(s.candles[skip..].to_vec())
        }))
    }

    fn class(&self) -> SymbolClass {
        self.class
    }
}
