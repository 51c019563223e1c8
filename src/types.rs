//! Shared types for the ZONESCAN scanner.
//!
//! These types form the data model used across all modules.
//! They are kept free of I/O so that the analysis, engine and market
//! modules can depend on them without circular references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Candles
// ---------------------------------------------------------------------------

/// One OHLCV sample for a symbol over one interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, ms since epoch.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Close time, ms since epoch.
    pub close_time: i64,
}

impl Candle {
    /// Flat candle at a single price, mostly for fixtures.
    pub fn flat(open_time: i64, price: f64, volume: f64) -> Self {
        Self {
            open_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            close_time: open_time,
        }
    }
}

/// Candles for one symbol/interval, ascending by open time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    /// Build a series from close prices with a constant volume.
    pub fn from_closes(closes: &[f64]) -> Self {
        Self::from_closes_and_volumes(closes, &vec![1.0; closes.len()])
    }

    /// Build a series from parallel close/volume slices. Extra entries on
    /// the longer side are ignored.
    pub fn from_closes_and_volumes(closes: &[f64], volumes: &[f64]) -> Self {
        let candles = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| Candle::flat(i as i64 * 60_000, c, v))
            .collect();
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// Percent change of the last close against the one before it.
    ///
    /// `None` with fewer than two candles; `0.0` when the previous close
    /// is not positive.
    pub fn last_change_pct(&self) -> Option<f64> {
        let n = self.candles.len();
        if n < 2 {
            return None;
        }
        let now = self.candles[n - 1].close;
        let before = self.candles[n - 2].close;
        if before > 0.0 {
            Some((now - before) / before * 100.0)
        } else {
            Some(0.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Timeframes
// ---------------------------------------------------------------------------

/// Sampling interval tracked by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Frequency timeframes in processing order, shortest first. The zone
    /// entry counter depends on this order.
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
    ];

    /// Exchange interval code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
        }
    }

    /// Position in [`Timeframe::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown timeframe: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

/// Oscillator level at or above which a reading is overbought.
pub const OVERBOUGHT_LEVEL: f64 = 70.0;

/// Oscillator level at or below which a reading is oversold.
pub const OVERSOLD_LEVEL: f64 = 30.0;

/// An extreme zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Overbought,
    Oversold,
}

impl Zone {
    pub const ALL: [Zone; 2] = [Zone::Overbought, Zone::Oversold];
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Overbought => write!(f, "overbought"),
            Zone::Oversold => write!(f, "oversold"),
        }
    }
}

/// Classification of a single oscillator reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneState {
    #[default]
    Normal,
    Overbought,
    Oversold,
}

impl ZoneState {
    /// Classify an oscillator value: `>= 70` overbought, `<= 30` oversold.
    pub fn classify(value: f64) -> Self {
        if value >= OVERBOUGHT_LEVEL {
            ZoneState::Overbought
        } else if value <= OVERSOLD_LEVEL {
            ZoneState::Oversold
        } else {
            ZoneState::Normal
        }
    }

    /// The extreme zone this state sits in, if any.
    pub fn extreme(&self) -> Option<Zone> {
        match self {
            ZoneState::Normal => None,
            ZoneState::Overbought => Some(Zone::Overbought),
            ZoneState::Oversold => Some(Zone::Oversold),
        }
    }
}

/// A pair of values, one per extreme zone.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerZone<T> {
    pub overbought: T,
    pub oversold: T,
}

impl<T> PerZone<T> {
    pub fn get(&self, zone: Zone) -> &T {
        match zone {
            Zone::Overbought => &self.overbought,
            Zone::Oversold => &self.oversold,
        }
    }

    pub fn get_mut(&mut self, zone: Zone) -> &mut T {
        match zone {
            Zone::Overbought => &mut self.overbought,
            Zone::Oversold => &mut self.oversold,
        }
    }
}

/// Market a symbol is traded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolClass {
    #[default]
    Futures,
    Spot,
}

impl SymbolClass {
    /// Short marker shown next to the symbol in reports.
    pub fn indicator(&self) -> &'static str {
        match self {
            SymbolClass::Futures => "F",
            SymbolClass::Spot => "",
        }
    }
}

impl fmt::Display for SymbolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolClass::Futures => write!(f, "FUTURES"),
            SymbolClass::Spot => write!(f, "SPOT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Breakout inputs
// ---------------------------------------------------------------------------

/// Raw per-symbol inputs for the breakout scorer. Any missing field
/// excludes the symbol from scoring.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BreakoutMetrics {
    pub rsi_1h: Option<f64>,
    pub rsi_4h: Option<f64>,
    /// Percent change over the last 4h candle.
    pub price_change_4h: Option<f64>,
    /// Percent change over the last 12h candle.
    pub price_change_12h: Option<f64>,
    /// Last 1h volume over the trailing mean volume.
    pub volume_multiplier: Option<f64>,
}

impl BreakoutMetrics {
    /// True when every field needed for scoring is present.
    pub fn is_complete(&self) -> bool {
        self.rsi_1h.is_some()
            && self.rsi_4h.is_some()
            && self.price_change_4h.is_some()
            && self.price_change_12h.is_some()
            && self.volume_multiplier.is_some()
    }
}

// ---------------------------------------------------------------------------
// Rank snapshot
// ---------------------------------------------------------------------------

/// Per-zone symbol ranks captured at the end of a run.
///
/// This is the only state that crosses run boundaries: the caller passes the
/// previous snapshot into a run and gets the new one back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSnapshot {
    #[serde(default)]
    pub overbought: BTreeMap<String, u32>,
    #[serde(default)]
    pub oversold: BTreeMap<String, u32>,
}

impl RankSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rank(&self, zone: Zone, symbol: &str) -> Option<u32> {
        self.zone(zone).get(symbol).copied()
    }

    pub fn insert(&mut self, zone: Zone, symbol: impl Into<String>, rank: u32) {
        self.zone_mut(zone).insert(symbol.into(), rank);
    }

    pub fn zone(&self, zone: Zone) -> &BTreeMap<String, u32> {
        match zone {
            Zone::Overbought => &self.overbought,
            Zone::Oversold => &self.oversold,
        }
    }

    fn zone_mut(&mut self, zone: Zone) -> &mut BTreeMap<String, u32> {
        match zone {
            Zone::Overbought => &mut self.overbought,
            Zone::Oversold => &mut self.oversold,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overbought.is_empty() && self.oversold.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// A progress milestone published during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub message: String,
    /// 0.0–100.0
    pub percentage: f64,
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>5.1}%] {}", self.percentage, self.message)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ZONESCAN.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("No tradable symbols returned by the market data source")]
    NoSymbols,

    #[error("Symbol listing failed: {0}")]
    SymbolList(String),

    #[error("Provider error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
