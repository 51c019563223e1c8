//! Breakout hunter for short-term recovery/momentum entries.
//!
//! A symbol is a candidate when its 4h RSI sits mid-range (a dip that has
//! not collapsed), the last 4h candle moved up by more than 1%, and volume
//! is not dead. Candidates are scored additively from a base of 50 and the
//! top ten are kept.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::types::BreakoutMetrics;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const RSI_4H_MIN: f64 = 35.0;
const RSI_4H_MAX: f64 = 65.0;
const MIN_PRICE_CHANGE_4H: f64 = 1.0;
const MIN_VOLUME_MULTIPLIER: f64 = 0.5;

const BASE_SCORE: f64 = 50.0;
const MOMENTUM_WEIGHT: f64 = 8.0;
const MOMENTUM_CAP: f64 = 40.0;
const DIP_WEIGHT: f64 = 1.5;
const VOLUME_WEIGHT: f64 = 5.0;
const VOLUME_CAP: f64 = 20.0;
const PULLBACK_BONUS: f64 = 10.0;
const HOT_1H_BONUS: f64 = 10.0;
const HOT_1H_RSI: f64 = 65.0;

const STRONG_SCORE: i64 = 100;
const MEDIUM_SCORE: i64 = 75;

/// Maximum opportunities returned per run.
pub const MAX_OPPORTUNITIES: usize = 10;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Strength bucket of an opportunity, derived from its rounded score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalTier {
    Strong,
    Medium,
    Low,
}

impl SignalTier {
    fn from_score(rounded: i64) -> Self {
        if rounded >= STRONG_SCORE {
            SignalTier::Strong
        } else if rounded >= MEDIUM_SCORE {
            SignalTier::Medium
        } else {
            SignalTier::Low
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            SignalTier::Strong => "🔥 STRONG",
            SignalTier::Medium => "⚡ MEDIUM",
            SignalTier::Low => "⚖️ LOW",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            SignalTier::Strong => "🚀 ENTER ON FIRST PULLBACK",
            SignalTier::Medium => "⚡ WATCH CLOSELY",
            SignalTier::Low => "⚠️ MONITOR",
        }
    }
}

impl fmt::Display for SignalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A scored breakout candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    /// Full-precision composite score.
    pub score: f64,
    pub price: f64,
    pub rsi_1h: f64,
    pub rsi_4h: f64,
    pub price_change_4h: f64,
    pub price_change_12h: f64,
    pub volume_multiplier: f64,
    pub tier: SignalTier,
}

impl Opportunity {
    /// Score rounded for display and tiering.
    pub fn display_score(&self) -> i64 {
        self.score.round() as i64
    }

    pub fn tag(&self) -> &'static str {
        self.tier.tag()
    }

    pub fn recommendation(&self) -> &'static str {
        self.tier.recommendation()
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | score {} {} | ${:.6} | RSI 1h {:.1} 4h {:.1} | 4h {:+.2}% 12h {:+.2}% | vol x{:.2} | {}",
            self.symbol,
            self.display_score(),
            self.tag(),
            self.price,
            self.rsi_1h,
            self.rsi_4h,
            self.price_change_4h,
            self.price_change_12h,
            self.volume_multiplier,
            self.recommendation(),
        )
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Complete metrics, unwrapped for scoring.
struct Inputs {
    rsi_1h: f64,
    rsi_4h: f64,
    change_4h: f64,
    change_12h: f64,
    volume: f64,
}

impl Inputs {
    fn from_metrics(m: &BreakoutMetrics) -> Option<Self> {
        Some(Self {
            rsi_1h: m.rsi_1h?,
            rsi_4h: m.rsi_4h?,
            change_4h: m.price_change_4h?,
            change_12h: m.price_change_12h?,
            volume: m.volume_multiplier?,
        })
    }

    fn passes_gate(&self) -> bool {
        let is_dip = (RSI_4H_MIN..=RSI_4H_MAX).contains(&self.rsi_4h);
        let is_momentum = self.change_4h > MIN_PRICE_CHANGE_4H;
        let is_volume = self.volume >= MIN_VOLUME_MULTIPLIER;
        is_dip && is_momentum && is_volume
    }

    fn score(&self) -> f64 {
        let mut score = BASE_SCORE;
        score += (self.change_4h * MOMENTUM_WEIGHT).min(MOMENTUM_CAP);
        score += (50.0 - self.rsi_4h).max(0.0) * DIP_WEIGHT;
        score += (self.volume * VOLUME_WEIGHT).min(VOLUME_CAP);
        if self.change_12h < 0.0 {
            score += PULLBACK_BONUS;
        }
        if self.rsi_1h >= HOT_1H_RSI {
            score += HOT_1H_BONUS;
        }
        score
    }
}

/// Filters and ranks breakout candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakoutScorer;

impl BreakoutScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a single symbol. `None` when a metric is missing or the gate
    /// rejects it.
    pub fn evaluate(&self, symbol: &str, metrics: &BreakoutMetrics, price: f64) -> Option<Opportunity> {
        let inputs = Inputs::from_metrics(metrics)?;
        if !inputs.passes_gate() {
            return None;
        }

        let score = inputs.score();
        Some(Opportunity {
            symbol: symbol.to_string(),
            score,
            price,
            rsi_1h: inputs.rsi_1h,
            rsi_4h: inputs.rsi_4h,
            price_change_4h: inputs.change_4h,
            price_change_12h: inputs.change_12h,
            volume_multiplier: inputs.volume,
            tier: SignalTier::from_score(score.round() as i64),
        })
    }

    /// Score every symbol with complete metrics and a known price, and
    /// return the best [`MAX_OPPORTUNITIES`] by score. Ties keep input order.
    pub fn score<'a>(
        &self,
        metrics: impl IntoIterator<Item = (&'a str, &'a BreakoutMetrics)>,
        prices: &HashMap<String, f64>,
    ) -> Vec<Opportunity> {
        let mut considered = 0usize;
        let mut opportunities: Vec<Opportunity> = metrics
            .into_iter()
            .filter_map(|(symbol, m)| {
                considered += 1;
                let price = *prices.get(symbol)?;
                self.evaluate(symbol, m, price)
            })
            .collect();

        let qualified = opportunities.len();
        opportunities.sort_by(|a, b| b.score.total_cmp(&a.score));
        opportunities.truncate(MAX_OPPORTUNITIES);

        debug!(considered, qualified, kept = opportunities.len(), "Breakout scoring complete");
        opportunities
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
