//! Analysis core: oscillator, zone tracking, breakout scoring, reports.
//!
//! Everything in here is synchronous and free of I/O. The engine feeds
//! these components with candle data and collects their output.

pub mod rsi;
pub mod zones;
pub mod breakout;
pub mod report;

pub use breakout::{BreakoutScorer, Opportunity, SignalTier};
pub use report::{FrequencyReport, ReportGenerator};
pub use rsi::{compute_rsi, DEFAULT_RSI_PERIOD};
pub use zones::{SymbolZones, ZoneMachine, ZoneTracker};
