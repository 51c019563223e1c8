//! Extreme-zone tracking for a single scan run.
//!
//! Every symbol owns a three-state [`ZoneMachine`] (`normal`, `overbought`,
//! `oversold`) that is walked through the timeframes in processing order.
//! Feeding it an oscillator reading classifies the reading, counts
//! appearances in extreme zones, and counts *entries*: a reading whose zone
//! is extreme and differs from the state left by the previous reading.
//! The state reached on each timeframe is kept as that timeframe's last
//! state.
//!
//! A [`ZoneTracker`] is built fresh for every run and never outlives it.
//! Entry counts therefore describe transitions across timeframes inside
//! one run, not persistence of a zone across runs.

use std::collections::HashMap;
use tracing::trace;

use crate::types::{PerZone, SymbolClass, Timeframe, Zone, ZoneState};

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Outcome of feeding one reading into a [`ZoneMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ZoneState,
    pub to: ZoneState,
}

impl Transition {
    /// The extreme zone that was just entered, if this reading entered one.
    pub fn entered(&self) -> Option<Zone> {
        if self.from == self.to {
            return None;
        }
        self.to.extreme()
    }
}

/// Zone classifier with transition detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneMachine {
    state: ZoneState,
}

impl ZoneMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ZoneState {
        self.state
    }

    /// Classify `value` and move to the resulting state unconditionally.
    pub fn advance(&mut self, value: f64) -> Transition {
        let to = ZoneState::classify(value);
        let transition = Transition { from: self.state, to };
        self.state = to;
        transition
    }
}

// ---------------------------------------------------------------------------
// Per-symbol aggregate
// ---------------------------------------------------------------------------

/// Everything the tracker knows about one symbol in the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolZones {
    /// Readings per zone, indexed by [`Timeframe::index`].
    pub appearances: PerZone<[u32; 6]>,
    /// Price latched on the first reading in each zone.
    pub first_price: PerZone<Option<f64>>,
    /// Entries into each zone across the timeframes processed so far.
    pub entries: PerZone<u32>,
    pub current_price: f64,
    pub class: SymbolClass,
    machine: ZoneMachine,
    last_states: [ZoneState; 6],
}

impl SymbolZones {
    fn new(current_price: f64, class: SymbolClass) -> Self {
        Self {
            appearances: PerZone::default(),
            first_price: PerZone::default(),
            entries: PerZone::default(),
            current_price,
            class,
            machine: ZoneMachine::new(),
            last_states: [ZoneState::Normal; 6],
        }
    }

    /// Total readings in `zone` across all timeframes.
    pub fn total(&self, zone: Zone) -> u32 {
        self.appearances.get(zone).iter().sum()
    }

    /// Readings in `zone` for one timeframe.
    pub fn count(&self, zone: Zone, timeframe: Timeframe) -> u32 {
        self.appearances.get(zone)[timeframe.index()]
    }

    /// Timeframes with at least one reading in `zone`, in processing order.
    pub fn timeframes(&self, zone: Zone) -> Vec<(Timeframe, u32)> {
        Timeframe::ALL
            .iter()
            .map(|&tf| (tf, self.count(zone, tf)))
            .filter(|&(_, c)| c > 0)
            .collect()
    }

    /// Last observed state for a timeframe.
    pub fn last_state(&self, timeframe: Timeframe) -> ZoneState {
        self.last_states[timeframe.index()]
    }

    /// Percent move from the first price seen in `zone` to the current price.
    pub fn change_since_first(&self, zone: Zone) -> Option<f64> {
        let first = (*self.first_price.get(zone)).filter(|p| *p != 0.0)?;
        Some((self.current_price - first) / first * 100.0)
    }

    fn observe(&mut self, timeframe: Timeframe, value: f64, price: f64) -> Transition {
        let transition = self.machine.advance(value);
        self.last_states[timeframe.index()] = transition.to;

        if let Some(zone) = transition.entered() {
            *self.entries.get_mut(zone) += 1;
        }

        if let Some(zone) = transition.to.extreme() {
            self.appearances.get_mut(zone)[timeframe.index()] += 1;
            self.first_price.get_mut(zone).get_or_insert(price);
        }

        transition
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Per-run aggregate of zone readings, keyed by symbol.
///
/// Iteration follows the scan universe order passed to
/// [`ZoneTracker::with_universe`]; symbols outside it come last, by name.
#[derive(Debug, Clone, Default)]
pub struct ZoneTracker {
    ordinals: HashMap<String, usize>,
    symbols: HashMap<String, SymbolZones>,
}

impl ZoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker whose iteration order follows `universe`.
    pub fn with_universe(universe: &[String]) -> Self {
        Self {
            ordinals: universe
                .iter()
                .enumerate()
                .map(|(i, s)| (s.clone(), i))
                .collect(),
            symbols: HashMap::new(),
        }
    }

    /// Record one oscillator reading for `symbol` on `timeframe`.
    ///
    /// `price` becomes the symbol's current price and is latched as the
    /// first price of any zone entered for the first time this run.
    pub fn observe(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        value: f64,
        price: f64,
        class: SymbolClass,
    ) -> Transition {
        let entry = self
            .symbols
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolZones::new(price, class));
        entry.current_price = price;
        entry.class = class;

        let transition = entry.observe(timeframe, value, price);
        trace!(
            symbol,
            timeframe = %timeframe,
            value,
            from = ?transition.from,
            to = ?transition.to,
            "Zone reading"
        );
        transition
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolZones> {
        self.symbols.get(symbol)
    }

    /// Number of symbols with at least one reading.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in universe order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolZones)> {
        let mut items: Vec<(&str, &SymbolZones)> = self
            .symbols
            .iter()
            .map(|(s, z)| (s.as_str(), z))
            .collect();
        items.sort_by_key(|&(s, _)| (self.ordinals.get(s).copied().unwrap_or(usize::MAX), s));
        items.into_iter()
    }

    /// Symbols with at least one reading in `zone`, most readings first.
    /// Ties keep universe order.
    pub fn ranked(&self, zone: Zone) -> Vec<(&str, &SymbolZones)> {
        let mut list: Vec<(&str, &SymbolZones)> =
            self.iter().filter(|(_, z)| z.total(zone) > 0).collect();
        list.sort_by(|(_, a), (_, b)| b.total(zone).cmp(&a.total(zone)));
        list
    }

    /// Latest price for every tracked symbol.
    pub fn current_prices(&self) -> HashMap<String, f64> {
        self.symbols
            .iter()
            .map(|(s, z)| (s.clone(), z.current_price))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
