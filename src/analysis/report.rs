//! RSI frequency report.
//!
//! Turns the zone tracker of a finished run into two ranked lists (most
//! overbought readings, most oversold readings), annotates each entry with
//! its movement against the previous run's ranks, and writes a short
//! narrative for each zone leader and for the market as a whole.
//!
//! The generator never keeps state: the previous [`RankSnapshot`] comes in
//! as an argument and the new one goes back to the caller.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::analysis::zones::{SymbolZones, ZoneTracker};
use crate::types::{RankSnapshot, SymbolClass, Timeframe, Zone};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Entries kept per zone.
pub const MAX_REPORT_ENTRIES: usize = 20;

/// Symbols listed after the leader in each zone's analysis.
const NOTABLE_OTHERS: usize = 3;

/// Entry counts at which a symbol earns a badge.
const STRONG_ENTRIES: u32 = 3;
const MODERATE_ENTRIES: u32 = 2;

/// Thresholds on the number of symbols in any extreme zone.
const VERY_ACTIVE_MARKET: usize = 50;
const MODERATE_MARKET: usize = 20;

// ---------------------------------------------------------------------------
// Rank movement
// ---------------------------------------------------------------------------

/// Movement of a symbol in a zone list since the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RankMovement {
    /// Not ranked in this zone last run.
    New,
    /// Moved up this many places.
    Up(u32),
    /// Moved down this many places.
    Down(u32),
    Stable,
}

impl RankMovement {
    pub fn between(previous: Option<u32>, current: u32) -> Self {
        match previous {
            None => RankMovement::New,
            Some(prev) if prev > current => RankMovement::Up(prev - current),
            Some(prev) if prev < current => RankMovement::Down(current - prev),
            Some(_) => RankMovement::Stable,
        }
    }

    /// `previous - current`; positive means closer to the top.
    pub fn delta(&self) -> Option<i64> {
        match self {
            RankMovement::New => None,
            RankMovement::Up(d) => Some(i64::from(*d)),
            RankMovement::Down(d) => Some(-i64::from(*d)),
            RankMovement::Stable => Some(0),
        }
    }

    /// Arrow marker. Oversold lists point downward when a symbol climbs.
    pub fn arrow(&self, zone: Zone) -> String {
        match (self, zone) {
            (RankMovement::New, _) => "🆕".to_string(),
            (RankMovement::Stable, _) => "➡️".to_string(),
            (RankMovement::Up(d), Zone::Overbought) => format!("⬆️+{d}"),
            (RankMovement::Up(d), Zone::Oversold) => format!("⬇️+{d}"),
            (RankMovement::Down(d), Zone::Overbought) => format!("⬇️-{d}"),
            (RankMovement::Down(d), Zone::Oversold) => format!("⬆️-{d}"),
        }
    }

    pub fn commentary(&self, zone: Zone) -> &'static str {
        match (self, zone) {
            (RankMovement::New, _) => "✨ NEW ENTRY",
            (RankMovement::Stable, _) => "⚖️ STABLE",
            (RankMovement::Up(_), Zone::Overbought) => "🚨 APPROACHING PEAK",
            (RankMovement::Down(_), Zone::Overbought) => "⚠️ LOSING STEAM",
            // Oversold follows the same rule as overbought: climbing the
            // list means moving deeper into the zone.
            (RankMovement::Up(_), Zone::Oversold) => "💎 APPROACHING BOTTOM",
            (RankMovement::Down(_), Zone::Oversold) => "📈 RECOVERING",
        }
    }
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BadgeTier {
    Strong,
    Moderate,
}

/// Marker for symbols that entered a zone repeatedly within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub zone: Zone,
    pub tier: BadgeTier,
    pub entries: u32,
}

impl Badge {
    pub fn for_entries(zone: Zone, entries: u32) -> Option<Self> {
        let tier = if entries >= STRONG_ENTRIES {
            BadgeTier::Strong
        } else if entries >= MODERATE_ENTRIES {
            BadgeTier::Moderate
        } else {
            return None;
        };
        Some(Self { zone, tier, entries })
    }

    pub fn symbol(&self) -> &'static str {
        tier_symbol(self.zone, Some(self.tier))
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.symbol(), self.entries)
    }
}

fn tier_symbol(zone: Zone, tier: Option<BadgeTier>) -> &'static str {
    match (zone, tier) {
        (Zone::Overbought, Some(BadgeTier::Strong)) => "🔥",
        (Zone::Overbought, Some(BadgeTier::Moderate)) => "⚡",
        (Zone::Oversold, Some(BadgeTier::Strong)) => "💎",
        (Zone::Oversold, Some(BadgeTier::Moderate)) => "🔹",
        (_, None) => "👀",
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Move from the first price seen in a zone to the current price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceChange {
    pub first: f64,
    pub current: f64,
    pub pct: f64,
}

impl PriceChange {
    fn for_zone(zones: &SymbolZones, zone: Zone) -> Option<Self> {
        let first = (*zones.first_price.get(zone))?;
        let pct = zones.change_since_first(zone)?;
        Some(Self {
            first,
            current: zones.current_price,
            pct,
        })
    }
}

impl fmt::Display for PriceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.pct >= 0.0 { "📈" } else { "📉" };
        write!(
            f,
            "{:.6} → {:.6} {} {:.2}%",
            self.first, self.current, arrow, self.pct
        )
    }
}

/// One ranked line of a zone list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub zone: Zone,
    pub rank: u32,
    pub symbol: String,
    pub class: SymbolClass,
    /// Readings in this zone across all timeframes.
    pub count: u32,
    pub timeframes: Vec<(Timeframe, u32)>,
    /// Entries into this zone during the run.
    pub entries: u32,
    pub badge: Option<Badge>,
    pub movement: RankMovement,
    pub price_change: Option<PriceChange>,
}

impl ReportEntry {
    /// `15m(2) | 1h(1)` style breakdown.
    pub fn timeframe_summary(&self) -> String {
        self.timeframes
            .iter()
            .map(|(tf, c)| format!("{tf}({c})"))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    pub fn position_change(&self) -> String {
        self.movement.arrow(self.zone)
    }

    pub fn warning(&self) -> &'static str {
        self.movement.commentary(self.zone)
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}. {}", self.rank, self.symbol)?;
        let indicator = self.class.indicator();
        if !indicator.is_empty() {
            write!(f, " [{indicator}]")?;
        }
        if let Some(badge) = &self.badge {
            write!(f, " {badge}")?;
        }
        write!(
            f,
            " {} {} | {} | total {}",
            self.position_change(),
            self.warning(),
            self.timeframe_summary(),
            self.count
        )?;
        if let Some(pc) = &self.price_change {
            write!(f, " | {pc}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Narrative
// ---------------------------------------------------------------------------

/// A runner-up listed under a zone leader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotableSymbol {
    pub symbol: String,
    pub count: u32,
    pub marker: &'static str,
}

/// Commentary on the top symbol of a zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderAnalysis {
    pub zone: Zone,
    pub symbol: String,
    pub count: u32,
    pub entries: u32,
    pub entry_text: Option<String>,
    pub comment: &'static str,
    pub price_comment: Option<String>,
    pub others: Vec<NotableSymbol>,
}

impl LeaderAnalysis {
    fn build(zone: Zone, ranked: &[(&str, &SymbolZones)]) -> Option<Self> {
        let (symbol, zones) = ranked.first()?;
        let entries = *zones.entries.get(zone);
        let tier = Badge::for_entries(zone, entries).map(|b| b.tier);

        let entry_text = tier.map(|t| match t {
            BadgeTier::Strong => format!("{} {entries}× TRENDING ENTRY!", tier_symbol(zone, tier)),
            BadgeTier::Moderate => format!("{} {entries}× trending entry", tier_symbol(zone, tier)),
        });

        let comment = match (zone, tier) {
            (Zone::Overbought, Some(BadgeTier::Strong)) => {
                "Very strong SHORT setup. Time to take profit."
            }
            (Zone::Overbought, Some(BadgeTier::Moderate)) => {
                "Strong SHORT signal. A momentum break is near."
            }
            (Zone::Overbought, None) => {
                "First trending entry. Consider a short if it spreads to more timeframes."
            }
            (Zone::Oversold, Some(BadgeTier::Strong)) => {
                "Very strong LONG setup. Could be accumulated at the bottom."
            }
            (Zone::Oversold, Some(BadgeTier::Moderate)) => "Strong LONG signal. A recovery is near.",
            (Zone::Oversold, None) => {
                "First trending entry. Consider a long if it spreads to more timeframes."
            }
        };

        let price_comment = zones.change_since_first(zone).map(|pc| match zone {
            Zone::Overbought if pc > 0.0 => {
                format!("Up +{pc:.2}% since first capture - the peak is near!")
            }
            Zone::Overbought => format!("Price falling ({pc:.2}%) - momentum is breaking."),
            Zone::Oversold if pc < 0.0 => {
                format!("Down {:.2}% since first capture - the bottom is near!", pc.abs())
            }
            Zone::Oversold => format!("Price rising (+{pc:.2}%) - recovery has started."),
        });

        let others = ranked
            .iter()
            .skip(1)
            .take(NOTABLE_OTHERS)
            .map(|(s, z)| NotableSymbol {
                symbol: s.to_string(),
                count: z.total(zone),
                marker: tier_symbol(zone, Badge::for_entries(zone, *z.entries.get(zone)).map(|b| b.tier)),
            })
            .collect();

        Some(Self {
            zone,
            symbol: symbol.to_string(),
            count: zones.total(zone),
            entries,
            entry_text,
            comment,
            price_comment,
            others,
        })
    }
}

/// How busy the market is, by number of symbols in an extreme zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketActivity {
    VeryActive,
    Moderate,
    Calm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketCommentary {
    pub activity: MarketActivity,
    pub level: &'static str,
    pub details: String,
}

impl MarketCommentary {
    pub fn for_extremes(total_extreme: usize) -> Self {
        let (activity, level, text) = if total_extreme > VERY_ACTIVE_MARKET {
            (
                MarketActivity::VeryActive,
                "VERY ACTIVE!",
                "High volatility. Plenty of opportunities, but the risk is high too!",
            )
        } else if total_extreme > MODERATE_MARKET {
            (
                MarketActivity::Moderate,
                "MODERATE",
                "Check the direction of BTC and ETH before acting.",
            )
        } else {
            (
                MarketActivity::Calm,
                "CALM",
                "Low volatility. Waiting on the sidelines may be appropriate.",
            )
        };
        Self {
            activity,
            level,
            details: format!("{text} ({total_extreme} coins)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    /// Symbols with at least one reading.
    pub total_tracked: usize,
    /// Symbols in the full overbought list plus the full oversold list.
    pub total_extreme: usize,
    pub overbought: usize,
    pub oversold: usize,
}

/// The ranked frequency report for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyReport {
    pub overbought: Vec<ReportEntry>,
    pub oversold: Vec<ReportEntry>,
    pub stats: ReportStats,
    pub market: MarketCommentary,
    pub overbought_leader: Option<LeaderAnalysis>,
    pub oversold_leader: Option<LeaderAnalysis>,
    pub generated_at: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
}

impl FrequencyReport {
    pub fn entries(&self, zone: Zone) -> &[ReportEntry] {
        match zone {
            Zone::Overbought => &self.overbought,
            Zone::Oversold => &self.oversold,
        }
    }

    pub fn leader(&self, zone: Zone) -> Option<&LeaderAnalysis> {
        match zone {
            Zone::Overbought => self.overbought_leader.as_ref(),
            Zone::Oversold => self.oversold_leader.as_ref(),
        }
    }
}

impl fmt::Display for FrequencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "RSI frequency report @ {} (next ~{})",
            self.generated_at.format("%Y-%m-%d %H:%M UTC"),
            self.next_update.format("%H:%M UTC")
        )?;
        writeln!(
            f,
            "Tracked {} | extreme {} (overbought {}, oversold {})",
            self.stats.total_tracked,
            self.stats.total_extreme,
            self.stats.overbought,
            self.stats.oversold
        )?;
        writeln!(f, "Market: {} {}", self.market.level, self.market.details)?;

        for zone in Zone::ALL {
            writeln!(f)?;
            writeln!(f, "== {} ==", zone.to_string().to_uppercase())?;
            for entry in self.entries(zone) {
                writeln!(f, "{entry}")?;
            }
            if let Some(leader) = self.leader(zone) {
                write!(f, "Leader: {} ({} readings)", leader.symbol, leader.count)?;
                if let Some(text) = &leader.entry_text {
                    write!(f, " {text}")?;
                }
                writeln!(f)?;
                writeln!(f, "  {}", leader.comment)?;
                if let Some(pc) = &leader.price_comment {
                    writeln!(f, "  {pc}")?;
                }
                for other in &leader.others {
                    writeln!(f, "  {} {} ({})", other.marker, other.symbol, other.count)?;
                }
            }
        }
        Ok(())
    }
}

/// Builds [`FrequencyReport`]s from a finished run.
#[derive(Debug, Clone, Copy)]
pub struct ReportGenerator {
    max_entries: usize,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            max_entries: MAX_REPORT_ENTRIES,
        }
    }
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the report and the rank snapshot for the next run.
    pub fn generate(
        &self,
        tracker: &ZoneTracker,
        previous: &RankSnapshot,
    ) -> (FrequencyReport, RankSnapshot) {
        self.generate_at(tracker, previous, Utc::now())
    }

    /// As [`ReportGenerator::generate`] with an explicit clock.
    pub fn generate_at(
        &self,
        tracker: &ZoneTracker,
        previous: &RankSnapshot,
        now: DateTime<Utc>,
    ) -> (FrequencyReport, RankSnapshot) {
        let mut snapshot = RankSnapshot::new();

        let overbought_ranked = tracker.ranked(Zone::Overbought);
        let oversold_ranked = tracker.ranked(Zone::Oversold);

        let overbought =
            self.rank_zone(Zone::Overbought, &overbought_ranked, previous, &mut snapshot);
        let oversold = self.rank_zone(Zone::Oversold, &oversold_ranked, previous, &mut snapshot);

        let total_extreme = overbought_ranked.len() + oversold_ranked.len();
        let stats = ReportStats {
            total_tracked: tracker.len(),
            total_extreme,
            overbought: overbought_ranked.len(),
            oversold: oversold_ranked.len(),
        };

        debug!(
            tracked = stats.total_tracked,
            overbought = stats.overbought,
            oversold = stats.oversold,
            "Frequency report built"
        );

        let report = FrequencyReport {
            overbought,
            oversold,
            stats,
            market: MarketCommentary::for_extremes(total_extreme),
            overbought_leader: LeaderAnalysis::build(Zone::Overbought, &overbought_ranked),
            oversold_leader: LeaderAnalysis::build(Zone::Oversold, &oversold_ranked),
            generated_at: now,
            next_update: next_update_after(now),
        };

        (report, snapshot)
    }

    fn rank_zone(
        &self,
        zone: Zone,
        ranked: &[(&str, &SymbolZones)],
        previous: &RankSnapshot,
        snapshot: &mut RankSnapshot,
    ) -> Vec<ReportEntry> {
        ranked
            .iter()
            .take(self.max_entries)
            .zip(1u32..)
            .map(|((symbol, zones), rank)| {
                snapshot.insert(zone, *symbol, rank);
                let entries = *zones.entries.get(zone);
                ReportEntry {
                    zone,
                    rank,
                    symbol: symbol.to_string(),
                    class: zones.class,
                    count: zones.total(zone),
                    timeframes: zones.timeframes(zone),
                    entries,
                    badge: Badge::for_entries(zone, entries),
                    movement: RankMovement::between(previous.rank(zone, symbol), rank),
                    price_change: PriceChange::for_zone(zones, zone),
                }
            })
            .collect()
    }
}

/// Next hourly refresh: one hour from `now`, at minute 59.
fn next_update_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let base = now + Duration::hours(1);
    base.with_minute(59)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(base)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
