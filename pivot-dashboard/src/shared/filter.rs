//! Pure filter and ranking derivation.
//!
//! [`derive`] maps `(records, tickers, config)` to the filtered positions and
//! the per-symbol ranks. It reads nothing else and mutates nothing, so the
//! same inputs always give the same [`DerivedView`].

use fnv::FnvHashMap;
use itertools::Itertools;
use pivot_data::model::{
    LevelName, Pattern, PatternDirection, Period, Signal, SignalDirection, TickerMap,
    TickerSnapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Multiplier applied to the minimum volume input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum VolumeUnit {
    K,
    #[default]
    M,
    B,
}

impl VolumeUnit {
    pub const ALL: [VolumeUnit; 3] = [VolumeUnit::K, VolumeUnit::M, VolumeUnit::B];

    pub fn multiplier(&self) -> f64 {
        match self {
            VolumeUnit::K => 1e3,
            VolumeUnit::M => 1e6,
            VolumeUnit::B => 1e9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeUnit::K => "K",
            VolumeUnit::M => "M",
            VolumeUnit::B => "B",
        }
    }

    /// Unknown units fall back to millions.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "K" => VolumeUnit::K,
            "B" => VolumeUnit::B,
            _ => VolumeUnit::M,
        }
    }

    /// Absolute quote volume for an input such as `50` with unit `M`.
    pub fn apply(&self, value: f64) -> f64 {
        if value.is_finite() && value > 0.0 {
            value * self.multiplier()
        } else {
            0.0
        }
    }
}

/// Symbol query matching: a leading `$` asks for an exact match on the
/// remainder, anything else is a substring match. Both ignore case.
pub fn symbol_matches(query: &str, symbol: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }

    let query = query.to_uppercase();
    let symbol = symbol.to_uppercase();
    match query.strip_prefix('$') {
        Some(exact) => symbol == exact,
        None => symbol.contains(&query),
    }
}

/// Signal filter. Rebuilt on every input change; `None` and zero mean "match all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    pub symbol_query: String,
    pub period: Option<Period>,
    /// Empty set means every level
    pub levels: BTreeSet<LevelName>,
    pub direction: Option<SignalDirection>,
    pub min_diff_percent: f64,
    /// Absolute quote volume
    pub min_volume: f64,
}

impl FilterConfig {
    pub fn with_symbol_query(mut self, query: impl Into<String>) -> Self {
        self.symbol_query = query.into();
        self
    }

    pub fn with_period(mut self, period: Option<Period>) -> Self {
        self.period = period;
        self
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LevelName>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_direction(mut self, direction: Option<SignalDirection>) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_min_diff_percent(mut self, percent: f64) -> Self {
        self.min_diff_percent = percent;
        self
    }

    pub fn with_min_volume(mut self, volume: f64) -> Self {
        self.min_volume = volume;
        self
    }

    pub fn matches(&self, signal: &Signal, tickers: &TickerMap) -> bool {
        if !symbol_matches(&self.symbol_query, &signal.symbol) {
            return false;
        }

        if self.period.is_some_and(|period| period != signal.period) {
            return false;
        }

        if !self.levels.is_empty() && !self.levels.contains(&signal.level) {
            return false;
        }

        if self
            .direction
            .is_some_and(|direction| direction != signal.direction)
        {
            return false;
        }

        let ticker = tickers.get(&signal.symbol);

        if self.min_diff_percent > 0.0 {
            match (ticker, diff_percent(signal.price, ticker)) {
                (Some(_), Some(diff)) if diff >= self.min_diff_percent => {}
                _ => return false,
            }
        }

        if self.min_volume > 0.0 {
            match ticker {
                Some(ticker) if ticker.quote_volume >= self.min_volume => {}
                _ => return false,
            }
        }

        true
    }
}

/// Distance of the last price from a level price, in percent of the level.
pub fn diff_percent(price: f64, ticker: Option<&TickerSnapshot>) -> Option<f64> {
    let ticker = ticker?;
    if price <= 0.0 || ticker.last_price <= 0.0 {
        return None;
    }
    Some((ticker.last_price - price).abs() / price * 100.0)
}

/// Symbol with the ticker values it is ranked on.
#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub symbol: String,
    pub volume: f64,
    pub trades: u64,
}

/// Two independent 1-based rankings over the same symbols.
///
/// Equal values keep the order in which symbols first appear in the ranked
/// records, so the symbol seen first gets the lower rank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolRanks {
    pub by_volume: Vec<RankEntry>,
    pub by_trades: Vec<RankEntry>,
    volume: FnvHashMap<String, u32>,
    trades: FnvHashMap<String, u32>,
}

impl SymbolRanks {
    /// Rank the distinct symbols of `symbols` that have a ticker.
    pub fn compute<'a>(symbols: impl IntoIterator<Item = &'a str>, tickers: &TickerMap) -> Self {
        let entries = symbols
            .into_iter()
            .unique()
            .filter_map(|symbol| {
                tickers.get(symbol).map(|ticker| RankEntry {
                    symbol: symbol.to_string(),
                    volume: ticker.quote_volume,
                    trades: ticker.trade_count,
                })
            })
            .collect::<Vec<_>>();

        // sorted_by is stable
        let by_volume = entries
            .iter()
            .cloned()
            .sorted_by(|a, b| b.volume.total_cmp(&a.volume))
            .collect::<Vec<_>>();
        let by_trades = entries
            .into_iter()
            .sorted_by(|a, b| b.trades.cmp(&a.trades))
            .collect::<Vec<_>>();

        let volume = rank_lookup(&by_volume);
        let trades = rank_lookup(&by_trades);

        Self {
            by_volume,
            by_trades,
            volume,
            trades,
        }
    }

    pub fn volume_rank(&self, symbol: &str) -> Option<u32> {
        self.volume.get(symbol).copied()
    }

    pub fn trades_rank(&self, symbol: &str) -> Option<u32> {
        self.trades.get(symbol).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_volume.is_empty()
    }
}

fn rank_lookup(entries: &[RankEntry]) -> FnvHashMap<String, u32> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.symbol.clone(), index as u32 + 1))
        .collect()
}

/// Output of [`derive`]: positions into the input records, in input order,
/// plus the rank side table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedView {
    pub filtered: Vec<usize>,
    pub ranks: SymbolRanks,
}

pub fn derive(records: &[Signal], tickers: &TickerMap, config: &FilterConfig) -> DerivedView {
    let filtered = records
        .iter()
        .enumerate()
        .filter(|(_, signal)| config.matches(signal, tickers))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    let ranks = SymbolRanks::compute(
        filtered.iter().map(|index| records[*index].symbol.as_str()),
        tickers,
    );

    DerivedView { filtered, ranks }
}

/// Pattern list filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternFilter {
    pub symbol_query: String,
    /// Exact pattern name
    pub pattern_type: Option<String>,
    /// Prefix of the efficiency rank, `A` matches `A+` and `A`
    pub efficiency_rank: Option<String>,
    pub direction: Option<PatternDirection>,
}

impl PatternFilter {
    pub fn matches(&self, pattern: &Pattern) -> bool {
        symbol_matches(&self.symbol_query, &pattern.symbol)
            && self
                .pattern_type
                .as_deref()
                .is_none_or(|kind| pattern.pattern == kind)
            && self
                .efficiency_rank
                .as_deref()
                .is_none_or(|rank| pattern.efficiency_rank.starts_with(rank))
            && self
                .direction
                .is_none_or(|direction| pattern.direction == direction)
    }
}

pub fn derive_patterns(records: &[Pattern], filter: &PatternFilter) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, pattern)| filter.matches(pattern))
        .map(|(index, _)| index)
        .collect()
}

/// Distinct pattern names, sorted, for the pattern type selector.
pub fn pattern_types(records: &[Pattern]) -> Vec<String> {
    records
        .iter()
        .map(|pattern| pattern.pattern.as_str())
        .unique()
        .sorted()
        .map(str::to_string)
        .collect()
}
