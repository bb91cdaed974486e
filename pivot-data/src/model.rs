//! Wire model for the pivot signal backend.
//!
//! These types match the JSON produced by the backend REST endpoints and the
//! `data:` payloads of the push stream.

use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// Latest [`TickerSnapshot`] per symbol.
pub type TickerMap = FnvHashMap<String, TickerSnapshot>;

/// A primary record of the dashboard: something with identity, a symbol and a timestamp.
pub trait Record {
    fn id(&self) -> &str;
    fn symbol(&self) -> &str;
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Pivot timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Period {
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1w")]
    Weekly,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Daily, Period::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "1d",
            Period::Weekly => "1w",
        }
    }

    /// Single letter used in compact level decorations.
    pub fn short_label(&self) -> &'static str {
        match self {
            Period::Daily => "D",
            Period::Weekly => "W",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named Camarilla pivot level, ordered from the highest resistance to the lowest support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum LevelName {
    R5,
    R4,
    R3,
    R2,
    R1,
    PP,
    S1,
    S2,
    S3,
    S4,
    S5,
}

impl LevelName {
    pub const ALL: [LevelName; 11] = [
        LevelName::R5,
        LevelName::R4,
        LevelName::R3,
        LevelName::R2,
        LevelName::R1,
        LevelName::PP,
        LevelName::S1,
        LevelName::S2,
        LevelName::S3,
        LevelName::S4,
        LevelName::S5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelName::R5 => "R5",
            LevelName::R4 => "R4",
            LevelName::R3 => "R3",
            LevelName::R2 => "R2",
            LevelName::R1 => "R1",
            LevelName::PP => "PP",
            LevelName::S1 => "S1",
            LevelName::S2 => "S2",
            LevelName::S3 => "S3",
            LevelName::S4 => "S4",
            LevelName::S5 => "S5",
        }
    }
}

impl std::fmt::Display for LevelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction in which price crossed a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Up,
    Down,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Up => "up",
            SignalDirection::Down => "down",
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, SignalDirection::Up)
    }
}

/// Bias of a detected candlestick pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl PatternDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternDirection::Bullish => "bullish",
            PatternDirection::Bearish => "bearish",
            PatternDirection::Neutral => "neutral",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            PatternDirection::Bullish => "↑",
            PatternDirection::Bearish => "↓",
            PatternDirection::Neutral => "•",
        }
    }
}

/// How well a related pattern agrees with the signal it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Correlation {
    Strong,
    Weak,
    Moderate,
}

impl Correlation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Correlation::Strong => "strong",
            Correlation::Weak => "weak",
            Correlation::Moderate => "moderate",
        }
    }
}

/// Pivot level crossing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub period: Period,
    pub level: LevelName,
    /// Level price that was crossed
    pub price: f64,
    pub direction: SignalDirection,
    pub triggered_at: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
    /// Nearest pattern for the same symbol, attached by the backend or by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_pattern: Option<RelatedPattern>,
}

impl Record for Signal {
    fn id(&self) -> &str {
        &self.id
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.triggered_at
    }
}

/// Candlestick pattern detection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Pattern {
    pub id: String,
    pub symbol: String,
    pub pattern: String,
    #[serde(default)]
    pub pattern_cn: Option<String>,
    pub direction: PatternDirection,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub up_percent: f64,
    #[serde(default)]
    pub down_percent: f64,
    #[serde(default)]
    pub efficiency_rank: String,
    #[serde(default)]
    pub source: String,
    pub detected_at: DateTime<Utc>,
}

impl Pattern {
    /// Localised name when present, falling back to the canonical pattern name.
    pub fn display_name(&self) -> &str {
        self.pattern_cn.as_deref().unwrap_or(&self.pattern)
    }
}

impl Record for Pattern {
    fn id(&self) -> &str {
        &self.id
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}

/// Summary of the pattern nearest in time to a signal.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RelatedPattern {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub pattern_cn: Option<String>,
    pub direction: PatternDirection,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub up_percent: f64,
    #[serde(default)]
    pub down_percent: f64,
    #[serde(default)]
    pub efficiency_rank: String,
    pub correlation: Correlation,
    pub detected_at: DateTime<Utc>,
    #[serde(default = "default_count")]
    pub count: u32,
    /// Signal time minus pattern time, in whole minutes (positive = pattern came first)
    #[serde(default)]
    pub minutes_diff: i64,
}

fn default_count() -> u32 {
    1
}

impl RelatedPattern {
    /// Probability shown on the badge: the one matching the pattern direction.
    pub fn rate(&self) -> f64 {
        match self.direction {
            PatternDirection::Bullish => self.up_percent,
            PatternDirection::Bearish => self.down_percent,
            PatternDirection::Neutral => self.up_percent.max(self.down_percent),
        }
    }
}

/// Most recent 24h ticker values for one symbol. No history is retained.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TickerSnapshot {
    #[serde(default)]
    pub symbol: String,
    #[serde(alias = "lastPrice")]
    pub last_price: f64,
    #[serde(default, alias = "price_change_percent", alias = "priceChangePercent")]
    pub price_percent: f64,
    #[serde(default, alias = "quoteVolume")]
    pub quote_volume: f64,
    #[serde(default, alias = "tradeCount")]
    pub trade_count: u64,
}

/// Camarilla levels of one symbol for one timeframe.
///
/// Zero values mean "not present".
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct LevelSet {
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub close: f64,
    #[serde(default)]
    pub pp: f64,
    #[serde(default)]
    pub r1: f64,
    #[serde(default)]
    pub r2: f64,
    #[serde(default)]
    pub r3: f64,
    #[serde(default)]
    pub r4: f64,
    #[serde(default)]
    pub r5: f64,
    #[serde(default)]
    pub s1: f64,
    #[serde(default)]
    pub s2: f64,
    #[serde(default)]
    pub s3: f64,
    #[serde(default)]
    pub s4: f64,
    #[serde(default)]
    pub s5: f64,
}

impl LevelSet {
    pub fn price(&self, name: LevelName) -> f64 {
        match name {
            LevelName::R5 => self.r5,
            LevelName::R4 => self.r4,
            LevelName::R3 => self.r3,
            LevelName::R2 => self.r2,
            LevelName::R1 => self.r1,
            LevelName::PP => self.pp,
            LevelName::S1 => self.s1,
            LevelName::S2 => self.s2,
            LevelName::S3 => self.s3,
            LevelName::S4 => self.s4,
            LevelName::S5 => self.s5,
        }
    }

    /// Present levels (price > 0) from R5 down to S5.
    pub fn levels(&self) -> impl Iterator<Item = (LevelName, f64)> + '_ {
        LevelName::ALL
            .into_iter()
            .map(|name| (name, self.price(name)))
            .filter(|(_, price)| *price > 0.0)
    }
}

/// Response of the per-symbol auxiliary endpoint.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PivotLevels {
    #[serde(default)]
    pub daily: Option<LevelSet>,
    #[serde(default)]
    pub weekly: Option<LevelSet>,
}

impl PivotLevels {
    pub fn get(&self, period: Period) -> Option<&LevelSet> {
        match period {
            Period::Daily => self.daily.as_ref(),
            Period::Weekly => self.weekly.as_ref(),
        }
    }
}

/// Ranking dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingKind {
    Volume,
    Trades,
}

impl RankingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingKind::Volume => "volume",
            RankingKind::Trades => "trades",
        }
    }
}

/// Comparison window for server ranking deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CompareWindow {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
}

impl CompareWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareWindow::FiveMinutes => "5m",
            CompareWindow::FifteenMinutes => "15m",
            CompareWindow::ThirtyMinutes => "30m",
            CompareWindow::OneHour => "1h",
            CompareWindow::SixHours => "6h",
            CompareWindow::OneDay => "24h",
        }
    }
}

/// One row of the server-computed ranking.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RankingItem {
    pub symbol: String,
    pub rank: u32,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub trade_count: u64,
    #[serde(default)]
    pub rank_change: Option<i32>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub price_change: Option<f64>,
    #[serde(default)]
    pub volume_change: Option<f64>,
    #[serde(default)]
    pub trade_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RankingResponse {
    #[serde(default)]
    pub items: Vec<RankingItem>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compare_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RankingSnapshot {
    pub timestamp: DateTime<Utc>,
    pub volume_rank: u32,
    pub trades_rank: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub trade_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RankingHistory {
    #[serde(default)]
    pub snapshots: Vec<RankingSnapshot>,
}

/// Freshness of one backend pivot snapshot.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PivotStatus {
    #[serde(default)]
    pub is_stale: bool,
    #[serde(default)]
    pub seconds_until: i64,
    #[serde(default)]
    pub symbol_count: usize,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PivotStatusResponse {
    #[serde(default)]
    pub daily: Option<PivotStatus>,
    #[serde(default)]
    pub weekly: Option<PivotStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_from_backend_json() {
        let json = r#"{
            "id": "BTCUSDT-1d-R3-1735948800",
            "symbol": "BTCUSDT",
            "period": "1d",
            "level": "R3",
            "price": 98250.5,
            "direction": "up",
            "triggered_at": "2025-01-04T00:00:00Z",
            "source": "markprice"
        }"#;

        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.period, Period::Daily);
        assert_eq!(signal.level, LevelName::R3);
        assert_eq!(signal.direction, SignalDirection::Up);
        assert_eq!(signal.symbol(), "BTCUSDT");
        assert!(signal.related_pattern.is_none());
        assert_eq!(signal.occurred_at().timestamp(), 1_735_948_800);
    }

    #[test]
    fn test_pattern_defaults_and_display_name() {
        let json = r#"{
            "id": "p1",
            "symbol": "ETHUSDT",
            "pattern": "hammer",
            "direction": "bullish",
            "detected_at": "2025-01-04T00:05:00Z"
        }"#;

        let pattern: Pattern = serde_json::from_str(json).unwrap();
        assert_eq!(pattern.display_name(), "hammer");
        assert_eq!(pattern.confidence, 0.0);
        assert_eq!(pattern.direction.arrow(), "↑");
    }

    #[test]
    fn test_ticker_accepts_camel_case_aliases() {
        let json = r#"{"lastPrice": 1.5, "priceChangePercent": -2.0, "quoteVolume": 1000.0, "tradeCount": 42}"#;
        let ticker: TickerSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(ticker.last_price, 1.5);
        assert_eq!(ticker.price_percent, -2.0);
        assert_eq!(ticker.quote_volume, 1000.0);
        assert_eq!(ticker.trade_count, 42);
        assert!(ticker.symbol.is_empty());
    }

    #[test]
    fn test_level_set_skips_absent_levels() {
        let levels = LevelSet {
            pp: 100.0,
            r1: 110.0,
            s1: 90.0,
            ..Default::default()
        };

        let present: Vec<_> = levels.levels().collect();
        assert_eq!(
            present,
            vec![
                (LevelName::R1, 110.0),
                (LevelName::PP, 100.0),
                (LevelName::S1, 90.0)
            ]
        );
    }

    #[test]
    fn test_pivot_levels_null_timeframe() {
        let json = r#"{"daily": {"pp": 100.0}, "weekly": null}"#;
        let levels: PivotLevels = serde_json::from_str(json).unwrap();
        assert!(levels.get(Period::Daily).is_some());
        assert!(levels.get(Period::Weekly).is_none());
    }

    #[test]
    fn test_related_pattern_rate() {
        let related = RelatedPattern {
            id: "p".to_string(),
            pattern: "doji".to_string(),
            pattern_cn: None,
            direction: PatternDirection::Neutral,
            confidence: 50.0,
            up_percent: 40.0,
            down_percent: 55.0,
            efficiency_rank: "B".to_string(),
            correlation: Correlation::Moderate,
            detected_at: Utc::now(),
            count: 1,
            minutes_diff: 0,
        };
        assert_eq!(related.rate(), 55.0);
    }
}
