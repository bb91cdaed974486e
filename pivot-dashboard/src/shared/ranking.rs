//! Volume and trade rankings shown in the ranking tabs.
//!
//! The server ranking is preferred; when it has no items for a kind the local
//! [`SymbolRanks`] computed from the filtered signals is shown instead.

use super::filter::{RankEntry, SymbolRanks, symbol_matches};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use pivot_data::model::{RankingHistory, RankingItem, RankingKind, RankingResponse};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum RankingSort {
    /// Order as delivered
    #[default]
    Default,
    Rank,
    /// Volume or trade change over the compare window
    Growth,
}

impl RankingSort {
    pub fn next(self) -> Self {
        match self {
            RankingSort::Default => RankingSort::Rank,
            RankingSort::Rank => RankingSort::Growth,
            RankingSort::Growth => RankingSort::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RankingSource {
    Server,
    Local,
}

/// Ranking row, from either source.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub symbol: String,
    pub rank: u32,
    pub volume: f64,
    pub trade_count: u64,
    pub rank_change: Option<i32>,
    pub is_new: bool,
    pub price_change: Option<f64>,
    /// Change of the ranked dimension, percent
    pub growth: Option<f64>,
}

impl RankingRow {
    fn from_server(kind: RankingKind, item: &RankingItem) -> Self {
        let growth = match kind {
            RankingKind::Volume => item.volume_change,
            RankingKind::Trades => item.trade_change,
        };
        Self {
            symbol: item.symbol.clone(),
            rank: item.rank,
            volume: item.volume,
            trade_count: item.trade_count,
            rank_change: item.rank_change,
            is_new: item.is_new,
            price_change: item.price_change,
            growth,
        }
    }

    fn from_local(rank: usize, entry: &RankEntry) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            rank: rank as u32 + 1,
            volume: entry.volume,
            trade_count: entry.trades,
            rank_change: None,
            is_new: false,
            price_change: None,
            growth: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankingView {
    server: FnvHashMap<RankingKind, RankingResponse>,
    pub sort: RankingSort,
    pub order: SortOrder,
}

impl RankingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_server(&mut self, kind: RankingKind, response: RankingResponse) {
        self.server.insert(kind, response);
    }

    pub fn server(&self, kind: RankingKind) -> Option<&RankingResponse> {
        self.server.get(&kind)
    }

    pub fn source(&self, kind: RankingKind) -> RankingSource {
        match self.server.get(&kind) {
            Some(response) if !response.items.is_empty() => RankingSource::Server,
            _ => RankingSource::Local,
        }
    }

    /// Rows for `kind` matching `query`, in the selected sort.
    pub fn rows(&self, kind: RankingKind, local: &SymbolRanks, query: &str) -> Vec<RankingRow> {
        let rows = match (self.source(kind), self.server.get(&kind)) {
            (RankingSource::Server, Some(response)) => response
                .items
                .iter()
                .map(|item| RankingRow::from_server(kind, item))
                .collect::<Vec<_>>(),
            _ => {
                let entries = match kind {
                    RankingKind::Volume => &local.by_volume,
                    RankingKind::Trades => &local.by_trades,
                };
                entries
                    .iter()
                    .enumerate()
                    .map(|(rank, entry)| RankingRow::from_local(rank, entry))
                    .collect()
            }
        };

        let mut rows = rows
            .into_iter()
            .filter(|row| query.trim().is_empty() || symbol_matches(query, &row.symbol))
            .collect::<Vec<_>>();
        sort_rows(&mut rows, self.sort, self.order);
        rows
    }
}

/// Stable sort; rows without a value go last in either order.
pub fn sort_rows(rows: &mut [RankingRow], sort: RankingSort, order: SortOrder) {
    let key: fn(&RankingRow) -> Option<f64> = match sort {
        RankingSort::Default => return,
        RankingSort::Rank => |row| Some(row.rank as f64),
        RankingSort::Growth => |row| row.growth,
    };

    rows.sort_by(|a, b| match (key(a), key(b)) {
        (Some(a), Some(b)) => match order {
            SortOrder::Asc => a.total_cmp(&b),
            SortOrder::Desc => b.total_cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Ranking history snapshot with the price move since the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub volume_rank: u32,
    pub trades_rank: u32,
    pub price: f64,
    pub volume: f64,
    pub trade_count: u64,
    pub price_change: Option<f64>,
}

/// Oldest first. The first point, and any after a zero price, has no change.
pub fn history_points(history: &RankingHistory) -> Vec<HistoryPoint> {
    let mut snapshots = history.snapshots.iter().collect::<Vec<_>>();
    snapshots.sort_by_key(|snapshot| snapshot.timestamp);

    let mut previous: Option<f64> = None;
    snapshots
        .into_iter()
        .map(|snapshot| {
            let price_change = previous
                .filter(|prev| *prev > 0.0)
                .map(|prev| (snapshot.price - prev) / prev * 100.0);
            previous = Some(snapshot.price);

            HistoryPoint {
                timestamp: snapshot.timestamp,
                volume_rank: snapshot.volume_rank,
                trades_rank: snapshot.trades_rank,
                price: snapshot.price,
                volume: snapshot.volume,
                trade_count: snapshot.trade_count,
                price_change,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pivot_data::model::{RankingSnapshot, TickerMap, TickerSnapshot};

    fn item(symbol: &str, rank: u32, volume_change: Option<f64>) -> RankingItem {
        RankingItem {
            symbol: symbol.to_string(),
            rank,
            volume: 1_000.0 * rank as f64,
            trade_count: 10 * rank as u64,
            rank_change: None,
            is_new: false,
            price_change: None,
            volume_change,
            trade_change: None,
        }
    }

    fn symbols(rows: &[RankingRow]) -> Vec<&str> {
        rows.iter().map(|row| row.symbol.as_str()).collect()
    }

    fn local() -> SymbolRanks {
        let mut tickers = TickerMap::default();
        for (symbol, volume, trades) in [("AAAUSDT", 5.0, 1), ("BBBUSDT", 9.0, 7)] {
            tickers.insert(
                symbol.to_string(),
                TickerSnapshot {
                    symbol: symbol.to_string(),
                    last_price: 1.0,
                    price_percent: 0.0,
                    quote_volume: volume,
                    trade_count: trades,
                },
            );
        }
        SymbolRanks::compute(["AAAUSDT", "BBBUSDT"], &tickers)
    }

    #[test]
    fn test_server_ranking_preferred_over_local() {
        let mut view = RankingView::new();
        assert_eq!(view.source(RankingKind::Volume), RankingSource::Local);
        assert_eq!(
            symbols(&view.rows(RankingKind::Volume, &local(), "")),
            vec!["BBBUSDT", "AAAUSDT"]
        );

        view.set_server(
            RankingKind::Volume,
            RankingResponse {
                items: vec![item("ETHUSDT", 1, None), item("BTCUSDT", 2, None)],
                timestamp: None,
                compare_to: None,
            },
        );
        assert_eq!(view.source(RankingKind::Volume), RankingSource::Server);
        assert_eq!(
            symbols(&view.rows(RankingKind::Volume, &local(), "")),
            vec!["ETHUSDT", "BTCUSDT"]
        );

        // Trades has no server items
        assert_eq!(
            symbols(&view.rows(RankingKind::Trades, &local(), "$aaausdt")),
            vec!["AAAUSDT"]
        );
    }

    #[test]
    fn test_sort_rows_puts_missing_last() {
        struct TestCase {
            sort: RankingSort,
            order: SortOrder,
            expected: Vec<&'static str>,
        }

        let input = vec![
            RankingRow::from_server(RankingKind::Volume, &item("A", 2, None)),
            RankingRow::from_server(RankingKind::Volume, &item("B", 3, Some(-4.0))),
            RankingRow::from_server(RankingKind::Volume, &item("C", 1, Some(12.5))),
        ];

        let tests = vec![
            TestCase {
                // TC0: delivered order
                sort: RankingSort::Default,
                order: SortOrder::Desc,
                expected: vec!["A", "B", "C"],
            },
            TestCase {
                // TC1
                sort: RankingSort::Rank,
                order: SortOrder::Asc,
                expected: vec!["C", "A", "B"],
            },
            TestCase {
                // TC2
                sort: RankingSort::Growth,
                order: SortOrder::Desc,
                expected: vec!["C", "B", "A"],
            },
            TestCase {
                // TC3
                sort: RankingSort::Growth,
                order: SortOrder::Asc,
                expected: vec!["B", "C", "A"],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut rows = input.clone();
            sort_rows(&mut rows, test.sort, test.order);
            assert_eq!(symbols(&rows), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_history_points_price_change() {
        let at = |minute: u32| Utc.with_ymd_and_hms(2025, 1, 4, 12, minute, 0).unwrap();
        let snapshot = |minute: u32, price: f64| RankingSnapshot {
            timestamp: at(minute),
            volume_rank: 3,
            trades_rank: 5,
            price,
            volume: 0.0,
            trade_count: 0,
        };
        let history = RankingHistory {
            snapshots: vec![snapshot(10, 110.0), snapshot(0, 100.0), snapshot(20, 99.0)],
        };

        let points = history_points(&history);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].timestamp, at(0));
        assert_eq!(points[0].price_change, None);
        assert!((points[1].price_change.unwrap() - 10.0).abs() < 1e-9);
        assert!((points[2].price_change.unwrap() + 10.0).abs() < 1e-9);
    }
}
