use itertools::Itertools;
use pivot_data::model::{LevelName, LevelSet, Period, PivotLevels};

/// A level price relative to the current price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearLevel {
    pub period: Period,
    pub name: LevelName,
    pub price: f64,
    /// Signed distance from the current price, in percent
    pub distance_percent: f64,
}

/// Closest level strictly above and strictly below a price.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NearestLevels {
    pub above: Option<NearLevel>,
    pub below: Option<NearLevel>,
}

/// Nearest levels of one timeframe. Levels equal to the price are neither
/// above nor below it; absent levels (price <= 0) never match.
pub fn nearest_levels(levels: &LevelSet, period: Period, price: f64) -> NearestLevels {
    if price.is_nan() || price <= 0.0 {
        return NearestLevels::default();
    }

    let mut nearest = NearestLevels::default();
    for (name, level) in levels.levels() {
        let near = NearLevel {
            period,
            name,
            price: level,
            distance_percent: (level - price) / price * 100.0,
        };

        if level > price {
            if nearest.above.is_none_or(|above| level - price < above.price - price) {
                nearest.above = Some(near);
            }
        } else if level < price
            && nearest.below.is_none_or(|below| price - level < price - below.price)
        {
            nearest.below = Some(near);
        }
    }

    nearest
}

/// Nearest levels for both timeframes, daily first.
pub fn nearest_for(levels: &PivotLevels, price: f64) -> Vec<NearestLevels> {
    Period::ALL
        .into_iter()
        .filter_map(|period| {
            levels
                .get(period)
                .map(|set| nearest_levels(set, period, price))
        })
        .collect()
}

/// Side of the pivot a level sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRole {
    Resistance,
    Pivot,
    Support,
}

impl From<LevelName> for LevelRole {
    fn from(name: LevelName) -> Self {
        match name {
            LevelName::R5 | LevelName::R4 | LevelName::R3 | LevelName::R2 | LevelName::R1 => {
                LevelRole::Resistance
            }
            LevelName::PP => LevelRole::Pivot,
            LevelName::S1 | LevelName::S2 | LevelName::S3 | LevelName::S4 | LevelName::S5 => {
                LevelRole::Support
            }
        }
    }
}

/// One line of a level ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LadderRow {
    Level {
        name: LevelName,
        role: LevelRole,
        price: f64,
        /// Signed distance from the current price, `None` without a price
        distance_percent: Option<f64>,
    },
    /// The current price, placed between the levels around it
    Price(f64),
}

/// Every present level of one timeframe, highest price first.
///
/// The current price row goes before the first level strictly below it, or
/// last if no level is. Without a price (<= 0) there is no price row.
pub fn level_ladder(levels: &LevelSet, price: f64) -> Vec<LadderRow> {
    let has_price = price > 0.0;
    let mut ladder = Vec::with_capacity(LevelName::ALL.len() + 1);
    let mut marked = !has_price;

    for (name, level) in levels
        .levels()
        .sorted_by(|(_, a), (_, b)| b.total_cmp(a))
    {
        if !marked && level < price {
            ladder.push(LadderRow::Price(price));
            marked = true;
        }
        ladder.push(LadderRow::Level {
            name,
            role: LevelRole::from(name),
            price: level,
            distance_percent: has_price.then(|| (level - price) / price * 100.0),
        });
    }

    if !marked {
        ladder.push(LadderRow::Price(price));
    }
    ladder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> LevelSet {
        LevelSet {
            r1: 110.0,
            pp: 100.0,
            s1: 90.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_nearest_levels() {
        struct TestCase {
            price: f64,
            expected: (Option<LevelName>, Option<LevelName>),
        }

        let tests = vec![
            TestCase {
                // TC0: just above the pivot
                price: 100.01,
                expected: (Some(LevelName::R1), Some(LevelName::PP)),
            },
            TestCase {
                // TC1: just below the pivot
                price: 99.99,
                expected: (Some(LevelName::PP), Some(LevelName::S1)),
            },
            TestCase {
                // TC2: above every level
                price: 120.0,
                expected: (None, Some(LevelName::R1)),
            },
            TestCase {
                // TC3: below every level
                price: 80.0,
                expected: (Some(LevelName::S1), None),
            },
            TestCase {
                // TC4: exactly on a level
                price: 100.0,
                expected: (Some(LevelName::R1), Some(LevelName::S1)),
            },
            TestCase {
                // TC5: no price
                price: 0.0,
                expected: (None, None),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let nearest = nearest_levels(&levels(), Period::Daily, test.price);
            let actual = (
                nearest.above.map(|level| level.name),
                nearest.below.map(|level| level.name),
            );
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_distance_percent() {
        let nearest = nearest_levels(&levels(), Period::Weekly, 100.0);
        let above = nearest.above.unwrap();
        assert_eq!(above.period, Period::Weekly);
        assert!((above.distance_percent - 10.0).abs() < 1e-9);
        assert!((nearest.below.unwrap().distance_percent + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_for_skips_missing_timeframe() {
        let pivots = PivotLevels {
            daily: None,
            weekly: Some(levels()),
        };
        let nearest = nearest_for(&pivots, 95.0);
        assert_eq!(nearest.len(), 1);
        assert_eq!(nearest[0].above.map(|level| level.period), Some(Period::Weekly));
    }

    #[test]
    fn test_level_ladder_places_price() {
        fn shape(ladder: &[LadderRow]) -> Vec<&'static str> {
            ladder
                .iter()
                .map(|row| match row {
                    LadderRow::Level { name, .. } => name.as_str(),
                    LadderRow::Price(_) => "price",
                })
                .collect()
        }

        struct TestCase {
            price: f64,
            expected: Vec<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: between pivot and support
                price: 95.0,
                expected: vec!["R1", "PP", "price", "S1"],
            },
            TestCase {
                // TC1: above every level
                price: 200.0,
                expected: vec!["price", "R1", "PP", "S1"],
            },
            TestCase {
                // TC2: below every level
                price: 50.0,
                expected: vec!["R1", "PP", "S1", "price"],
            },
            TestCase {
                // TC3: on a level, the level comes first
                price: 100.0,
                expected: vec!["R1", "PP", "price", "S1"],
            },
            TestCase {
                // TC4: no price
                price: 0.0,
                expected: vec!["R1", "PP", "S1"],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let ladder = level_ladder(&levels(), test.price);
            assert_eq!(shape(&ladder), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_level_ladder_roles_and_distance() {
        let ladder = level_ladder(&levels(), 100.0);
        let LadderRow::Level {
            role,
            distance_percent,
            ..
        } = ladder[0]
        else {
            panic!("expected a level row");
        };
        assert_eq!(role, LevelRole::Resistance);
        assert!((distance_percent.unwrap() - 10.0).abs() < 1e-9);
        assert!(matches!(
            ladder[1],
            LadderRow::Level {
                role: LevelRole::Pivot,
                ..
            }
        ));

        let ladder = level_ladder(&levels(), 0.0);
        assert!(matches!(
            ladder[2],
            LadderRow::Level {
                role: LevelRole::Support,
                distance_percent: None,
                ..
            }
        ));
    }
}
