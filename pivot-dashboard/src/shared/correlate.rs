//! Association of signals with the nearest candlestick pattern of the same symbol.

use chrono::{DateTime, Utc};
use pivot_data::model::{
    Correlation, Pattern, PatternDirection, RelatedPattern, Signal, SignalDirection,
};

/// Maximum absolute distance between a signal and its related pattern.
pub const RELATED_WINDOW_MS: i64 = 60 * 60 * 1000;

/// Pattern of `symbol` nearest to `at` within [`RELATED_WINDOW_MS`].
///
/// Equal distances resolve to the first pattern in `patterns` order.
pub fn find_related<'a>(
    patterns: &'a [Pattern],
    symbol: &str,
    at: DateTime<Utc>,
) -> Option<&'a Pattern> {
    let mut closest: Option<(&Pattern, i64)> = None;

    for pattern in patterns.iter().filter(|pattern| pattern.symbol == symbol) {
        let diff = (at - pattern.detected_at).num_milliseconds().abs();
        if diff > RELATED_WINDOW_MS {
            continue;
        }
        if closest.is_none_or(|(_, best)| diff < best) {
            closest = Some((pattern, diff));
        }
    }

    closest.map(|(pattern, _)| pattern)
}

/// Agreement between a level crossing and a pattern bias.
pub fn correlation(signal: SignalDirection, pattern: PatternDirection) -> Correlation {
    match (signal, pattern) {
        (_, PatternDirection::Neutral) => Correlation::Moderate,
        (SignalDirection::Up, PatternDirection::Bullish)
        | (SignalDirection::Down, PatternDirection::Bearish) => Correlation::Strong,
        _ => Correlation::Weak,
    }
}

pub fn related_pattern(signal: &Signal, pattern: &Pattern) -> RelatedPattern {
    let diff_ms = (signal.triggered_at - pattern.detected_at).num_milliseconds();
    let minutes = (diff_ms.unsigned_abs() as f64 / 60_000.0).round() as i64;

    RelatedPattern {
        id: pattern.id.clone(),
        pattern: pattern.pattern.clone(),
        pattern_cn: pattern.pattern_cn.clone(),
        direction: pattern.direction,
        confidence: pattern.confidence,
        up_percent: pattern.up_percent,
        down_percent: pattern.down_percent,
        efficiency_rank: pattern.efficiency_rank.clone(),
        correlation: correlation(signal.direction, pattern.direction),
        detected_at: pattern.detected_at,
        count: 1,
        minutes_diff: if diff_ms >= 0 { minutes } else { -minutes },
    }
}

/// Attach the nearest pattern to a signal that has none.
///
/// Returns `true` if the signal was modified.
pub fn associate(signal: &mut Signal, patterns: &[Pattern]) -> bool {
    if signal.related_pattern.is_some() {
        return false;
    }

    match find_related(patterns, &signal.symbol, signal.triggered_at) {
        Some(pattern) => {
            signal.related_pattern = Some(related_pattern(signal, pattern));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use pivot_data::model::{LevelName, Period};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 4, 12, 0, 0).unwrap()
    }

    fn pattern(id: &str, symbol: &str, minutes: i64, direction: PatternDirection) -> Pattern {
        Pattern {
            id: id.to_string(),
            symbol: symbol.to_string(),
            pattern: "hammer".to_string(),
            pattern_cn: None,
            direction,
            confidence: 70.0,
            up_percent: 60.0,
            down_percent: 40.0,
            efficiency_rank: "A".to_string(),
            source: String::new(),
            detected_at: base() + TimeDelta::minutes(minutes),
        }
    }

    fn signal(direction: SignalDirection) -> Signal {
        Signal {
            id: "s".to_string(),
            symbol: "BTCUSDT".to_string(),
            period: Period::Daily,
            level: LevelName::R1,
            price: 100.0,
            direction,
            triggered_at: base(),
            source: String::new(),
            related_pattern: None,
        }
    }

    #[test]
    fn test_find_related_nearest_within_window() {
        let patterns = vec![
            pattern("far", "BTCUSDT", -61, PatternDirection::Bullish),
            pattern("other", "ETHUSDT", 0, PatternDirection::Bullish),
            pattern("near", "BTCUSDT", 5, PatternDirection::Bullish),
            pattern("nearer", "BTCUSDT", -3, PatternDirection::Bullish),
        ];

        let found = find_related(&patterns, "BTCUSDT", base()).unwrap();
        assert_eq!(found.id, "nearer");
    }

    #[test]
    fn test_find_related_window_edge_and_ties() {
        let patterns = vec![
            pattern("later", "BTCUSDT", 60, PatternDirection::Bullish),
            pattern("earlier", "BTCUSDT", -60, PatternDirection::Bullish),
        ];

        // Exactly 60 minutes is inside, ties keep the first found
        let found = find_related(&patterns, "BTCUSDT", base()).unwrap();
        assert_eq!(found.id, "later");

        assert!(find_related(&patterns, "BTCUSDT", base() + TimeDelta::minutes(121)).is_none());
    }

    #[test]
    fn test_correlation() {
        struct TestCase {
            signal: SignalDirection,
            pattern: PatternDirection,
            expected: Correlation,
        }

        let tests = vec![
            TestCase {
                // TC0
                signal: SignalDirection::Up,
                pattern: PatternDirection::Bullish,
                expected: Correlation::Strong,
            },
            TestCase {
                // TC1
                signal: SignalDirection::Down,
                pattern: PatternDirection::Bearish,
                expected: Correlation::Strong,
            },
            TestCase {
                // TC2
                signal: SignalDirection::Up,
                pattern: PatternDirection::Bearish,
                expected: Correlation::Weak,
            },
            TestCase {
                // TC3
                signal: SignalDirection::Down,
                pattern: PatternDirection::Bullish,
                expected: Correlation::Weak,
            },
            TestCase {
                // TC4
                signal: SignalDirection::Down,
                pattern: PatternDirection::Neutral,
                expected: Correlation::Moderate,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = correlation(test.signal, test.pattern);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_associate_sets_signed_minutes() {
        let patterns = vec![pattern("p", "BTCUSDT", 12, PatternDirection::Bearish)];
        let mut signal = signal(SignalDirection::Down);

        assert!(associate(&mut signal, &patterns));
        let related = signal.related_pattern.clone().unwrap();
        assert_eq!(related.id, "p");
        assert_eq!(related.minutes_diff, -12);
        assert_eq!(related.correlation, Correlation::Strong);

        // Existing association is kept
        assert!(!associate(&mut signal, &patterns));
    }
}
