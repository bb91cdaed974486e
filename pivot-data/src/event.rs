use crate::{
    error::DataError,
    model::{Pattern, Signal, TickerMap},
};
use serde::Deserialize;

/// Named event carrying a new [`Signal`].
pub const EVENT_SIGNAL: &str = "signal";
/// Named event carrying a new [`Pattern`].
pub const EVENT_PATTERN: &str = "pattern";
/// Named event carrying a map of [`TickerSnapshot`](crate::model::TickerSnapshot)s.
pub const EVENT_TICKER_BATCH: &str = "ticker-batch";
/// Older name of [`EVENT_TICKER_BATCH`] still emitted by some backends.
pub const EVENT_TICKER_LEGACY: &str = "ticker";

/// Decoded push feed event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Signal(Signal),
    Pattern(Pattern),
    TickerBatch(TickerMap),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TickerBatchPayload {
    Wrapped { tickers: TickerMap },
    Bare(TickerMap),
}

impl PushEvent {
    /// Decode the `data` of a named push event.
    ///
    /// Returns `Ok(None)` for event names this client does not consume.
    pub fn decode(event: &str, data: &str) -> Result<Option<Self>, DataError> {
        match event {
            EVENT_SIGNAL => serde_json::from_str::<Signal>(data)
                .map(|signal| Some(PushEvent::Signal(signal)))
                .map_err(|error| DataError::decode("signal event", error)),
            EVENT_PATTERN => serde_json::from_str::<Pattern>(data)
                .map(|pattern| Some(PushEvent::Pattern(pattern)))
                .map_err(|error| DataError::decode("pattern event", error)),
            EVENT_TICKER_BATCH | EVENT_TICKER_LEGACY => {
                let payload = serde_json::from_str::<TickerBatchPayload>(data)
                    .map_err(|error| DataError::decode("ticker batch", error))?;

                let mut tickers = match payload {
                    TickerBatchPayload::Wrapped { tickers } => tickers,
                    TickerBatchPayload::Bare(tickers) => tickers,
                };

                for (symbol, ticker) in tickers.iter_mut() {
                    if ticker.symbol.is_empty() {
                        ticker.symbol.clone_from(symbol);
                    }
                }

                Ok(Some(PushEvent::TickerBatch(tickers)))
            }
            _ => Ok(None),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::Signal(_) => EVENT_SIGNAL,
            PushEvent::Pattern(_) => EVENT_PATTERN,
            PushEvent::TickerBatch(_) => EVENT_TICKER_BATCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_push_event() {
        struct TestCase {
            event: &'static str,
            data: &'static str,
            expected: Result<Option<&'static str>, ()>,
        }

        let tests = vec![
            TestCase {
                // TC0: signal
                event: "signal",
                data: r#"{"id":"s1","symbol":"BTCUSDT","period":"1w","level":"S2","price":1.0,"direction":"down","triggered_at":"2025-01-01T00:00:00Z"}"#,
                expected: Ok(Some("signal")),
            },
            TestCase {
                // TC1: pattern
                event: "pattern",
                data: r#"{"id":"p1","symbol":"BTCUSDT","pattern":"engulfing","direction":"bearish","detected_at":"2025-01-01T00:00:00Z"}"#,
                expected: Ok(Some("pattern")),
            },
            TestCase {
                // TC2: wrapped ticker batch
                event: "ticker-batch",
                data: r#"{"tickers":{"BTCUSDT":{"last_price":1.0}}}"#,
                expected: Ok(Some("ticker-batch")),
            },
            TestCase {
                // TC3: legacy ticker name with bare map
                event: "ticker",
                data: r#"{"BTCUSDT":{"last_price":1.0}}"#,
                expected: Ok(Some("ticker-batch")),
            },
            TestCase {
                // TC4: unknown event ignored
                event: "heartbeat",
                data: "{}",
                expected: Ok(None),
            },
            TestCase {
                // TC5: malformed signal
                event: "signal",
                data: r#"{"id":"s1"}"#,
                expected: Err(()),
            },
            TestCase {
                // TC6: not json
                event: "pattern",
                data: "not json",
                expected: Err(()),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = PushEvent::decode(test.event, test.data)
                .map(|event| event.map(|event| event.name()))
                .map_err(|_| ());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_ticker_batch_fills_symbol_from_key() {
        let event = PushEvent::decode(
            EVENT_TICKER_BATCH,
            r#"{"tickers":{"ETHUSDT":{"last_price":3000.5,"quote_volume":2.5e9}}}"#,
        )
        .unwrap()
        .unwrap();

        let PushEvent::TickerBatch(tickers) = event else {
            panic!("expected ticker batch");
        };
        let ticker = tickers.get("ETHUSDT").unwrap();
        assert_eq!(ticker.symbol, "ETHUSDT");
        assert_eq!(ticker.quote_volume, 2.5e9);
    }
}
