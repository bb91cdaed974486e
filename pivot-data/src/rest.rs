//! REST client for the pivot backend's pull endpoints.
//!
//! Every call is a single GET returning a typed body. Failures are returned
//! as [`DataError`] and the caller decides whether to retry or skip.

use crate::{
    error::DataError,
    model::{
        CompareWindow, Pattern, PivotLevels, PivotStatusResponse, RankingHistory, RankingKind,
        RankingResponse, Signal, TickerMap,
    },
    server::{endpoint, normalize_server_url},
};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const HISTORY_PATH: &str = "/api/history";
pub const PATTERNS_PATH: &str = "/api/patterns";
pub const PIVOTS_PATH: &str = "/api/pivots";
pub const TICKERS_PATH: &str = "/api/tickers";
pub const RANKING_CURRENT_PATH: &str = "/api/ranking/current";
pub const RANKING_HISTORY_PATH: &str = "/api/ranking/history";
pub const PIVOT_STATUS_PATH: &str = "/api/pivot-status";

#[derive(Serialize)]
struct LimitQuery {
    limit: usize,
}

#[derive(Serialize)]
struct RankingQuery {
    #[serde(rename = "type")]
    kind: &'static str,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    compare: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    server: String,
}

impl RestClient {
    pub fn new(server: &str, request_timeout: Duration) -> Result<Self, DataError> {
        let server = normalize_server_url(server);
        // Unusable addresses fail here, not per request
        endpoint(&server, "/")?;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self { http, server })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Same HTTP client pointed at another server.
    pub fn with_server(&self, server: &str) -> Result<Self, DataError> {
        let server = normalize_server_url(server);
        endpoint(&server, "/")?;

        Ok(Self {
            http: self.http.clone(),
            server,
        })
    }

    /// Most recent signals, newest first after the caller sorts them.
    pub async fn history(&self, limit: usize) -> Result<Vec<Signal>, DataError> {
        let url = self.url(HISTORY_PATH, &[], Some(&LimitQuery { limit }))?;
        self.get_list(url).await
    }

    pub async fn patterns(&self, limit: usize) -> Result<Vec<Pattern>, DataError> {
        let url = self.url(PATTERNS_PATH, &[], Some(&LimitQuery { limit }))?;
        self.get_list(url).await
    }

    /// Daily and weekly levels of one symbol.
    pub async fn pivots(&self, symbol: &str) -> Result<PivotLevels, DataError> {
        let url = self.url::<()>(PIVOTS_PATH, &[symbol], None)?;
        self.get(url).await
    }

    pub async fn tickers(&self) -> Result<TickerMap, DataError> {
        let url = self.url::<()>(TICKERS_PATH, &[], None)?;
        let mut tickers: TickerMap = self.get::<Option<TickerMap>>(url).await?.unwrap_or_default();
        for (symbol, ticker) in tickers.iter_mut() {
            if ticker.symbol.is_empty() {
                ticker.symbol.clone_from(symbol);
            }
        }
        Ok(tickers)
    }

    pub async fn ranking_current(
        &self,
        kind: RankingKind,
        limit: usize,
        compare: Option<CompareWindow>,
    ) -> Result<RankingResponse, DataError> {
        let query = RankingQuery {
            kind: kind.as_str(),
            limit,
            compare: compare.map(|window| window.as_str()),
        };
        let url = self.url(RANKING_CURRENT_PATH, &[], Some(&query))?;
        self.get(url).await
    }

    pub async fn ranking_history(&self, symbol: &str) -> Result<RankingHistory, DataError> {
        let url = self.url::<()>(RANKING_HISTORY_PATH, &[symbol], None)?;
        self.get(url).await
    }

    pub async fn pivot_status(&self) -> Result<PivotStatusResponse, DataError> {
        let url = self.url::<()>(PIVOT_STATUS_PATH, &[], None)?;
        self.get(url).await
    }

    fn url<Q: Serialize>(
        &self,
        path: &str,
        segments: &[&str],
        query: Option<&Q>,
    ) -> Result<Url, DataError> {
        build_url(&self.server, path, segments, query)
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, DataError> {
        Ok(self.get::<Option<Vec<T>>>(url).await?.unwrap_or_default())
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, DataError> {
        debug!(%url, "GET");

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DataError::Status {
                endpoint: url.path().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|error| DataError::decode(url.path(), error))
    }
}

/// Join `path`, percent-encoded `segments` and an optional query onto `server`.
pub fn build_url<Q: Serialize>(
    server: &str,
    path: &str,
    segments: &[&str],
    query: Option<&Q>,
) -> Result<Url, DataError> {
    let mut url = endpoint(server, path)?;

    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| DataError::InvalidUrl(format!("{server} cannot be a base")))?
            .extend(segments);
    }

    if let Some(query) = query {
        let encoded = serde_urlencoded::to_string(query)
            .map_err(|error| DataError::decode("query", error))?;
        url.set_query(Some(&encoded));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        struct TestCase {
            actual: Result<Url, DataError>,
            expected: &'static str,
        }

        let server = "http://localhost:8080/";
        let tests = vec![
            TestCase {
                // TC0: limit query
                actual: build_url(server, HISTORY_PATH, &[], Some(&LimitQuery { limit: 1000 })),
                expected: "http://localhost:8080/api/history?limit=1000",
            },
            TestCase {
                // TC1: symbol path segment
                actual: build_url::<()>(server, PIVOTS_PATH, &["BTCUSDT"], None),
                expected: "http://localhost:8080/api/pivots/BTCUSDT",
            },
            TestCase {
                // TC2: segment is percent-encoded
                actual: build_url::<()>(server, RANKING_HISTORY_PATH, &["A/B"], None),
                expected: "http://localhost:8080/api/ranking/history/A%2FB",
            },
            TestCase {
                // TC3: ranking with compare window
                actual: build_url(
                    server,
                    RANKING_CURRENT_PATH,
                    &[],
                    Some(&RankingQuery {
                        kind: RankingKind::Trades.as_str(),
                        limit: 100,
                        compare: Some(CompareWindow::OneHour.as_str()),
                    }),
                ),
                expected: "http://localhost:8080/api/ranking/current?type=trades&limit=100&compare=1h",
            },
            TestCase {
                // TC4: ranking without compare window
                actual: build_url(
                    server,
                    RANKING_CURRENT_PATH,
                    &[],
                    Some(&RankingQuery {
                        kind: RankingKind::Volume.as_str(),
                        limit: 100,
                        compare: None,
                    }),
                ),
                expected: "http://localhost:8080/api/ranking/current?type=volume&limit=100",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.actual.unwrap();
            assert_eq!(actual.as_str(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_rest_client_rejects_invalid_server() {
        let result = RestClient::new("localhost:8080", Duration::from_secs(5));
        assert!(matches!(result, Err(DataError::InvalidUrl(_))));
    }

    #[test]
    fn test_rest_client_with_server() {
        let client = RestClient::new("http://a.example:8080", Duration::from_secs(5)).unwrap();

        let moved = client.with_server(" http://b.example:9090/ ").unwrap();
        assert_eq!(moved.server(), "http://b.example:9090");
        assert_eq!(client.server(), "http://a.example:8080");

        assert!(matches!(
            client.with_server("ftp://b.example"),
            Err(DataError::InvalidUrl(_))
        ));
    }
}
