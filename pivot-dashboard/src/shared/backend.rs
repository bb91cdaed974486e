//! Pull requests to the backend.
//!
//! The dashboard submits a [`Request`] and carries on; the matching
//! [`Response`] arrives later through the event loop. Requests cannot be
//! cancelled, so every response is checked against current state on arrival.

use pivot_data::{
    DataError, RestClient,
    model::{
        CompareWindow, Pattern, PivotLevels, PivotStatusResponse, RankingHistory, RankingKind,
        RankingResponse, Signal, TickerMap,
    },
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    History {
        limit: usize,
    },
    Patterns {
        limit: usize,
    },
    Tickers,
    Levels {
        symbol: String,
    },
    Ranking {
        kind: RankingKind,
        limit: usize,
        compare: Option<CompareWindow>,
    },
    RankingHistory {
        symbol: String,
    },
    PivotStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    History(Result<Vec<Signal>, DataError>),
    Patterns(Result<Vec<Pattern>, DataError>),
    Tickers(Result<TickerMap, DataError>),
    Levels {
        symbol: String,
        result: Result<PivotLevels, DataError>,
    },
    Ranking {
        kind: RankingKind,
        /// Compare window the ranking was requested with
        compare: Option<CompareWindow>,
        result: Result<RankingResponse, DataError>,
    },
    RankingHistory {
        symbol: String,
        result: Result<RankingHistory, DataError>,
    },
    PivotStatus(Result<PivotStatusResponse, DataError>),
}

/// Capability to issue backend requests without waiting for them.
pub trait Backend {
    fn submit(&mut self, request: Request);

    /// Send later requests to `server`. Requests already submitted are unaffected.
    fn set_server(&mut self, server: &str);
}

/// [`Backend`] running each request on a tokio task against the REST API.
#[derive(Debug)]
pub struct RestBackend {
    client: RestClient,
    response_tx: mpsc::UnboundedSender<Response>,
}

impl RestBackend {
    pub fn new(client: RestClient) -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        (
            Self {
                client,
                response_tx,
            },
            response_rx,
        )
    }

    pub fn server(&self) -> &str {
        self.client.server()
    }
}

impl Backend for RestBackend {
    fn submit(&mut self, request: Request) {
        let client = self.client.clone();
        let response_tx = self.response_tx.clone();

        tokio::spawn(async move {
            let response = execute(&client, request).await;
            if response_tx.send(response).is_err() {
                debug!("Response receiver dropped");
            }
        });
    }

    fn set_server(&mut self, server: &str) {
        match self.client.with_server(server) {
            Ok(client) if client.server() == self.client.server() => {}
            Ok(client) => {
                info!(server = client.server(), "Backend requests now use new server");
                self.client = client;
            }
            Err(e) => warn!(%server, "Keeping backend server, new address unusable: {}", e),
        }
    }
}

pub async fn execute(client: &RestClient, request: Request) -> Response {
    match request {
        Request::History { limit } => Response::History(client.history(limit).await),
        Request::Patterns { limit } => Response::Patterns(client.patterns(limit).await),
        Request::Tickers => Response::Tickers(client.tickers().await),
        Request::Levels { symbol } => {
            let result = client.pivots(&symbol).await;
            Response::Levels { symbol, result }
        }
        Request::Ranking {
            kind,
            limit,
            compare,
        } => Response::Ranking {
            kind,
            compare,
            result: client.ranking_current(kind, limit, compare).await,
        },
        Request::RankingHistory { symbol } => {
            let result = client.ranking_history(&symbol).await;
            Response::RankingHistory { symbol, result }
        }
        Request::PivotStatus => Response::PivotStatus(client.pivot_status().await),
    }
}

/// [`Backend`] that records requests. Tests answer them through the dashboard.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    submitted: Vec<Request>,
    server: Option<String>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last server passed to [`Backend::set_server`].
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn submitted(&self) -> &[Request] {
        &self.submitted
    }

    /// Take every request submitted so far.
    pub fn take(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.submitted)
    }

    pub fn level_requests(&self) -> Vec<&str> {
        self.submitted
            .iter()
            .filter_map(|request| match request {
                Request::Levels { symbol } => Some(symbol.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Backend for InMemoryBackend {
    fn submit(&mut self, request: Request) {
        self.submitted.push(request);
    }

    fn set_server(&mut self, server: &str) {
        self.server = Some(server.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_in_memory_backend_records_requests() {
        let mut backend = InMemoryBackend::new();
        backend.submit(Request::Tickers);
        backend.submit(Request::Levels {
            symbol: "BTCUSDT".to_string(),
        });

        assert_eq!(backend.level_requests(), vec!["BTCUSDT"]);
        assert_eq!(backend.take().len(), 2);
        assert!(backend.submitted().is_empty());
    }

    #[test]
    fn test_rest_backend_rebinds_server() {
        let client = RestClient::new("http://a.example:8080", Duration::from_secs(5)).unwrap();
        let (mut backend, _responses) = RestBackend::new(client);

        backend.set_server("http://b.example:9090/");
        assert_eq!(backend.server(), "http://b.example:9090");

        // Unusable address keeps the current server
        backend.set_server("b.example");
        assert_eq!(backend.server(), "http://b.example:9090");
    }
}
