use super::{
    cache::DEFAULT_LEVEL_TTL, connection::Backoff, viewport::Geometry,
    visibility::DEFAULT_FETCH_DEBOUNCE,
};
use std::time::Duration;

/// Dashboard configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Backend base address, e.g. `http://127.0.0.1:8080`
    pub server_url: String,
    /// Signals kept in the store
    pub signal_limit: usize,
    /// Patterns kept in the store
    pub pattern_limit: usize,
    /// Patterns requested by the bulk load
    pub pattern_load_limit: usize,
    /// Items requested from the server ranking
    pub ranking_limit: usize,
    pub level_ttl: Duration,
    pub fetch_debounce: Duration,
    pub backoff_floor: Duration,
    pub backoff_cap: Duration,
    pub backoff_factor: f64,
    pub status_poll_interval: Duration,
    pub relative_time_interval: Duration,
    pub request_timeout: Duration,
    pub geometry: Geometry,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            signal_limit: 1000,
            pattern_limit: 1000,
            pattern_load_limit: 500,
            ranking_limit: 100,
            level_ttl: DEFAULT_LEVEL_TTL,
            fetch_debounce: DEFAULT_FETCH_DEBOUNCE,
            backoff_floor: Duration::from_millis(1_000),
            backoff_cap: Duration::from_millis(30_000),
            backoff_factor: 1.5,
            status_poll_interval: Duration::from_secs(60),
            relative_time_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            geometry: Geometry::default(),
        }
    }
}

impl DashboardConfig {
    /// Create a new configuration with custom server URL
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `PIVOT_SERVER_URL`, `PIVOT_LIMIT`,
    /// `PIVOT_PATTERN_LIMIT` and `PIVOT_RANKING_LIMIT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let server_url =
            std::env::var("PIVOT_SERVER_URL").unwrap_or_else(|_| defaults.server_url.clone());
        let signal_limit = env_parse("PIVOT_LIMIT").unwrap_or(defaults.signal_limit);
        let pattern_limit = env_parse("PIVOT_PATTERN_LIMIT").unwrap_or(defaults.pattern_limit);
        let ranking_limit = env_parse("PIVOT_RANKING_LIMIT").unwrap_or(defaults.ranking_limit);

        Self {
            server_url,
            signal_limit,
            pattern_limit,
            ranking_limit,
            ..defaults
        }
    }

    pub fn with_signal_limit(mut self, limit: usize) -> Self {
        self.signal_limit = limit;
        self
    }

    pub fn with_pattern_limit(mut self, limit: usize) -> Self {
        self.pattern_limit = limit;
        self
    }

    pub fn with_level_ttl(mut self, ttl: Duration) -> Self {
        self.level_ttl = ttl;
        self
    }

    pub fn with_fetch_debounce(mut self, debounce: Duration) -> Self {
        self.fetch_debounce = debounce;
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_floor, self.backoff_cap, self.backoff_factor)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
}
