//! Push stream capability and its Server-Sent Events implementation.
//!
//! A [`StreamClient`] only moves bytes: it opens a subscription, forwards every
//! named event as a [`TransportEvent`] tagged with the caller supplied
//! [`ConnectionId`], and reports when the subscription ends. Decoding,
//! backoff and state tracking belong to the consumer.

use crate::{
    error::DataError,
    server::push_url,
    sse::SseDecoder,
};
use futures::StreamExt;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

pub mod timeout;

use timeout::{DEFAULT_IDLE_TIMEOUT, TimeoutStream};

/// Identifies one subscription attempt. Events from superseded attempts are stale.
pub type ConnectionId = u64;

/// Output of a [`StreamClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened {
        connection: ConnectionId,
    },
    Message {
        connection: ConnectionId,
        event: String,
        data: String,
    },
    Closed {
        connection: ConnectionId,
        error: Option<DataError>,
    },
}

impl TransportEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            TransportEvent::Opened { connection }
            | TransportEvent::Message { connection, .. }
            | TransportEvent::Closed { connection, .. } => *connection,
        }
    }
}

/// Capability to hold at most one push subscription.
pub trait StreamClient {
    /// Start a subscription to `server`, replacing any existing one.
    fn connect(&mut self, server: &str, connection: ConnectionId);

    /// Drop the current subscription. No further events are delivered for it.
    fn disconnect(&mut self);
}

/// Push stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Body silence after which the subscription is considered dead
    pub idle_timeout: Duration,
    /// Timeout for establishing the HTTP connection
    pub connect_timeout: Duration,
    /// Maximum channel buffer size for transport events
    pub channel_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            channel_buffer_size: 1000,
        }
    }
}

impl StreamConfig {
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// [`StreamClient`] reading `/api/sse` on a tokio task.
#[derive(Debug)]
pub struct SseStreamClient {
    config: StreamConfig,
    http: reqwest::Client,
    event_tx: mpsc::Sender<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

impl SseStreamClient {
    /// Create a client and the receiver its transport events are delivered on.
    pub fn new(config: StreamConfig) -> Result<(Self, mpsc::Receiver<TransportEvent>), DataError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);

        Ok((
            Self {
                config,
                http,
                event_tx,
                task: None,
            },
            event_rx,
        ))
    }
}

impl StreamClient for SseStreamClient {
    fn connect(&mut self, server: &str, connection: ConnectionId) {
        self.disconnect();

        let http = self.http.clone();
        let event_tx = self.event_tx.clone();
        let idle_timeout = self.config.idle_timeout;
        let server = server.to_string();

        self.task = Some(tokio::spawn(async move {
            let error = run_sse_connection(&http, &server, connection, idle_timeout, &event_tx).await;
            let _ = event_tx
                .send(TransportEvent::Closed { connection, error })
                .await;
        }));
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Aborting push stream task");
            task.abort();
        }
    }
}

impl Drop for SseStreamClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Read one subscription until it fails, returning the reason it ended.
///
/// `None` means the consumer dropped the receiver.
async fn run_sse_connection(
    http: &reqwest::Client,
    server: &str,
    connection: ConnectionId,
    idle_timeout: Duration,
    event_tx: &mpsc::Sender<TransportEvent>,
) -> Option<DataError> {
    let url = match push_url(server) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid push stream url {}: {}", server, e);
            return Some(e);
        }
    };

    info!(%url, connection, "Opening push stream");

    let response = match http
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            return Some(DataError::from(e));
        }
    };

    let status = response.status();
    if !status.is_success() {
        error!("Push stream rejected by {} with status {}", url, status);
        return Some(DataError::Status {
            endpoint: url.path().to_string(),
            status: status.as_u16(),
        });
    }

    info!("Connected to push stream at {}", url);
    if event_tx
        .send(TransportEvent::Opened { connection })
        .await
        .is_err()
    {
        return None;
    }

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(DataError::from));
    let mut body = std::pin::pin!(TimeoutStream::new(body, idle_timeout));
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Push stream error: {}", e);
                return Some(e);
            }
        };

        for frame in decoder.feed(&chunk) {
            let message = TransportEvent::Message {
                connection,
                event: frame.event,
                data: frame.data,
            };
            if event_tx.send(message).await.is_err() {
                warn!("Transport event receiver dropped, stopping stream");
                return None;
            }
        }
    }

    info!("Server closed push stream");
    Some(DataError::StreamEnded)
}

/// Call recorded by [`InMemoryStreamClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCall {
    Connect {
        server: String,
        connection: ConnectionId,
    },
    Disconnect,
}

/// [`StreamClient`] that performs no I/O and records every call. Events are
/// injected by the test driving the consumer.
#[derive(Debug, Default)]
pub struct InMemoryStreamClient {
    calls: Vec<StreamCall>,
    active: Option<ConnectionId>,
}

impl InMemoryStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[StreamCall] {
        &self.calls
    }

    /// Connection id of the live subscription, if any.
    pub fn active(&self) -> Option<ConnectionId> {
        self.active
    }

    pub fn connect_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, StreamCall::Connect { .. }))
            .count()
    }
}

impl StreamClient for InMemoryStreamClient {
    fn connect(&mut self, server: &str, connection: ConnectionId) {
        self.calls.push(StreamCall::Connect {
            server: server.to_string(),
            connection,
        });
        self.active = Some(connection);
    }

    fn disconnect(&mut self) {
        self.calls.push(StreamCall::Disconnect);
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = StreamConfig::default()
            .with_idle_timeout(Duration::from_secs(30))
            .with_connect_timeout(Duration::from_secs(5))
            .with_channel_buffer_size(64);

        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.channel_buffer_size, 64);
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.idle_timeout, Duration::from_secs(45));
        assert_eq!(config.channel_buffer_size, 1000);
    }

    #[test]
    fn test_transport_event_connection() {
        let event = TransportEvent::Message {
            connection: 3,
            event: "signal".to_string(),
            data: "{}".to_string(),
        };
        assert_eq!(event.connection(), 3);
        assert_eq!(
            TransportEvent::Closed {
                connection: 4,
                error: None
            }
            .connection(),
            4
        );
    }

    #[test]
    fn test_in_memory_client_records_calls() {
        let mut client = InMemoryStreamClient::new();
        client.connect("http://localhost:8080", 1);
        client.disconnect();
        client.connect("http://localhost:8080", 2);

        assert_eq!(client.connect_count(), 2);
        assert_eq!(client.active(), Some(2));
        assert_eq!(client.calls()[1], StreamCall::Disconnect);
    }

    #[tokio::test]
    async fn test_invalid_server_reports_closed() {
        let (mut client, mut event_rx) = SseStreamClient::new(StreamConfig::default()).unwrap();
        client.connect("not a url", 9);

        let event = event_rx.recv().await.unwrap();
        assert!(matches!(
            event,
            TransportEvent::Closed {
                connection: 9,
                error: Some(DataError::InvalidUrl(_))
            }
        ));
    }
}
