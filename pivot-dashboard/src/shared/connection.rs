//! Push connection state machine with exponential backoff.
//!
//! ```text
//! Idle --open--> Connecting --opened--> Connected
//!                    |                      |
//!                 closed                 closed
//!                    v                      v
//!               Disconnected <--closed-- Reconnecting
//!                    |                      ^
//!                    +----reconnect timer---+
//! ```
//!
//! Every attempt gets a fresh [`ConnectionId`]; transport events carrying an
//! older id are ignored. At most one reconnect timer exists at a time.

use super::scheduler::{Scheduler, Timer, TimerHandle};
use derive_more::Display;
use pivot_data::{
    event::PushEvent,
    server::normalize_server_url,
    streams::{ConnectionId, StreamClient, TransportEvent},
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest raw payload excerpt written to the log.
const RAW_LOG_LIMIT: usize = 256;

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

impl ConnectionStatus {
    /// An attempt is in flight or a subscription is established.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting
                | ConnectionStatus::Connected
                | ConnectionStatus::Reconnecting
        )
    }
}

/// Reconnect delay policy: `floor`, then ×`factor` per failure up to `cap`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    floor: Duration,
    cap: Duration,
    factor: f64,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1_000),
            Duration::from_millis(30_000),
            1.5,
        )
    }
}

impl Backoff {
    pub fn new(floor: Duration, cap: Duration, factor: f64) -> Self {
        Self {
            floor,
            cap,
            factor,
            current: floor,
        }
    }

    /// Delay before the next attempt; grows the delay for the attempt after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.factor).min(self.cap);
        delay
    }

    pub fn peek(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

#[derive(Debug)]
pub struct ConnectionManager<C> {
    client: C,
    status: ConnectionStatus,
    server: Option<String>,
    connection: ConnectionId,
    backoff: Backoff,
    reconnect_timer: Option<TimerHandle>,
    transitions: Vec<ConnectionStatus>,
    malformed: u64,
}

impl<C> ConnectionManager<C>
where
    C: StreamClient,
{
    pub fn new(client: C, backoff: Backoff) -> Self {
        Self {
            client,
            status: ConnectionStatus::Idle,
            server: None,
            connection: 0,
            backoff,
            reconnect_timer: None,
            transitions: Vec::new(),
            malformed: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Number of push payloads dropped because they failed to decode.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    pub fn reconnect_timer(&self) -> Option<TimerHandle> {
        self.reconnect_timer
    }

    /// Status changes since the last call, oldest first.
    pub fn drain_transitions(&mut self) -> Vec<ConnectionStatus> {
        std::mem::take(&mut self.transitions)
    }

    /// Subscribe to `server`. Returns `false` if the same server already has a
    /// live attempt or subscription.
    pub fn open<S: Scheduler>(&mut self, server: &str, scheduler: &mut S) -> bool {
        let server = normalize_server_url(server);
        if self.status.is_live() && self.server.as_deref() == Some(server.as_str()) {
            debug!(%server, "Push stream already open");
            return false;
        }

        self.teardown(scheduler);
        self.server = Some(server);
        self.connect(ConnectionStatus::Connecting);
        true
    }

    /// Drop the subscription and any pending reconnect. No retry follows.
    pub fn close<S: Scheduler>(&mut self, scheduler: &mut S) {
        self.teardown(scheduler);
        self.server = None;
        self.set_status(ConnectionStatus::Idle);
    }

    /// Handle output of the stream client, returning a decoded event if any.
    pub fn on_transport<S: Scheduler>(
        &mut self,
        event: TransportEvent,
        scheduler: &mut S,
    ) -> Option<PushEvent> {
        if event.connection() != self.connection || self.server.is_none() {
            debug!(connection = event.connection(), "Ignoring stale transport event");
            return None;
        }

        match event {
            TransportEvent::Opened { .. } => {
                info!(server = ?self.server, "Push stream connected");
                self.backoff.reset();
                self.set_status(ConnectionStatus::Connected);
                None
            }
            TransportEvent::Message { event, data, .. } => match PushEvent::decode(&event, &data) {
                Ok(Some(event)) => Some(event),
                Ok(None) => {
                    debug!(%event, "Ignoring unknown push event");
                    None
                }
                Err(e) => {
                    self.malformed += 1;
                    warn!("Failed to parse message: {}", e);
                    debug!("Raw message: {}", truncate(&data, RAW_LOG_LIMIT));
                    None
                }
            },
            TransportEvent::Closed { error, .. } => {
                match error {
                    Some(e) => warn!(terminal = e.is_terminal(), "Push stream closed: {}", e),
                    None => info!("Push stream closed"),
                }
                self.client.disconnect();
                self.set_status(ConnectionStatus::Disconnected);
                self.schedule_reconnect(scheduler);
                None
            }
        }
    }

    /// Handle a reconnect timer fire. Superseded handles are ignored.
    pub fn on_timer(&mut self, handle: TimerHandle) {
        if self.reconnect_timer != Some(handle) {
            debug!(?handle, "Ignoring superseded reconnect timer");
            return;
        }
        self.reconnect_timer = None;

        if self.server.is_some() {
            self.connect(ConnectionStatus::Reconnecting);
        }
    }

    fn connect(&mut self, status: ConnectionStatus) {
        let Some(server) = self.server.clone() else {
            return;
        };

        self.connection += 1;
        info!(%server, connection = self.connection, "Connecting push stream");
        self.client.connect(&server, self.connection);
        self.set_status(status);
    }

    fn schedule_reconnect<S: Scheduler>(&mut self, scheduler: &mut S) {
        if self.reconnect_timer.is_some() {
            return;
        }

        let delay = self.backoff.next_delay();
        debug!("Waiting {:?} before reconnecting...", delay);
        self.reconnect_timer = Some(scheduler.after(delay, Timer::Reconnect));
    }

    fn teardown<S: Scheduler>(&mut self, scheduler: &mut S) {
        if let Some(timer) = self.reconnect_timer.take() {
            scheduler.cancel(timer);
        }
        if self.status.is_live() {
            self.client.disconnect();
        }
        // Events of the torn down attempt become stale
        self.connection += 1;
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            self.transitions.push(status);
        }
    }
}

fn truncate(raw: &str, limit: usize) -> &str {
    match raw.char_indices().nth(limit) {
        Some((index, _)) => &raw[..index],
        None => raw,
    }
}
